//! Route table
//!
//! Maps the routing prefix of a `/v1/{prefix}/...` request path to the
//! backend that should receive it.
//!
//! # Routing model
//!
//! Lookups are two-level:
//!
//! 1. **Prefix → entry**: the second path segment selects a [`RouteEntry`]
//! 2. **Next segment → target**: entries may override the target for
//!    specific follow-on segments (`/v1/ach/transfers/...` goes to paygate
//!    while the rest of `/v1/ach/...` goes to the ach service); the entry's
//!    own target is the default for anything not listed
//!
//! Matching is case-insensitive at both levels. The table is built once at
//! startup from configuration plus the execution mode and never mutated
//! afterwards, so it is shared across request tasks without locking.

use crate::config::Config;
use crate::environment::Mode;
use crate::errors::ProxyError;
use http::uri::Authority;
use std::collections::HashMap;

/// A resolved backend authority (host:port) rewritten requests are sent to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub authority: Authority,
}

#[derive(Debug)]
struct RouteEntry {
    target: Target,
    path_rewrite: Option<String>,
    sub_routes: HashMap<String, Target>,
}

/// Borrowed view of a single table match
#[derive(Debug, PartialEq)]
pub struct Resolved<'a> {
    pub target: &'a Target,
    /// Fixed path prefix the backend expects in place of the consumed
    /// segments; `None` means strip-and-forward
    pub path_rewrite: Option<&'a str>,
}

/// Immutable prefix → target mapping
#[derive(Debug)]
pub struct RouteTable {
    entries: HashMap<String, RouteEntry>,
}

impl RouteTable {
    /// Builds the table, resolving each route's service name to an authority
    /// for the given execution mode: configured bind addresses locally,
    /// `{service}.{domain}:{port}` DNS names inside a cluster.
    pub fn from_config(config: &Config, mode: Mode) -> Result<RouteTable, ProxyError> {
        let services: HashMap<&str, &str> = config
            .services
            .iter()
            .map(|s| (s.name.as_str(), s.address.as_str()))
            .collect();

        let resolve = |service: &str| -> Result<Target, ProxyError> {
            let authority = match mode {
                Mode::Local => services
                    .get(service)
                    .ok_or_else(|| ProxyError::UnknownService(service.to_string()))?
                    .parse::<Authority>()?,
                Mode::Cluster => {
                    format!("{}.{}:{}", service, config.cluster.domain, config.cluster.port)
                        .parse::<Authority>()?
                }
            };
            Ok(Target { authority })
        };

        let mut entries = HashMap::with_capacity(config.routes.len());
        for route in &config.routes {
            let mut sub_routes = HashMap::new();
            for sub in &route.sub_routes {
                let target = resolve(&sub.service)?;
                for segment in &sub.segments {
                    sub_routes.insert(segment.to_ascii_lowercase(), target.clone());
                }
            }
            entries.insert(
                route.prefix.to_ascii_lowercase(),
                RouteEntry {
                    target: resolve(&route.service)?,
                    path_rewrite: route.path_rewrite.clone(),
                    sub_routes,
                },
            );
        }

        Ok(RouteTable { entries })
    }

    /// Looks up a routing prefix and, when the entry carries sub-routes, the
    /// segment after it. Unlisted or absent next segments fall back to the
    /// entry's default target.
    pub fn resolve(&self, prefix: &str, next: Option<&str>) -> Option<Resolved<'_>> {
        let entry = self.entries.get(&prefix.to_ascii_lowercase())?;
        let target = next
            .and_then(|segment| entry.sub_routes.get(&segment.to_ascii_lowercase()))
            .unwrap_or(&entry.target);
        Some(Resolved {
            target,
            path_rewrite: entry.path_rewrite.as_deref(),
        })
    }
}
