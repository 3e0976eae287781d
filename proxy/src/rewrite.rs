//! Request rewriter
//!
//! Reshapes production-shaped request URLs onto route-table targets. Each
//! route looks like `/v1/{prefix}/...`, so the v1 and prefix segments are
//! trimmed off while the prefix selects the backend; a few prefixes
//! substitute a fixed path prefix instead because their backend expects one
//! (`/v1/users/...` becomes `/users/...` on the auth service).

use crate::config::FallbackPolicy;
use crate::errors::ProxyError;
use crate::routes::RouteTable;
use http::Request;
use http::uri::{PathAndQuery, Scheme, Uri};
use std::sync::Arc;

/// What a rewrite pass decided about a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// URI mutated in place; forward to the resolved backend
    Matched,
    /// No routing prefix applies; request left untouched
    Passthrough,
}

/// Applies the route table to request URIs.
///
/// Rewriting is pure computation on request metadata; the table is immutable,
/// so one rewriter (or clones of it) serves concurrent requests without
/// synchronization.
#[derive(Clone)]
pub struct Rewriter {
    table: Arc<RouteTable>,
    fallback: FallbackPolicy,
    debug: bool,
}

impl Rewriter {
    pub fn new(table: Arc<RouteTable>, fallback: FallbackPolicy, debug: bool) -> Self {
        Self {
            table,
            fallback,
            debug,
        }
    }

    /// Rewrites the request URI in place.
    ///
    /// Requests without a `/v1/{prefix}/...` shape are reported as
    /// [`RewriteOutcome::Passthrough`] and left untouched. Unmatched prefixes
    /// follow the fallback policy: pass through, or fail naming the prefix.
    /// The rewritten URI no longer matches `/v1/{prefix}/...`, so a second
    /// pass over the same request is not supported.
    pub fn rewrite<B>(&self, req: &mut Request<B>) -> Result<RewriteOutcome, ProxyError> {
        let path = req.uri().path().to_owned();

        // Splits into: "", v1, $prefix, (rest of path)
        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 3 {
            return Ok(RewriteOutcome::Passthrough);
        }
        if segments.len() > 3 && segments.last() == Some(&"") {
            // Tolerate a trailing slash
            segments.pop();
        }

        let prefix = segments[2];
        let Some(resolved) = self.table.resolve(prefix, segments.get(3).copied()) else {
            return match self.fallback {
                FallbackPolicy::Strict => {
                    Err(ProxyError::UnresolvedPrefix(prefix.to_ascii_lowercase()))
                }
                FallbackPolicy::Passthrough => {
                    tracing::debug!(prefix, "no route; passing request through");
                    Ok(RewriteOutcome::Passthrough)
                }
            };
        };

        // Everything after $prefix, re-rooted at the rewrite prefix or "/"
        let rest = segments[3..].join("/");
        let mut target_path = match resolved.path_rewrite {
            Some(rewrite) => format!("{rewrite}/{rest}"),
            None => format!("/{rest}"),
        };
        if let Some(query) = req.uri().query() {
            target_path.push('?');
            target_path.push_str(query);
        }

        let original = self.debug.then(|| req.uri().to_string());

        let mut parts = req.uri().clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(resolved.target.authority.clone());
        parts.path_and_query = Some(target_path.parse::<PathAndQuery>()?);
        let rewritten = Uri::from_parts(parts)?;

        if let Some(original) = original {
            tracing::debug!(
                method = %req.method(),
                url = %rewritten,
                original = %original,
                headers = ?req.headers(),
                "rewrote request"
            );
        }

        *req.uri_mut() = rewritten;
        Ok(RewriteOutcome::Matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::environment::Mode;

    // URL pairs a local-dev client would exercise: the production-shaped URL
    // sent to the load balancer, and the URL the rewriter should produce.
    const CASES: &[(&str, &str)] = &[
        ("https://api.example.com/v1/ach/files", "http://127.0.0.1:8080/files"),
        ("https://api.example.com/v1/users/create", "http://127.0.0.1:8081/users/create"),
        ("https://api.example.com/v1/oauth2/clients", "http://127.0.0.1:8081/oauth2/clients"),
        ("https://api.example.com/v1/ach/customers/foo", "http://127.0.0.1:8082/customers/foo"),
        ("https://api.example.com/v1/ach/depositories/foo", "http://127.0.0.1:8082/depositories/foo"),
        ("https://api.example.com/v1/ach/originators/foo", "http://127.0.0.1:8082/originators/foo"),
        ("https://api.example.com/v1/ach/transfers/foo", "http://127.0.0.1:8082/transfers/foo"),
        ("https://api.example.com/v1/ofac/downloads", "http://127.0.0.1:8084/downloads"),
        ("https://api.example.com/v1/fed/test", "http://127.0.0.1:8086/fed/test"),
    ];

    fn test_table() -> Arc<RouteTable> {
        let config: Config = serde_yaml::from_str(
            r#"
services:
    - name: ach
      address: "127.0.0.1:8080"
    - name: auth
      address: "127.0.0.1:8081"
    - name: paygate
      address: "127.0.0.1:8082"
    - name: ofac
      address: "127.0.0.1:8084"
    - name: fed
      address: "127.0.0.1:8086"
routes:
    - prefix: ach
      service: ach
      sub_routes:
          - segments: [customers, depositories, originators, transfers]
            service: paygate
    - prefix: auth
      service: auth
    - prefix: paygate
      service: paygate
    - prefix: oauth2
      service: auth
      path_rewrite: /oauth2
    - prefix: users
      service: auth
      path_rewrite: /users
    - prefix: fed
      service: fed
      path_rewrite: /fed
    - prefix: ofac
      service: ofac
"#,
        )
        .expect("parse test config");
        Arc::new(RouteTable::from_config(&config, Mode::Local).expect("build table"))
    }

    fn rewriter(fallback: FallbackPolicy) -> Rewriter {
        Rewriter::new(test_table(), fallback, false)
    }

    fn request(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_rewrite_table() {
        let rewriter = rewriter(FallbackPolicy::Strict);
        for (incoming, proxied) in CASES {
            let mut req = request(incoming);
            let outcome = rewriter.rewrite(&mut req).unwrap();
            assert_eq!(outcome, RewriteOutcome::Matched);
            assert_eq!(&req.uri().to_string(), proxied, "for {incoming}");
        }
    }

    #[test]
    fn test_prefix_matching_is_case_insensitive() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        let mut req = request("https://api.example.com/v1/ACH/Transfers/foo");
        rewriter.rewrite(&mut req).unwrap();
        assert_eq!(req.uri().authority().unwrap(), "127.0.0.1:8082");
        assert_eq!(req.uri().path(), "/Transfers/foo");
    }

    #[test]
    fn test_short_paths_pass_through() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        for uri in ["https://api.example.com/", "https://api.example.com/v1"] {
            let mut req = request(uri);
            let outcome = rewriter.rewrite(&mut req).unwrap();
            assert_eq!(outcome, RewriteOutcome::Passthrough);
            assert_eq!(&req.uri().to_string(), uri, "request should be untouched");
        }
    }

    #[test]
    fn test_bare_prefix_and_trailing_slash() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        // No segments after the prefix still produces a valid target path
        let mut req = request("https://api.example.com/v1/ach");
        rewriter.rewrite(&mut req).unwrap();
        assert_eq!(&req.uri().to_string(), "http://127.0.0.1:8080/");

        let mut req = request("https://api.example.com/v1/users");
        rewriter.rewrite(&mut req).unwrap();
        assert_eq!(&req.uri().to_string(), "http://127.0.0.1:8081/users/");

        let mut req = request("https://api.example.com/v1/ach/files/");
        rewriter.rewrite(&mut req).unwrap();
        assert_eq!(&req.uri().to_string(), "http://127.0.0.1:8080/files");
    }

    #[test]
    fn test_query_preserved() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        let mut req = request("https://api.example.com/v1/ach/transfers/foo?limit=10&cursor=abc");
        rewriter.rewrite(&mut req).unwrap();
        assert_eq!(
            &req.uri().to_string(),
            "http://127.0.0.1:8082/transfers/foo?limit=10&cursor=abc"
        );
    }

    #[test]
    fn test_unmatched_prefix_strict() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        let mut req = request("https://api.example.com/v1/unknown/thing");
        match rewriter.rewrite(&mut req) {
            Err(ProxyError::UnresolvedPrefix(prefix)) => assert_eq!(prefix, "unknown"),
            other => panic!("expected UnresolvedPrefix, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_prefix_passthrough() {
        let rewriter = rewriter(FallbackPolicy::Passthrough);

        let uri = "https://api.example.com/v1/unknown/thing";
        let mut req = request(uri);
        let outcome = rewriter.rewrite(&mut req).unwrap();
        assert_eq!(outcome, RewriteOutcome::Passthrough);
        assert_eq!(&req.uri().to_string(), uri);
    }

    #[test]
    fn test_concurrent_rewrites_match_sequential() {
        let rewriter = rewriter(FallbackPolicy::Strict);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rewriter = rewriter.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        for (incoming, proxied) in CASES {
                            let mut req = request(incoming);
                            rewriter.rewrite(&mut req).unwrap();
                            assert_eq!(&req.uri().to_string(), proxied);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("rewrite thread panicked");
        }
    }
}
