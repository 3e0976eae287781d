use http::uri::Authority;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Built-in routing table for plain local development. Matches the port
/// assignments each service binds when run directly on the host.
const DEFAULT_CONFIG: &str = include_str!("../default_config.yaml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty service name")]
    EmptyServiceName,

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Service {0} has an invalid address: {1}")]
    InvalidServiceAddress(String, String),

    #[error("Empty route prefix")]
    EmptyPrefix,

    #[error("Duplicate route prefix: {0}")]
    DuplicatePrefix(String),

    #[error("Route references unknown service: {0}")]
    UnknownService(String),

    #[error("Path rewrite for prefix {0} must start with '/' and not end with one")]
    InvalidPathRewrite(String),

    #[error("Sub-route under prefix {0} has no segments")]
    EmptySubRoute(String),

    #[error("Duplicate sub-route segment {1} under prefix {0}")]
    DuplicateSubRouteSegment(String, String),
}

/// What to do with a request whose routing prefix has no table entry
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Fail the lookup with an error naming the prefix
    #[default]
    Strict,
    /// Forward the request unmodified
    Passthrough,
}

/// Proxy configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for incoming requests
    #[serde(default)]
    pub listener: Listener,
    /// Log every rewrite with its original URL
    #[serde(default)]
    pub debug: bool,
    /// Behavior for unmatched routing prefixes
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Optional StatsD metrics sink
    pub metrics: Option<MetricsConfig>,
    /// Local bind addresses, one per logical service
    ///
    /// Note: this is deployment data, not code. The set of services and
    /// their ports has changed repeatedly over the platform's lifetime, so
    /// it lives in configuration.
    pub services: Vec<ServiceConfig>,
    /// Naming convention for cluster-hosted service authorities
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Request routing rules, keyed by the `/v1/{prefix}/...` path segment
    pub routes: Vec<RouteConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default routing table for plain local development.
    pub fn default_local() -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        let mut service_names = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err(ValidationError::EmptyServiceName);
            }
            if !service_names.insert(service.name.as_str()) {
                return Err(ValidationError::DuplicateService(service.name.clone()));
            }
            if service.address.parse::<Authority>().is_err() {
                return Err(ValidationError::InvalidServiceAddress(
                    service.name.clone(),
                    service.address.clone(),
                ));
            }
        }

        let mut prefixes = HashSet::new();
        for route in &self.routes {
            route.validate(&service_names)?;
            if !prefixes.insert(route.prefix.to_ascii_lowercase()) {
                return Err(ValidationError::DuplicatePrefix(route.prefix.clone()));
            }
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 9000,
        }
    }
}

impl Listener {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// StatsD metrics sink configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

/// A locally running service and the address it binds
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Logical service name referenced by routes (e.g., "paygate")
    pub name: String,
    /// host:port the service listens on
    pub address: String,
}

/// Naming convention for service authorities when running inside a cluster
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// DNS suffix appended to service names
    #[serde(default = "default_cluster_domain")]
    pub domain: String,
    /// Port every cluster-hosted service listens on
    #[serde(default = "default_cluster_port")]
    pub port: u16,
}

fn default_cluster_domain() -> String {
    "apps.svc.cluster.local".into()
}

fn default_cluster_port() -> u16 {
    8080
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            domain: default_cluster_domain(),
            port: default_cluster_port(),
        }
    }
}

/// Routing rule for one `/v1/{prefix}/...` path prefix
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// Path segment the rule matches on (case-insensitive)
    pub prefix: String,
    /// Service receiving requests for this prefix
    pub service: String,
    /// Fixed path prefix substituted for the consumed segments; absent means
    /// the consumed segments are stripped and the remainder forwarded as-is
    pub path_rewrite: Option<String>,
    /// Second-level overrides: requests whose next path segment is listed
    /// here go to a different service than the prefix default
    #[serde(default)]
    pub sub_routes: Vec<SubRouteConfig>,
}

impl RouteConfig {
    fn validate(&self, service_names: &HashSet<&str>) -> Result<(), ValidationError> {
        if self.prefix.is_empty() {
            return Err(ValidationError::EmptyPrefix);
        }
        if !service_names.contains(self.service.as_str()) {
            return Err(ValidationError::UnknownService(self.service.clone()));
        }
        if let Some(rewrite) = &self.path_rewrite
            && (!rewrite.starts_with('/') || rewrite.len() < 2 || rewrite.ends_with('/'))
        {
            return Err(ValidationError::InvalidPathRewrite(self.prefix.clone()));
        }

        let mut segments = HashSet::new();
        for sub in &self.sub_routes {
            if sub.segments.is_empty() {
                return Err(ValidationError::EmptySubRoute(self.prefix.clone()));
            }
            if !service_names.contains(sub.service.as_str()) {
                return Err(ValidationError::UnknownService(sub.service.clone()));
            }
            for segment in &sub.segments {
                if !segments.insert(segment.to_ascii_lowercase()) {
                    return Err(ValidationError::DuplicateSubRouteSegment(
                        self.prefix.clone(),
                        segment.clone(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Second-level routing override under a prefix
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubRouteConfig {
    /// Path segments (segment after the prefix) this override matches
    pub segments: Vec<String>,
    /// Service receiving the matched requests
    pub service: String,
}
