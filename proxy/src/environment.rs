use std::path::Path;

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Execution context the proxy was started in. Detected once at startup and
/// immutable for the life of the process; route targets are resolved
/// differently in each mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Services run directly on the host, each on its own port
    Local,
    /// Services reachable through Kubernetes service DNS names
    Cluster,
}

impl Mode {
    /// Probes the environment for Kubernetes markers.
    pub fn detect() -> Mode {
        if std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
            || Path::new(SERVICE_ACCOUNT_TOKEN).exists()
        {
            Mode::Cluster
        } else {
            Mode::Local
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Cluster => "cluster",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(Mode::Local.as_str(), "local");
        assert_eq!(Mode::Cluster.as_str(), "cluster");
    }
}
