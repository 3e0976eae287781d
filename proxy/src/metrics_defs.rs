//! Metric names emitted by the proxy.

/// Counter. Tagged with outcome: matched, unrouted, error.
pub const REQUESTS: &str = "localdevproxy.requests";

/// Counter. Forward attempts that failed at the upstream.
pub const UPSTREAM_ERRORS: &str = "localdevproxy.upstream_errors";
