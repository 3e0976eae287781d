pub mod config;
pub mod environment;
pub mod errors;
pub mod http;
pub mod metrics_defs;
pub mod proxy_service;
pub mod rewrite;
pub mod routes;
pub mod transport;

pub use config::Config;
pub use environment::Mode;
pub use errors::ProxyError;

use hyper::body::Incoming;
use proxy_service::ProxyService;
use routes::RouteTable;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Binds the configured listener and serves the reverse proxy until SIGINT
/// or SIGTERM. Bind failures propagate out so the caller can exit non-zero.
pub async fn run(config: Config, mode: Mode) -> Result<(), ProxyError> {
    let table = Arc::new(RouteTable::from_config(&config, mode)?);
    let service: ProxyService<Incoming> = ProxyService::new(&config, table);

    let listener =
        TcpListener::bind((config.listener.host.as_str(), config.listener.port)).await?;
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        mode = mode.as_str(),
        "listening for HTTP"
    );

    http::run_http_service(listener, service, http::shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty};
    use hyper_util::client::legacy::Client;
    use hyper_util::client::legacy::connect::HttpConnector;
    use hyper_util::rt::TokioExecutor;
    use tokio::sync::oneshot;

    // End-to-end over a real socket: bind port 0, serve the proxy, probe
    // /ping, then shut down cleanly.
    #[tokio::test]
    async fn test_serve_ping_and_shutdown() {
        let config = Config::default_local().expect("default config");
        let table = Arc::new(RouteTable::from_config(&config, Mode::Local).expect("build table"));
        let service: ProxyService<Incoming> = ProxyService::new(&config, table);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(http::run_http_service(listener, service, async move {
            let _ = shutdown_rx.await;
        }));

        let client: Client<HttpConnector, Empty<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let response = client
            .get(format!("http://{addr}/ping").parse().unwrap())
            .await
            .expect("ping request");
        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"pong");

        shutdown_tx.send(()).expect("signal shutdown");
        server
            .await
            .expect("server task")
            .expect("server exits cleanly");
    }
}
