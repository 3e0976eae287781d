use crate::config::Config;
use crate::metrics_defs;
use crate::rewrite::{RewriteOutcome, Rewriter};
use crate::routes::RouteTable;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::service::Service as HyperService;
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Reverse-proxy service: rewrites each inbound request against the route
/// table and relays the backend's response verbatim. `/ping` answers
/// liveness probes without touching the route table.
pub struct ProxyService<B = Incoming> {
    rewriter: Rewriter,
    client: Client<HttpConnector, B>,
}

impl<B> ProxyService<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn new(config: &Config, table: Arc<RouteTable>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            rewriter: Rewriter::new(table, config.fallback, config.debug),
            client,
        }
    }
}

fn synthetic_response(
    status: StatusCode,
    body: impl Into<Bytes>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut response = Response::new(Full::new(body.into()).map_err(|e| match e {}).boxed());
    *response.status_mut() = status;
    response
}

impl<B> HyperService<Request<B>> for ProxyService<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<BoxBody<Bytes, hyper::Error>>;
    type Error = hyper::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, mut req: Request<B>) -> Self::Future {
        if req.uri().path() == "/ping" {
            return Box::pin(std::future::ready(Ok(synthetic_response(
                StatusCode::OK,
                "pong",
            ))));
        }

        let outcome = self.rewriter.rewrite(&mut req);
        let client = self.client.clone();

        Box::pin(async move {
            let response = match outcome {
                Ok(RewriteOutcome::Matched) => {
                    metrics::counter!(metrics_defs::REQUESTS, "outcome" => "matched").increment(1);
                    match client.request(req).await {
                        Ok(response) => response.map(|body| body.boxed()),
                        Err(err) => {
                            tracing::error!(error = %err, "upstream request failed");
                            metrics::counter!(metrics_defs::UPSTREAM_ERRORS).increment(1);
                            synthetic_response(
                                StatusCode::BAD_GATEWAY,
                                format!("upstream request failed: {err}"),
                            )
                        }
                    }
                }
                Ok(RewriteOutcome::Passthrough) => {
                    // A standalone proxy has nowhere to send an unroutable
                    // request.
                    tracing::warn!(
                        method = %req.method(),
                        path = %req.uri().path(),
                        "no routing prefix in request path"
                    );
                    metrics::counter!(metrics_defs::REQUESTS, "outcome" => "unrouted").increment(1);
                    synthetic_response(StatusCode::BAD_GATEWAY, "no route for request")
                }
                Err(err) => {
                    tracing::warn!(error = %err, "rewrite failed");
                    metrics::counter!(metrics_defs::REQUESTS, "outcome" => "error").increment(1);
                    synthetic_response(StatusCode::BAD_GATEWAY, err.to_string())
                }
            };
            Ok(response)
        })
    }
}
