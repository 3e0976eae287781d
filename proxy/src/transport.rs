//! Client-side interceptor
//!
//! Wraps an HTTP client's underlying service and rewrites outgoing
//! production-shaped requests onto their local targets before delegating.
//! The hyper-util legacy `Client` implements `tower::Service`, so a test
//! harness can drop this in as its transport and keep issuing requests
//! against production URLs.

use crate::config::FallbackPolicy;
use crate::errors::ProxyError;
use crate::rewrite::Rewriter;
use crate::routes::RouteTable;
use http::Request;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Rewrites outgoing requests, then forwards them through the underlying
/// service. Performs no I/O of its own; safe for concurrent use from many
/// tasks (the route table is immutable and shared).
#[derive(Clone)]
pub struct LocalTransport<S> {
    rewriter: Rewriter,
    inner: S,
}

impl<S> LocalTransport<S> {
    pub fn builder(table: Arc<RouteTable>) -> TransportBuilder<S> {
        TransportBuilder::new(table)
    }
}

impl<S, B> Service<Request<B>> for LocalTransport<S>
where
    S: Service<Request<B>>,
    S::Error: Into<ProxyError>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = ProxyError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, ProxyError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        match self.rewriter.rewrite(&mut req) {
            // Matched requests carry their rewritten URI; passthrough
            // requests go out untouched to whatever host they already name.
            Ok(_) => {
                let forwarded = self.inner.call(req);
                Box::pin(async move { forwarded.await.map_err(Into::into) })
            }
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}

/// Builder for [`LocalTransport`]. The route table is required up front;
/// forgetting the underlying service is reported by `build`, not by a panic
/// on the first request.
pub struct TransportBuilder<S> {
    table: Arc<RouteTable>,
    underlying: Option<S>,
    fallback: FallbackPolicy,
    debug: bool,
}

impl<S> TransportBuilder<S> {
    fn new(table: Arc<RouteTable>) -> Self {
        TransportBuilder {
            table,
            underlying: None,
            // Interceptors pass unknown hosts through so calls to unrelated
            // third-party services keep working.
            fallback: FallbackPolicy::Passthrough,
            debug: false,
        }
    }

    /// The service that performs the actual network I/O.
    pub fn underlying(mut self, inner: S) -> Self {
        self.underlying = Some(inner);
        self
    }

    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Log every rewritten request with its original URL.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn build(self) -> Result<LocalTransport<S>, ProxyError> {
        let inner = self.underlying.ok_or(ProxyError::MissingTransport)?;
        Ok(LocalTransport {
            rewriter: Rewriter::new(self.table, self.fallback, self.debug),
            inner,
        })
    }
}
