use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("no route for prefix {0:?}")]
    UnresolvedPrefix(String),
    #[error("transport built without an underlying service")]
    MissingTransport,
    #[error("route references unknown service: {0}")]
    UnknownService(String),
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("could not assemble rewritten URI: {0}")]
    InvalidUriParts(#[from] http::uri::InvalidUriParts),
    #[error("http error: {0}")]
    Http(#[from] http::Error),
    #[error("hyper error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("upstream request failed: {0}")]
    UpstreamRequest(#[from] hyper_util::client::legacy::Error),
}
