use async_trait::async_trait;
use thiserror::Error;
use url::Url;

mod chain;
mod html;

pub use chain::ChainResolver;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("No {host} link found")]
    PortalLinkNotFound { host: String },

    #[error("No pepe- token found")]
    TokenNotFound,

    #[error("No CDN link found")]
    CdnLinkNotFound,

    #[error("No download link found")]
    DownloadLinkNotFound,
}

/// Maps a source URL to a temporary direct-download URL.
#[async_trait]
pub trait Resolve: Send + Sync + 'static {
    async fn resolve(&self, source: &Url) -> Result<String, ResolveError>;
}
