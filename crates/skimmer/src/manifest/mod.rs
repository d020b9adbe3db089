// Manifest Acquisition: fetches a manifest with bounded retry, follows redirects
// for base URL resolution, parses it through an injected parser and publishes
// either a ready manifest or a terminal failure.

mod loader;
mod progress;
mod transport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::ManifestError;

pub use crate::error::{
    DOWNLOAD_ERROR_CODE, INVALID_URL_ERROR_CODE, LINK_RESOLUTION_ERROR_CODE, PARSER_ERROR_CODE,
};
pub use loader::{ManifestLoader, base_url_of};
pub use progress::{ProgressReport, ProgressTracker};
pub use transport::{
    HttpTransport, ReqwestTransport, TransportRequest, TransportResponse, install_rustls_provider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// On-demand presentation
    Static,
    /// Live presentation that is refreshed periodically
    Dynamic,
}

/// What a parser extracts from a manifest body.
#[derive(Debug, Clone)]
pub struct ParsedManifest<D> {
    pub kind: ManifestKind,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub document: D,
}

impl<D> ParsedManifest<D> {
    pub fn new(kind: ManifestKind, document: D) -> Self {
        Self {
            kind,
            availability_start_time: None,
            document,
        }
    }
}

/// A parsed manifest ready for use by the scheduler.
#[derive(Debug, Clone)]
pub struct Manifest<D> {
    /// Location the manifest was actually served from (post-redirect).
    pub url: Url,
    /// Base for resolving relative references inside the document.
    pub base_url: Url,
    pub loaded_time: DateTime<Utc>,
    pub kind: ManifestKind,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub document: D,
}

#[derive(Debug, Clone)]
pub enum ManifestEvent<D> {
    Ready(Manifest<D>),
    LoadFailed { code: u32, message: String },
}

impl<D> ManifestEvent<D> {
    pub fn failed(error: &ManifestError) -> Self {
        Self::LoadFailed {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Turns a manifest body into a document. Format specifics (DASH XML, ...)
/// live entirely behind this trait.
pub trait ManifestParser: Send + Sync {
    type Document: Send + Sync + 'static;

    /// Parse `body`, resolving relative references against `base_url`.
    /// An `Err` carries a human readable reason and is terminal.
    fn parse(&self, body: &str, base_url: &Url) -> Result<ParsedManifest<Self::Document>, String>;
}

/// Resolves remote (linked) elements of a freshly loaded manifest.
#[async_trait]
pub trait LinkResolver<D: Send + 'static>: Send + Sync {
    async fn resolve_on_load(&self, manifest: Manifest<D>) -> Result<Manifest<D>, String>;
}

/// Hook for rewriting outgoing manifest requests, e.g. to add auth tokens.
pub trait RequestModifier: Send + Sync {
    fn modify_request_url(&self, url: &Url) -> Url {
        url.clone()
    }

    fn modify_request_headers(&self, _headers: &mut HeaderMap) {}
}
