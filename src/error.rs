//! Error types for the edgequake-pdf2img library.
//!
//! Every pipeline stage returns exactly one [`Pdf2ImgError`] variant or
//! succeeds. There is no page-level error type: a single failed page aborts
//! the whole request and the pages rendered before it are dropped.
//!
//! Each variant carries the value that tripped it (status code, content
//! type, byte count, page count) so that its `Display` text can be sent to
//! the caller verbatim as the `detail` field and still be diagnosable from
//! the logs alone.

use thiserror::Error;

/// Which side of the connection caused a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad URL, wrong content type, oversized or pathological document.
    Client,
    /// Transport fault, engine crash, overload, or an internal bug.
    Server,
}

/// All errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The supplied URL is not an absolute HTTP/HTTPS URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request body is not `{"url": "<string>"}`.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// DNS, TLS, connect, reset or timeout while talking to the remote.
    #[error("Failed to reach '{url}': {reason}")]
    Transport { url: String, reason: String },

    /// The remote answered, but not with a success status.
    #[error("Failed to download PDF. Status code: {status}")]
    RemoteFetch { url: String, status: u16 },

    /// The remote's declared content type does not mention "pdf".
    #[error("URL does not point to a PDF file. Content-Type: {content_type}")]
    InvalidContentType { url: String, content_type: String },

    /// Body size exceeds the configured maximum.
    ///
    /// `received` is either the declared `Content-Length` or the number of
    /// bytes read before the stream was abandoned.
    #[error("PDF file is too large: {received} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge { received: u64, limit: u64 },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The rendering engine could not parse the bytes as a PDF.
    #[error("Document could not be opened as a PDF: {detail}")]
    MalformedDocument { detail: String },

    /// Page count is above the configured maximum. Nothing was rendered.
    #[error("PDF has too many pages ({pages}). Maximum allowed is {limit}.")]
    PageLimitExceeded { pages: usize, limit: usize },

    /// The engine failed while rasterising or encoding a page.
    #[error("Error converting PDF to images: page {page}: {detail}")]
    RenderFailure { page: usize, detail: String },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// The packager received zero pages.
    #[error("No images were generated.")]
    EmptyResult,

    // ── Service errors ────────────────────────────────────────────────────
    /// The render pool queue is full.
    #[error("Service overloaded: {queued} renders already admitted, try again later")]
    Overloaded { queued: usize },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (task panic, engine binding, archive writer).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ImgError {
    /// Stable HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl { .. }
            | Self::InvalidRequest(_)
            | Self::RemoteFetch { .. }
            | Self::InvalidContentType { .. }
            | Self::MalformedDocument { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::PageLimitExceeded { .. } | Self::EmptyResult => 422,
            Self::Transport { .. } => 502,
            Self::Overloaded { .. } => 503,
            Self::RenderFailure { .. } | Self::InvalidConfig(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether the caller or the service is at fault.
    pub fn class(&self) -> ErrorClass {
        if self.status_code() < 500 {
            ErrorClass::Client
        } else {
            ErrorClass::Server
        }
    }

    /// Pipeline stage that produced the error, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidRequest(_) => "request",
            Self::Transport { .. }
            | Self::RemoteFetch { .. }
            | Self::InvalidContentType { .. }
            | Self::PayloadTooLarge { .. } => "fetch",
            Self::MalformedDocument { .. }
            | Self::PageLimitExceeded { .. }
            | Self::RenderFailure { .. }
            | Self::Overloaded { .. } => "render",
            Self::EmptyResult => "package",
            Self::InvalidConfig(_) | Self::Internal(_) => "internal",
        }
    }
}
