//! Fetch stage: download the remote PDF under size, type and status limits.
//!
//! ## Why stream the body?
//!
//! The remote is untrusted. A declared `Content-Length` above the limit is
//! rejected before a single body byte is read; otherwise the body is read
//! chunk by chunk and abandoned the moment the running total would cross
//! the limit, so a lying or absent `Content-Length` cannot push the process
//! past the budget either.
//!
//! There is exactly one attempt per request. Retrying a slow or hostile
//! remote only multiplies its cost.

use crate::config::ServiceConfig;
use crate::error::Pdf2ImgError;
use futures::StreamExt;
use reqwest::{header, redirect, Client, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A validated conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    url: Url,
}

impl SourceRequest {
    /// Parse and validate a user-supplied URL.
    ///
    /// Only absolute `http`/`https` URLs with a host are accepted.
    pub fn parse(input: &str) -> Result<Self, Pdf2ImgError> {
        let input = input.trim();
        let url = Url::parse(input).map_err(|e| Pdf2ImgError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Pdf2ImgError::InvalidUrl {
                url: input.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Pdf2ImgError::InvalidUrl {
                url: input.to_string(),
                reason: "missing host".into(),
            });
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Downloaded bytes plus the content type the remote declared.
///
/// Only the fetcher constructs validated instances; the renderer consumes
/// the document by value and drops it once the page loop finishes.
#[derive(Debug, Clone)]
pub struct RawDocument {
    bytes: Vec<u8>,
    declared_content_type: String,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, declared_content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            declared_content_type: declared_content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_content_type(&self) -> &str {
        &self.declared_content_type
    }

    pub fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Loose content-type check: any value mentioning "pdf", case-insensitively.
///
/// Deliberately not a MIME parse; `application/x-pdf` and
/// `application/pdf; charset=binary` both pass.
pub fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("pdf")
}

/// Outbound HTTP client bound to one set of fetch limits.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_bytes: u64,
    timeout_secs: u64,
}

impl Fetcher {
    pub fn new(config: &ServiceConfig) -> Result<Self, Pdf2ImgError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| Pdf2ImgError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: config.max_pdf_bytes,
            timeout_secs: config.download_timeout_secs,
        })
    }

    /// Download `request` into memory.
    ///
    /// # Errors
    /// - [`Pdf2ImgError::Transport`] on DNS/TLS/connect/reset/timeout
    /// - [`Pdf2ImgError::RemoteFetch`] on a non-success status
    /// - [`Pdf2ImgError::InvalidContentType`] when the type lacks "pdf"
    /// - [`Pdf2ImgError::PayloadTooLarge`] past `max_pdf_bytes`
    pub async fn fetch(&self, request: &SourceRequest) -> Result<RawDocument, Pdf2ImgError> {
        let url = request.url().as_str();
        info!("Downloading PDF from: {}", url);

        let response = self
            .client
            .get(request.url().clone())
            .send()
            .await
            .map_err(|e| self.transport_error(url, &e))?;

        let status = response.status();
        info!("Response status: {}", status);
        debug!("Response headers: {:?}", response.headers());

        if !status.is_success() {
            warn!(stage = "fetch", status = status.as_u16(), "Remote refused {}", url);
            return Err(Pdf2ImgError::RemoteFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        info!("Content-Type: {}", content_type);

        if !is_pdf_content_type(&content_type) {
            warn!(stage = "fetch", content_type = %content_type, "Not a PDF: {}", url);
            return Err(Pdf2ImgError::InvalidContentType {
                url: url.to_string(),
                content_type,
            });
        }

        let declared_len = response.content_length();
        if let Some(len) = declared_len {
            if len > self.max_bytes {
                warn!(
                    stage = "fetch",
                    declared = len,
                    limit = self.max_bytes,
                    "Declared Content-Length over limit"
                );
                return Err(Pdf2ImgError::PayloadTooLarge {
                    received: len,
                    limit: self.max_bytes,
                });
            }
        }

        let capacity = declared_len.unwrap_or(0).min(self.max_bytes) as usize;
        let mut body = Vec::with_capacity(capacity);
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(url, &e))?;
            let total = body.len() as u64 + chunk.len() as u64;
            if total > self.max_bytes {
                warn!(
                    stage = "fetch",
                    received = total,
                    limit = self.max_bytes,
                    "Body exceeded limit mid-stream"
                );
                return Err(Pdf2ImgError::PayloadTooLarge {
                    received: total,
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        info!("Downloaded {} bytes from {}", body.len(), url);
        Ok(RawDocument::new(body, content_type))
    }

    fn transport_error(&self, url: &str, e: &reqwest::Error) -> Pdf2ImgError {
        let reason = if e.is_timeout() {
            format!("timed out after {}s", self.timeout_secs)
        } else {
            e.to_string()
        };
        warn!(stage = "fetch", reason = %reason, "Transport failure for {}", url);
        Pdf2ImgError::Transport {
            url: url.to_string(),
            reason,
        }
    }
}
