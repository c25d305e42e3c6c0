//! Configuration for the fetch → render → package pipeline.
//!
//! All limits and tunables live in one [`ServiceConfig`] value that the
//! binary builds once at startup and hands to [`crate::Converter::new`].
//! Nothing reads the environment after that, so tests can inject tighter
//! limits without touching process state.
//!
//! # Design choice: builder over constructor
//! Setters clamp obviously broken values (zero workers, zero limits) and
//! `build()` rejects anything that cannot be clamped into shape.

use crate::error::Pdf2ImgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 100 MiB.
pub const DEFAULT_MAX_PDF_BYTES: u64 = 100 * 1024 * 1024;

/// Documents with more pages than this are rejected before rendering.
pub const DEFAULT_MAX_PAGE_COUNT: usize = 5000;

/// Highest page count any deployment may accept. Page indices are `u16`
/// inside the rendering engine, so nothing past this is addressable.
pub const MAX_ADDRESSABLE_PAGES: usize = u16::MAX as usize;

/// Default rasterisation density.
pub const DEFAULT_DPI: u32 = 100;

/// Allowed DPI range for [`ServiceConfigBuilder::dpi`].
pub const DPI_RANGE: (u32, u32) = (36, 600);

/// Configuration for a conversion service.
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{OutputMode, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .dpi(72)
///     .max_page_count(200)
///     .output_mode(OutputMode::Inline)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_page_count, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Rasterisation density in dots per inch. Range: 36–600. Default: 100.
    ///
    /// Fixed per deployment, never per request. Output size grows with the
    /// square of this value; 100 keeps a letter page near 850 × 1100 px.
    pub dpi: u32,

    /// Maximum accepted PDF size in bytes. Default: 100 MiB.
    pub max_pdf_bytes: u64,

    /// Maximum accepted page count. Default: 5000. Never above
    /// [`MAX_ADDRESSABLE_PAGES`].
    pub max_page_count: usize,

    /// Maximum rendered edge (width or height) in pixels. Default: 10 000.
    ///
    /// Independent of DPI. An A0 poster at 300 DPI would otherwise produce a
    /// 10 000 × 14 000 px bitmap per page.
    pub max_page_pixels: u32,

    /// Number of renders allowed to run at once. Default: logical CPU count.
    pub render_workers: usize,

    /// Number of renders allowed to wait for a worker. Default: 4 × workers.
    ///
    /// Requests beyond `render_workers + render_queue_depth` fail fast with
    /// [`Pdf2ImgError::Overloaded`] instead of piling documents up in memory.
    pub render_queue_depth: usize,

    /// Whole-request timeout for the outbound fetch in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Maximum redirects followed by the fetcher. Default: 10.
    pub max_redirects: usize,

    /// `User-Agent` sent with every fetch. Some origins reject empty agents.
    pub user_agent: String,

    /// Response representation produced by this deployment. Default: Archive.
    pub output_mode: OutputMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            dpi: DEFAULT_DPI,
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            max_page_count: DEFAULT_MAX_PAGE_COUNT,
            max_page_pixels: 10_000,
            render_workers: workers,
            render_queue_depth: workers * 4,
            download_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_redirects: 10,
            user_agent: default_user_agent(),
            output_mode: OutputMode::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; pdf2img/{})",
        env!("CARGO_PKG_VERSION")
    )
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(DPI_RANGE.0, DPI_RANGE.1);
        self
    }

    pub fn max_pdf_bytes(mut self, bytes: u64) -> Self {
        self.config.max_pdf_bytes = bytes.max(1);
        self
    }

    pub fn max_page_count(mut self, pages: usize) -> Self {
        self.config.max_page_count = pages.clamp(1, MAX_ADDRESSABLE_PAGES);
        self
    }

    pub fn max_page_pixels(mut self, px: u32) -> Self {
        self.config.max_page_pixels = px.max(16);
        self
    }

    pub fn render_workers(mut self, n: usize) -> Self {
        self.config.render_workers = n.max(1);
        self
    }

    pub fn render_queue_depth(mut self, n: usize) -> Self {
        self.config.render_queue_depth = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.config.max_redirects = n;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.dpi < DPI_RANGE.0 || c.dpi > DPI_RANGE.1 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "DPI must be {}–{}, got {}",
                DPI_RANGE.0, DPI_RANGE.1, c.dpi
            )));
        }
        if c.render_workers == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "render_workers must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "download_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.connect_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "connect_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(Pdf2ImgError::InvalidConfig(
                "user_agent must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which representation the packager produces.
///
/// Both modes consume the same ordered page sequence; only the final
/// materialisation differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// A DEFLATE-compressed ZIP with one `page_<n>.png` entry per page. (default)
    #[default]
    Archive,
    /// A JSON list of `{page, image_data}` with base64 PNG payloads.
    Inline,
}

impl FromStr for OutputMode {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "archive" | "zip" => Ok(Self::Archive),
            "inline" | "json" | "base64" => Ok(Self::Inline),
            other => Err(Pdf2ImgError::InvalidConfig(format!(
                "unknown output mode '{other}' (expected archive or inline)"
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => f.write_str("archive"),
            Self::Inline => f.write_str("inline"),
        }
    }
}
