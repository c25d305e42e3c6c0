//! # edgequake-pdf2img
//!
//! Fetch a PDF by URL, rasterise every page to PNG, and hand the pages back
//! either as a ZIP archive or as inline base64 JSON.
//!
//! The interesting part is not the HTTP framing but the resource
//! discipline around an untrusted, arbitrarily expensive input: the fetch
//! stage rejects oversized or mistyped documents before committing memory,
//! the render stage rejects pathological page counts before rasterising
//! anything, and rendering runs on a bounded blocking pool so CPU-heavy
//! documents cannot starve other requests' network I/O.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch    single GET, status / content-type / size checks (async)
//!  ├─ 2. Render   page-limit check, pdfium rasterisation (spawn_blocking pool)
//!  ├─ 3. Encode   raster → PNG
//!  └─ 4. Package  ZIP of page_<n>.png  |  {"images": [{page, image_data}]}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{Converter, OutputMode, PdfiumEngine, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().dpi(100).build()?;
//!     let converter = Converter::new(config, Arc::new(PdfiumEngine::new()))?;
//!     let conversion = converter
//!         .convert("https://arxiv.org/pdf/1706.03762", OutputMode::Inline)
//!         .await?;
//!     eprintln!("{} pages", conversion.stats.page_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router + the `pdf2img-server` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `server` when embedding only the pipeline:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OutputMode, ServiceConfig, ServiceConfigBuilder};
pub use convert::Converter;
pub use error::{ErrorClass, Pdf2ImgError};
pub use output::{
    Conversion, ConversionResult, ConversionStats, InlineImage, InlineImageList, RenderedPage,
};
pub use pipeline::engine::{DocumentHandle, EngineError, EngineSession, PdfiumEngine, RasterSpec, RenderEngine};
pub use pipeline::fetch::{Fetcher, RawDocument, SourceRequest};
