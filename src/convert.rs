//! The orchestrator: fetch → render → package for one request.
//!
//! [`Converter`] owns the long-lived pieces (HTTP client, render pool,
//! limits). Everything a single conversion touches (the downloaded bytes,
//! the page images, the output buffer) is created inside
//! [`Converter::convert`] and dropped when it returns. No state is shared
//! between requests except the pool's admission counters, and nothing is
//! cached: the same URL twice means two downloads and two renders.

use crate::config::{OutputMode, ServiceConfig};
use crate::error::Pdf2ImgError;
use crate::output::{Conversion, ConversionResult, ConversionStats};
use crate::pipeline::engine::RenderEngine;
use crate::pipeline::fetch::{Fetcher, SourceRequest};
use crate::pipeline::package;
use crate::pipeline::render::{RenderLimits, RenderPool};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs conversions against one configuration and one rendering engine.
///
/// Cheap to clone; clones share the HTTP connection pool and render pool.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServiceConfig>,
    fetcher: Fetcher,
    pool: RenderPool,
}

impl Converter {
    pub fn new(config: ServiceConfig, engine: Arc<dyn RenderEngine>) -> Result<Self, Pdf2ImgError> {
        let fetcher = Fetcher::new(&config)?;
        let pool = RenderPool::from_config(engine, &config);
        info!(
            "Converter ready: {} render workers, queue depth {}, {} DPI, output {}",
            pool.workers(),
            config.render_queue_depth,
            config.dpi,
            config.output_mode
        );
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            pool,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Convert with the deployment's configured [`OutputMode`].
    pub async fn convert_default(&self, url: &str) -> Result<Conversion, Pdf2ImgError> {
        self.convert(url, self.config.output_mode).await
    }

    /// Fetch the PDF at `url`, render every page, and package the result.
    ///
    /// The first failing stage short-circuits the rest; its error is
    /// returned unchanged.
    pub async fn convert(&self, url: &str, mode: OutputMode) -> Result<Conversion, Pdf2ImgError> {
        let total_start = Instant::now();
        info!("Starting conversion: {} ({})", url, mode);

        let result = self.run(url, mode, total_start).await;
        if let Err(ref e) = result {
            if e.status_code() >= 500 {
                error!(stage = e.stage(), status = e.status_code(), "Conversion failed: {}", e);
            } else {
                warn!(stage = e.stage(), status = e.status_code(), "Conversion rejected: {}", e);
            }
        }
        result
    }

    async fn run(
        &self,
        url: &str,
        mode: OutputMode,
        total_start: Instant,
    ) -> Result<Conversion, Pdf2ImgError> {
        // ── Step 1: Validate request ─────────────────────────────────────
        let request = SourceRequest::parse(url)?;

        // ── Step 2: Fetch ────────────────────────────────────────────────
        let fetch_start = Instant::now();
        let document = self.fetcher.fetch(&request).await?;
        let fetched_bytes = document.byte_length();
        let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

        // ── Step 3: Render on the pool ───────────────────────────────────
        let render_start = Instant::now();
        let pages = self
            .pool
            .render(document, RenderLimits::from(self.config.as_ref()))
            .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        let page_count = pages.len();
        info!("Rendered {} pages in {}ms", page_count, render_duration_ms);

        // ── Step 4: Package ──────────────────────────────────────────────
        let package_start = Instant::now();
        let result = package::package(pages, mode)?;
        let package_duration_ms = package_start.elapsed().as_millis() as u64;

        let output_bytes = match &result {
            ConversionResult::Archive(bytes) => bytes.len(),
            ConversionResult::Inline(list) => list.images.iter().map(|i| i.image_data.len()).sum(),
        };

        let stats = ConversionStats {
            page_count,
            fetched_bytes,
            output_bytes,
            fetch_duration_ms,
            render_duration_ms,
            package_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Conversion complete: {} pages, {} bytes in, {} bytes out, {}ms total",
            stats.page_count, stats.fetched_bytes, stats.output_bytes, stats.total_duration_ms
        );

        Ok(Conversion { result, stats })
    }
}
