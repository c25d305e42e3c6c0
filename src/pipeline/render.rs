//! Render stage: page-limit policy, sequential rasterisation, worker pool.
//!
//! ## Why a dedicated pool?
//!
//! Rasterisation is CPU-bound and synchronous. Running it on the Tokio
//! worker threads would stall every other request's network I/O, so each
//! render pass runs under `spawn_blocking`, gated by two semaphores:
//!
//! * `workers`: at most `render_workers` passes execute at once, further
//!   capped by [`RenderEngine::max_parallelism`] (1 for pdfium, whose
//!   binding holds a process-wide lock);
//! * `admission`: at most `render_workers + render_queue_depth` passes are
//!   running or waiting. Beyond that a request fails immediately with
//!   [`Pdf2ImgError::Overloaded`] rather than parking another document in
//!   memory.
//!
//! Both permits move into the blocking closure, so the slot is released
//! when rendering ends even if the requesting client has gone away.
//!
//! Pages within one document are rendered strictly in order on a single
//! thread; the engine's document handle is never shared.

use crate::config::{ServiceConfig, MAX_ADDRESSABLE_PAGES};
use crate::error::Pdf2ImgError;
use crate::output::RenderedPage;
use crate::pipeline::encode;
use crate::pipeline::engine::{EngineError, RasterSpec, RenderEngine};
use crate::pipeline::fetch::RawDocument;
use crate::pipeline::usage::{self, UsageSample};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Per-document limits, copied out of [`ServiceConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    pub max_page_count: usize,
    pub raster: RasterSpec,
}

impl From<&ServiceConfig> for RenderLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            max_page_count: config.max_page_count,
            raster: RasterSpec {
                dpi: config.dpi,
                max_edge: config.max_page_pixels,
            },
        }
    }
}

/// Render every page of `document`, blocking the current thread.
///
/// The page count is checked against the limit (never more than
/// [`MAX_ADDRESSABLE_PAGES`]) before any page is rasterised. A failure on
/// any page discards the pages already rendered.
/// A zero-page document yields an empty vector; rejecting it is the
/// packager's job.
pub fn render_document(
    engine: &dyn RenderEngine,
    document: RawDocument,
    limits: &RenderLimits,
) -> Result<Vec<RenderedPage>, Pdf2ImgError> {
    let before = UsageSample::now();
    usage::log_usage("Before Conversion", &before, None);

    let session = engine.session().map_err(|e| {
        error!(stage = "render", "Engine unavailable: {}", e);
        Pdf2ImgError::Internal(e.to_string())
    })?;

    let bytes = document.into_bytes();
    let handle = session.open(&bytes).map_err(|e| {
        warn!(stage = "render", bytes = bytes.len(), "Cannot open document: {}", e);
        Pdf2ImgError::MalformedDocument {
            detail: e.to_string(),
        }
    })?;

    let page_count = handle.page_count();
    info!("PDF has {} pages.", page_count);
    let limit = limits.max_page_count.min(MAX_ADDRESSABLE_PAGES);
    if page_count > limit {
        warn!(stage = "render", pages = page_count, limit, "Page limit exceeded");
        return Err(Pdf2ImgError::PageLimitExceeded {
            pages: page_count,
            limit,
        });
    }

    let mut pages = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let page_number = index + 1;

        let raster = panic::catch_unwind(AssertUnwindSafe(|| {
            handle.rasterize(index, limits.raster)
        }))
        .unwrap_or_else(|_| Err(EngineError::Rasterise("engine panicked".into())))
        .map_err(|e| render_failure(page_number, e.to_string()))?;

        let image_bytes = encode::encode_png(&raster)
            .map_err(|e| render_failure(page_number, format!("PNG encoding failed: {e}")))?;

        debug!("Page {} → {} bytes", page_number, image_bytes.len());
        pages.push(RenderedPage {
            page_number,
            image_bytes,
        });
    }

    let after = UsageSample::now();
    usage::log_usage("After Conversion", &after, Some(&before));

    Ok(pages)
}

fn render_failure(page: usize, detail: String) -> Pdf2ImgError {
    error!(stage = "render", page, "Rasterisation failed: {}", detail);
    Pdf2ImgError::RenderFailure { page, detail }
}

/// Bounded pool that runs [`render_document`] off the async executor.
#[derive(Clone)]
pub struct RenderPool {
    engine: Arc<dyn RenderEngine>,
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    worker_count: usize,
    capacity: usize,
}

impl RenderPool {
    pub fn new(engine: Arc<dyn RenderEngine>, workers: usize, queue_depth: usize) -> Self {
        let requested = workers.max(1);
        let workers = match engine.max_parallelism() {
            Some(bound) if bound.max(1) < requested => {
                warn!(
                    requested,
                    bound, "Engine serialises renders; clamping render workers"
                );
                bound.max(1)
            }
            _ => requested,
        };
        let capacity = workers + queue_depth;
        Self {
            engine,
            workers: Arc::new(Semaphore::new(workers)),
            admission: Arc::new(Semaphore::new(capacity)),
            worker_count: workers,
            capacity,
        }
    }

    pub fn from_config(engine: Arc<dyn RenderEngine>, config: &ServiceConfig) -> Self {
        Self::new(engine, config.render_workers, config.render_queue_depth)
    }

    /// Renders allowed to run at once.
    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Renders running or waiting for a worker.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.admission.available_permits()
    }

    /// Maximum renders running or waiting.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Render `document` on the pool.
    pub async fn render(
        &self,
        document: RawDocument,
        limits: RenderLimits,
    ) -> Result<Vec<RenderedPage>, Pdf2ImgError> {
        let admitted = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| {
                warn!(stage = "render", capacity = self.capacity, "Render queue full");
                Pdf2ImgError::Overloaded {
                    queued: self.capacity,
                }
            })?;

        let worker = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| Pdf2ImgError::Internal("render pool closed".into()))?;

        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let _slot = (admitted, worker);
            render_document(engine.as_ref(), document, &limits)
        })
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Render task panicked: {}", e)))?
    }
}
