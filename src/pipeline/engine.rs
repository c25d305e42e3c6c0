//! The rendering-engine seam: open a PDF, count pages, rasterise one page.
//!
//! The page-limit policy, ordering and error mapping live in
//! [`super::render`]; this module only knows how to talk to an engine.
//! [`PdfiumEngine`] is the production implementation. Tests plug in a
//! scripted engine to count rasterisation calls.
//!
//! ## Sessions and the pdfium lock
//!
//! A pdfium document handle borrows the library binding, so neither may
//! cross threads. The engine itself is just configuration (`Send + Sync`,
//! shared by every request); each render pass opens an [`EngineSession`] on
//! its own blocking thread, opens the document inside it, and drops both
//! before the thread is handed back.
//!
//! With `pdfium-render`'s `thread_safe` feature, binding the library takes a
//! process-wide mutex that is held until the binding is dropped. A pdfium
//! session therefore excludes every other session for its whole lifetime,
//! and [`RenderEngine::max_parallelism`] reports 1 so the render pool does
//! not park extra admitted documents on that mutex.
//!
//! ## Page counts
//!
//! `PdfPages::len` narrows pdfium's `int` page count to `u16`, so a document
//! with 65 537 pages would report one. The pdfium document reads the count
//! through the raw `FPDF_GetPageCount` binding instead.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Engine-level failure, mapped to a pipeline error by the renderer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine library could not be loaded.
    #[error("rendering engine unavailable: {0}")]
    Unavailable(String),

    /// The bytes are not a PDF the engine can parse.
    #[error("{0}")]
    Open(String),

    /// A page could not be loaded or rasterised.
    #[error("{0}")]
    Rasterise(String),
}

/// Rasterisation parameters shared by every page of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSpec {
    /// Dots per inch; 72 renders one PDF point per pixel.
    pub dpi: u32,
    /// Upper bound on either rendered edge, in pixels.
    pub max_edge: u32,
}

impl RasterSpec {
    /// Pixels per PDF point.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// A rendering engine shared across requests.
pub trait RenderEngine: Send + Sync {
    /// Bind the engine for use on the current thread.
    fn session(&self) -> Result<Box<dyn EngineSession + '_>, EngineError>;

    /// Upper bound on sessions that can make progress at once, if the engine
    /// serialises them internally. `None` means no engine-imposed bound.
    fn max_parallelism(&self) -> Option<usize> {
        None
    }
}

/// A thread-confined engine binding.
pub trait EngineSession {
    /// Parse `bytes` as a PDF document.
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn DocumentHandle + 'a>, EngineError>;
}

/// An opened document.
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Rasterise the page at 0-based `index`.
    fn rasterize(&self, index: usize, spec: RasterSpec) -> Result<DynamicImage, EngineError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// pdfium via `pdfium-render`.
///
/// With no explicit path the library is looked up next to the executable,
/// then in the working directory, then on the system search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific `libpdfium` file or a directory containing one.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match &self.library_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                &exe_dir(),
            ))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            })
            .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| EngineError::Unavailable(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }

    /// Check that the library can be bound, for startup diagnostics.
    pub fn probe(&self) -> Result<(), EngineError> {
        self.bind().map(|_| ())
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("./"))
}

impl RenderEngine for PdfiumEngine {
    fn session(&self) -> Result<Box<dyn EngineSession + '_>, EngineError> {
        Ok(Box::new(PdfiumSession {
            pdfium: self.bind()?,
        }))
    }

    fn max_parallelism(&self) -> Option<usize> {
        Some(1)
    }
}

struct PdfiumSession {
    pdfium: Pdfium,
}

impl EngineSession for PdfiumSession {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn DocumentHandle + 'a>, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| EngineError::Open(format!("{e:?}")))?;
        let page_count = self
            .raw_page_count(bytes)
            .unwrap_or_else(|| document.pages().len() as usize);
        Ok(Box::new(PdfiumDocument {
            document,
            page_count,
        }))
    }
}

impl PdfiumSession {
    /// Untruncated page count from `FPDF_GetPageCount`.
    fn raw_page_count(&self, bytes: &[u8]) -> Option<usize> {
        let bindings = self.pdfium.bindings();
        let handle = bindings.FPDF_LoadMemDocument64(bytes, None);
        if handle.is_null() {
            return None;
        }
        let count = bindings.FPDF_GetPageCount(handle);
        bindings.FPDF_CloseDocument(handle);
        usize::try_from(count).ok()
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
}

impl DocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn rasterize(&self, index: usize, spec: RasterSpec) -> Result<DynamicImage, EngineError> {
        let page_index = u16::try_from(index)
            .map_err(|_| EngineError::Rasterise(format!("page index {index} out of range")))?;

        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| EngineError::Rasterise(format!("{e:?}")))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(spec.scale())
            .set_maximum_width(spec.max_edge as i32)
            .set_maximum_height(spec.max_edge as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| EngineError::Rasterise(format!("{e:?}")))?;

        let image = bitmap.as_image();
        debug!(
            "Rasterised page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_scale_is_relative_to_pdf_points() {
        let spec = RasterSpec {
            dpi: 144,
            max_edge: 4000,
        };
        assert!((spec.scale() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn pdfium_sessions_are_serialised() {
        assert_eq!(PdfiumEngine::new().max_parallelism(), Some(1));
    }

    #[test]
    fn explicit_missing_library_is_unavailable() {
        let engine = PdfiumEngine::with_library_path("/nonexistent/libpdfium.so");
        let err = engine.session().err().expect("binding must fail");
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
