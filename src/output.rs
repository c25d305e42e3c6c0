//! Values flowing out of the render and package stages.

use serde::{Deserialize, Serialize};

/// One rasterised page, PNG-encoded.
///
/// `page_number` is 1-based and matches the page's position in the source
/// document. The renderer emits these in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub page_number: usize,
    pub image_bytes: Vec<u8>,
}

/// A single page in the inline representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub page: usize,
    /// Standard (padded) base64 of the page PNG.
    pub image_data: String,
}

/// Inline representation: `{"images": [{"page": 1, "image_data": "…"}, …]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImageList {
    pub images: Vec<InlineImage>,
}

/// The packaged output of one conversion.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    /// A complete ZIP archive, positioned at its first byte.
    Archive(Vec<u8>),
    /// Ordered base64 page images.
    Inline(InlineImageList),
}

/// Timing and size figures for one conversion, logged by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages rendered; the number of entries in the result.
    pub page_count: usize,
    /// Bytes downloaded from the remote.
    pub fetched_bytes: u64,
    /// Size of the packaged payload (archive bytes or total base64 chars).
    pub output_bytes: usize,
    pub fetch_duration_ms: u64,
    pub render_duration_ms: u64,
    pub package_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A successful conversion: the result plus its stats.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub result: ConversionResult,
    pub stats: ConversionStats,
}
