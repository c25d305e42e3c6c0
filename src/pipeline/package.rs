//! Package stage: turn the ordered page sequence into the response payload.
//!
//! Both representations consume the same `Vec<RenderedPage>` and preserve
//! its order. Neither re-validates the PNG bytes. An empty sequence is an
//! error in both modes, so a caller never receives a "successful" empty
//! archive or an empty image list.

use crate::config::OutputMode;
use crate::error::Pdf2ImgError;
use crate::output::{ConversionResult, InlineImage, InlineImageList, RenderedPage};
use crate::pipeline::encode;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive entry name for a 1-based page number.
pub fn entry_name(page_number: usize) -> String {
    format!("page_{page_number}.png")
}

/// Package `pages` in the representation chosen by `mode`.
pub fn package(pages: Vec<RenderedPage>, mode: OutputMode) -> Result<ConversionResult, Pdf2ImgError> {
    match mode {
        OutputMode::Archive => package_archive(&pages).map(ConversionResult::Archive),
        OutputMode::Inline => package_inline(&pages).map(ConversionResult::Inline),
    }
}

/// Build an in-memory DEFLATE ZIP with one `page_<n>.png` entry per page.
///
/// The returned buffer starts at the archive's first byte.
pub fn package_archive(pages: &[RenderedPage]) -> Result<Vec<u8>, Pdf2ImgError> {
    ensure_not_empty(pages)?;

    let estimate: usize = pages.iter().map(|p| p.image_bytes.len()).sum();
    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(estimate)));
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for page in pages {
        let name = entry_name(page.page_number);
        zip.start_file(name.as_str(), deflated)
            .map_err(|e| archive_error(&name, e.to_string()))?;
        zip.write_all(&page.image_bytes)
            .map_err(|e| archive_error(&name, e.to_string()))?;
    }

    let buf = zip
        .finish()
        .map_err(|e| archive_error("central directory", e.to_string()))?
        .into_inner();

    debug!("Packaged {} pages → {} byte archive", pages.len(), buf.len());
    Ok(buf)
}

/// Base64-encode each page into `{page, image_data}` records.
pub fn package_inline(pages: &[RenderedPage]) -> Result<InlineImageList, Pdf2ImgError> {
    ensure_not_empty(pages)?;

    let images = pages
        .iter()
        .map(|p| InlineImage {
            page: p.page_number,
            image_data: encode::to_base64(&p.image_bytes),
        })
        .collect();

    Ok(InlineImageList { images })
}

fn ensure_not_empty(pages: &[RenderedPage]) -> Result<(), Pdf2ImgError> {
    if pages.is_empty() {
        warn!(stage = "package", "No pages to package");
        return Err(Pdf2ImgError::EmptyResult);
    }
    Ok(())
}

fn archive_error(entry: &str, detail: String) -> Pdf2ImgError {
    Pdf2ImgError::Internal(format!("ZIP write failed at {entry}: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::io::Read;

    fn pages(n: usize) -> Vec<RenderedPage> {
        (1..=n)
            .map(|page_number| RenderedPage {
                page_number,
                image_bytes: format!("png-bytes-for-page-{page_number}").repeat(page_number).into_bytes(),
            })
            .collect()
    }

    #[test]
    fn archive_entries_match_pages_in_order() {
        let input = pages(3);
        let bytes = package_archive(&input).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        for (i, page) in input.iter().enumerate() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), format!("page_{}.png", i + 1));
            assert_eq!(entry.compression(), CompressionMethod::Deflated);
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            assert_eq!(content, page.image_bytes);
        }
    }

    #[test]
    fn archive_uses_page_numbers_verbatim() {
        let input = vec![RenderedPage {
            page_number: 7,
            image_bytes: vec![1, 2, 3],
        }];
        let bytes = package_archive(&input).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "page_7.png");
    }

    #[test]
    fn inline_decodes_back_to_original_bytes() {
        let input = pages(4);
        let list = package_inline(&input).unwrap();
        assert_eq!(list.images.len(), 4);
        for (img, page) in list.images.iter().zip(&input) {
            assert_eq!(img.page, page.page_number);
            assert_eq!(STANDARD.decode(&img.image_data).unwrap(), page.image_bytes);
        }
    }

    #[test]
    fn empty_input_is_an_error_in_both_modes() {
        assert!(matches!(package_archive(&[]), Err(Pdf2ImgError::EmptyResult)));
        assert!(matches!(package_inline(&[]), Err(Pdf2ImgError::EmptyResult)));
        assert!(matches!(
            package(Vec::new(), OutputMode::Inline),
            Err(Pdf2ImgError::EmptyResult)
        ));
    }

    #[test]
    fn inline_serialises_with_image_data_key() {
        let list = package_inline(&pages(1)).unwrap();
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["images"][0]["page"], 1);
        assert!(json["images"][0]["image_data"].is_string());
    }
}
