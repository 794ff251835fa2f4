//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! Markers are located on rasters, so PDF inputs are rendered page by page
//! before scanning. pdfium keeps thread-local state and is not async-safe;
//! the work runs under `tokio::task::spawn_blocking`.
//!
//! `max_rendered_pixels` caps the longest edge. A 15 mm subsection marker on
//! A4 rendered at 2000 px is ~140 px wide, comfortably above what the
//! detector needs.

use crate::config::ExtractionConfig;
use crate::error::FormScanError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Bind to the native pdfium library.
///
/// Lookup order: `PDFIUM_LIB_PATH`, the working directory, then the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, FormScanError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| FormScanError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Rasterise selected pages of a PDF into images.
///
/// # Returns
/// A vector of `(page_index_0based, DynamicImage)` tuples.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, FormScanError> {
    let path = pdf_path.to_path_buf();
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| FormScanError::Internal(format!("Render task panicked: {}", e)))?
}

/// Number of pages in a PDF, without rendering anything.
pub async fn page_count(pdf_path: &Path, password: Option<&str>) -> Result<usize, FormScanError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || -> Result<usize, FormScanError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, pwd.as_deref())?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| FormScanError::Internal(format!("Page-count task panicked: {}", e)))?
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, FormScanError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                FormScanError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                FormScanError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            FormScanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn render_pages_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, FormScanError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| FormScanError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            FormScanError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}
