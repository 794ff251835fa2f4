//! Marker page layout: one title, one main marker, N subsection markers.
//!
//! [`build_page`] produces a [`PageLayout`]: pure data in millimetres with a
//! top-left origin, so placement can be checked without any PDF engine.
//! The layout can then be drawn two ways:
//!
//! * [`PageLayout::compose_raster`] — markers pasted on a white greyscale page
//!   (text is not drawn). Enough to verify markers survive placement.
//! * [`write_pdf`] — an A4 PDF through pdfium with the title and labels as
//!   real text objects.

use crate::error::FormScanError;
use crate::pipeline::codec::{encode_styled, MarkerStyle};
use crate::pipeline::render::bind_pdfium;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

/// Main marker: top-left corner, 30 mm square.
pub const MAIN_SLOT: (f32, f32) = (10.0, 20.0);
pub const MAIN_SIZE_MM: f32 = 30.0;

/// Subsection marker slots, in subsection order; 15 mm squares.
pub const SUBSECTION_SLOTS: [(f32, f32); 3] = [(10.0, 70.0), (10.0, 100.0), (10.0, 130.0)];
pub const SUBSECTION_SIZE_MM: f32 = 15.0;

const TITLE_SIZE_PT: f32 = 16.0;
const LABEL_SIZE_PT: f32 = 12.0;
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Marker styles used when building a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutStyles {
    pub main: MarkerStyle,
    pub subsection: MarkerStyle,
}

impl Default for LayoutStyles {
    fn default() -> Self {
        Self {
            main: MarkerStyle::MAIN,
            subsection: MarkerStyle::SUBSECTION,
        }
    }
}

/// A marker image and where it goes on the page.
#[derive(Debug, Clone)]
pub struct PlacedMarker {
    pub payload: String,
    pub image: GrayImage,
    pub x_mm: f32,
    pub y_mm: f32,
    pub size_mm: f32,
}

/// A line of text; `y_mm` is the top of the text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub x_mm: f32,
    pub y_mm: f32,
    pub size_pt: f32,
}

/// One laid-out marker page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub title: TextLabel,
    /// Main marker first, then subsections in order.
    pub markers: Vec<PlacedMarker>,
    pub labels: Vec<TextLabel>,
}

/// Which marker of a form a generated image is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    Main,
    /// 1-indexed subsection position.
    Subsection(usize),
}

/// A marker image before placement.
#[derive(Debug, Clone)]
pub struct GeneratedMarker {
    pub role: MarkerRole,
    pub payload: String,
    pub image: GrayImage,
}

impl GeneratedMarker {
    /// File name used when the marker is saved on its own.
    pub fn file_name(&self) -> String {
        match self.role {
            MarkerRole::Main => "marker_main.png".to_string(),
            MarkerRole::Subsection(n) => format!("marker_subsection_{n}.png"),
        }
    }
}

/// Encode the main marker and one marker per subsection.
///
/// Fails with [`FormScanError::LayoutOverflow`] when there are more
/// subsections than [`SUBSECTION_SLOTS`], and with
/// [`FormScanError::Encoding`] when a payload does not fit its marker.
pub fn generate_markers<S: AsRef<str>>(
    main_payload: &str,
    subsection_payloads: &[S],
    styles: &LayoutStyles,
) -> Result<Vec<GeneratedMarker>, FormScanError> {
    if subsection_payloads.len() > SUBSECTION_SLOTS.len() {
        return Err(FormScanError::LayoutOverflow {
            supplied: subsection_payloads.len(),
            slots: SUBSECTION_SLOTS.len(),
        });
    }

    let mut markers = Vec::with_capacity(subsection_payloads.len() + 1);
    markers.push(GeneratedMarker {
        role: MarkerRole::Main,
        payload: main_payload.to_string(),
        image: encode_styled(main_payload, &styles.main)?,
    });
    for (i, payload) in subsection_payloads.iter().enumerate() {
        let payload = payload.as_ref();
        markers.push(GeneratedMarker {
            role: MarkerRole::Subsection(i + 1),
            payload: payload.to_string(),
            image: encode_styled(payload, &styles.subsection)?,
        });
    }
    Ok(markers)
}

/// Lay out a page for `main_payload` and its subsection markers.
///
/// Same failure modes as [`generate_markers`].
pub fn build_page<S: AsRef<str>>(
    main_payload: &str,
    subsection_payloads: &[S],
    styles: &LayoutStyles,
) -> Result<PageLayout, FormScanError> {
    let generated = generate_markers(main_payload, subsection_payloads, styles)?;

    let mut markers = Vec::with_capacity(generated.len());
    let mut labels = Vec::with_capacity(subsection_payloads.len());
    for marker in generated {
        let (x_mm, y_mm, size_mm) = match marker.role {
            MarkerRole::Main => (MAIN_SLOT.0, MAIN_SLOT.1, MAIN_SIZE_MM),
            MarkerRole::Subsection(n) => {
                let (x, y) = SUBSECTION_SLOTS[n - 1];
                labels.push(TextLabel {
                    text: format!("Subsection {n}"),
                    x_mm: x + 20.0,
                    y_mm: y + 5.0,
                    size_pt: LABEL_SIZE_PT,
                });
                (x, y, SUBSECTION_SIZE_MM)
            }
        };
        markers.push(PlacedMarker {
            payload: marker.payload,
            image: marker.image,
            x_mm,
            y_mm,
            size_mm,
        });
    }

    info!(
        "Laid out page {:?} with {} subsection markers",
        main_payload,
        subsection_payloads.len()
    );

    Ok(PageLayout {
        title: centred_title(main_payload),
        markers,
        labels,
    })
}

/// Title centred on the page width, using an average Helvetica glyph width.
fn centred_title(text: &str) -> TextLabel {
    let approx_width_mm = text.chars().count() as f32 * TITLE_SIZE_PT * 0.55 * MM_PER_PT;
    TextLabel {
        text: text.to_string(),
        x_mm: ((PAGE_WIDTH_MM - approx_width_mm) / 2.0).max(10.0),
        y_mm: 10.0,
        size_pt: TITLE_SIZE_PT,
    }
}

impl PageLayout {
    /// Payloads of every marker on the page, main marker first.
    pub fn payloads(&self) -> Vec<&str> {
        self.markers.iter().map(|m| m.payload.as_str()).collect()
    }

    /// Paste every marker onto a white page at `px_per_mm` resolution.
    ///
    /// Markers are scaled with nearest-neighbour sampling so modules stay
    /// solid black or white.
    pub fn compose_raster(&self, px_per_mm: f32) -> GrayImage {
        let to_px = |mm: f32| (mm * px_per_mm).round() as u32;
        let mut page = GrayImage::from_pixel(
            to_px(PAGE_WIDTH_MM),
            to_px(PAGE_HEIGHT_MM),
            Luma([255u8]),
        );
        for marker in &self.markers {
            let side = to_px(marker.size_mm).max(1);
            let scaled = imageops::resize(&marker.image, side, side, FilterType::Nearest);
            imageops::overlay(
                &mut page,
                &scaled,
                i64::from(to_px(marker.x_mm)),
                i64::from(to_px(marker.y_mm)),
            );
        }
        debug!(
            "Composed page raster {}x{} px",
            page.width(),
            page.height()
        );
        page
    }
}

/// Write the layout as a single-page A4 PDF.
///
/// Needs the native pdfium library (see [`FormScanError::PdfiumBindingFailed`]).
pub fn write_pdf(layout: &PageLayout, path: &Path) -> Result<(), FormScanError> {
    let pdf_err = |detail: String| FormScanError::PdfWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| pdf_err(format!("{e:?}")))?;
    let font = document.fonts_mut().helvetica_bold();
    let mut page = document
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::a4())
        .map_err(|e| pdf_err(format!("{e:?}")))?;

    // PDF user space has its origin bottom-left; the layout's is top-left.
    for label in std::iter::once(&layout.title).chain(layout.labels.iter()) {
        let baseline_mm = label.y_mm + label.size_pt * MM_PER_PT;
        page.objects_mut()
            .create_text_object(
                PdfPoints::from_mm(label.x_mm),
                PdfPoints::from_mm(PAGE_HEIGHT_MM - baseline_mm),
                label.text.as_str(),
                font,
                PdfPoints::new(label.size_pt),
            )
            .map_err(|e| pdf_err(format!("{e:?}")))?;
    }

    for marker in &layout.markers {
        let image = DynamicImage::ImageLuma8(marker.image.clone());
        page.objects_mut()
            .create_image_object(
                PdfPoints::from_mm(marker.x_mm),
                PdfPoints::from_mm(PAGE_HEIGHT_MM - marker.y_mm - marker.size_mm),
                &image,
                Some(PdfPoints::from_mm(marker.size_mm)),
                Some(PdfPoints::from_mm(marker.size_mm)),
            )
            .map_err(|e| pdf_err(format!("{e:?}")))?;
    }
    drop(page);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| pdf_err(e.to_string()))?;
    }
    document
        .save_to_file(path)
        .map_err(|e| pdf_err(format!("{e:?}")))?;

    info!("Marker PDF written to {}", path.display());
    Ok(())
}
