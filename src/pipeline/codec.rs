//! Marker codec: section payload ⇄ QR code image.
//!
//! Markers are printed small, so the codec always uses the lowest error
//! correction level (L) and lets the caller pick the module size in pixels
//! (`density`). Rendering is done module-by-module into a greyscale buffer,
//! which keeps the quiet-zone width under our control.
//!
//! Decoding finds every code in an image in detector order. That order is not
//! spatial; callers that care about position use [`Marker::bounding_box`].

use crate::error::FormScanError;
use image::{DynamicImage, GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Module size and code geometry for one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerStyle {
    /// Pixels per module edge.
    pub density: u32,
    /// Quiet-zone width in modules.
    pub border: u32,
    /// Fixed QR version (1–40). `None` picks the smallest version that fits.
    pub version: Option<i16>,
}

impl MarkerStyle {
    /// Large marker identifying the whole form.
    pub const MAIN: MarkerStyle = MarkerStyle {
        density: 10,
        border: 2,
        version: None,
    };

    /// Small marker beside each subsection.
    pub const SUBSECTION: MarkerStyle = MarkerStyle {
        density: 3,
        border: 2,
        version: None,
    };

    pub fn with_density(density: u32) -> Self {
        Self {
            density,
            ..Self::MAIN
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self::MAIN
    }
}

/// Axis-aligned pixel box around a detected code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    fn from_corners(corners: &[rqrr::Point; 4]) -> Self {
        let min_x = corners.iter().map(|p| p.x).min().unwrap_or(0).max(0);
        let min_y = corners.iter().map(|p| p.y).min().unwrap_or(0).max(0);
        let max_x = corners.iter().map(|p| p.x).max().unwrap_or(0).max(min_x);
        let max_y = corners.iter().map(|p| p.y).max().unwrap_or(0).max(min_y);
        Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        }
    }
}

/// A decoded marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub payload: String,
    pub bounding_box: BoundingBox,
}

/// Everything the detector found in one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub markers: Vec<Marker>,
    /// Codes that were located but could not be decoded.
    pub failures: Vec<String>,
}

/// Largest marker image side `encode_styled` will allocate.
pub const MAX_MARKER_SIDE_PX: u32 = 16_384;

/// Encode `payload` as a QR image with `density` pixels per module.
pub fn encode(payload: &str, density: u32) -> Result<GrayImage, FormScanError> {
    encode_styled(payload, &MarkerStyle::with_density(density))
}

/// Encode `payload` with full control over density, border and version.
///
/// Fails with [`FormScanError::Encoding`] when the payload exceeds the
/// capacity of the requested version at error-correction level L.
pub fn encode_styled(payload: &str, style: &MarkerStyle) -> Result<GrayImage, FormScanError> {
    if style.density == 0 {
        return Err(FormScanError::InvalidConfig(
            "Marker density must be ≥ 1 pixel per module".into(),
        ));
    }

    let code = match style.version {
        Some(v) => QrCode::with_version(payload.as_bytes(), Version::Normal(v), EcLevel::L),
        None => QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L),
    }
    .map_err(|e| FormScanError::Encoding {
        payload: payload.to_string(),
        reason: e.to_string(),
    })?;

    let modules = code.width() as u32;
    let side = style
        .border
        .checked_mul(2)
        .and_then(|b| b.checked_add(modules))
        .and_then(|m| m.checked_mul(style.density))
        .filter(|&side| side <= MAX_MARKER_SIDE_PX)
        .ok_or_else(|| {
            FormScanError::InvalidConfig(format!(
                "Marker of {} modules at density {} with border {} exceeds {} px",
                modules, style.density, style.border, MAX_MARKER_SIDE_PX
            ))
        })?;
    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = i as u32 % modules;
        let my = i as u32 / modules;
        let x0 = (mx + style.border) * style.density;
        let y0 = (my + style.border) * style.density;
        for y in y0..y0 + style.density {
            for x in x0..x0 + style.density {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    }

    debug!(
        "Encoded marker {:?}: {} modules, {}x{} px",
        payload, modules, side, side
    );
    Ok(img)
}

/// Detect and decode every marker in `image`.
///
/// Returns an empty list when there are none; undecodable codes are logged
/// and skipped (see [`scan`] to get them reported).
pub fn decode_all(image: &DynamicImage) -> Vec<Marker> {
    let result = scan(image);
    for failure in &result.failures {
        warn!("Skipping undecodable marker: {}", failure);
    }
    result.markers
}

/// Detect every code in `image`, separating decoded markers from failures.
pub fn scan(image: &DynamicImage) -> MarkerScan {
    let luma = image.to_luma8();
    let (width, height) = luma.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

    let mut result = MarkerScan::default();
    for grid in prepared.detect_grids() {
        let bounding_box = BoundingBox::from_corners(&grid.bounds);
        match grid.decode() {
            Ok((_meta, payload)) => {
                debug!("Decoded marker {:?} at {:?}", payload, bounding_box);
                result.markers.push(Marker {
                    payload,
                    bounding_box,
                });
            }
            Err(e) => result.failures.push(format!("{e:?} at {bounding_box:?}")),
        }
    }
    result
}
