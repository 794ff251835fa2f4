//! Marker verification: did each rendered page keep its marker?
//!
//! A page passes when its expected payload is among the markers decoded from
//! it. Other markers on the same page (neighbouring subsections, stray codes)
//! do not matter. Failures are reported and logged, never raised.

use crate::error::{ExtractionWarning, FormScanError};
use crate::pipeline::codec::decode_all;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Outcome for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// 0-based position in the input sequences.
    pub index: usize,
    pub expected: String,
    pub ok: bool,
    /// Every payload decoded from the page, in detector order.
    pub got: Vec<String>,
}

impl VerificationResult {
    /// The mismatch as a warning, or `None` when the page passed.
    pub fn to_warning(&self) -> Option<ExtractionWarning> {
        (!self.ok).then(|| ExtractionWarning::MarkerMismatch {
            index: self.index,
            expected: self.expected.clone(),
            got: self.got.clone(),
        })
    }
}

/// Check each page image against the payload expected at the same position.
///
/// Pages and payloads are paired positionally; surplus entries on either side
/// are ignored with a warning.
pub fn verify<S: AsRef<str>>(
    pages: &[DynamicImage],
    expected: &[S],
) -> Vec<VerificationResult> {
    if pages.len() != expected.len() {
        warn!(
            "Verifying {} pages against {} expected payloads; extra entries ignored",
            pages.len(),
            expected.len()
        );
    }

    pages
        .iter()
        .zip(expected)
        .enumerate()
        .map(|(index, (page, expected))| {
            let expected = expected.as_ref();
            let got: Vec<String> = decode_all(page).into_iter().map(|m| m.payload).collect();
            let ok = got.iter().any(|p| p == expected);
            if ok {
                info!("Page {}: marker matches expected {:?}", index, expected);
            } else {
                warn!(
                    "Page {}: mismatch. Expected {:?}, got {:?}",
                    index, expected, got
                );
            }
            VerificationResult {
                index,
                expected: expected.to_string(),
                ok,
                got,
            }
        })
        .collect()
}

/// Load page images from disk and [`verify`] them.
///
/// An unreadable image is an input error, not a mismatch.
pub fn verify_files<P: AsRef<Path>, S: AsRef<str>>(
    paths: &[P],
    expected: &[S],
) -> Result<Vec<VerificationResult>, FormScanError> {
    let pages = paths
        .iter()
        .map(|p| load_image(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(verify(&pages, expected))
}

pub(crate) fn load_image(path: &Path) -> Result<DynamicImage, FormScanError> {
    if !path.exists() {
        return Err(FormScanError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(|e| FormScanError::ImageDecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
