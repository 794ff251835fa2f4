//! Output types for extraction runs.

use crate::error::{ExtractionWarning, FormScanError};
use crate::pipeline::codec::Marker;
use crate::pipeline::export::{to_csv_bytes, ExportRecord};
use crate::schema::{SectionId, SectionTemplate};
use serde::{Deserialize, Serialize};

/// Markers decoded from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarkers {
    /// 1-indexed page number.
    pub page: usize,
    pub markers: Vec<Marker>,
}

impl PageMarkers {
    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(|m| m.payload.as_str())
    }
}

/// Result of scanning an input for markers, before any analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Pages in scan order.
    pub pages: Vec<PageMarkers>,
    pub warnings: Vec<ExtractionWarning>,
}

impl ScanReport {
    pub fn marker_count(&self) -> usize {
        self.pages.iter().map(|p| p.markers.len()).sum()
    }
}

/// One template section the run recognised on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport {
    pub id: SectionId,
    /// First page the section marker was seen on (1-indexed).
    pub page: usize,
    /// Slot writes performed for this section.
    pub fields_populated: usize,
}

/// Complete result of [`crate::extract()`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Key-sorted records, one per template slot.
    pub records: Vec<ExportRecord>,
    /// The populated template the records were flattened from.
    pub template: SectionTemplate,
    /// Recognised sections in first-seen order.
    pub sections: Vec<SectionReport>,
    /// Every marker decoded, per page.
    pub markers: Vec<PageMarkers>,
    /// Non-fatal findings for downstream review.
    pub warnings: Vec<ExtractionWarning>,
    pub job_id: String,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// The records as a UTF-8 CSV document with header row.
    pub fn to_csv(&self) -> Result<Vec<u8>, FormScanError> {
        to_csv_bytes(&self.records)
    }
}

/// Counters and timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub pages_scanned: usize,
    pub markers_decoded: usize,
    pub pairs_resolved: usize,
    /// Slot writes summed over sections (overwrites included).
    pub fields_populated: usize,
    /// Status requests made to the analysis service.
    pub poll_attempts: u32,
    pub scan_duration_ms: u64,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}
