//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while pages are scanned and the analysis job is polled. The CLI
//! drives a spinner from it; a service could forward events to a channel.
//!
//! # Example
//!
//! ```rust
//! use edgequake_formscan::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter(AtomicU32);
//!
//! impl ExtractionProgressCallback for PollCounter {
//!     fn on_poll(&self, _job_id: &str, _attempt: u32, _status: edgequake_formscan::JobStatus) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PollCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::analysis::JobStatus;
use std::sync::Arc;

/// Called by the extraction pipeline as it progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any page is scanned.
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after markers were decoded from one page.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `markers`  — number of payloads decoded on that page
    fn on_page_scanned(&self, page_num: usize, markers: usize) {
        let _ = (page_num, markers);
    }

    /// Called once the analysis service accepted the document.
    fn on_job_submitted(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after every status request.
    ///
    /// # Arguments
    /// * `attempt` — 1-based count of status requests so far
    fn on_poll(&self, job_id: &str, attempt: u32, status: JobStatus) {
        let _ = (job_id, attempt, status);
    }

    /// Called after a section's slots were filled from the resolved pairs.
    ///
    /// # Arguments
    /// * `matched` — number of slots written
    fn on_section_populated(&self, section: &str, matched: usize) {
        let _ = (section, matched);
    }

    /// Called once the records are ready.
    fn on_extraction_complete(&self, records: usize) {
        let _ = records;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
