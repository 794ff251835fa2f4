//! Extraction entry points: scanned form in, sorted records out.
//!
//! The run is a flat sequence: scan the input for section markers, wait for
//! the analysis job, resolve the block graph once, populate every recognised
//! section from the same pairs, then export. A failed job aborts the run
//! before anything is populated; data-quality problems are collected as
//! [`ExtractionWarning`]s instead.

use crate::analysis::{DocumentAnalyzer, DocumentRef, JobRunner};
use crate::config::ExtractionConfig;
use crate::error::{ExtractionWarning, FormScanError};
use crate::output::{ExtractionOutput, ExtractionStats, PageMarkers, ScanReport, SectionReport};
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::resolve::resolve_pairs_with;
use crate::pipeline::{codec, export, populate, render, verify};
use crate::schema::{SectionId, SectionTemplate};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract form data from a scanned form.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`    — Local path or HTTP/HTTPS URL of the scanned form (PDF, PNG or JPEG)
/// * `document` — Where the analysis service finds the same document
/// * `analyzer` — The analysis service
/// * `config`   — Extraction configuration
///
/// # Errors
/// Returns `Err(FormScanError)` for fatal errors only: unreadable input,
/// a rasterisation failure, or an analysis job that failed, timed out or was
/// cancelled. A failed job never produces records.
pub async fn extract(
    input: impl AsRef<str>,
    document: &DocumentRef,
    analyzer: &dyn DocumentAnalyzer,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, FormScanError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting extraction: {}", input);

    // ── Step 1: Scan pages for markers ───────────────────────────────────
    let scan_start = Instant::now();
    let scan = scan_markers(input, config).await?;
    let scan_duration_ms = scan_start.elapsed().as_millis() as u64;

    let mut warnings = scan.warnings;
    let (recognised, classify_warnings) =
        classify_sections(&scan.pages, &config.template, &config.form_title);
    warnings.extend(classify_warnings);
    if recognised.is_empty() {
        warn!("No template section markers found on {}", input);
    }

    // ── Step 2: Run the analysis job ─────────────────────────────────────
    let analysis_start = Instant::now();
    let mut runner = JobRunner::new(analyzer, config.poll);
    if let Some(ref token) = config.cancel {
        runner = runner.cancel_on(token);
    }
    if let Some(ref cb) = config.progress_callback {
        runner = runner.with_progress(cb);
    }
    let outcome = runner.run(document).await?;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    // ── Step 3: Resolve the block graph ──────────────────────────────────
    let pairs = resolve_pairs_with(&outcome.blocks, config.resolve);
    for pair in pairs.iter().filter(|p| p.key.is_empty()) {
        warnings.push(ExtractionWarning::EmptyKey {
            block_id: pair.key_block_id.clone(),
        });
    }
    info!("Resolved {} key/value pairs", pairs.len());

    // ── Step 4: Populate each recognised section ─────────────────────────
    let mut template = config.template.clone();
    let sections: Vec<SectionReport> = recognised
        .into_iter()
        .map(|(id, page)| {
            let fields_populated = populate::populate_in_place(&mut template, &pairs, id.name());
            info!("Section {}: {} fields populated", id, fields_populated);
            if let Some(ref cb) = config.progress_callback {
                cb.on_section_populated(id.name(), fields_populated);
            }
            SectionReport {
                id,
                page,
                fields_populated,
            }
        })
        .collect();

    // ── Step 5: Export ───────────────────────────────────────────────────
    let records = export::export(&template);
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(records.len());
    }

    let stats = ExtractionStats {
        pages_scanned: scan.pages.len(),
        markers_decoded: scan.pages.iter().map(|p| p.markers.len()).sum(),
        pairs_resolved: pairs.len(),
        fields_populated: sections.iter().map(|s| s.fields_populated).sum(),
        poll_attempts: outcome.attempts,
        scan_duration_ms,
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} sections, {} records, {} warnings, {}ms total",
        sections.len(),
        records.len(),
        warnings.len(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        records,
        template,
        sections,
        markers: scan.pages,
        warnings,
        job_id: outcome.job_id.0,
        stats,
    })
}

/// Extract and write the records as CSV directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Nothing
/// is written when extraction fails.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    document: &DocumentRef,
    analyzer: &dyn DocumentAnalyzer,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, FormScanError> {
    let output = extract(input, document, analyzer, config).await?;
    let path = output_path.as_ref();
    let csv = output.to_csv()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FormScanError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, &csv)
        .await
        .map_err(|e| FormScanError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| FormScanError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} records to {}", output.records.len(), path.display());
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    document: &DocumentRef,
    analyzer: &dyn DocumentAnalyzer,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, FormScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FormScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, document, analyzer, config))
}

/// Decode every marker on the selected pages of a PDF or image input.
///
/// Does not contact the analysis service.
pub async fn scan_markers(
    input: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ScanReport, FormScanError> {
    let resolved = input::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();

    let pages: Vec<(usize, DynamicImage)> = match resolved.kind() {
        InputKind::Image => {
            if config.pages.to_indices(1).is_empty() {
                return Err(FormScanError::PageOutOfRange { page: 0, total: 1 });
            }
            let img = verify::load_image(&path)?;
            vec![(0, img)]
        }
        InputKind::Pdf => {
            let total = render::page_count(&path, config.password.as_deref()).await?;
            let indices = config.pages.to_indices(total);
            if indices.is_empty() {
                return Err(FormScanError::PageOutOfRange { page: 0, total });
            }
            render::render_pages(&path, config, &indices).await?
        }
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_start(pages.len());
    }

    let progress = config.progress_callback.clone();
    let report = tokio::task::spawn_blocking(move || {
        let mut report = ScanReport::default();
        for (idx, img) in pages {
            let page = idx + 1;
            let scan = codec::scan(&img);
            debug!("Page {}: {} markers decoded", page, scan.markers.len());
            for detail in scan.failures {
                report
                    .warnings
                    .push(ExtractionWarning::UndecodableMarker { page, detail });
            }
            if scan.markers.is_empty() {
                report.warnings.push(ExtractionWarning::NoMarkersOnPage { page });
            }
            if let Some(ref cb) = progress {
                cb.on_page_scanned(page, scan.markers.len());
            }
            report.pages.push(PageMarkers {
                page,
                markers: scan.markers,
            });
        }
        report
    })
    .await
    .map_err(|e| FormScanError::Internal(format!("Scan task panicked: {}", e)))?;

    info!(
        "Scanned {} pages: {} markers",
        report.pages.len(),
        report.marker_count()
    );
    Ok(report)
}

/// Map decoded payloads onto template sections.
///
/// Returns each recognised section once, in first-seen order, with the page
/// it was first seen on. The main marker (`form_title`) is skipped; any other
/// payload the template does not know becomes an
/// [`ExtractionWarning::UnknownSection`].
pub fn classify_sections(
    pages: &[PageMarkers],
    template: &SectionTemplate,
    form_title: &str,
) -> (Vec<(SectionId, usize)>, Vec<ExtractionWarning>) {
    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    let mut warnings = Vec::new();

    for page in pages {
        for payload in page.payloads() {
            let id = template.section_id(payload);
            if id.is_known() {
                if seen.insert(id.name().to_string()) {
                    sections.push((id, page.page));
                }
            } else if payload == form_title {
                debug!("Page {}: form marker", page.page);
            } else {
                warn!("Page {}: unknown section marker {:?}", page.page, payload);
                warnings.push(ExtractionWarning::UnknownSection {
                    page: page.page,
                    payload: payload.to_string(),
                });
            }
        }
    }

    (sections, warnings)
}
