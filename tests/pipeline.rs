//! Integration tests for the extraction pipeline.
//!
//! Scans are synthesised from the marker layout (no pdfium needed) and the
//! analysis service is replayed from `tests/fixtures/`.

use edgequake_formscan::pipeline::layout::LayoutStyles;
use edgequake_formscan::pipeline::encode::save_png;
use edgequake_formscan::{
    build_page, extract, extract_to_file, scan_markers, verify, verify_files, DocumentRef,
    ExtractionConfig, ExtractionWarning, FormScanError, SectionId, SectionTemplate, StoredAnalyzer,
    FORM_TITLE,
};
use edgequake_formscan::analysis::stored::StoredResponse;
use edgequake_formscan::schema::SectionSchema;
use image::DynamicImage;
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/loan_application_analysis.json")
}

/// Write a composed marker page for `sections` into `dir` and return its path.
fn scanned_page(dir: &Path, name: &str, sections: &[&str]) -> String {
    let layout = build_page(FORM_TITLE, sections, &LayoutStyles::default()).expect("layout");
    let path = dir.join(name);
    save_png(&layout.compose_raster(10.0), &path).expect("save page");
    path.to_string_lossy().into_owned()
}

fn value<'a>(records: &'a [edgequake_formscan::ExportRecord], key: &str) -> Option<&'a str> {
    records
        .iter()
        .find(|r| r.key == key)
        .and_then(|r| r.value.as_deref())
}

const ALL_SECTIONS: [&str; 3] = ["Personal Details", "Employment History", "Loan Details"];

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn extracts_every_marked_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &ALL_SECTIONS);

    let output = extract(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &ExtractionConfig::default(),
    )
    .await
    .expect("extraction");

    let ids: Vec<&SectionId> = output.sections.iter().map(|s| &s.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&&SectionId::PersonalDetails));
    assert!(ids.contains(&&SectionId::LoanDetails));

    let keys: Vec<&str> = output.records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "Date of Birth:",
            "Employer Name:",
            "End Date:",
            "First Name:",
            "Interest Rate:",
            "Job Title:",
            "Last Name:",
            "Loan Amount:",
            "Monthly Payment:",
            "Repayment Term:",
            "Social Security Number:",
            "Start Date:",
        ]
    );

    let r = &output.records;
    assert_eq!(value(r, "First Name:"), Some("Alice"));
    assert_eq!(value(r, "Employer Name:"), Some("Acme, Inc."));
    assert_eq!(value(r, "Loan Amount:"), Some("$25,000"));
    // Value block without text and dangling value id both resolve to "".
    assert_eq!(value(r, "Social Security Number:"), Some(""));
    assert_eq!(value(r, "Start Date:"), Some(""));
    // Never mentioned by the analysis.
    assert_eq!(value(r, "End Date:"), None);
    // Key block has no text of its own.
    assert_eq!(value(r, "Monthly Payment:"), None);
    // Keys outside the schema never become records.
    assert!(!keys.contains(&"Co-signer:"));

    assert!(output.warnings.contains(&ExtractionWarning::EmptyKey {
        block_id: "k11".into()
    }));
    assert!(!output
        .warnings
        .iter()
        .any(|w| matches!(w, ExtractionWarning::UnknownSection { .. })));

    assert_eq!(output.stats.pages_scanned, 1);
    assert_eq!(output.stats.markers_decoded, 4);
    assert_eq!(output.stats.pairs_resolved, 12);
    assert_eq!(output.stats.poll_attempts, 1);
}

#[tokio::test]
async fn child_text_fallback_recovers_textless_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &["Loan Details"]);
    let config = ExtractionConfig::builder()
        .child_text_fallback(true)
        .build()
        .expect("config");

    let output = extract(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &config,
    )
    .await
    .expect("extraction");

    assert_eq!(value(&output.records, "Monthly Payment:"), Some("$466.07"));
    assert!(!output
        .warnings
        .iter()
        .any(|w| matches!(w, ExtractionWarning::EmptyKey { .. })));
}

#[tokio::test]
async fn only_marked_sections_are_populated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &["Personal Details"]);

    let output = extract(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &ExtractionConfig::default(),
    )
    .await
    .expect("extraction");

    assert_eq!(output.sections.len(), 1);
    assert_eq!(output.sections[0].id, SectionId::PersonalDetails);
    assert_eq!(output.sections[0].page, 1);
    assert_eq!(value(&output.records, "Last Name:"), Some("Doe"));
    // The analysis has these pairs, but their sections carry no marker.
    assert_eq!(value(&output.records, "Job Title:"), None);
    assert_eq!(value(&output.records, "Interest Rate:"), None);
    assert_eq!(output.records.len(), 12);
}

#[tokio::test]
async fn unknown_marker_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &["Section 9", "Loan Details"]);

    let report = scan_markers(&page, &ExtractionConfig::default())
        .await
        .expect("scan");
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.marker_count(), 3);

    let output = extract(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &ExtractionConfig::default(),
    )
    .await
    .expect("extraction");
    assert!(output.warnings.contains(&ExtractionWarning::UnknownSection {
        page: 1,
        payload: "Section 9".into()
    }));
    assert_eq!(output.sections.len(), 1);
}

#[tokio::test]
async fn custom_title_and_template_sections_are_recognised() {
    static SCHEMA: [SectionSchema; 1] = [SectionSchema {
        name: "Financing",
        fields: &["Loan Amount:", "Interest Rate:"],
    }];
    let dir = tempfile::tempdir().expect("tempdir");
    let layout =
        build_page("Farm Loan", &["Financing"], &LayoutStyles::default()).expect("layout");
    let page = dir.path().join("scan.png");
    save_png(&layout.compose_raster(10.0), &page).expect("save page");

    let config = ExtractionConfig::builder()
        .template(SectionTemplate::new(&SCHEMA).expect("schema"))
        .form_title("Farm Loan")
        .build()
        .expect("config");
    let output = extract(
        page.to_string_lossy(),
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &config,
    )
    .await
    .expect("extraction");

    assert!(
        !output
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::UnknownSection { .. })),
        "got {:?}",
        output.warnings
    );
    assert_eq!(output.sections.len(), 1);
    assert_eq!(output.sections[0].id, SectionId::Custom("Financing".into()));
    assert_eq!(output.sections[0].fields_populated, 2);
    assert_eq!(value(&output.records, "Interest Rate:"), Some("4.5%"));
}

#[tokio::test]
async fn failed_job_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &ALL_SECTIONS);
    let out = dir.path().join("out/records.csv");

    let analyzer = StoredAnalyzer::from_response(StoredResponse {
        job_status: Some("FAILED".into()),
        status_message: Some("Unable to read document".into()),
        blocks: None,
    });
    let err = extract_to_file(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &analyzer,
        &out,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, FormScanError::AnalysisFailed { ref reason, .. } if reason == "Unable to read document"),
        "got {err:?}"
    );
    assert!(err.to_string().contains("No data available"));
    assert!(!out.exists());
}

#[tokio::test]
async fn response_without_blocks_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &ALL_SECTIONS);
    let submission = dir.path().join("submission.json");
    std::fs::write(&submission, r#"{"JobId": "abc123"}"#).expect("write");
    let out = dir.path().join("records.csv");

    let err = extract_to_file(
        &page,
        &DocumentRef::LocalFile(submission),
        &StoredAnalyzer::new(),
        &out,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, FormScanError::MalformedAnalysis(_)),
        "got {err:?}"
    );
    assert!(!out.exists());
}

#[tokio::test]
async fn extract_to_file_writes_sorted_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "scan.png", &ALL_SECTIONS);
    let out = dir.path().join("records.csv");

    extract_to_file(
        &page,
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &out,
        &ExtractionConfig::default(),
    )
    .await
    .expect("extraction");

    let csv = std::fs::read_to_string(&out).expect("csv written");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Section,Key,Value");
    assert_eq!(lines[1], "Personal Details,Date of Birth:,1990-04-12");
    assert_eq!(lines[2], "Employment History,Employer Name:,\"Acme, Inc.\"");
    assert_eq!(lines[3], "Employment History,End Date:,");
    assert_eq!(lines.len(), 13);
    assert!(!dir.path().join("records.csv.tmp").exists());
}

#[tokio::test]
async fn unsupported_input_fails_before_analysis() {
    let dir = tempfile::tempdir().expect("tempdir");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "not a scan").expect("write");

    let err = extract(
        notes.to_string_lossy(),
        &DocumentRef::LocalFile(fixture()),
        &StoredAnalyzer::new(),
        &ExtractionConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FormScanError::UnsupportedInput { .. }));
}

// ── Verification ─────────────────────────────────────────────────────────────

#[test]
fn composed_pages_verify_against_their_markers() {
    let first = build_page(FORM_TITLE, &["Personal Details"], &LayoutStyles::default())
        .expect("layout")
        .compose_raster(10.0);
    let second = build_page(FORM_TITLE, &["Loan Details"], &LayoutStyles::default())
        .expect("layout")
        .compose_raster(10.0);
    let pages = [
        DynamicImage::ImageLuma8(first),
        DynamicImage::ImageLuma8(second),
    ];

    let results = verify(&pages, &["Personal Details", "Personal Details"]);
    assert!(results[0].ok);
    assert!(!results[1].ok);
    assert!(results[1].got.contains(&"Loan Details".to_string()));
    assert!(matches!(
        results[1].to_warning(),
        Some(ExtractionWarning::MarkerMismatch { index: 1, .. })
    ));
}

#[test]
fn verify_files_reads_pngs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let page = scanned_page(dir.path(), "p1.png", &["Employment History"]);
    let results = verify_files(&[page], &[FORM_TITLE]).expect("verify");
    assert!(results[0].ok);
}
