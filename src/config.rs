//! Configuration types for form extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks and logged as a whole.

use crate::analysis::PollPolicy;
use crate::error::FormScanError;
use crate::pipeline::resolve::ResolveOptions;
use crate::progress::ProgressCallback;
use crate::schema::{SectionTemplate, FORM_TITLE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_formscan::{ExtractionConfig, PageSelection};
///
/// let config = ExtractionConfig::builder()
///     .max_rendered_pixels(2400)
///     .pages(PageSelection::Single(1))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Only PDF inputs are rendered. 2000 px on A4 puts a 15 mm subsection
    /// marker at about 140 px, well above what the detector needs.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pages scanned for markers. Default: all.
    pub pages: PageSelection,

    /// How to wait on the analysis job. Default: fixed 10 s, no deadline.
    pub poll: PollPolicy,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Where key and value text is read from in the block graph.
    pub resolve: ResolveOptions,

    /// Empty template the run fills in. Default: the loan application.
    pub template: SectionTemplate,

    /// Payload of the form's main marker, skipped when classifying sections.
    /// Default: [`FORM_TITLE`].
    pub form_title: String,

    /// Receives per-page and per-poll events.
    pub progress_callback: Option<ProgressCallback>,

    /// Aborts the analysis wait when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            password: None,
            pages: PageSelection::default(),
            poll: PollPolicy::default(),
            download_timeout_secs: 120,
            resolve: ResolveOptions::default(),
            template: SectionTemplate::loan_application(),
            form_title: FORM_TITLE.to_string(),
            progress_callback: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pages", &self.pages)
            .field("poll", &self.poll)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("resolve", &self.resolve)
            .field("sections", &self.template.sections().len())
            .field("form_title", &self.form_title)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn poll(mut self, policy: PollPolicy) -> Self {
        self.config.poll = policy;
        self
    }

    /// Shorthand for a fixed polling interval, keeping any deadline.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        let max_wait = self.config.poll.max_wait;
        self.config.poll = PollPolicy::fixed(interval);
        self.config.poll.max_wait = max_wait;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.config.poll.max_wait = Some(max_wait);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn child_text_fallback(mut self, v: bool) -> Self {
        self.config.resolve.child_text_fallback = v;
        self
    }

    pub fn template(mut self, template: SectionTemplate) -> Self {
        self.config.template = template;
        self
    }

    pub fn form_title(mut self, title: impl Into<String>) -> Self {
        self.config.form_title = title.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.cancel = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, FormScanError> {
        let c = &self.config;
        if c.poll.interval.is_zero() {
            return Err(FormScanError::InvalidConfig(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(FormScanError::InvalidConfig(
                "Download timeout must be ≥ 1 s".into(),
            ));
        }
        if c.template.sections().is_empty() {
            return Err(FormScanError::InvalidConfig(
                "Template has no sections".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Specifies which pages of the input to scan for markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Parse the CLI form: `3`, `2-5`, or `1,3,7`.
    pub fn parse(s: &str) -> Result<Self, FormScanError> {
        let s = s.trim();
        let bad = || FormScanError::InvalidConfig(format!("Invalid page selection: {s:?}"));
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if let Some((a, b)) = s.split_once('-') {
            let a = a.trim().parse().map_err(|_| bad())?;
            let b = b.trim().parse().map_err(|_| bad())?;
            return Ok(PageSelection::Range(a, b));
        }
        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| p.trim().parse().map_err(|_| bad()))
                .collect::<Result<Vec<usize>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        s.parse().map(PageSelection::Single).map_err(|_| bad())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ExtractionConfig::builder().build().expect("defaults");
        assert_eq!(config.max_rendered_pixels, 2000);
        assert_eq!(config.poll, PollPolicy::default());
        assert_eq!(config.template.sections().len(), 3);
        assert!(!config.resolve.child_text_fallback);
        assert_eq!(config.form_title, FORM_TITLE);
    }

    #[test]
    fn builder_clamps_pixels() {
        let config = ExtractionConfig::builder()
            .max_rendered_pixels(10)
            .build()
            .expect("valid");
        assert_eq!(config.max_rendered_pixels, 100);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = ExtractionConfig::builder()
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, FormScanError::InvalidConfig(_)));
    }

    #[test]
    fn poll_interval_keeps_deadline() {
        let config = ExtractionConfig::builder()
            .max_wait(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(2))
            .build()
            .expect("valid");
        assert_eq!(config.poll.interval, Duration::from_secs(2));
        assert_eq!(config.poll.max_wait, Some(Duration::from_secs(60)));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ExtractionConfig::builder()
            .password("hunter2")
            .build()
            .expect("valid");
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn page_selection_all() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
    }

    #[test]
    fn page_selection_single_out_of_range() {
        assert!(PageSelection::Single(0).to_indices(3).is_empty());
        assert!(PageSelection::Single(4).to_indices(3).is_empty());
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
    }

    #[test]
    fn page_selection_range_is_clipped() {
        assert_eq!(PageSelection::Range(2, 10).to_indices(4), vec![1, 2, 3]);
    }

    #[test]
    fn page_selection_set_dedups() {
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 9]).to_indices(3),
            vec![0, 2]
        );
    }

    #[test]
    fn page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("2").unwrap(), PageSelection::Single(2));
        assert_eq!(PageSelection::parse("2-5").unwrap(), PageSelection::Range(2, 5));
        assert_eq!(
            PageSelection::parse("1, 3,7").unwrap(),
            PageSelection::Set(vec![1, 3, 7])
        );
        assert!(PageSelection::parse("x-2").is_err());
    }
}
