//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! Scanned forms arrive either as a PDF (rendered page by page) or as a
//! single page image. URLs are downloaded into a `TempDir` that lives as long
//! as the [`ResolvedInput`], so cleanup happens on drop. The file type is
//! sniffed from its first bytes, not its extension.

use crate::error::FormScanError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What kind of document the input is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// A single PNG or JPEG page.
    Image,
}

impl InputKind {
    /// Classify by magic bytes.
    pub fn sniff(magic: &[u8; 4]) -> Option<Self> {
        match magic {
            b"%PDF" => Some(InputKind::Pdf),
            [0x89, b'P', b'N', b'G'] => Some(InputKind::Image),
            [0xFF, 0xD8, 0xFF, _] => Some(InputKind::Image),
            _ => None,
        }
    }
}

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: InputKind },
    /// Input was a URL; downloaded to a temp directory kept alive here.
    Downloaded {
        path: PathBuf,
        kind: InputKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF or image file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, FormScanError> {
    if input.trim().is_empty() {
        return Err(FormScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, FormScanError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(FormScanError::FileNotFound { path });
    }

    let magic = match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            f.read_exact(&mut magic)
                .map_err(|_| FormScanError::UnsupportedInput {
                    path: path.clone(),
                    magic,
                })?;
            magic
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FormScanError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(FormScanError::FileNotFound { path });
        }
    };

    let kind =
        InputKind::sniff(&magic).ok_or_else(|| FormScanError::UnsupportedInput {
            path: path.clone(),
            magic,
        })?;

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, FormScanError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FormScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FormScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FormScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(FormScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| FormScanError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FormScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    let kind = InputKind::sniff(&magic).ok_or_else(|| FormScanError::UnsupportedInput {
        path: file_path.clone(),
        magic,
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| FormScanError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}
