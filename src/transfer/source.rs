//! Send-side attachment sources
//!
//! An outgoing attachment is either literal content that gets written
//! to a temporary file, or a path. A path naming a directory expands to
//! every file in it whose name matches a `*`/`?` mask.

use crate::error::{Error, Result};
use crate::transfer::collision::safe_file_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const DEFAULT_MASK: &str = "*";

fn default_mask() -> String {
    DEFAULT_MASK.to_string()
}

/// Where an outgoing attachment comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttachmentSource {
    /// Literal content, sent as a file called `file_name`.
    FromString { file_name: String, content: String },
    /// A file, or a directory filtered by `mask`.
    File {
        path: PathBuf,
        #[serde(default = "default_mask")]
        mask: String,
    },
}

impl AttachmentSource {
    #[must_use]
    pub fn from_string(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::FromString {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            mask: default_mask(),
        }
    }

    #[must_use]
    pub fn directory(path: impl Into<PathBuf>, mask: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            mask: mask.into(),
        }
    }
}

/// Files ready to attach, plus the temporary directories backing
/// string-sourced attachments. The directories are removed when this
/// value is dropped or [`cleanup`](Self::cleanup) is called.
#[derive(Debug, Default)]
pub struct ResolvedAttachments {
    pub files: Vec<PathBuf>,
    temp_dirs: Vec<TempDir>,
}

impl ResolvedAttachments {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Remove temporary files. Failures are logged and ignored.
    pub fn cleanup(self) {
        for dir in self.temp_dirs {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                debug!("Could not remove temporary directory {}: {e}", path.display());
            }
        }
    }
}

/// Resolve every source to files on disk.
///
/// A path source that yields no files is skipped unless
/// `fail_if_missing` is set.
///
/// # Errors
///
/// Returns [`Error::AttachmentNotFound`] for an empty source when
/// `fail_if_missing` is set, or an I/O error if a file cannot be
/// written or a directory cannot be listed.
pub async fn resolve(
    sources: &[AttachmentSource],
    fail_if_missing: bool,
) -> Result<ResolvedAttachments> {
    let mut resolved = ResolvedAttachments::default();

    for source in sources {
        match source {
            AttachmentSource::FromString { file_name, content } => {
                let dir = TempDir::new()?;
                let path = dir.path().join(safe_file_name(file_name));
                tokio::fs::write(&path, content).await?;
                debug!("Materialized string attachment {}", path.display());
                resolved.files.push(path);
                resolved.temp_dirs.push(dir);
            }
            AttachmentSource::File { path, mask } => {
                let files = expand(path, mask).await?;
                if files.is_empty() {
                    if fail_if_missing {
                        return Err(Error::AttachmentNotFound(path.display().to_string()));
                    }
                    warn!("No attachment files found in {}, skipping", path.display());
                }
                resolved.files.extend(files);
            }
        }
    }

    Ok(resolved)
}

async fn expand(path: &Path, mask: &str) -> Result<Vec<PathBuf>> {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return Ok(Vec::new());
    };
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mask = if mask.trim().is_empty() { DEFAULT_MASK } else { mask.trim() };
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if matches_mask(&entry.file_name().to_string_lossy(), mask) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Match `name` against a file mask where `*` matches any run of
/// characters and `?` exactly one. ASCII case is ignored.
#[must_use]
pub fn matches_mask(name: &str, mask: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let mask: Vec<char> = mask.chars().collect();

    let (mut n, mut m) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if m < mask.len() && (mask[m] == '?' || mask[m].eq_ignore_ascii_case(&name[n])) {
            n += 1;
            m += 1;
        } else if m < mask.len() && mask[m] == '*' {
            backtrack = Some((m, n));
            m += 1;
        } else if let Some((star, matched)) = backtrack {
            m = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    mask[m..].iter().all(|c| *c == '*')
}
