//! Writing downloaded attachments
//!
//! When the target file already exists the configured
//! [`FileExistPolicy`] decides what happens. The decision is made per
//! file at write time; nothing is remembered between runs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// What to do when a downloaded attachment's file name is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileExistPolicy {
    /// Leave the existing file alone and write nothing.
    #[default]
    Skip,
    /// Write to `name(N).ext` with the lowest free N.
    Rename,
    /// Append the new bytes to the existing file.
    Append,
    /// Replace the existing file.
    OverWrite,
}

impl fmt::Display for FileExistPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skip => "Skip",
            Self::Rename => "Rename",
            Self::Append => "Append",
            Self::OverWrite => "OverWrite",
        };
        f.write_str(s)
    }
}

impl FromStr for FileExistPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "rename" => Ok(Self::Rename),
            "append" => Ok(Self::Append),
            "overwrite" => Ok(Self::OverWrite),
            _ => Err(Error::Config(format!("Invalid file exist policy: {s}"))),
        }
    }
}

/// How a save resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    /// No file existed; a new one was created.
    Created,
    /// The file existed; the bytes went to a fresh `name(N).ext`.
    Renamed,
    Appended,
    Overwritten,
    /// The file existed and was left untouched.
    Skipped,
}

/// The file an attachment ended up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// Path written to, or the existing path when skipped.
    pub path: PathBuf,
    pub outcome: SaveOutcome,
}

impl SavedFile {
    #[must_use]
    pub fn skipped(&self) -> bool {
        self.outcome == SaveOutcome::Skipped
    }
}

/// Reduce an attachment name to a bare file name so it cannot escape
/// the destination directory.
#[must_use]
pub fn safe_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => "attachment".to_string(),
        other => other.to_string(),
    }
}

/// The first `stem(N).ext` (N from 1) that does not exist in the same
/// directory as `path`.
#[must_use]
pub fn unique_path(path: &Path) -> PathBuf {
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| directory.join(format!("{stem}({n}){extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Write `bytes` to `directory/name`, applying `policy` if the file
/// already exists.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub async fn save_bytes(
    directory: &Path,
    name: &str,
    bytes: &[u8],
    policy: FileExistPolicy,
) -> Result<SavedFile> {
    let path = directory.join(safe_file_name(name));

    match write_new(&path, bytes).await {
        Ok(()) => {
            debug!("Saved {}", path.display());
            return Ok(SavedFile {
                path,
                outcome: SaveOutcome::Created,
            });
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }

    let saved = match policy {
        FileExistPolicy::Skip => {
            info!("The file {} already exists, download skipped", path.display());
            SavedFile {
                path,
                outcome: SaveOutcome::Skipped,
            }
        }
        FileExistPolicy::Rename => loop {
            let candidate = unique_path(&path);
            match write_new(&candidate, bytes).await {
                Ok(()) => {
                    break SavedFile {
                        path: candidate,
                        outcome: SaveOutcome::Renamed,
                    };
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        },
        FileExistPolicy::Append => {
            let mut file = OpenOptions::new().append(true).open(&path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            SavedFile {
                path,
                outcome: SaveOutcome::Appended,
            }
        }
        FileExistPolicy::OverWrite => {
            let mut file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&path)
                .await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            SavedFile {
                path,
                outcome: SaveOutcome::Overwritten,
            }
        }
    };

    debug!("{:?} {}", saved.outcome, saved.path.display());
    Ok(saved)
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}
