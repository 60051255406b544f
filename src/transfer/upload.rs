//! Attaching files to outgoing mail
//!
//! Each file is routed by size: small files are base64-encoded into the
//! message itself, large files are streamed through an upload session on
//! a draft. The draft must then be sent explicitly.

use crate::error::{Error, Result};
use crate::graph::types::Attachment;
use crate::graph::{GraphClient, SliceOutcome};
use crate::mailbox::Mailbox;
use crate::transfer::{AttachmentRoute, UPLOAD_SLICE_SIZE};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// A file too large to send inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Files split by route.
#[derive(Debug, Default)]
pub struct UploadPlan {
    /// Ready-to-send inline attachments.
    pub inline: Vec<Attachment>,
    pub chunked: Vec<LargeFile>,
}

impl UploadPlan {
    /// Inspect each file and route it by size. Inline files are read
    /// and encoded here.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be read.
    pub async fn build(files: &[PathBuf]) -> Result<Self> {
        let mut plan = Self::default();

        for path in files {
            let size = tokio::fs::metadata(path).await?.len();
            match AttachmentRoute::for_size(size) {
                AttachmentRoute::Inline => plan.inline.push(inline_attachment(path).await?),
                AttachmentRoute::Chunked => plan.chunked.push(LargeFile {
                    path: path.clone(),
                    name: file_name(path),
                    size,
                }),
            }
        }

        debug!(
            "Attachment plan: {} inline, {} chunked",
            plan.inline.len(),
            plan.chunked.len()
        );
        Ok(plan)
    }

    /// Whether a draft and an explicit send are needed.
    #[must_use]
    pub const fn needs_draft(&self) -> bool {
        !self.chunked.is_empty()
    }
}

/// Read `path` and wrap it as an inline file attachment.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn inline_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path).await?;
    Ok(Attachment::file(file_name(path), STANDARD.encode(bytes)))
}

/// Upload `file` to the draft `message_id` through an upload session.
///
/// Slices of [`UPLOAD_SLICE_SIZE`] are sent from the offset the server
/// expects next. The upload only counts as done once the server
/// acknowledges completion.
///
/// # Errors
///
/// Returns [`Error::UploadFailed`] if the server never acknowledges
/// completion, or the underlying error if a request fails.
pub async fn upload_large(
    client: &GraphClient,
    mailbox: &Mailbox,
    message_id: &str,
    file: &LargeFile,
) -> Result<()> {
    let session = client
        .create_upload_session(mailbox, message_id, &file.name, file.size)
        .await?;
    let failed = || Error::UploadFailed(file.path.display().to_string());

    let mut reader = tokio::fs::File::open(&file.path).await?;
    let mut offset = 0u64;

    while offset < file.size {
        let len = UPLOAD_SLICE_SIZE.min(file.size - offset);
        let mut slice = vec![0u8; usize::try_from(len).map_err(|_| failed())?];
        reader.seek(SeekFrom::Start(offset)).await?;
        reader.read_exact(&mut slice).await?;

        match client
            .upload_slice(&session.upload_url, offset, slice, file.size)
            .await?
        {
            SliceOutcome::Completed => {
                info!("Uploaded {} ({} bytes)", file.name, file.size);
                return Ok(());
            }
            SliceOutcome::Unacknowledged => return Err(failed()),
            SliceOutcome::Continue(ranges) => {
                let next = ranges
                    .first()
                    .map(String::as_str)
                    .and_then(next_range_start)
                    .ok_or_else(failed)?;
                if next <= offset {
                    return Err(failed());
                }
                debug!("{}: server expects bytes from {next}", file.name);
                offset = next;
            }
        }
    }

    Err(failed())
}

/// Start offset of a `nextExpectedRanges` entry such as `"327680-"` or
/// `"0-1023"`.
fn next_range_start(range: &str) -> Option<u64> {
    range.split('-').next()?.trim().parse().ok()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
