//! Attachment transfer
//!
//! Moving attachment bytes between the local filesystem and a mailbox:
//!
//! - [`collision`] writes downloaded attachments under a
//!   [`FileExistPolicy`]
//! - [`source`] resolves send-side attachment sources to files on disk
//! - [`upload`] attaches files to outgoing mail, inline or through an
//!   upload session depending on their size

pub mod collision;
pub mod source;
pub mod upload;

pub use collision::{FileExistPolicy, SaveOutcome, SavedFile};
pub use source::{AttachmentSource, ResolvedAttachments};

/// Files up to this size are sent inline as base64.
pub const INLINE_ATTACHMENT_LIMIT: u64 = 3 * 1024 * 1024;

/// Slice size for upload sessions. Graph requires slices to be a
/// multiple of 320 KiB.
pub const UPLOAD_SLICE_SIZE: u64 = 320 * 1024;

/// How a file of a given size is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRoute {
    /// Base64 in the message body.
    Inline,
    /// Upload session on a draft.
    Chunked,
}

impl AttachmentRoute {
    #[must_use]
    pub const fn for_size(size: u64) -> Self {
        if size > INLINE_ATTACHMENT_LIMIT {
            Self::Chunked
        } else {
            Self::Inline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive_for_inline() {
        assert_eq!(AttachmentRoute::for_size(0), AttachmentRoute::Inline);
        assert_eq!(
            AttachmentRoute::for_size(INLINE_ATTACHMENT_LIMIT),
            AttachmentRoute::Inline
        );
        assert_eq!(
            AttachmentRoute::for_size(INLINE_ATTACHMENT_LIMIT + 1),
            AttachmentRoute::Chunked
        );
    }
}
