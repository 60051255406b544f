//! Read email task
//!
//! Lists messages from a mailbox, optionally downloads their
//! attachments and marks them read, and flattens everything into a
//! [`ReadResult`].

use crate::config::Connection;
use crate::error::{Error, Result};
use crate::graph::GraphClient;
use crate::graph::types::{Attachment, Message, Recipient};
use crate::mailbox::Mailbox;
use crate::query::MessageQuery;
use crate::transfer::collision::{FileExistPolicy, save_bytes};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to read and what to do with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadInput {
    /// Mailbox user id or principal name. Blank reads the signed-in
    /// user's mailbox.
    pub from: String,
    #[serde(flatten)]
    pub query: MessageQuery,
    pub download_attachments: bool,
    pub destination_directory: String,
    /// Create `destination_directory` if it does not exist.
    pub create_directory: bool,
    pub file_exist_policy: FileExistPolicy,
    /// Mark each returned message as read.
    pub update_read_status: bool,
}

impl Default for ReadInput {
    fn default() -> Self {
        Self {
            from: String::new(),
            query: MessageQuery::default(),
            download_attachments: false,
            destination_directory: String::new(),
            create_directory: false,
            file_exist_policy: FileExistPolicy::default(),
            update_read_status: true,
        }
    }
}

impl ReadInput {
    /// Check the attachment destination settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if downloading without a destination,
    /// or if the destination is missing and may not be created.
    pub fn validate(&self) -> Result<()> {
        let destination = self.destination_directory.trim();

        if self.download_attachments && destination.is_empty() {
            return Err(Error::Config(
                "DownloadAttachments is set to true, but DestinationDirectory is missing".into(),
            ));
        }

        if !destination.is_empty() && !self.create_directory && !Path::new(destination).is_dir() {
            return Err(Error::Config(format!(
                "DestinationDirectory is set, but the directory {destination} does not exist. \
                 Set CreateDirectory to true to create the specified directory"
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Abort on the first failure instead of collecting errors.
    pub throw_on_failure: bool,
    /// Treat an empty listing as an error.
    pub throw_if_no_messages_found: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            throw_on_failure: true,
            throw_if_no_messages_found: false,
        }
    }
}

/// A downloaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: Option<String>,
    pub file_path: PathBuf,
    pub size: Option<u64>,
    pub odata_type: String,
    /// The file already existed and was left untouched.
    pub skipped: bool,
}

/// One message, flattened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Option<String>,
    pub parent_folder_id: Option<String>,
    pub from: Option<String>,
    pub sender: Option<String>,
    pub to_recipients: Vec<String>,
    pub cc_recipients: Vec<String>,
    pub bcc_recipients: Vec<String>,
    pub reply_to: Vec<String>,
    pub subject: Option<String>,
    pub content_type: Option<String>,
    pub content: Option<String>,
    pub categories: Vec<String>,
    pub importance: Option<String>,
    pub is_draft: bool,
    pub is_read: bool,
    pub has_attachments: bool,
    pub extensions: Vec<String>,
    pub received: Option<DateTime<Utc>>,
    pub attachments: Vec<AttachmentRecord>,
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            parent_folder_id: message.parent_folder_id.clone(),
            from: address(message.from.as_ref()),
            sender: address(message.sender.as_ref()),
            to_recipients: addresses(&message.to_recipients),
            cc_recipients: addresses(&message.cc_recipients),
            bcc_recipients: addresses(&message.bcc_recipients),
            reply_to: addresses(&message.reply_to),
            subject: message.subject.clone(),
            content_type: message.body.as_ref().map(|b| b.content_type.clone()),
            content: message.body.as_ref().map(|b| b.content.clone()),
            categories: message.categories.clone(),
            importance: message.importance.map(|i| i.to_string()),
            is_draft: message.is_draft.unwrap_or_default(),
            is_read: message.is_read.unwrap_or_default(),
            has_attachments: message.has_attachments.unwrap_or_default(),
            extensions: message
                .extensions
                .iter()
                .filter_map(|e| e.id.clone())
                .collect(),
            received: message.received_date_time,
            attachments: Vec::new(),
        }
    }
}

fn address(recipient: Option<&Recipient>) -> Option<String> {
    recipient?.email().map(str::to_string)
}

fn addresses(recipients: &[Recipient]) -> Vec<String> {
    recipients
        .iter()
        .filter_map(Recipient::email)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    /// No error occurred.
    pub success: bool,
    pub data: Vec<MessageRecord>,
    pub error_messages: Vec<String>,
}

impl ReadResult {
    const fn new(data: Vec<MessageRecord>, error_messages: Vec<String>) -> Self {
        Self {
            success: error_messages.is_empty(),
            data,
            error_messages,
        }
    }
}

/// Read messages from a mailbox.
///
/// Configuration errors and [`Error::NoMessagesFound`] are always
/// returned as `Err`. Other failures are returned as `Err` when
/// `options.throw_on_failure` is set; otherwise they are collected in
/// [`ReadResult::error_messages`], the failing message is left out of
/// the data, and the remaining messages are still processed.
///
/// # Errors
///
/// See above.
pub async fn read_email(
    connection: &Connection,
    input: &ReadInput,
    options: &ReadOptions,
    cancel: CancellationToken,
) -> Result<ReadResult> {
    input.validate()?;
    let client = GraphClient::new(connection)?.with_cancellation(cancel);
    let mailbox = Mailbox::from(input.from.as_str());

    let mut errors = Vec::new();
    let messages = match client.list_messages(&mailbox, &input.query).await {
        Ok(messages) => messages,
        Err(e) => {
            if options.throw_on_failure || e.is_config() || matches!(e, Error::Cancelled) {
                return Err(e);
            }
            warn!("Listing messages failed: {e}");
            errors.push(e.to_string());
            return Ok(ReadResult::new(Vec::new(), errors));
        }
    };

    if messages.is_empty() && options.throw_if_no_messages_found {
        return Err(Error::NoMessagesFound);
    }

    if input.download_attachments && input.create_directory {
        tokio::fs::create_dir_all(input.destination_directory.trim()).await?;
    }

    let mut data = Vec::with_capacity(messages.len());
    for message in &messages {
        match process_message(&client, &mailbox, input, message).await {
            Ok(record) => data.push(record),
            Err(e) => {
                if options.throw_on_failure || matches!(e, Error::Cancelled) {
                    return Err(e);
                }
                warn!(
                    "Failed to process message {}: {e}",
                    message.id.as_deref().unwrap_or("<no id>")
                );
                errors.push(e.to_string());
            }
        }
    }

    info!("Read {} messages with {} errors", data.len(), errors.len());
    Ok(ReadResult::new(data, errors))
}

async fn process_message(
    client: &GraphClient,
    mailbox: &Mailbox,
    input: &ReadInput,
    message: &Message,
) -> Result<MessageRecord> {
    let mut record = MessageRecord::from(message);

    let Some(id) = message.id.as_deref() else {
        return Ok(record);
    };

    if input.download_attachments && record.has_attachments {
        let directory = Path::new(input.destination_directory.trim());
        let attachments = client.list_attachments(mailbox, id).await?;
        record.attachments = download(directory, &attachments, input.file_exist_policy).await?;
    }

    if input.update_read_status {
        client.mark_as_read(mailbox, id).await?;
    }

    Ok(record)
}

/// Save file attachments, and the file attachments inside attached
/// messages, to `directory`. Inner files are reported under the outer
/// attachment's id, size and type.
async fn download(
    directory: &Path,
    attachments: &[Attachment],
    policy: FileExistPolicy,
) -> Result<Vec<AttachmentRecord>> {
    let mut records = Vec::new();

    for attachment in attachments {
        let files: Vec<&Attachment> = if attachment.is_file() {
            vec![attachment]
        } else if attachment.is_item() {
            attachment
                .item
                .iter()
                .flat_map(|item| item.attachments.iter())
                .filter(|inner| inner.is_file())
                .collect()
        } else {
            debug!("Ignoring attachment {} of type {}", attachment.name, attachment.odata_type);
            Vec::new()
        };

        for file in files {
            let bytes = STANDARD.decode(file.content_bytes.as_deref().unwrap_or_default())?;
            let saved = save_bytes(directory, &file.name, &bytes, policy).await?;
            records.push(AttachmentRecord {
                id: attachment.id.clone(),
                skipped: saved.skipped(),
                file_path: saved.path,
                size: attachment.size,
                odata_type: attachment.odata_type.clone(),
            });
        }
    }

    Ok(records)
}
