//! Send email task

use crate::config::Connection;
use crate::error::{Error, Result};
use crate::graph::GraphClient;
use crate::graph::types::{ItemBody, Message, Recipient};
use crate::importance::Importance;
use crate::mailbox::Mailbox;
use crate::transfer::source::{self, AttachmentSource};
use crate::transfer::upload::{UploadPlan, upload_large};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const SENT_MESSAGE: &str = "Email sent successfully.";

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendInput {
    /// Sending mailbox. Blank sends as the signed-in user.
    pub from: String,
    /// Recipients separated by `,` or `;`.
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub message: String,
    pub is_message_html: bool,
    pub importance: Importance,
    pub save_to_sent_items: bool,
    pub attachments: Vec<AttachmentSource>,
}

impl Default for SendInput {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            cc: String::new(),
            bcc: String::new(),
            subject: String::new(),
            message: String::new(),
            is_message_html: false,
            importance: Importance::default(),
            save_to_sent_items: true,
            attachments: Vec::new(),
        }
    }
}

impl SendInput {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if there is no `To` recipient.
    pub fn validate(&self) -> Result<()> {
        if parse_recipients(&self.to).is_empty() {
            return Err(Error::Config(
                "One or more required message values missing: To".into(),
            ));
        }
        Ok(())
    }

    /// The Graph message for this input, without attachments.
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message {
            subject: Some(self.subject.clone()),
            body: Some(ItemBody {
                content_type: if self.is_message_html { "html" } else { "text" }.to_string(),
                content: self.message.clone(),
            }),
            to_recipients: recipients(&self.to),
            cc_recipients: recipients(&self.cc),
            bcc_recipients: recipients(&self.bcc),
            importance: Some(self.importance),
            ..Message::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    /// Return failures as `Err` instead of an unsuccessful result.
    pub throw_on_failure: bool,
    /// Fail when a file attachment source matches nothing.
    pub throw_if_attachment_not_found: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            throw_on_failure: true,
            throw_if_attachment_not_found: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub data: String,
}

impl SendResult {
    fn sent() -> Self {
        Self {
            success: true,
            data: SENT_MESSAGE.to_string(),
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            success: false,
            data: format!("Failed to send an email. {error}"),
        }
    }
}

/// Split a `,`/`;` separated recipient list. Spaces are removed and
/// empty entries dropped.
#[must_use]
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split([',', ';'])
        .map(|address| address.replace(' ', ""))
        .filter(|address| !address.is_empty())
        .collect()
}

fn recipients(list: &str) -> Vec<Recipient> {
    parse_recipients(list)
        .into_iter()
        .map(Recipient::address)
        .collect()
}

/// Send a message with its attachments.
///
/// Attachments up to the inline limit travel inside the message and
/// the whole thing is sent with one `sendMail` call. If any attachment
/// is larger, a draft is created with the small ones inline, the large
/// ones are uploaded to it, and the draft is sent.
///
/// Temporary files for string attachments are removed afterwards,
/// whether or not sending succeeded.
///
/// # Errors
///
/// Configuration errors are always returned as `Err`. Other failures
/// are returned as `Err` when `options.throw_on_failure` is set, and as
/// an unsuccessful [`SendResult`] otherwise.
pub async fn send_email(
    connection: &Connection,
    input: &SendInput,
    options: &SendOptions,
    cancel: CancellationToken,
) -> Result<SendResult> {
    input.validate()?;
    let client = GraphClient::new(connection)?.with_cancellation(cancel);
    let mailbox = Mailbox::from(input.from.as_str());

    match deliver(&client, &mailbox, input, options).await {
        Ok(()) => {
            info!("Email sent from {}", mailbox);
            Ok(SendResult::sent())
        }
        Err(e) if options.throw_on_failure || e.is_config() || matches!(e, Error::Cancelled) => {
            Err(e)
        }
        Err(e) => {
            warn!("Sending failed: {e}");
            Ok(SendResult::failed(&e))
        }
    }
}

async fn deliver(
    client: &GraphClient,
    mailbox: &Mailbox,
    input: &SendInput,
    options: &SendOptions,
) -> Result<()> {
    let resolved =
        source::resolve(&input.attachments, options.throw_if_attachment_not_found).await?;
    let outcome = send_with_files(client, mailbox, input, &resolved.files).await;
    resolved.cleanup();
    outcome
}

async fn send_with_files(
    client: &GraphClient,
    mailbox: &Mailbox,
    input: &SendInput,
    files: &[PathBuf],
) -> Result<()> {
    let mut plan = UploadPlan::build(files).await?;
    let mut message = input.to_message();
    message.attachments = std::mem::take(&mut plan.inline);

    if !plan.needs_draft() {
        return client
            .send_mail(mailbox, &message, input.save_to_sent_items)
            .await;
    }

    let draft = client.create_draft(mailbox, &message).await?;
    let id = draft.id.ok_or_else(|| Error::Graph {
        status: 0,
        code: "MissingId".into(),
        message: "Draft message was created without an id".into(),
    })?;

    for file in &plan.chunked {
        upload_large(client, mailbox, &id, file).await?;
    }

    client.send_draft(mailbox, &id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_split_on_both_delimiters() {
        assert_eq!(
            parse_recipients("a@example.com; b @example.com,,c@example.com ;"),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(parse_recipients(" ; , ").is_empty());
    }

    #[test]
    fn to_is_required() {
        let input = SendInput {
            to: " ;".into(),
            ..SendInput::default()
        };
        let err = input.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("To"));
    }

    #[test]
    fn message_body_and_importance() {
        let input = SendInput {
            to: "a@example.com".into(),
            subject: "Report".into(),
            message: "<b>done</b>".into(),
            is_message_html: true,
            importance: Importance::High,
            ..SendInput::default()
        };
        let json = serde_json::to_value(input.to_message()).unwrap();
        assert_eq!(json["body"]["contentType"], "html");
        assert_eq!(json["importance"], "high");
        assert_eq!(json["toRecipients"][0]["emailAddress"]["address"], "a@example.com");
        assert!(json.get("ccRecipients").is_none());
    }

    #[test]
    fn failure_text() {
        let result = SendResult::failed(&Error::UploadFailed("big.bin".into()));
        assert!(!result.success);
        assert!(result.data.starts_with("Failed to send an email. "));
        assert_eq!(SendResult::sent().data, "Email sent successfully.");
    }
}
