//! Graph wire types
//!
//! Only the properties this crate reads or writes are modelled. Graph
//! sends `null` for empty collections on some messages, so list fields
//! go through [`nullable`].

use crate::importance::Importance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const FILE_ATTACHMENT_TYPE: &str = "#microsoft.graph.fileAttachment";
pub const ITEM_ATTACHMENT_TYPE: &str = "#microsoft.graph.itemAttachment";

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: Option<EmailAddress>,
}

impl Recipient {
    #[must_use]
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            email_address: Some(EmailAddress {
                address: Some(address.into()),
                name: None,
            }),
        }
    }

    /// The recipient's address, if Graph returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email_address.as_ref()?.address.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    /// `text` or `html`
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    #[serde(default)]
    pub id: Option<String>,
}

/// A Graph `message` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ItemBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Recipient>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub to_recipients: Vec<Recipient>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<Recipient>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub bcc_recipients: Vec<Recipient>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<Recipient>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attachments: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// A Graph `attachment`. The concrete kind is carried in
/// `@odata.type`; file attachments have `contentBytes`, item
/// attachments have an expanded `item`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Base64 payload of a file attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<Message>>,
}

impl Attachment {
    /// An inline file attachment carrying its payload.
    #[must_use]
    pub fn file(name: impl Into<String>, content_bytes: String) -> Self {
        Self {
            odata_type: FILE_ATTACHMENT_TYPE.to_string(),
            name: name.into(),
            content_bytes: Some(content_bytes),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.odata_type.eq_ignore_ascii_case(FILE_ATTACHMENT_TYPE)
    }

    #[must_use]
    pub fn is_item(&self) -> bool {
        self.odata_type.eq_ignore_ascii_case(ITEM_ATTACHMENT_TYPE)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagePage {
    #[serde(default, deserialize_with = "nullable")]
    pub value: Vec<Message>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPage {
    #[serde(default, deserialize_with = "nullable")]
    pub value: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest<'a> {
    pub message: &'a Message,
    pub save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadSessionRequest {
    #[serde(rename = "AttachmentItem")]
    pub attachment_item: AttachmentItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentItem {
    pub attachment_type: &'static str,
    pub name: String,
    pub size: u64,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub next_expected_ranges: Vec<String>,
}

/// Body of a `200` answer to an upload slice.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceProgress {
    pub next_expected_ranges: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_collections_deserialize_empty() {
        let message: Message = serde_json::from_str(
            r#"{"id":"m1","toRecipients":null,"categories":null,"importance":"high"}"#,
        )
        .unwrap();
        assert!(message.to_recipients.is_empty());
        assert!(message.categories.is_empty());
        assert_eq!(message.importance, Some(Importance::High));
    }

    #[test]
    fn outgoing_message_omits_empty_fields() {
        let message = Message {
            subject: Some("Hi".into()),
            to_recipients: vec![Recipient::address("a@example.com")],
            ..Message::default()
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["toRecipients"][0]["emailAddress"]["address"], "a@example.com");
        assert!(json.get("ccRecipients").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn attachment_kinds() {
        let file: Attachment = serde_json::from_str(
            r##"{"@odata.type":"#microsoft.graph.fileAttachment","name":"a.txt","contentBytes":"aGk="}"##,
        )
        .unwrap();
        assert!(file.is_file());
        assert!(!file.is_item());

        let item: Attachment = serde_json::from_str(
            r##"{"@odata.type":"#microsoft.graph.itemAttachment","name":"fwd","item":{"attachments":[]}}"##,
        )
        .unwrap();
        assert!(item.is_item());
        assert!(item.item.is_some());
    }

    #[test]
    fn upload_session_request_shape() {
        let request = UploadSessionRequest {
            attachment_item: AttachmentItem {
                attachment_type: "file",
                name: "big.bin".into(),
                size: 42,
                content_type: "application/octet-stream",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["AttachmentItem"]["attachmentType"], "file");
        assert_eq!(json["AttachmentItem"]["size"], 42);
    }
}
