//! JSON builders for Graph resources

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

/// A minimal message as `GET /messages` returns it.
pub fn message(id: &str, subject: &str, has_attachments: bool) -> Value {
    json!({
        "id": id,
        "parentFolderId": "inbox-id",
        "subject": subject,
        "body": { "contentType": "text", "content": format!("Body of {subject}") },
        "from": { "emailAddress": { "address": "alice@example.com", "name": "Alice" } },
        "sender": { "emailAddress": { "address": "alice@example.com" } },
        "toRecipients": [{ "emailAddress": { "address": "bob@example.com" } }],
        "ccRecipients": null,
        "bccRecipients": [],
        "replyTo": [],
        "categories": ["Blue"],
        "importance": "normal",
        "isDraft": false,
        "isRead": false,
        "hasAttachments": has_attachments,
        "receivedDateTime": "2024-01-01T10:00:00Z",
    })
}

pub fn file_attachment(id: &str, name: &str, content: &[u8]) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.fileAttachment",
        "id": id,
        "name": name,
        "contentType": "application/octet-stream",
        "size": content.len(),
        "contentBytes": STANDARD.encode(content),
    })
}

/// An attached message carrying `files` as its own attachments.
pub fn item_attachment(id: &str, name: &str, files: Vec<Value>) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.itemAttachment",
        "id": id,
        "name": name,
        "size": 4096,
        "item": {
            "id": format!("{id}-item"),
            "subject": name,
            "attachments": files,
        },
    })
}
