//! EWS SOAP request bodies

use super::EwsReadOptions;
use crate::config::ServerVersion;
use quick_xml::escape::escape;
use std::fmt::Write as _;

const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

/// An EWS item id with its change key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemId {
    pub id: String,
    pub change_key: Option<String>,
}

impl ItemId {
    fn to_xml(&self) -> String {
        match &self.change_key {
            Some(key) => format!(
                r#"<t:ItemId Id="{}" ChangeKey="{}"/>"#,
                escape(&self.id),
                escape(key)
            ),
            None => format!(r#"<t:ItemId Id="{}"/>"#, escape(&self.id)),
        }
    }
}

/// Wrap `body` in a SOAP envelope carrying `RequestServerVersion`.
#[must_use]
pub fn envelope(version: ServerVersion, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="{SOAP_NS}" xmlns:t="{TYPES_NS}" xmlns:m="{MESSAGES_NS}"><soap:Header><t:RequestServerVersion Version="{}"/></soap:Header><soap:Body>{body}</soap:Body></soap:Envelope>"#,
        version.as_ews_str()
    )
}

/// The `Restriction` contents for the read filters, or `None` when no
/// filter is set.
#[must_use]
pub fn restriction(options: &EwsReadOptions) -> Option<String> {
    let mut conditions = Vec::new();

    if options.only_with_attachments {
        conditions.push(is_equal_to("item:HasAttachments", "true"));
    }
    if options.only_unread {
        conditions.push(is_equal_to("message:IsRead", "false"));
    }
    let sender = options.sender_filter.trim();
    if !sender.is_empty() {
        conditions.push(is_equal_to("message:Sender", sender));
    }
    let subject = options.subject_filter.trim();
    if !subject.is_empty() {
        conditions.push(format!(
            r#"<t:Contains ContainmentMode="Substring" ContainmentComparison="IgnoreCase"><t:FieldURI FieldURI="item:Subject"/><t:Constant Value="{}"/></t:Contains>"#,
            escape(subject)
        ));
    }

    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(format!("<t:And>{}</t:And>", conditions.concat())),
    }
}

fn is_equal_to(field: &str, value: &str) -> String {
    format!(
        r#"<t:IsEqualTo><t:FieldURI FieldURI="{field}"/><t:FieldURIOrConstant><t:Constant Value="{}"/></t:FieldURIOrConstant></t:IsEqualTo>"#,
        escape(value)
    )
}

/// `FindItem` over the inbox of `mailbox` (or the caller's own inbox).
#[must_use]
pub fn find_item(mailbox: &str, options: &EwsReadOptions) -> String {
    let mut body = format!(
        r#"<m:FindItem Traversal="Shallow"><m:ItemShape><t:BaseShape>IdOnly</t:BaseShape></m:ItemShape><m:IndexedPageItemView MaxEntriesReturned="{}" Offset="0" BasePoint="Beginning"/>"#,
        options.max_emails
    );

    if let Some(restriction) = restriction(options) {
        let _ = write!(body, "<m:Restriction>{restriction}</m:Restriction>");
    }

    let mailbox = mailbox.trim();
    if mailbox.is_empty() {
        body.push_str(r#"<m:ParentFolderIds><t:DistinguishedFolderId Id="inbox"/></m:ParentFolderIds>"#);
    } else {
        let _ = write!(
            body,
            r#"<m:ParentFolderIds><t:DistinguishedFolderId Id="inbox"><t:Mailbox><t:EmailAddress>{}</t:EmailAddress></t:Mailbox></t:DistinguishedFolderId></m:ParentFolderIds>"#,
            escape(mailbox)
        );
    }

    body.push_str("</m:FindItem>");
    body
}

/// `GetItem` with the HTML body and, where supported, the text body.
#[must_use]
pub fn get_item(id: &ItemId, text_body: bool) -> String {
    let additional = if text_body {
        r#"<t:AdditionalProperties><t:FieldURI FieldURI="item:TextBody"/></t:AdditionalProperties>"#
    } else {
        ""
    };
    format!(
        r"<m:GetItem><m:ItemShape><t:BaseShape>AllProperties</t:BaseShape><t:BodyType>HTML</t:BodyType>{additional}</m:ItemShape><m:ItemIds>{}</m:ItemIds></m:GetItem>",
        id.to_xml()
    )
}

#[must_use]
pub fn get_attachment(attachment_id: &str) -> String {
    format!(
        r#"<m:GetAttachment><m:AttachmentIds><t:AttachmentId Id="{}"/></m:AttachmentIds></m:GetAttachment>"#,
        escape(attachment_id)
    )
}

/// `UpdateItem` setting `IsRead` to true.
#[must_use]
pub fn mark_as_read(id: &ItemId) -> String {
    format!(
        r#"<m:UpdateItem MessageDisposition="SaveOnly" ConflictResolution="AutoResolve"><m:ItemChanges><t:ItemChange>{}<t:Updates><t:SetItemField><t:FieldURI FieldURI="message:IsRead"/><t:Message><t:IsRead>true</t:IsRead></t:Message></t:SetItemField></t:Updates></t:ItemChange></m:ItemChanges></m:UpdateItem>"#,
        id.to_xml()
    )
}

#[must_use]
pub fn hard_delete(id: &ItemId) -> String {
    format!(
        r#"<m:DeleteItem DeleteType="HardDelete"><m:ItemIds>{}</m:ItemIds></m:DeleteItem>"#,
        id.to_xml()
    )
}
