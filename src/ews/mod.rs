//! Legacy Exchange Web Services reader
//!
//! Reads inbox messages from an on-premises Exchange (or Office 365)
//! EWS endpoint over SOAP with basic authentication. Attachments are
//! saved to disk and messages can be marked read or hard-deleted once
//! they have been read.

pub mod autodiscover;
pub mod parse;
pub mod soap;

use crate::config::{EwsSettings, ServerVersion};
use crate::error::{Error, Result};
use crate::transfer::collision::{FileExistPolicy, save_bytes};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use parse::XmlNode;
use serde::{Deserialize, Serialize};
use soap::ItemId;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What to read and what to do afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EwsReadOptions {
    pub max_emails: u32,
    pub only_unread: bool,
    pub mark_as_read: bool,
    /// Hard-delete messages after reading. Takes precedence over
    /// `mark_as_read`.
    pub delete_read: bool,
    /// Exact sender address.
    pub sender_filter: String,
    /// Substring of the subject, case-insensitive.
    pub subject_filter: String,
    pub throw_if_no_messages_found: bool,
    pub ignore_attachments: bool,
    pub only_with_attachments: bool,
    pub attachment_directory: String,
    pub file_exist_policy: FileExistPolicy,
}

impl Default for EwsReadOptions {
    fn default() -> Self {
        Self {
            max_emails: 10,
            only_unread: false,
            mark_as_read: false,
            delete_read: false,
            sender_filter: String::new(),
            subject_filter: String::new(),
            throw_if_no_messages_found: false,
            ignore_attachments: false,
            only_with_attachments: false,
            attachment_directory: String::new(),
            file_exist_policy: FileExistPolicy::Rename,
        }
    }
}

impl EwsReadOptions {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_emails` is 0, or if attachments
    /// are wanted and the directory is missing.
    pub fn validate(&self) -> Result<()> {
        if !self.ignore_attachments {
            let directory = self.attachment_directory.trim();
            if directory.is_empty() {
                return Err(Error::Config("No attachment save directory given".into()));
            }
            if !Path::new(directory).is_dir() {
                return Err(Error::Config(format!(
                    "Could not find or access attachment save directory {directory}"
                )));
            }
        }
        if self.max_emails == 0 {
            return Err(Error::Config("MaxEmails can't be lower than 1".into()));
        }
        Ok(())
    }
}

/// A message read over EWS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EwsMessage {
    pub id: String,
    /// Comma separated addresses.
    pub to: String,
    pub cc: String,
    pub from: String,
    pub date: Option<DateTime<Utc>>,
    pub subject: String,
    /// Empty before Exchange 2013.
    pub body_text: String,
    pub body_html: String,
    /// Files written for this message. Attachments skipped because a
    /// file of that name already existed are not listed.
    pub attachment_paths: Vec<PathBuf>,
}

/// A message as returned by `GetItem`, before attachments are fetched.
#[derive(Debug, Clone, Default)]
struct FetchedItem {
    id: ItemId,
    message: EwsMessage,
    attachment_ids: Vec<String>,
}

pub struct EwsClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    version: ServerVersion,
    cancel: CancellationToken,
}

impl std::fmt::Debug for EwsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwsClient")
            .field("url", &self.url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl EwsClient {
    /// Resolve the endpoint (autodiscovering it if configured) and build
    /// a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing settings, or an error if
    /// autodiscover fails.
    pub async fn connect(settings: &EwsSettings) -> Result<Self> {
        if settings.username.trim().is_empty() {
            return Err(Error::Config("EWS username is missing".into()));
        }
        if !settings.use_autodiscover && settings.server_address.trim().is_empty() {
            return Err(Error::Config(
                "ServerAddress is required when UseAutoDiscover is false".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .redirect(autodiscover::https_only())
            .build()?;

        let url = if settings.use_autodiscover {
            let candidates = autodiscover::candidate_urls(&settings.username)?;
            autodiscover::discover(
                &http,
                &candidates,
                &settings.username,
                &settings.username,
                &settings.password,
            )
            .await?
        } else {
            settings.server_address.trim().to_string()
        };

        Ok(Self::with_url(http, url, settings))
    }

    /// Build a client for a known EWS URL.
    #[must_use]
    pub fn with_url(http: reqwest::Client, url: String, settings: &EwsSettings) -> Self {
        info!("Using EWS endpoint {url}");
        Self {
            http,
            url,
            username: settings.username.clone(),
            password: settings.password.clone(),
            version: settings.server_version,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ids of inbox messages matching the options' filters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ews`] if the server reports an error.
    pub async fn find_items(
        &self,
        mailbox: &str,
        options: &EwsReadOptions,
    ) -> Result<Vec<ItemId>> {
        let root = self.call(&soap::find_item(mailbox, options)).await?;
        let ids = root
            .find_all("Items")
            .into_iter()
            .flat_map(|items| items.children.iter())
            .filter(|item| item.name == "Message")
            .filter_map(|message| message.child("ItemId"))
            .filter_map(item_id)
            .collect::<Vec<_>>();
        debug!("FindItem returned {} messages", ids.len());
        Ok(ids)
    }

    async fn get_item(&self, id: &ItemId) -> Result<FetchedItem> {
        let body = soap::get_item(id, self.version.supports_text_body());
        let root = self.call(&body).await?;
        let message = root
            .find("Items")
            .and_then(|items| items.children.first())
            .ok_or_else(|| Error::Ews(format!("GetItem returned no item for {}", id.id)))?;
        Ok(fetched_item(message, id))
    }

    /// Name and content of a file attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ews`] if the server reports an error or the
    /// attachment is not a file.
    pub async fn get_attachment(&self, attachment_id: &str) -> Result<(String, Vec<u8>)> {
        let root = self.call(&soap::get_attachment(attachment_id)).await?;
        let file = root
            .find("FileAttachment")
            .ok_or_else(|| Error::Ews(format!("Attachment {attachment_id} is not a file")))?;
        let name = file.child_text("Name").unwrap_or_default().to_string();
        let content = STANDARD.decode(file.child_text("Content").unwrap_or_default().trim())?;
        Ok((name, content))
    }

    /// # Errors
    ///
    /// Returns [`Error::Ews`] if the server reports an error.
    pub async fn mark_as_read(&self, id: &ItemId) -> Result<()> {
        self.call(&soap::mark_as_read(id)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Ews`] if the server reports an error.
    pub async fn hard_delete(&self, id: &ItemId) -> Result<()> {
        self.call(&soap::hard_delete(id)).await?;
        Ok(())
    }

    async fn call(&self, body: &str) -> Result<XmlNode> {
        let request = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(soap::envelope(self.version, body));

        let (status, text) = self
            .cancellable(async move {
                let response = request.send().await?;
                let status = response.status();
                Ok((status, response.text().await?))
            })
            .await?;

        let root = if text.trim().is_empty() {
            XmlNode::default()
        } else {
            XmlNode::parse(&text)?
        };

        if let Some(fault) = root.find("Fault") {
            let reason = fault.child_text("faultstring").unwrap_or("SOAP fault");
            return Err(Error::Ews(reason.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Ews(format!("EWS endpoint returned {status}")));
        }
        if let Some(error) = response_messages(&root)
            .into_iter()
            .find(|node| node.attr("ResponseClass") == Some("Error"))
        {
            let message = error.child_text("MessageText").unwrap_or("Unknown EWS error");
            let code = error.child_text("ResponseCode").unwrap_or_default();
            return Err(Error::Ews(format!("{code}: {message}")));
        }

        Ok(root)
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

/// The per-request response messages, which carry `ResponseClass`.
fn response_messages(root: &XmlNode) -> Vec<&XmlNode> {
    root.find("ResponseMessages")
        .map(|messages| messages.children.iter().collect())
        .unwrap_or_default()
}

fn item_id(node: &XmlNode) -> Option<ItemId> {
    Some(ItemId {
        id: node.attr("Id")?.to_string(),
        change_key: node.attr("ChangeKey").map(str::to_string),
    })
}

fn addresses(node: Option<&XmlNode>) -> String {
    node.map(|n| {
        n.find_all("EmailAddress")
            .iter()
            .map(|address| address.text.as_str())
            .collect::<Vec<_>>()
            .join(",")
    })
    .unwrap_or_default()
}

fn fetched_item(message: &XmlNode, requested: &ItemId) -> FetchedItem {
    let id = message
        .child("ItemId")
        .and_then(item_id)
        .unwrap_or_else(|| requested.clone());

    let attachment_ids = message
        .child("Attachments")
        .map(|attachments| {
            attachments
                .children
                .iter()
                .filter(|a| a.name == "FileAttachment")
                .filter_map(|a| a.child("AttachmentId")?.attr("Id"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    FetchedItem {
        message: EwsMessage {
            id: id.id.clone(),
            to: addresses(message.child("ToRecipients")),
            cc: addresses(message.child("CcRecipients")),
            from: addresses(message.child("From")),
            date: message
                .child_text("DateTimeReceived")
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.with_timezone(&Utc)),
            subject: message.child_text("Subject").unwrap_or_default().to_string(),
            body_text: message.child_text("TextBody").unwrap_or_default().to_string(),
            body_html: message.child_text("Body").unwrap_or_default().to_string(),
            attachment_paths: Vec::new(),
        },
        id,
        attachment_ids,
    }
}

/// Read inbox messages over EWS.
///
/// Matching messages are fetched with their bodies, file attachments
/// are saved unless `ignore_attachments` is set, and then every message
/// is deleted or marked read as configured.
///
/// # Errors
///
/// Returns [`Error::Config`] for invalid settings or options,
/// [`Error::NoMessagesFound`] when nothing matches and
/// `throw_if_no_messages_found` is set, and any EWS or I/O error.
pub async fn read_ews_email(
    settings: &EwsSettings,
    options: &EwsReadOptions,
    cancel: CancellationToken,
) -> Result<Vec<EwsMessage>> {
    options.validate()?;
    let client = EwsClient::connect(settings).await?.with_cancellation(cancel);
    read_with_client(&client, &settings.mailbox, options).await
}

/// [`read_ews_email`] against an already connected client.
///
/// # Errors
///
/// See [`read_ews_email`].
pub async fn read_with_client(
    client: &EwsClient,
    mailbox: &str,
    options: &EwsReadOptions,
) -> Result<Vec<EwsMessage>> {
    options.validate()?;

    let ids = client.find_items(mailbox, options).await?;
    if ids.is_empty() && options.throw_if_no_messages_found {
        return Err(Error::NoMessagesFound);
    }

    let mut fetched = Vec::with_capacity(ids.len());
    for id in &ids {
        let mut item = client.get_item(id).await?;
        if !options.ignore_attachments {
            let directory = Path::new(options.attachment_directory.trim());
            for attachment_id in &item.attachment_ids {
                let (name, content) = client.get_attachment(attachment_id).await?;
                let saved =
                    save_bytes(directory, &name, &content, options.file_exist_policy).await?;
                if saved.skipped() {
                    debug!("Kept existing {}", saved.path.display());
                } else {
                    item.message.attachment_paths.push(saved.path);
                }
            }
        }
        fetched.push(item);
    }

    for item in &fetched {
        if options.delete_read {
            client.hard_delete(&item.id).await?;
        } else if options.mark_as_read {
            client.mark_as_read(&item.id).await?;
        }
    }

    info!("Read {} messages over EWS", fetched.len());
    Ok(fetched.into_iter().map(|item| item.message).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_validation() {
        let mut options = EwsReadOptions::default();
        assert!(options.validate().unwrap_err().is_config());

        options.ignore_attachments = true;
        assert!(options.validate().is_ok());

        options.max_emails = 0;
        assert!(options.validate().unwrap_err().to_string().contains("MaxEmails"));

        let dir = tempfile::tempdir().unwrap();
        let options = EwsReadOptions {
            attachment_directory: dir.path().join("missing").display().to_string(),
            ..EwsReadOptions::default()
        };
        assert!(options.validate().unwrap_err().is_config());
    }

    #[test]
    fn get_item_response_is_mapped() {
        let xml = r#"<Envelope><Body><GetItemResponse><ResponseMessages>
<GetItemResponseMessage ResponseClass="Success"><ResponseCode>NoError</ResponseCode><Items>
<Message>
  <ItemId Id="AAA=" ChangeKey="fresh"/>
  <Subject>Invoice</Subject>
  <Body BodyType="HTML">&lt;p&gt;Hi&lt;/p&gt;</Body>
  <TextBody BodyType="Text">Hi</TextBody>
  <Attachments>
    <FileAttachment><AttachmentId Id="att1"/><Name>a.pdf</Name></FileAttachment>
    <ItemAttachment><AttachmentId Id="att2"/><Name>fwd</Name></ItemAttachment>
  </Attachments>
  <DateTimeReceived>2024-03-01T08:30:00Z</DateTimeReceived>
  <ToRecipients><Mailbox><EmailAddress>a@example.com</EmailAddress></Mailbox><Mailbox><EmailAddress>b@example.com</EmailAddress></Mailbox></ToRecipients>
  <From><Mailbox><EmailAddress>boss@example.com</EmailAddress></Mailbox></From>
</Message>
</Items></GetItemResponseMessage></ResponseMessages></GetItemResponse></Body></Envelope>"#;
        let root = XmlNode::parse(xml).unwrap();
        let message = root.find("Items").unwrap().children.first().unwrap();
        let requested = ItemId {
            id: "AAA=".into(),
            change_key: Some("stale".into()),
        };

        let item = fetched_item(message, &requested);
        assert_eq!(item.id.change_key.as_deref(), Some("fresh"));
        assert_eq!(item.attachment_ids, vec!["att1"]);
        assert_eq!(item.message.subject, "Invoice");
        assert_eq!(item.message.body_html, "<p>Hi</p>");
        assert_eq!(item.message.body_text, "Hi");
        assert_eq!(item.message.to, "a@example.com,b@example.com");
        assert_eq!(item.message.from, "boss@example.com");
        assert_eq!(
            item.message.date.unwrap().to_rfc3339(),
            "2024-03-01T08:30:00+00:00"
        );
    }
}
