//! Microsoft Graph mail client
//!
//! A thin wrapper over the handful of Graph endpoints the read and send
//! tasks need. Every call is raced against the client's cancellation
//! token.

pub mod types;

use crate::config::Connection;
use crate::credential::TokenCredential;
use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::query::MessageQuery;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    Attachment, AttachmentItem, AttachmentPage, ErrorResponse, Message, MessagePage,
    SendMailRequest, SliceProgress, UploadSession, UploadSessionRequest,
};

/// Expand that makes item attachments carry their inner message.
const ITEM_ATTACHMENT_EXPAND: &str = "microsoft.graph.itemattachment/item";

/// Result of uploading one slice to an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The server wants more bytes, starting at these ranges.
    Continue(Vec<String>),
    /// The attachment has been created.
    Completed,
    /// A `200` whose body carries no usable `nextExpectedRanges`.
    Unacknowledged,
}

/// Graph mail client bound to one connection.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    credential: TokenCredential,
    cancel: CancellationToken,
}

impl GraphClient {
    /// Build a client for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required connection values are
    /// missing. No network call is made.
    pub fn new(connection: &Connection) -> Result<Self> {
        let credential = TokenCredential::from_connection(connection)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: connection.graph_endpoint.trim_end_matches('/').to_string(),
            credential,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future calls when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// List messages in `mailbox`.
    ///
    /// Follows `@odata.nextLink` until `query.top` messages have been
    /// collected, or until the listing is exhausted when `top` is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_messages(
        &self,
        mailbox: &Mailbox,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let headers = query.header_map()?;
        let limit = usize::try_from(query.top).unwrap_or(usize::MAX);
        let mut url = self.url(mailbox, "messages");
        let mut params = Some(query.params());
        let mut messages = Vec::new();

        loop {
            let mut request = self.request(Method::GET, &url).await?.headers(headers.clone());
            if let Some(params) = params.take() {
                request = request.query(&params);
            }
            let page: MessagePage = self.json(request).await?;
            debug!("Fetched page of {} messages", page.value.len());
            messages.extend(page.value);

            if limit > 0 && messages.len() >= limit {
                messages.truncate(limit);
                break;
            }
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        info!("Listed {} messages from {}", messages.len(), mailbox);
        Ok(messages)
    }

    /// List a message's attachments, with item attachments expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_attachments(
        &self,
        mailbox: &Mailbox,
        message_id: &str,
    ) -> Result<Vec<Attachment>> {
        let url = self.url(mailbox, &format!("messages/{message_id}/attachments"));
        let request = self
            .request(Method::GET, &url)
            .await?
            .query(&[("$expand", ITEM_ATTACHMENT_EXPAND)]);
        let page: AttachmentPage = self.json(request).await?;
        Ok(page.value)
    }

    /// Set `isRead` on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_as_read(&self, mailbox: &Mailbox, message_id: &str) -> Result<()> {
        let url = self.url(mailbox, &format!("messages/{message_id}"));
        let request = self
            .request(Method::PATCH, &url)
            .await?
            .json(&serde_json::json!({ "isRead": true }));
        self.send(request).await?;
        debug!("Marked {} as read", message_id);
        Ok(())
    }

    /// Compose and send in one call (`sendMail`).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_mail(
        &self,
        mailbox: &Mailbox,
        message: &Message,
        save_to_sent_items: bool,
    ) -> Result<()> {
        let url = self.url(mailbox, "sendMail");
        let request = self.request(Method::POST, &url).await?.json(&SendMailRequest {
            message,
            save_to_sent_items,
        });
        self.send(request).await?;
        Ok(())
    }

    /// Create a draft and return it with its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_draft(&self, mailbox: &Mailbox, message: &Message) -> Result<Message> {
        let url = self.url(mailbox, "messages");
        let request = self.request(Method::POST, &url).await?.json(message);
        self.json(request).await
    }

    /// Send an existing draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_draft(&self, mailbox: &Mailbox, message_id: &str) -> Result<()> {
        let url = self.url(mailbox, &format!("messages/{message_id}/send"));
        let request = self.request(Method::POST, &url).await?;
        self.send(request).await?;
        Ok(())
    }

    /// Open an upload session for a file attachment on a draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_upload_session(
        &self,
        mailbox: &Mailbox,
        message_id: &str,
        name: &str,
        size: u64,
    ) -> Result<UploadSession> {
        let url = self.url(
            mailbox,
            &format!("messages/{message_id}/attachments/createUploadSession"),
        );
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&UploadSessionRequest {
                attachment_item: AttachmentItem {
                    attachment_type: "file",
                    name: name.to_string(),
                    size,
                    content_type: "application/octet-stream",
                },
            });
        self.json(request).await
    }

    /// PUT one slice to a session URL. Session URLs are pre-authorized,
    /// so no bearer token is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the slice.
    pub async fn upload_slice(
        &self,
        upload_url: &str,
        start: u64,
        bytes: Vec<u8>,
        total: u64,
    ) -> Result<SliceOutcome> {
        let end = (start + bytes.len() as u64).saturating_sub(1);
        let request = self
            .http
            .put(upload_url)
            .header(CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
            .body(bytes);
        let response = self.send(request).await?;

        if response.status() == StatusCode::CREATED {
            return Ok(SliceOutcome::Completed);
        }

        let body = self
            .cancellable(async move { Ok(response.bytes().await?) })
            .await?;
        Ok(slice_outcome(&body))
    }

    // -- private helpers --

    fn url(&self, mailbox: &Mailbox, path: &str) -> String {
        format!("{}/{}/{path}", self.base_url, mailbox.path())
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.cancellable(self.credential.token(&self.http)).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.cancellable(async move { Ok(request.send().await?) }).await?;
        check_status(response).await
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        self.cancellable(async move { Ok(response.json().await?) }).await
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

/// Interpret the body of a non-`201` slice response. Only a parsed,
/// explicitly empty `nextExpectedRanges` means the upload is done.
fn slice_outcome(body: &[u8]) -> SliceOutcome {
    match serde_json::from_slice::<SliceProgress>(body) {
        Ok(progress) if progress.next_expected_ranges.is_empty() => SliceOutcome::Completed,
        Ok(progress) => SliceOutcome::Continue(progress.next_expected_ranges),
        Err(e) => {
            warn!("Unreadable upload slice response: {e}");
            SliceOutcome::Unacknowledged
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = serde_json::from_str::<ErrorResponse>(&body).map_or_else(
        |_| (status.canonical_reason().unwrap_or("Unknown").to_string(), body.clone()),
        |e| (e.error.code, e.error.message),
    );

    Err(Error::Graph {
        status: status.as_u16(),
        code,
        message,
    })
}
