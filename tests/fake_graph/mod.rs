//! Fake Microsoft Graph for integration testing
//!
//! Wraps a `wiremock` server with the endpoints the read and send tasks
//! talk to:
//!
//! token -> list messages (paged) -> attachments -> PATCH isRead
//! token -> sendMail | draft -> createUploadSession -> PUT slices -> send
//!
//! ## Module layout
//!
//! - `fixtures` -- JSON builders for messages and attachments
//! - `upload` -- responder that plays an upload session

#![allow(dead_code)]

pub mod fixtures;
mod upload;

use exchange_mail::{AuthProvider, Connection};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub use upload::SliceResponder;

pub const TENANT: &str = "test-tenant";
pub const ACCESS_TOKEN: &str = "test-token";

/// A running fake Graph endpoint with a working token endpoint.
pub struct FakeGraph {
    server: MockServer,
}

impl FakeGraph {
    /// Start the server and mount the token endpoint.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": ACCESS_TOKEN,
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// A client-secret connection pointed at this server for both the
    /// authority and Graph.
    pub fn connection(&self) -> Connection {
        Connection {
            auth_provider: AuthProvider::ClientCredentialsSecret,
            client_secret: "secret".to_string(),
            client_id: "client".to_string(),
            tenant_id: TENANT.to_string(),
            graph_endpoint: self.uri(),
            authority_host: self.uri(),
            ..Connection::default()
        }
    }

    /// Serve `pages` of messages from `/me/messages`, chained with
    /// `@odata.nextLink`. The first page is only matched when the
    /// query carries `$count`, later pages by their skip token.
    pub async fn messages(&self, pages: &[Vec<Value>]) {
        for (index, page) in pages.iter().enumerate() {
            let mut body = json!({ "value": page });
            if index + 1 < pages.len() {
                body["@odata.nextLink"] =
                    json!(format!("{}/me/messages?$skiptoken={}", self.uri(), index + 1));
            }

            let mock = Mock::given(method("GET"))
                .and(path("/me/messages"))
                .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()));
            let mock = if index == 0 {
                mock.and(query_param("$count", "true"))
            } else {
                mock.and(query_param("$skiptoken", index.to_string().as_str()))
            };

            mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }
    }

    pub async fn attachments(&self, message_id: &str, attachments: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/me/messages/{message_id}/attachments")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": attachments })))
            .mount(&self.server)
            .await;
    }

    /// Accept `PATCH /me/messages/{id}` for any id.
    pub async fn accept_updates(&self) {
        Mock::given(method("PATCH"))
            .and(path_regex(r"^/me/messages/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }

    pub async fn accept_send_mail(&self) {
        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&self.server)
            .await;
    }

    /// Create drafts with id `draft_id` and accept everything needed to
    /// upload to and send it.
    pub async fn accept_draft(&self, draft_id: &str) {
        self.accept_draft_with(draft_id, SliceResponder::Accept).await;
    }

    /// Like [`accept_draft`](Self::accept_draft), with `slices` answering
    /// the upload PUTs.
    pub async fn accept_draft_with(&self, draft_id: &str, slices: SliceResponder) {
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": draft_id })))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!(
                "/me/messages/{draft_id}/attachments/createUploadSession"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uploadUrl": format!("{}/upload/{draft_id}", self.uri()),
                "nextExpectedRanges": ["0-"],
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("PUT"))
            .and(path(format!("/upload/{draft_id}")))
            .respond_with(slices)
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/me/messages/{draft_id}/send")))
            .respond_with(ResponseTemplate::new(202))
            .mount(&self.server)
            .await;
    }

    /// Answer `method path` with a Graph error body.
    pub async fn fail(&self, verb: &str, url_path: &str, status: u16, code: &str) {
        Mock::given(method(verb))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": { "code": code, "message": format!("{code} raised by fake") }
            })))
            .mount(&self.server)
            .await;
    }

    /// Requests received for `verb` on paths starting with `prefix`.
    pub async fn requests(&self, verb: &str, prefix: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path().starts_with(prefix))
            .collect()
    }

    /// Every request the server has seen, token requests included.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}
