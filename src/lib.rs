//! Exchange Online mail client library
//!
//! Reads and sends mail through the
//! [Microsoft Graph](https://learn.microsoft.com/graph/api/resources/mail-api-overview)
//! REST API, authenticating with a username/password, a client secret
//! or a client certificate. A legacy reader for on-premises Exchange
//! Web Services endpoints is included.
//!
//! The three entry points are [`read_email`], [`send_email`] and
//! [`read_ews_email`]. Each validates its parameters before any network
//! call and returns a plain result value.

mod certificate;
mod config;
mod credential;
mod error;
pub mod ews;
pub mod graph;
mod importance;
mod mailbox;
mod query;
mod read;
mod send;
pub mod transfer;

pub use certificate::ClientCertificate;
pub use config::{AuthProvider, Connection, EwsSettings, ServerVersion};
pub use credential::{GRAPH_SCOPE, TokenCredential};
pub use error::{Error, Result};
pub use ews::{EwsClient, EwsMessage, EwsReadOptions, read_ews_email};
pub use graph::GraphClient;
pub use importance::Importance;
pub use mailbox::Mailbox;
pub use query::{HeaderParameter, MessageQuery};
pub use read::{AttachmentRecord, MessageRecord, ReadInput, ReadOptions, ReadResult, read_email};
pub use send::{SendInput, SendOptions, SendResult, parse_recipients, send_email};
pub use tokio_util::sync::CancellationToken;
pub use transfer::{AttachmentSource, FileExistPolicy, INLINE_ATTACHMENT_LIMIT, UPLOAD_SLICE_SIZE};
