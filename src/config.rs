//! Connection configuration
//!
//! [`Connection`] describes how to reach Microsoft Graph and which
//! credential to use; [`EwsSettings`] describes a legacy EWS endpoint.
//! Both can be built by hand or loaded from `EXCHANGE_*` environment
//! variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Which credential flow to use against Azure AD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthProvider {
    /// Client id + certificate file holding the certificate and its
    /// private key.
    ClientCredentialsCertificate,
    /// Client id + client secret.
    ClientCredentialsSecret,
    /// Resource owner username and password.
    #[default]
    UsernamePassword,
}

impl AuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientCredentialsCertificate => "ClientCredentialsCertificate",
            Self::ClientCredentialsSecret => "ClientCredentialsSecret",
            Self::UsernamePassword => "UsernamePassword",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "clientcredentialscertificate" | "certificate" => Ok(Self::ClientCredentialsCertificate),
            "clientcredentialssecret" | "secret" => Ok(Self::ClientCredentialsSecret),
            "usernamepassword" | "password" => Ok(Self::UsernamePassword),
            _ => Err(Error::Config(format!("Invalid authentication provider: {s}"))),
        }
    }
}

/// Parameters for establishing a Graph connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub auth_provider: AuthProvider,
    /// PEM file with both the client certificate and its PKCS#8
    /// private key.
    pub certificate_path: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub tenant_id: String,
    pub graph_endpoint: String,
    pub authority_host: String,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            auth_provider: AuthProvider::default(),
            certificate_path: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            tenant_id: String::new(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }
}

impl Connection {
    /// Load the connection from environment variables
    ///
    /// Reads from `.env` file if present. Recognized variables:
    /// - `EXCHANGE_AUTH_PROVIDER` (default: `UsernamePassword`)
    /// - `EXCHANGE_TENANT_ID`, `EXCHANGE_CLIENT_ID`
    /// - `EXCHANGE_CLIENT_SECRET`
    /// - `EXCHANGE_CERTIFICATE_PATH`
    /// - `EXCHANGE_USERNAME`, `EXCHANGE_PASSWORD`
    /// - `EXCHANGE_GRAPH_ENDPOINT` (default: Graph v1.0)
    /// - `EXCHANGE_AUTHORITY_HOST` (default: Azure public cloud)
    ///
    /// Credentials are not checked here; see [`Connection::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `EXCHANGE_AUTH_PROVIDER` is not a
    /// known provider.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let auth_provider = match env::var("EXCHANGE_AUTH_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => AuthProvider::default(),
        };

        Ok(Self {
            auth_provider,
            certificate_path: env::var("EXCHANGE_CERTIFICATE_PATH").unwrap_or_default(),
            client_secret: env::var("EXCHANGE_CLIENT_SECRET").unwrap_or_default(),
            username: env::var("EXCHANGE_USERNAME").unwrap_or_default(),
            password: env::var("EXCHANGE_PASSWORD").unwrap_or_default(),
            client_id: env::var("EXCHANGE_CLIENT_ID").unwrap_or_default(),
            tenant_id: env::var("EXCHANGE_TENANT_ID").unwrap_or_default(),
            graph_endpoint: env::var("EXCHANGE_GRAPH_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GRAPH_ENDPOINT.to_string()),
            authority_host: env::var("EXCHANGE_AUTHORITY_HOST")
                .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string()),
        })
    }

    /// Check that every field the selected provider needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming all missing fields.
    pub fn validate(&self) -> Result<()> {
        let required: Vec<(&str, &str)> = match self.auth_provider {
            AuthProvider::ClientCredentialsCertificate => vec![
                ("TenantId", self.tenant_id.as_str()),
                ("ClientId", self.client_id.as_str()),
                ("X509CertificateFilePath", self.certificate_path.as_str()),
            ],
            AuthProvider::ClientCredentialsSecret => vec![
                ("TenantId", self.tenant_id.as_str()),
                ("ClientId", self.client_id.as_str()),
                ("ClientSecret", self.client_secret.as_str()),
            ],
            AuthProvider::UsernamePassword => vec![
                ("Username", self.username.as_str()),
                ("Password", self.password.as_str()),
                ("TenantId", self.tenant_id.as_str()),
                ("ClientId", self.client_id.as_str()),
            ],
        };

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "One or more required connection values missing: {}",
                missing.join(", ")
            )))
        }
    }

    /// Azure AD v2 token endpoint for this tenant.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id.trim()
        )
    }
}

/// Exchange server version sent in `RequestServerVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerVersion {
    #[serde(rename = "Exchange2007_SP1")]
    Exchange2007Sp1,
    Exchange2010,
    #[serde(rename = "Exchange2010_SP1")]
    Exchange2010Sp1,
    #[serde(rename = "Exchange2010_SP2")]
    Exchange2010Sp2,
    #[default]
    Exchange2013,
    #[serde(rename = "Exchange2013_SP1")]
    Exchange2013Sp1,
    Office365,
}

impl ServerVersion {
    /// The EWS schema version string. Office 365 speaks the
    /// Exchange 2013 SP1 schema.
    #[must_use]
    pub const fn as_ews_str(self) -> &'static str {
        match self {
            Self::Exchange2007Sp1 => "Exchange2007_SP1",
            Self::Exchange2010 => "Exchange2010",
            Self::Exchange2010Sp1 => "Exchange2010_SP1",
            Self::Exchange2010Sp2 => "Exchange2010_SP2",
            Self::Exchange2013 => "Exchange2013",
            Self::Exchange2013Sp1 | Self::Office365 => "Exchange2013_SP1",
        }
    }

    /// `item:TextBody` exists from Exchange 2013 on.
    #[must_use]
    pub const fn supports_text_body(self) -> bool {
        matches!(
            self,
            Self::Exchange2013 | Self::Exchange2013Sp1 | Self::Office365
        )
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.replace(['_', '-'], "").to_ascii_lowercase().as_str() {
            "exchange2007sp1" => Ok(Self::Exchange2007Sp1),
            "exchange2010" => Ok(Self::Exchange2010),
            "exchange2010sp1" => Ok(Self::Exchange2010Sp1),
            "exchange2010sp2" => Ok(Self::Exchange2010Sp2),
            "exchange2013" => Ok(Self::Exchange2013),
            "exchange2013sp1" => Ok(Self::Exchange2013Sp1),
            "office365" => Ok(Self::Office365),
            _ => Err(Error::Config(format!("Invalid Exchange server version: {s}"))),
        }
    }
}

/// Settings for a legacy EWS endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EwsSettings {
    pub server_version: ServerVersion,
    /// Discover the EWS URL from the username's domain instead of
    /// using `server_address`.
    pub use_autodiscover: bool,
    /// Full EWS URL, e.g. `https://mail.example.com/EWS/Exchange.asmx`.
    pub server_address: String,
    pub username: String,
    pub password: String,
    /// Mailbox to read from. Empty reads the authenticated user's
    /// own inbox.
    pub mailbox: String,
    /// Accept self-signed server certificates (default on-premises
    /// installations).
    pub accept_invalid_certs: bool,
}

impl EwsSettings {
    /// Load EWS settings from environment variables
    ///
    /// Reads from `.env` file if present:
    /// - `EWS_SERVER_VERSION` (default: `Exchange2013`)
    /// - `EWS_USE_AUTODISCOVER` (`true`/`false`, default: `false`)
    /// - `EWS_SERVER_ADDRESS`
    /// - `EWS_USERNAME`, `EWS_PASSWORD`
    /// - `EWS_MAILBOX`
    /// - `EWS_ACCEPT_INVALID_CERTS` (`true`/`false`, default: `false`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown server version or a
    /// flag that is not `true`/`false`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let server_version = match env::var("EWS_SERVER_VERSION") {
            Ok(value) => value.parse()?,
            Err(_) => ServerVersion::default(),
        };

        Ok(Self {
            server_version,
            use_autodiscover: env_flag("EWS_USE_AUTODISCOVER")?,
            server_address: env::var("EWS_SERVER_ADDRESS").unwrap_or_default(),
            username: env::var("EWS_USERNAME").unwrap_or_default(),
            password: env::var("EWS_PASSWORD").unwrap_or_default(),
            mailbox: env::var("EWS_MAILBOX").unwrap_or_default(),
            accept_invalid_certs: env_flag("EWS_ACCEPT_INVALID_CERTS")?,
        })
    }
}

fn env_flag(name: &str) -> Result<bool> {
    env::var(name).map_or(Ok(false), |value| {
        value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
    })
}
