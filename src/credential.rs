//! Token credentials
//!
//! Resolves a [`Connection`] into one of three Azure AD grants and
//! exchanges it for a Graph access token. The token is reused until
//! shortly before it expires; there is no refresh-token or retry logic.

use crate::certificate::ClientCertificate;
use crate::config::{AuthProvider, Connection};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Scope requested for every grant.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens this close to expiry are fetched again.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

enum Grant {
    Password { username: String, password: String },
    Secret(String),
    Certificate(ClientCertificate),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// A credential able to produce Graph access tokens.
pub struct TokenCredential {
    client_id: String,
    token_url: String,
    grant: Grant,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCredential")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl TokenCredential {
    /// Resolve the credential for the connection's provider.
    ///
    /// Validation happens first, so missing fields are reported before
    /// the certificate file is touched or any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing fields or
    /// [`Error::Certificate`] if the certificate cannot be loaded.
    pub fn from_connection(connection: &Connection) -> Result<Self> {
        connection.validate()?;

        let grant = match connection.auth_provider {
            AuthProvider::UsernamePassword => Grant::Password {
                username: connection.username.clone(),
                password: connection.password.clone(),
            },
            AuthProvider::ClientCredentialsSecret => {
                Grant::Secret(connection.client_secret.clone())
            }
            AuthProvider::ClientCredentialsCertificate => Grant::Certificate(
                ClientCertificate::from_pem_file(connection.certificate_path.trim())?,
            ),
        };

        debug!(
            "Resolved {} credential for client {}",
            connection.auth_provider, connection.client_id
        );

        Ok(Self {
            client_id: connection.client_id.trim().to_string(),
            token_url: connection.token_url(),
            grant,
            cached: Mutex::new(None),
        })
    }

    /// Return a valid access token, requesting a new one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the token endpoint rejects the grant,
    /// or a transport error if it cannot be reached.
    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECONDS)
        {
            return Ok(token.access_token.clone());
        }

        let form = self.form()?;
        let response = http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| format!("token endpoint returned {status}"),
                |e| match e.error_description {
                    Some(description) => format!("{}: {description}", e.error),
                    None => e.error,
                },
            );
            return Err(Error::Auth(reason));
        }

        let token: TokenResponse = response.json().await?;
        info!("Acquired access token for client {}", self.client_id);

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        drop(cached);
        Ok(access_token)
    }

    fn form(&self) -> Result<Vec<(&'static str, String)>> {
        let mut form = vec![
            ("client_id", self.client_id.clone()),
            ("scope", GRAPH_SCOPE.to_string()),
        ];

        match &self.grant {
            Grant::Password { username, password } => {
                form.push(("grant_type", "password".to_string()));
                form.push(("username", username.clone()));
                form.push(("password", password.clone()));
            }
            Grant::Secret(secret) => {
                form.push(("grant_type", "client_credentials".to_string()));
                form.push(("client_secret", secret.clone()));
            }
            Grant::Certificate(certificate) => {
                form.push(("grant_type", "client_credentials".to_string()));
                form.push((
                    "client_assertion_type",
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_string(),
                ));
                form.push((
                    "client_assertion",
                    certificate.assertion(&self.client_id, &self.token_url)?,
                ));
            }
        }

        Ok(form)
    }
}
