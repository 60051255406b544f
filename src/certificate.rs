//! Client certificate credentials
//!
//! Azure AD accepts a signed JWT (`client_assertion`) in place of a
//! client secret. The assertion is signed RS256 with the certificate's
//! private key and names the certificate by its SHA-1 thumbprint in the
//! `x5t` header.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{self, RsaKeyPair};
use rustls_pemfile::Item;
use serde_json::json;
use std::path::Path;

/// Assertions are short-lived; Azure AD rejects anything valid for
/// more than ten minutes.
const ASSERTION_LIFETIME_MINUTES: i64 = 10;

/// A certificate and its RSA private key, loaded from one PEM file.
pub struct ClientCertificate {
    thumbprint: String,
    key: RsaKeyPair,
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

impl ClientCertificate {
    /// Load a PEM file holding the certificate followed (or preceded)
    /// by its private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold
    /// both a certificate and an RSA key.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            Error::Certificate(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Parse PEM bytes. The first certificate is used; PKCS#8 and
    /// PKCS#1 RSA keys are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate or key is missing or the
    /// key is not a usable RSA key.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let mut reader = pem;
        let mut certificate: Option<Vec<u8>> = None;
        let mut key: Option<RsaKeyPair> = None;

        for item in rustls_pemfile::read_all(&mut reader) {
            let item = item.map_err(|e| Error::Certificate(format!("Invalid PEM: {e}")))?;
            match item {
                Item::X509Certificate(der) if certificate.is_none() => {
                    certificate = Some(der.as_ref().to_vec());
                }
                Item::Pkcs8Key(der) => {
                    key = Some(RsaKeyPair::from_pkcs8(der.secret_pkcs8_der()).map_err(|e| {
                        Error::Certificate(format!("Unsupported private key: {e}"))
                    })?);
                }
                Item::Pkcs1Key(der) => {
                    key = Some(RsaKeyPair::from_der(der.secret_pkcs1_der()).map_err(|e| {
                        Error::Certificate(format!("Unsupported private key: {e}"))
                    })?);
                }
                _ => {}
            }
        }

        let certificate = certificate
            .ok_or_else(|| Error::Certificate("No certificate found in PEM".into()))?;
        let key = key.ok_or_else(|| Error::Certificate("No RSA private key found in PEM".into()))?;

        let sha1 = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &certificate);
        Ok(Self {
            thumbprint: URL_SAFE_NO_PAD.encode(sha1.as_ref()),
            key,
        })
    }

    /// Base64url SHA-1 thumbprint of the certificate (`x5t`).
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Build a signed `client_assertion` for `client_id`, addressed to
    /// the token endpoint `audience`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn assertion(&self, client_id: &str, audience: &str) -> Result<String> {
        let now = Utc::now();
        let header = json!({
            "alg": "RS256",
            "typ": "JWT",
            "x5t": self.thumbprint,
        });
        let claims = json!({
            "aud": audience,
            "iss": client_id,
            "sub": client_id,
            "jti": uuid::Uuid::new_v4().to_string(),
            "nbf": now.timestamp(),
            "exp": (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut signature = vec![0; self.key.public().modulus_len()];
        self.key
            .sign(
                &signature::RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|e| Error::Certificate(format!("Signing failed: {e}")))?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}
