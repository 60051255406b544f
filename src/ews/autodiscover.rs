//! POX autodiscover
//!
//! Finds the EWS URL for an address by asking the well-known
//! autodiscover endpoints of its domain. Redirects are only followed to
//! https URLs so credentials never travel in clear text.

use super::parse::XmlNode;
use crate::error::{Error, Result};
use quick_xml::escape::escape;
use reqwest::redirect::{Attempt, Policy};
use tracing::{debug, warn};

const REQUEST_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/requestschema/2006";
const RESPONSE_SCHEMA: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a";

const MAX_REDIRECTS: usize = 10;

/// Redirect policy that only follows https targets.
#[must_use]
pub fn https_only() -> Policy {
    Policy::custom(|attempt: Attempt<'_>| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt.url().scheme() == "https" {
            attempt.follow()
        } else {
            warn!("Refusing autodiscover redirect to {}", attempt.url());
            attempt.stop()
        }
    })
}

/// Autodiscover URLs to try for `email`, in order.
///
/// # Errors
///
/// Returns [`Error::Config`] if `email` has no domain part.
pub fn candidate_urls(email: &str) -> Result<Vec<String>> {
    let domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| {
            Error::Config(format!("Cannot autodiscover without a domain in '{email}'"))
        })?;

    Ok(vec![
        format!("https://{domain}/autodiscover/autodiscover.xml"),
        format!("https://autodiscover.{domain}/autodiscover/autodiscover.xml"),
    ])
}

fn request_body(email: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><Autodiscover xmlns="{REQUEST_SCHEMA}"><Request><EMailAddress>{}</EMailAddress><AcceptableResponseSchema>{RESPONSE_SCHEMA}</AcceptableResponseSchema></Request></Autodiscover>"#,
        escape(email)
    )
}

/// First `EwsUrl` in an autodiscover response.
fn ews_url(xml: &str) -> Option<String> {
    let root = XmlNode::parse(xml).ok()?;
    root.find_all("EwsUrl")
        .into_iter()
        .map(|node| node.text.trim())
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Ask each URL in turn; the first response carrying an `EwsUrl` wins.
///
/// # Errors
///
/// Returns [`Error::Ews`] if no candidate yields an EWS URL.
pub async fn discover(
    http: &reqwest::Client,
    candidates: &[String],
    email: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    for url in candidates {
        let response = match http
            .post(url)
            .basic_auth(username, Some(password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(request_body(email))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Autodiscover at {url} failed: {e}");
                continue;
            }
        };

        if !response.status().is_success() {
            debug!("Autodiscover at {url} returned {}", response.status());
            continue;
        }

        let body = response.text().await?;
        if let Some(ews) = ews_url(&body) {
            debug!("Autodiscovered EWS URL {ews}");
            return Ok(ews);
        }
    }

    Err(Error::Ews(format!("Autodiscover found no EWS URL for {email}")))
}
