//! OData query building
//!
//! Turns the read task's query knobs into the `$`-prefixed query pairs
//! and extra request headers Graph understands.

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// A custom request header and the values to send for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderParameter {
    /// e.g. `Prefer`
    pub name: String,
    /// e.g. `outlook.body-content-type="text"`
    pub values: Vec<String>,
}

impl HeaderParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Query options for listing messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageQuery {
    /// Properties to return, comma separated.
    pub select: String,
    /// OData filter expression.
    pub filter: String,
    pub skip: Option<u32>,
    /// Maximum number of messages. 0 returns every match.
    pub top: u32,
    /// Sort keys, comma separated (`receivedDateTime DESC,subject ASC`).
    pub orderby: String,
    /// Related entities to expand, comma separated.
    pub expand: String,
    pub headers: Vec<HeaderParameter>,
}

impl MessageQuery {
    /// The `$`-prefixed query pairs for this query.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("$count", "true".to_string())];

        if let Some(filter) = non_blank(&self.filter) {
            params.push(("$filter", filter.to_string()));
        }
        if let Some(select) = join_list(&self.select) {
            params.push(("$select", select));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if self.top > 0 {
            params.push(("$top", self.top.to_string()));
        }
        if let Some(orderby) = join_list(&self.orderby) {
            params.push(("$orderby", orderby));
        }
        if let Some(expand) = join_list(&self.expand) {
            params.push(("$expand", expand));
        }

        params
    }

    /// The custom headers as a [`HeaderMap`]. Every value of a header
    /// is appended, so repeated names are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a header name or value is not valid
    /// HTTP.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for header in &self.headers {
            let Some(name) = non_blank(&header.name) else {
                continue;
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name '{name}': {e}")))?;
            for value in &header.values {
                let value = HeaderValue::from_str(value).map_err(|e| {
                    Error::Config(format!("Invalid value for header '{name}': {e}"))
                })?;
                map.append(name.clone(), value);
            }
        }
        Ok(map)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Normalize a comma separated list: items trimmed, blanks dropped.
fn join_list(s: &str) -> Option<String> {
    let items: Vec<&str> = s
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    (!items.is_empty()).then(|| items.join(","))
}
