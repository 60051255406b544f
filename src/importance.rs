//! Message importance levels

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Importance of an outgoing message.
///
/// Serializes to the lowercase values Graph expects.
///
/// # Examples
///
/// ```
/// use exchange_mail::Importance;
///
/// assert_eq!(Importance::High.as_graph_str(), "high");
/// assert_eq!("Low".parse::<Importance>().unwrap(), Importance::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Routine or informational mail.
    Low,
    #[default]
    Normal,
    /// Urgent or time-sensitive mail.
    High,
}

impl Importance {
    /// The Graph wire representation.
    #[must_use]
    pub const fn as_graph_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_graph_str())
    }
}

impl FromStr for Importance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(Error::Config(format!("Invalid importance: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_values() {
        assert_eq!(Importance::Low.as_graph_str(), "low");
        assert_eq!(Importance::Normal.as_graph_str(), "normal");
        assert_eq!(Importance::High.as_graph_str(), "high");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Importance>().unwrap(), Importance::High);
        assert_eq!(" normal ".parse::<Importance>().unwrap(), Importance::Normal);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("urgent".parse::<Importance>().unwrap_err().is_config());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Importance::High).unwrap(), "\"high\"");
    }
}
