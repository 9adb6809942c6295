//! Content style codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Presentation style of a content fragment.
///
/// The single-letter wire codes (`d`, `h1`, … `u`) are what clients send
/// and what the store persists; keep them stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentStyle {
    #[default]
    #[serde(rename = "d")]
    Default,
    #[serde(rename = "h1")]
    Heading1,
    #[serde(rename = "h2")]
    Heading2,
    #[serde(rename = "h3")]
    Heading3,
    #[serde(rename = "b")]
    Bold,
    #[serde(rename = "i")]
    Italic,
    #[serde(rename = "u")]
    Underline,
}

impl ContentStyle {
    /// Returns the persisted wire code for this style.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "d",
            Self::Heading1 => "h1",
            Self::Heading2 => "h2",
            Self::Heading3 => "h3",
            Self::Bold => "b",
            Self::Italic => "i",
            Self::Underline => "u",
        }
    }
}

impl fmt::Display for ContentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStyle {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(Self::Default),
            "h1" => Ok(Self::Heading1),
            "h2" => Ok(Self::Heading2),
            "h3" => Ok(Self::Heading3),
            "b" => Ok(Self::Bold),
            "i" => Ok(Self::Italic),
            "u" => Ok(Self::Underline),
            other => Err(crate::Error::InvalidStyle(other.to_string())),
        }
    }
}
