//! Card and input line types.

use std::fmt;
use std::str::FromStr;

/// A front/back pair to be added as one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// The question side; also the text duplicates are searched by.
    pub front: String,
    /// The answer side.
    pub back: String,
}

impl Card {
    /// Create a card.
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }

    /// Parse one input line in the given format.
    ///
    /// The error is a human readable reason; the caller adds the line number.
    pub fn parse(line: &str, format: InputFormat) -> std::result::Result<Self, String> {
        match format {
            InputFormat::Text => Ok(match line.split_once('\t') {
                Some((front, back)) => Self::new(front, back),
                None => Self::new(line, ""),
            }),
            InputFormat::Json => {
                let [front, back]: [String; 2] = serde_json::from_str(line)
                    .map_err(|e| format!("expected [\"front\", \"back\"]: {}", e))?;
                Ok(Self::new(front, back))
            }
        }
    }
}

/// Encoding of input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// `front<TAB>back`; a line without a tab has an empty back.
    #[default]
    Text,
    /// A JSON array `["front", "back"]`.
    Json,
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(InputFormat::Text),
            "json" => Ok(InputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'text' or 'json'", s)),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Text => f.write_str("text"),
            InputFormat::Json => f.write_str("json"),
        }
    }
}
