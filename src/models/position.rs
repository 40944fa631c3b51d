use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized meaning of a trade's free-form `position` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Entry,
    Exit,
    Unknown,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PositionSide {
    /// Classify a raw tag. Case and surrounding whitespace are ignored.
    pub fn classify(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return PositionSide::Unknown;
        };
        match tag.trim().to_ascii_lowercase().as_str() {
            "entry" | "buy" => PositionSide::Entry,
            "exit" | "sell" | "cutoff" => PositionSide::Exit,
            _ => PositionSide::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Entry => "entry",
            PositionSide::Exit => "exit",
            PositionSide::Unknown => "unknown",
        }
    }
}

/// A trade after boundary normalization: side classified, timestamp parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTrade {
    pub id: i64,
    pub instrument: Option<String>,
    pub side: PositionSide,
    pub price: Option<f64>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// An entry matched with the exit that closed it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub instrument: String,
    pub entry: ClassifiedTrade,
    pub exit: ClassifiedTrade,
}

impl ClosedPosition {
    /// Realized P&L, or None when either leg has no price.
    pub fn pnl(&self) -> Option<f64> {
        Some(self.exit.price? - self.entry.price?)
    }
}

/// An entry still waiting for its exit when the scan ended.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub instrument: String,
    pub entry: ClassifiedTrade,
}
