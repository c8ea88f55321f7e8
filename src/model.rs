use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Market segment of a listed instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Kospi,
    Kosdaq,
    Unknown,
}

impl Market {
    pub fn from_str(s: &str) -> Self {
        match s {
            "KOSPI" => Self::Kospi,
            "KOSDAQ" => Self::Kosdaq,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kospi => "KOSPI",
            Self::Kosdaq => "KOSDAQ",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trading day of one symbol. Prices are KRW, which has no minor unit,
/// so integer fields are exact. Volume can exceed the 32-bit range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
}

/// Listing entry from the exchange master file.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub code: String,
    pub name: String,
    pub market: Market,
}

/// A tracked instrument with its cached classification.
#[derive(Debug, Clone)]
pub struct StockRecord {
    pub code: String,
    pub name: String,
    pub market: Market,
    pub is_double_bottom: bool,
    pub score: u8,
    pub last_analyzed: Option<DateTime<Utc>>,
}

/// Per-bar derived values. `None` means "not enough trailing history yet",
/// which callers must treat differently from a real zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSet {
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub rsi: Option<f64>,
}

/// Latest view of a symbol used by ranking and the decision layer:
/// cached classification joined with the most recent bar and its indicators.
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    pub code: String,
    pub name: String,
    pub is_double_bottom: bool,
    pub score: u8,
    pub close: i64,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub rsi: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one order attempt, accepted or rejected.
#[derive(Debug, Clone)]
pub struct TradeLog {
    pub code: String,
    pub side: TradeSide,
    pub price: i64,
    pub quantity: u32,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
