use std::fmt;

use crate::error::{NotifierError, NotifierResult};

/// One `(symbol, price)` update travelling through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEvent {
    pub symbol: String,
    pub new_price: f64,
}

impl PriceEvent {
    /// Rejects empty or whitespace-containing symbols and prices that are
    /// negative or not finite.
    pub fn new(symbol: impl Into<String>, new_price: f64) -> NotifierResult<Self> {
        let symbol = symbol.into();
        validate(&symbol, new_price)?;
        Ok(Self { symbol, new_price })
    }
}

pub(crate) fn validate(symbol: &str, price: f64) -> NotifierResult<()> {
    if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
        return Err(NotifierError::InvalidSymbol(symbol.to_string()));
    }

    if !price.is_finite() || price < 0.0 {
        return Err(NotifierError::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        });
    }

    Ok(())
}

/// Prices are stored and reported with two fractional digits.
pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

/// Persisted history entry, encoded as `"<price:.2>|<unix seconds>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub symbol: String,
    pub price: f64,
    pub timestamp: i64,
}

impl PriceRecord {
    pub fn encode(&self) -> String {
        format!("{}|{}", format_price(self.price), self.timestamp)
    }

    /// `None` for entries that do not follow the encoding.
    pub fn decode(symbol: &str, entry: &str) -> Option<Self> {
        let (price, ts) = entry.split_once('|')?;

        Some(Self {
            symbol: symbol.to_string(),
            price: price.parse().ok()?,
            timestamp: ts.parse().ok()?,
        })
    }
}

/// Magnitude of a price move relative to the previously stored price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceChange {
    /// `|new - prior| / prior * 100`
    Percent(f64),
    /// No usable prior price to compare against (prior is zero, new is not).
    Undefined,
}

impl PriceChange {
    pub fn between(prior: f64, new: f64) -> Self {
        if prior > 0.0 {
            let pct = (new - prior).abs() / prior * 100.0;
            // Subnormal priors can overflow the ratio.
            return if pct.is_finite() { Self::Percent(pct) } else { Self::Undefined };
        }

        if new == 0.0 {
            Self::Percent(0.0)
        } else {
            Self::Undefined
        }
    }

    /// An undefined change always crosses: the first price seen for a
    /// symbol is reported to every observer.
    pub fn crosses(&self, threshold: f64) -> bool {
        match self {
            Self::Percent(p) => *p >= threshold,
            Self::Undefined => true,
        }
    }
}

impl fmt::Display for PriceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p:.2}%"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}
