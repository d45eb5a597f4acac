use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::model::{PriceRecord, format_price};

/// IST (UTC+05:30), the zone history timestamps are rendered in.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Full price history of one symbol, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReport {
    pub symbol: String,
    pub records: Vec<PriceRecord>,
    /// Stored entries that could not be decoded.
    pub skipped: usize,
}

impl HistoryReport {
    pub fn latest(&self) -> Option<&PriceRecord> {
        self.records.last()
    }
}

fn render_time(ts: i64) -> String {
    let Some(ist) = FixedOffset::east_opt(IST_OFFSET_SECS) else {
        return ts.to_string();
    };

    DateTime::from_timestamp(ts, 0)
        .map(|t| t.with_timezone(&ist).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

impl fmt::Display for HistoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stock history for {}:", self.symbol)?;
        writeln!(f, "{:<10} | {:<10} | {:<25}", "Symbol", "Price", "Time (IST)")?;
        writeln!(f, "{}", "-".repeat(50))?;

        for r in &self.records {
            writeln!(
                f,
                "{:<10} | {:<10} | {:<25}",
                r.symbol,
                format_price(r.price),
                render_time(r.timestamp)
            )?;
        }

        if self.skipped > 0 {
            writeln!(f, "({} unreadable entries skipped)", self.skipped)?;
        }

        Ok(())
    }
}
