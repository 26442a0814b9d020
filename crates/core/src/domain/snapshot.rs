use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNAVAILABLE: &str = "Data Unavailable";

/// One scan of the watchlist, in watchlist order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub ticker: String,
    pub price: Option<f64>,
    pub headline: Option<String>,
}

impl SnapshotEntry {
    pub fn line(&self) -> String {
        let mut out = quote_line(&self.ticker, self.price);
        if let Some(headline) = self.headline.as_deref() {
            out.push_str(" | ");
            out.push_str(headline);
        }
        out
    }
}

impl MarketSnapshot {
    /// Newline-terminated lines, one per ticker.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.line());
            out.push('\n');
        }
        out
    }
}

pub fn quote_line(ticker: &str, price: Option<f64>) -> String {
    match price {
        Some(p) if p.is_finite() => format!("{ticker}: ${}", format_usd(p)),
        _ => format!("{ticker}: {UNAVAILABLE}"),
    }
}

/// Two decimals with comma thousands separators: `1234567.891` -> `1,234,567.89`.
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx != 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_usd_groups_thousands() {
        assert_eq!(format_usd(0.0), "0.00");
        assert_eq!(format_usd(999.999), "1,000.00");
        assert_eq!(format_usd(1234567.891), "1,234,567.89");
        assert_eq!(format_usd(123.4), "123.40");
        assert_eq!(format_usd(-4321.0), "-4,321.00");
        assert_eq!(format_usd(-0.001), "0.00");
    }

    #[test]
    fn quote_line_uses_sentinel() {
        assert_eq!(quote_line("AAPL", None), "AAPL: Data Unavailable");
        assert_eq!(quote_line("AAPL", Some(f64::NAN)), "AAPL: Data Unavailable");
        assert_eq!(quote_line("BTC-USD", Some(67123.456)), "BTC-USD: $67,123.46");
    }
}
