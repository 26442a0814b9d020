pub mod provider;
pub mod types;
pub mod yahoo;

pub use provider::{fetch_history, fetch_quote, scan_watchlist, QuoteProvider};
