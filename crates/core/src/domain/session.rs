use crate::domain::snapshot::MarketSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Per-user state for the dashboard. Lives only as long as the process that created it.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    market_snapshot: Option<MarketSnapshot>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            market_snapshot: None,
        }
    }

    /// Last scan wins.
    pub fn record_scan(&mut self, snapshot: MarketSnapshot) {
        self.market_snapshot = Some(snapshot);
    }

    /// Display string of the last scan, if any.
    pub fn market_context(&self) -> Option<String> {
        self.market_snapshot.as_ref().map(MarketSnapshot::display)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::SnapshotEntry;

    fn snapshot(ticker: &str, price: f64) -> MarketSnapshot {
        MarketSnapshot {
            generated_at: Utc::now(),
            entries: vec![SnapshotEntry {
                ticker: ticker.to_string(),
                price: Some(price),
                headline: None,
            }],
        }
    }

    #[test]
    fn new_session_has_no_context() {
        let session = Session::new();
        assert!(session.market_context().is_none());
    }

    #[test]
    fn last_scan_wins() {
        let mut session = Session::new();
        session.record_scan(snapshot("NVDA", 1.0));
        session.record_scan(snapshot("AMD", 2.0));
        assert_eq!(session.market_context().as_deref(), Some("AMD: $2.00\n"));
    }

    #[test]
    fn sessions_get_distinct_ids() {
        assert_ne!(Session::new().id, Session::new().id);
    }
}
