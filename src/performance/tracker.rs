use chrono::{DateTime, TimeZone};
use tracing::{info, warn};

use crate::backend::{Session, TradeLedger};
use crate::models::TradeRecord;
use crate::performance::{monthly_performance, MonthlyPerformance};

/// Keeps the latest ledger snapshot and the performance derived from it.
pub struct PerformanceTracker {
    ledger: Box<dyn TradeLedger>,
    session: Session,
    snapshot: Vec<TradeRecord>,
    latest: MonthlyPerformance,
}

impl PerformanceTracker {
    pub fn new(ledger: Box<dyn TradeLedger>, session: Session) -> Self {
        Self {
            ledger,
            session,
            snapshot: Vec::new(),
            latest: MonthlyPerformance::default(),
        }
    }

    /// Fetch the ledger and recompute. A failed fetch is logged and leaves an
    /// empty snapshot, so the result is the zero-state summary.
    pub async fn refresh<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> &MonthlyPerformance {
        self.snapshot = match self.ledger.fetch_trades(&self.session).await {
            Ok(trades) => trades,
            Err(e) => {
                warn!("Failed to load trades: {}", e);
                Vec::new()
            }
        };

        self.latest = monthly_performance(&self.snapshot, now);
        let s = &self.latest.summary;
        info!(
            "{}: {} closed | PnL {:+.2} | return {:+.2}% | win rate {:.1}%",
            self.latest.label(),
            s.trade_count,
            s.total_pnl,
            s.return_percent,
            s.win_rate
        );
        &self.latest
    }

    pub fn latest(&self) -> &MonthlyPerformance {
        &self.latest
    }

    pub fn snapshot(&self) -> &[TradeRecord] {
        &self.snapshot
    }

    /// Newest `limit` trades of the snapshot (the ledger already sorts them).
    pub fn recent_trades(&self, limit: usize) -> &[TradeRecord] {
        &self.snapshot[..self.snapshot.len().min(limit)]
    }
}
