pub mod month_filter;
pub mod pairing;
pub mod summary;
pub mod tracker;

pub use month_filter::{filter_month, in_month_of};
pub use pairing::{pair_positions, PairingOutcome, PairingStats};
pub use summary::{summarize, PerformanceSummary};
pub use tracker::PerformanceTracker;

use chrono::{DateTime, Datelike, TimeZone};
use tracing::debug;

use crate::models::{ClassifiedTrade, ClosedPosition, OpenPosition, TradeRecord};

/// Month-to-date performance derived from one ledger snapshot.
#[derive(Debug, Clone, Default)]
pub struct MonthlyPerformance {
    pub year: i32,
    pub month: u32,
    pub trades_in_month: usize,
    pub summary: PerformanceSummary,
    pub closed: Vec<ClosedPosition>,
    pub open: Vec<OpenPosition>,
    pub stats: PairingStats,
}

impl MonthlyPerformance {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Classify, keep `now`'s calendar month, pair, summarize.
pub fn monthly_performance<Tz: TimeZone>(
    records: &[TradeRecord],
    now: &DateTime<Tz>,
) -> MonthlyPerformance {
    let tz = now.timezone();
    let classified: Vec<ClassifiedTrade> = records.iter().map(|r| r.classify(&tz)).collect();
    let in_month = filter_month(&classified, now);
    let pairing = pair_positions(&in_month);
    let summary = summarize(&pairing.closed);

    debug!(
        "{} of {} trades in {:04}-{:02}: {} closed, {} open, {} unmatched exits, {} stacked entries",
        in_month.len(),
        records.len(),
        now.year(),
        now.month(),
        pairing.closed.len(),
        pairing.open.len(),
        pairing.stats.unmatched_exits,
        pairing.stats.stacked_entries,
    );

    MonthlyPerformance {
        year: now.year(),
        month: now.month(),
        trades_in_month: in_month.len(),
        summary,
        closed: pairing.closed,
        open: pairing.open,
        stats: pairing.stats,
    }
}
