use serde::{Deserialize, Serialize};

use crate::models::ClosedPosition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_pnl: f64,
    pub return_percent: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub winning_count: usize,
    pub entry_value: f64,
}

impl PerformanceSummary {
    pub fn is_empty(&self) -> bool {
        self.trade_count == 0
    }
}

/// Reduce closed positions to realized P&L, return on entry value and win
/// rate. Positions missing either price are left out entirely.
pub fn summarize(closed: &[ClosedPosition]) -> PerformanceSummary {
    let mut total_pnl = 0.0;
    let mut entry_value = 0.0;
    let mut trade_count = 0;
    let mut winning_count = 0;

    for pos in closed {
        let (Some(entry), Some(exit)) = (pos.entry.price, pos.exit.price) else {
            continue;
        };
        let pnl = exit - entry;
        total_pnl += pnl;
        entry_value += entry;
        trade_count += 1;
        if pnl > 0.0 {
            winning_count += 1;
        }
    }

    let return_percent = if entry_value > 0.0 {
        total_pnl / entry_value * 100.0
    } else {
        0.0
    };
    let win_rate = if trade_count > 0 {
        winning_count as f64 / trade_count as f64 * 100.0
    } else {
        0.0
    };

    PerformanceSummary {
        total_pnl,
        return_percent,
        win_rate,
        trade_count,
        winning_count,
        entry_value,
    }
}
