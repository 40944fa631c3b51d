use chrono::{DateTime, Datelike, TimeZone};

use crate::models::ClassifiedTrade;

/// True when `trade` executed in the same calendar month as `now`, judged in
/// `now`'s time zone. Trades without a parsed timestamp never match.
pub fn in_month_of<Tz: TimeZone>(trade: &ClassifiedTrade, now: &DateTime<Tz>) -> bool {
    let Some(at) = trade.executed_at else {
        return false;
    };
    let local = at.with_timezone(&now.timezone());
    local.year() == now.year() && local.month() == now.month()
}

/// Keep the trades executed in the evaluation instant's calendar month.
pub fn filter_month<Tz: TimeZone>(
    trades: &[ClassifiedTrade],
    now: &DateTime<Tz>,
) -> Vec<ClassifiedTrade> {
    trades
        .iter()
        .filter(|t| in_month_of(t, now))
        .cloned()
        .collect()
}
