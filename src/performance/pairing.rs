use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{ClassifiedTrade, ClosedPosition, OpenPosition, PositionSide};

/// Trades the pairing scan skipped, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingStats {
    pub missing_instrument: usize,
    pub unknown_side: usize,
    pub unmatched_exits: usize,
    pub stacked_entries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PairingOutcome {
    pub closed: Vec<ClosedPosition>,
    pub open: Vec<OpenPosition>,
    pub stats: PairingStats,
}

/// Match entries with exits per instrument.
///
/// Each instrument's trades are scanned oldest first. A trade without a
/// timestamp compares equal to every other trade, so it keeps its input
/// position relative to its neighbours. At most one entry is open per instrument: a
/// second entry is ignored while one is open, and an exit with nothing open
/// is dropped. Entries still open at the end come back in `open`.
pub fn pair_positions(trades: &[ClassifiedTrade]) -> PairingOutcome {
    let mut outcome = PairingOutcome::default();

    // Instruments in order of first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ClassifiedTrade>> = HashMap::new();

    for trade in trades {
        let Some(instrument) = trade.instrument.as_deref() else {
            outcome.stats.missing_instrument += 1;
            continue;
        };
        groups
            .entry(instrument)
            .or_insert_with(|| {
                order.push(instrument);
                Vec::new()
            })
            .push(trade);
    }

    for instrument in order {
        let Some(mut group) = groups.remove(instrument) else {
            continue;
        };
        sort_by_time(&mut group);

        let mut open_entry: Option<&ClassifiedTrade> = None;
        for trade in group {
            match (trade.side, open_entry) {
                (PositionSide::Entry, None) => open_entry = Some(trade),
                (PositionSide::Entry, Some(_)) => outcome.stats.stacked_entries += 1,
                (PositionSide::Exit, Some(entry)) => {
                    outcome.closed.push(ClosedPosition {
                        instrument: instrument.to_string(),
                        entry: entry.clone(),
                        exit: trade.clone(),
                    });
                    open_entry = None;
                }
                (PositionSide::Exit, None) => outcome.stats.unmatched_exits += 1,
                (PositionSide::Unknown, _) => outcome.stats.unknown_side += 1,
            }
        }

        if let Some(entry) = open_entry {
            outcome.open.push(OpenPosition {
                instrument: instrument.to_string(),
                entry: entry.clone(),
            });
        }
    }

    outcome
}

fn by_time(a: &ClassifiedTrade, b: &ClassifiedTrade) -> Ordering {
    match (a.executed_at, b.executed_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

/// Stable insertion sort on `by_time`.
///
/// `by_time` is not a total order once a timestamp is missing, which
/// `slice::sort_by` does not allow, so elements are only moved past
/// neighbours that compare strictly greater.
fn sort_by_time(group: &mut [&ClassifiedTrade]) {
    for i in 1..group.len() {
        let mut j = i;
        while j > 0 && by_time(group[j - 1], group[j]) == Ordering::Greater {
            group.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::classified;

    #[test]
    fn pairs_entry_with_following_exit() {
        let trades = vec![
            classified(1, "AAPL", "entry", Some(100.0), Some(1)),
            classified(2, "AAPL", "exit", Some(110.0), Some(2)),
        ];
        let out = pair_positions(&trades);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].entry.id, 1);
        assert_eq!(out.closed[0].exit.id, 2);
        assert!(out.open.is_empty());
    }

    #[test]
    fn sorts_by_timestamp_not_input_order() {
        let trades = vec![
            classified(1, "A", "entry", Some(12.0), Some(2)),
            classified(2, "A", "entry", Some(10.0), Some(1)),
            classified(3, "A", "exit", Some(15.0), Some(3)),
        ];
        let out = pair_positions(&trades);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].entry.id, 2);
        assert_eq!(out.stats.stacked_entries, 1);
    }

    #[test]
    fn exit_without_entry_is_dropped() {
        let trades = vec![classified(1, "A", "exit", Some(10.0), Some(1))];
        let out = pair_positions(&trades);
        assert!(out.closed.is_empty());
        assert_eq!(out.stats.unmatched_exits, 1);
    }

    #[test]
    fn trailing_entry_stays_open() {
        let trades = vec![
            classified(1, "A", "buy", Some(10.0), Some(1)),
            classified(2, "A", "sell", Some(11.0), Some(2)),
            classified(3, "A", "buy", Some(12.0), Some(3)),
        ];
        let out = pair_positions(&trades);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.open.len(), 1);
        assert_eq!(out.open[0].entry.id, 3);
    }

    #[test]
    fn skips_missing_instrument_and_unknown_side() {
        let mut orphan = classified(1, "A", "entry", Some(10.0), Some(1));
        orphan.instrument = None;
        let trades = vec![
            orphan,
            classified(2, "A", "hold", Some(10.0), Some(2)),
            classified(3, "A", "entry", Some(10.0), Some(3)),
            classified(4, "A", "cutoff", Some(9.0), Some(4)),
        ];
        let out = pair_positions(&trades);
        assert_eq!(out.stats.missing_instrument, 1);
        assert_eq!(out.stats.unknown_side, 1);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].entry.id, 3);
    }

    #[test]
    fn untimestamped_exit_keeps_its_place_before_a_timed_entry() {
        let trades = vec![
            classified(1, "A", "exit", Some(11.0), None),
            classified(2, "A", "entry", Some(10.0), Some(5)),
        ];
        let out = pair_positions(&trades);
        assert!(out.closed.is_empty());
        assert_eq!(out.stats.unmatched_exits, 1);
        assert_eq!(out.open.len(), 1);
        assert_eq!(out.open[0].entry.id, 2);
    }

    #[test]
    fn untimestamped_trades_tie_with_their_neighbours() {
        let trades = vec![
            classified(1, "A", "exit", Some(11.0), None),
            classified(2, "A", "entry", Some(10.0), Some(5)),
            classified(3, "A", "exit", Some(12.0), None),
        ];
        let out = pair_positions(&trades);
        assert_eq!(out.stats.unmatched_exits, 1);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].entry.id, 2);
        assert_eq!(out.closed[0].exit.id, 3);
    }

    #[test]
    fn instruments_are_paired_independently() {
        let trades = vec![
            classified(1, "A", "entry", Some(10.0), Some(1)),
            classified(2, "B", "entry", Some(20.0), Some(2)),
            classified(3, "B", "exit", Some(25.0), Some(3)),
            classified(4, "A", "exit", Some(9.0), Some(4)),
        ];
        let out = pair_positions(&trades);
        let names: Vec<&str> = out.closed.iter().map(|p| p.instrument.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
