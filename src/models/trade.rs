use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::position::{ClassifiedTrade, PositionSide};

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A row of the `trades` ledger table, exactly as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub stock_option: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub date_time: Option<String>,
}

impl TradeRecord {
    pub fn side(&self) -> PositionSide {
        PositionSide::classify(self.position.as_deref())
    }

    /// Instrument identifier, None when missing or blank.
    pub fn instrument(&self) -> Option<&str> {
        self.stock_option
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Parse `date_time`, reading naive timestamps as wall-clock time in `tz`.
    pub fn executed_at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        parse_timestamp(self.date_time.as_deref()?, tz)
    }

    pub fn classify<Tz: TimeZone>(&self, tz: &Tz) -> ClassifiedTrade {
        ClassifiedTrade {
            id: self.id,
            instrument: self.instrument().map(str::to_string),
            side: self.side(),
            price: self.price,
            executed_at: self.executed_at(tz),
        }
    }
}

/// Parse an ISO-style timestamp.
///
/// Offsets are honoured; naive datetimes are wall-clock time in `tz`; a bare
/// date is midnight UTC. Returns None for anything else.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(resolve_local(&naive, tz));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Wall-clock time in `tz`. Ambiguous times take the earlier instant; times
/// skipped by a forward transition move forward by the usual one-hour gap,
/// and anything still unresolved is read as UTC.
fn resolve_local<Tz: TimeZone>(naive: &NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    tz.from_local_datetime(naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-03T10:00:00+02:00", &Utc).unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn parses_postgres_short_offset() {
        let ts = parse_timestamp("2024-05-03 10:00:00.123+00", &Utc).unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn naive_timestamp_uses_given_zone() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let ts = parse_timestamp("2024-05-03T10:00:00", &tz).unwrap();
        assert_eq!(ts.hour(), 5);

        let spaced = parse_timestamp("2024-05-03 10:00:00.5", &tz).unwrap();
        assert_eq!(spaced.hour(), 5);
    }

    #[test]
    fn bare_date_is_utc_midnight() {
        let tz = FixedOffset::west_opt(4 * 3600).unwrap();
        let ts = parse_timestamp("2024-05-03", &tz).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-03T00:00:00+00:00");
    }

    #[test]
    fn naive_time_in_spring_forward_gap_moves_past_it() {
        let ny = chrono_tz::America::New_York;
        // 02:30 does not exist on 2024-03-10 in New York; 03:30 EDT does.
        let ts = parse_timestamp("2024-03-10T02:30:00", &ny).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-10T07:30:00+00:00");

        // Ambiguous fall-back hour resolves to the earlier (EDT) reading.
        let ts = parse_timestamp("2024-11-03T01:30:00", &ny).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-11-03T05:30:00+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("", &Utc).is_none());
        assert!(parse_timestamp("yesterday", &Utc).is_none());
        assert!(parse_timestamp("2024-13-40T00:00:00", &Utc).is_none());
    }

    #[test]
    fn deserializes_ledger_row_with_nulls() {
        let json = r#"{"id": 7, "user": "u1", "stock_option": null,
                       "position": "Buy", "price": null, "date_time": null}"#;
        let rec: TradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, 7);
        assert_eq!(rec.side(), PositionSide::Entry);
        assert!(rec.instrument().is_none());
        assert!(rec.executed_at(&Utc).is_none());
    }

    #[test]
    fn blank_instrument_counts_as_missing() {
        let rec = TradeRecord {
            id: 1,
            user: None,
            stock_option: Some("   ".to_string()),
            position: Some("entry".to_string()),
            price: Some(1.0),
            date_time: None,
        };
        assert!(rec.classify(&Utc).instrument.is_none());
    }
}
