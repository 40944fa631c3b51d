use chrono::{DateTime, Duration, Utc};

use crate::backend::Session;
use crate::config::Config;
use crate::models::{ClassifiedTrade, ClosedPosition, PositionSide, StrategyRow, TradeRecord};

/// Evaluation instant used across tests: mid-May 2024, UTC.
pub fn eval_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-20T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn session() -> Session {
    Session::new("user-1", "test-token")
}

/// A ledger row owned by the test session's user.
pub fn record(
    id: i64,
    instrument: &str,
    position: &str,
    price: Option<f64>,
    date_time: Option<&str>,
) -> TradeRecord {
    TradeRecord {
        id,
        user: Some("user-1".to_string()),
        stock_option: Some(instrument.to_string()),
        position: Some(position.to_string()),
        price,
        date_time: date_time.map(str::to_string),
    }
}

/// A classified trade `hour` hours after 2024-05-01 00:00 UTC.
pub fn classified(
    id: i64,
    instrument: &str,
    position: &str,
    price: Option<f64>,
    hour: Option<i64>,
) -> ClassifiedTrade {
    let base = DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    ClassifiedTrade {
        id,
        instrument: Some(instrument.to_string()),
        side: PositionSide::classify(Some(position)),
        price,
        executed_at: hour.map(|h| base + Duration::hours(h)),
    }
}

pub fn closed_pair(instrument: &str, entry: Option<f64>, exit: Option<f64>) -> ClosedPosition {
    ClosedPosition {
        instrument: instrument.to_string(),
        entry: classified(1, instrument, "entry", entry, Some(1)),
        exit: classified(2, instrument, "exit", exit, Some(2)),
    }
}

pub fn strategy(id: &str, name: &str, requires_telegram: bool) -> StrategyRow {
    StrategyRow {
        id: id.to_string(),
        name: name.to_string(),
        image_uri: String::new(),
        description: None,
        requires_telegram: Some(requires_telegram),
        default_qty: None,
        active: Some(true),
        created_at: None,
    }
}

/// A Config suitable for testing — fixed session, UTC, quiet logging.
pub fn default_test_config() -> Config {
    Config {
        supabase_url: "https://example.supabase.co".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        http_timeout_secs: 5,
        user_id: "user-1".to_string(),
        access_token: "test-token".to_string(),
        timezone: Some("UTC".to_string()),
        recent_trades_limit: 20,
        log_level: "ERROR".to_string(),
    }
}
