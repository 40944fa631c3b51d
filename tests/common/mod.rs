use chrono::{DateTime, Utc};
use trade_dashboard::backend::{MemoryBackend, Session};
use trade_dashboard::models::{BrokerAccount, StrategyRow, TelegramSetup, TradeRecord};

pub const USER: &str = "user-1";

pub fn session() -> Session {
    Session::new(USER, "test-token")
}

pub fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .with_timezone(&Utc)
}

/// Build ledger rows from (instrument, position, price, date_time) tuples,
/// numbered from 1 and owned by `USER`.
pub fn ledger(rows: &[(&str, &str, Option<f64>, Option<&str>)]) -> Vec<TradeRecord> {
    rows.iter()
        .enumerate()
        .map(|(i, &(instrument, position, price, date_time))| TradeRecord {
            id: i as i64 + 1,
            user: Some(USER.to_string()),
            stock_option: Some(instrument.to_string()),
            position: Some(position.to_string()),
            price,
            date_time: date_time.map(str::to_string),
        })
        .collect()
}

pub fn catalog_entry(id: &str, name: &str, requires_telegram: bool, active: bool) -> StrategyRow {
    StrategyRow {
        id: id.to_string(),
        name: name.to_string(),
        image_uri: format!("https://cdn.example.com/{}.png", id),
        description: Some(format!("{} strategy", name)),
        requires_telegram: Some(requires_telegram),
        default_qty: Some(2),
        active: Some(active),
        created_at: None,
    }
}

pub fn broker_account(id: &str, owner: &str, name: &str) -> BrokerAccount {
    BrokerAccount {
        id: id.to_string(),
        user_id: owner.to_string(),
        name: name.to_string(),
        platform: "alpaca".to_string(),
        api_key: format!("key-{}", id),
        api_secret: Some(format!("secret-{}", id)),
        auth_token: None,
        client_id: None,
        mpin: None,
        totp: None,
        notes: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn telegram_setup(id: &str, owner: &str, label: Option<&str>) -> TelegramSetup {
    TelegramSetup {
        id: id.to_string(),
        user_id: owner.to_string(),
        bot_token: "123456:ABC".to_string(),
        chat_id: "-100200300".to_string(),
        label: label.map(str::to_string),
        created_at: None,
        updated_at: None,
    }
}

/// Backend with a small catalog, one broker and one labeled chat for `USER`.
pub async fn strategy_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.add_strategy(catalog_entry("s-orb", "Opening Range Breakout", false, true)).await;
    backend.add_strategy(catalog_entry("s-alert", "Alert Scalper", true, true)).await;
    backend.add_strategy(catalog_entry("s-old", "Retired Grid", false, false)).await;
    backend.add_broker(broker_account("b-1", USER, "Alpaca")).await;
    backend.add_broker(broker_account("b-2", "someone-else", "Other")).await;
    backend.add_telegram_chat(telegram_setup("t-1", USER, Some("Fills"))).await;
    backend
}
