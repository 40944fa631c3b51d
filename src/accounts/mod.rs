pub mod broker;
pub mod telegram;

pub use broker::{add_broker, find_broker, remove_broker, update_broker, BrokerForm};
pub use telegram::{
    add_telegram_chat, find_telegram_chat, remove_telegram_chat, update_telegram_chat,
    TelegramForm,
};

/// Trimmed value, None when blank.
fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
