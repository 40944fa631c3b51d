use serde::{Deserialize, Serialize};

/// A row of `strategy_catalog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_uri: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_telegram: Option<bool>,
    #[serde(default)]
    pub default_qty: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StrategyRow {
    pub fn requires_telegram(&self) -> bool {
        self.requires_telegram.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramRow {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogName {
    pub id: String,
    pub name: String,
}

/// A row of `user_strategies`: one deployment of a catalog strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStrategyRow {
    pub id: String,
    pub user_id: String,
    pub strategy_id: String,
    #[serde(default)]
    pub broker_id: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub qty: Option<i64>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub config_version: Option<i64>,
    #[serde(default)]
    pub task_arn: Option<String>,
    #[serde(default)]
    pub last_task_status: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Insert payload for `user_strategies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserStrategy {
    pub user_id: String,
    pub strategy_id: String,
    pub broker_id: String,
    pub telegram_chat_id: Option<String>,
    pub qty: Option<i64>,
    pub dry_run: bool,
    pub active: bool,
    pub config_version: i64,
    pub updated_at: String,
}

/// Patch for an existing deployment. Every field is written, so `None`
/// clears the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStrategyUpdate {
    pub broker_id: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub qty: Option<i64>,
    pub dry_run: bool,
    pub updated_at: String,
}
