use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "<redacted>";

/// A full row of `user_brokers`: one set of broker API credentials.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub platform: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub mpin: Option<String>,
    #[serde(default)]
    pub totp: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl fmt::Debug for BrokerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("api_key", &REDACTED)
            .field("client_id", &self.client_id)
            .field("notes", &self.notes)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Insert and update payload for `user_brokers`. Optional fields go out as
/// `null` so an update clears them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccountPayload {
    pub user_id: String,
    pub name: String,
    pub platform: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    pub auth_token: Option<String>,
    pub client_id: Option<String>,
    pub mpin: Option<String>,
    pub totp: Option<String>,
    pub notes: Option<String>,
    pub updated_at: String,
}

impl fmt::Debug for BrokerAccountPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerAccountPayload")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("api_key", &REDACTED)
            .field("client_id", &self.client_id)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A full row of `user_telegram_chats`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramSetup {
    pub id: String,
    pub user_id: String,
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl fmt::Debug for TelegramSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSetup")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("bot_token", &REDACTED)
            .field("chat_id", &self.chat_id)
            .field("label", &self.label)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramSetupPayload {
    pub user_id: String,
    pub bot_token: String,
    pub chat_id: String,
    pub label: Option<String>,
    pub updated_at: String,
}
