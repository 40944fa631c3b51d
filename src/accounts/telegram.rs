use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::optional;
use crate::backend::{AccountStore, Session};
use crate::error::{AccountError, BackendError};
use crate::models::{TelegramSetup, TelegramSetupPayload};

/// Bot token and destination chat for trade notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelegramForm {
    pub bot_token: String,
    pub chat_id: String,
    pub label: Option<String>,
}

impl TelegramForm {
    pub fn new(bot_token: &str, chat_id: &str, label: Option<&str>) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            label: label.map(str::to_string),
        }
    }

    pub fn from_setup(setup: &TelegramSetup) -> Self {
        Self {
            bot_token: setup.bot_token.clone(),
            chat_id: setup.chat_id.clone(),
            label: setup.label.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        if self.bot_token.trim().is_empty() || self.chat_id.trim().is_empty() {
            return Err(AccountError::MissingTelegramFields);
        }
        Ok(())
    }

    pub fn to_payload(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<TelegramSetupPayload, AccountError> {
        self.validate()?;
        Ok(TelegramSetupPayload {
            user_id: session.user_id.clone(),
            bot_token: self.bot_token.trim().to_string(),
            chat_id: self.chat_id.trim().to_string(),
            label: optional(self.label.as_deref()),
            updated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

pub async fn add_telegram_chat(
    store: &dyn AccountStore,
    session: &Session,
    form: &TelegramForm,
) -> Result<TelegramSetup, AccountError> {
    let payload = form.to_payload(session, Utc::now())?;
    let row = store.insert_telegram_setup(session, &payload).await?;
    info!("Added telegram chat {}", row.id);
    Ok(row)
}

pub async fn update_telegram_chat(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
    form: &TelegramForm,
) -> Result<TelegramSetup, AccountError> {
    let payload = form.to_payload(session, Utc::now())?;
    let row = store.update_telegram_setup(session, id, &payload).await?;
    info!("Updated telegram chat {}", row.id);
    Ok(row)
}

pub async fn remove_telegram_chat(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
) -> Result<(), AccountError> {
    store.delete_telegram_setup(session, id).await?;
    info!("Removed telegram chat {}", id);
    Ok(())
}

pub async fn find_telegram_chat(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
) -> Result<TelegramSetup, AccountError> {
    store
        .list_telegram_setups(session)
        .await?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| BackendError::NotFound(format!("user_telegram_chats {}", id)).into())
}
