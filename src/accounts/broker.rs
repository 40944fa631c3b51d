use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::optional;
use crate::backend::{AccountStore, Session};
use crate::error::{AccountError, BackendError};
use crate::models::{BrokerAccount, BrokerAccountPayload};

/// Editable fields of a broker credential set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerForm {
    pub name: String,
    pub platform: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    pub auth_token: Option<String>,
    pub client_id: Option<String>,
    pub mpin: Option<String>,
    pub totp: Option<String>,
    pub notes: Option<String>,
}

impl BrokerForm {
    pub fn new(name: &str, platform: &str, api_key: &str) -> Self {
        Self {
            name: name.to_string(),
            platform: platform.to_string(),
            api_key: api_key.to_string(),
            ..Self::default()
        }
    }

    /// Prefill from a stored row for editing.
    pub fn from_account(account: &BrokerAccount) -> Self {
        Self {
            name: account.name.clone(),
            platform: account.platform.clone(),
            api_key: account.api_key.clone(),
            api_secret: account.api_secret.clone(),
            auth_token: account.auth_token.clone(),
            client_id: account.client_id.clone(),
            mpin: account.mpin.clone(),
            totp: account.totp.clone(),
            notes: account.notes.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        let required = [&self.name, &self.platform, &self.api_key];
        if required.iter().any(|v| v.trim().is_empty()) {
            return Err(AccountError::MissingBrokerFields);
        }
        Ok(())
    }

    pub fn to_payload(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<BrokerAccountPayload, AccountError> {
        self.validate()?;
        Ok(BrokerAccountPayload {
            user_id: session.user_id.clone(),
            name: self.name.trim().to_string(),
            platform: self.platform.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            api_secret: optional(self.api_secret.as_deref()),
            auth_token: optional(self.auth_token.as_deref()),
            client_id: optional(self.client_id.as_deref()),
            mpin: optional(self.mpin.as_deref()),
            totp: optional(self.totp.as_deref()),
            notes: optional(self.notes.as_deref()),
            updated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

pub async fn add_broker(
    store: &dyn AccountStore,
    session: &Session,
    form: &BrokerForm,
) -> Result<BrokerAccount, AccountError> {
    let payload = form.to_payload(session, Utc::now())?;
    let row = store.insert_broker_account(session, &payload).await?;
    info!("Added broker {} ({}) as {}", row.name, row.platform, row.id);
    Ok(row)
}

pub async fn update_broker(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
    form: &BrokerForm,
) -> Result<BrokerAccount, AccountError> {
    let payload = form.to_payload(session, Utc::now())?;
    let row = store.update_broker_account(session, id, &payload).await?;
    info!("Updated broker {}", row.id);
    Ok(row)
}

pub async fn remove_broker(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
) -> Result<(), AccountError> {
    store.delete_broker_account(session, id).await?;
    info!("Removed broker {}", id);
    Ok(())
}

/// One of the user's broker rows by id.
pub async fn find_broker(
    store: &dyn AccountStore,
    session: &Session,
    id: &str,
) -> Result<BrokerAccount, AccountError> {
    store
        .list_broker_accounts(session)
        .await?
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| BackendError::NotFound(format!("user_brokers {}", id)).into())
}
