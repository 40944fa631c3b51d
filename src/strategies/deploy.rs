use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::backend::{Session, StrategyStore};
use crate::error::{BackendError, DeployError};
use crate::models::{
    BrokerRow, NewUserStrategy, StrategyRow, TelegramRow, UserStrategyRow, UserStrategyUpdate,
};

/// User choices for deploying one catalog strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployForm {
    pub broker_id: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub qty: Option<i64>,
    pub dry_run: bool,
}

impl DeployForm {
    /// Defaults for a fresh deployment: catalog quantity (or 1), dry run on.
    pub fn for_strategy(strategy: &StrategyRow) -> Self {
        Self {
            broker_id: None,
            telegram_chat_id: None,
            qty: Some(strategy.default_qty.unwrap_or(1)),
            dry_run: true,
        }
    }

    /// Prefill from an existing deployment for editing.
    pub fn for_deployment(deployment: &UserStrategyRow) -> Self {
        Self {
            broker_id: deployment.broker_id.clone(),
            telegram_chat_id: deployment.telegram_chat_id.clone(),
            qty: Some(deployment.qty.unwrap_or(1)),
            dry_run: deployment.dry_run.unwrap_or(true),
        }
    }

    pub fn broker(&self) -> Option<&str> {
        non_blank(self.broker_id.as_deref())
    }

    pub fn telegram_chat(&self) -> Option<&str> {
        non_blank(self.telegram_chat_id.as_deref())
    }

    /// Quantity to store. Zero means "no quantity".
    pub fn quantity(&self) -> Result<Option<i64>, DeployError> {
        match self.qty {
            Some(q) if q < 0 => Err(DeployError::InvalidQuantity(q)),
            Some(0) | None => Ok(None),
            Some(q) => Ok(Some(q)),
        }
    }

    pub fn validate(
        &self,
        strategy: &StrategyRow,
        brokers: &[BrokerRow],
        chats: &[TelegramRow],
    ) -> Result<(), DeployError> {
        self.validate_for(strategy.requires_telegram(), brokers, chats)
    }

    /// Same checks as `validate` when only the telegram requirement of the
    /// strategy is known.
    pub fn validate_for(
        &self,
        requires_telegram: bool,
        brokers: &[BrokerRow],
        chats: &[TelegramRow],
    ) -> Result<(), DeployError> {
        let broker = self.broker().ok_or(DeployError::MissingBroker)?;
        if !brokers.iter().any(|b| b.id == broker) {
            return Err(DeployError::UnknownBroker(broker.to_string()));
        }

        match self.telegram_chat() {
            Some(chat) if !chats.iter().any(|c| c.id == chat) => {
                return Err(DeployError::UnknownTelegramChat(chat.to_string()));
            }
            None if requires_telegram => return Err(DeployError::TelegramRequired),
            _ => {}
        }

        self.quantity()?;
        Ok(())
    }

    pub fn to_payload(
        &self,
        session: &Session,
        strategy: &StrategyRow,
        now: DateTime<Utc>,
    ) -> Result<NewUserStrategy, DeployError> {
        Ok(NewUserStrategy {
            user_id: session.user_id.clone(),
            strategy_id: strategy.id.clone(),
            broker_id: self.broker().ok_or(DeployError::MissingBroker)?.to_string(),
            telegram_chat_id: self.telegram_chat().map(str::to_string),
            qty: self.quantity()?,
            dry_run: self.dry_run,
            active: true,
            config_version: 0,
            updated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub fn to_update(&self, now: DateTime<Utc>) -> Result<UserStrategyUpdate, DeployError> {
        Ok(UserStrategyUpdate {
            broker_id: Some(self.broker().ok_or(DeployError::MissingBroker)?.to_string()),
            telegram_chat_id: self.telegram_chat().map(str::to_string),
            qty: self.quantity()?,
            dry_run: self.dry_run,
            updated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Catalog defaults for `strategy_id`, the starting point for a deploy.
pub async fn deploy_form(
    store: &dyn StrategyStore,
    session: &Session,
    strategy_id: &str,
) -> Result<DeployForm, DeployError> {
    let catalog = store.list_catalog(session).await?;
    catalog
        .iter()
        .find(|s| s.id == strategy_id)
        .map(DeployForm::for_strategy)
        .ok_or_else(|| DeployError::UnknownStrategy(strategy_id.to_string()))
}

/// Validate `form` against the user's brokers and chats and record the
/// deployment for the worker to pick up.
pub async fn deploy_strategy(
    store: &dyn StrategyStore,
    session: &Session,
    strategy_id: &str,
    form: &DeployForm,
) -> Result<UserStrategyRow, DeployError> {
    let catalog = store.list_catalog(session).await?;
    let strategy = catalog
        .iter()
        .find(|s| s.id == strategy_id)
        .ok_or_else(|| DeployError::UnknownStrategy(strategy_id.to_string()))?;

    let brokers = store.list_brokers(session).await?;
    let chats = store.list_telegram_chats(session).await?;
    form.validate(strategy, &brokers, &chats)?;

    let payload = form.to_payload(session, strategy, Utc::now())?;
    let row = store
        .insert_user_strategy(session, &payload)
        .await
        .map_err(|e| match e {
            BackendError::Conflict(_) => DeployError::AlreadyDeployed,
            other => DeployError::Backend(other),
        })?;

    info!(
        "Deployed {} ({}) as {}{}",
        strategy.name,
        strategy.id,
        row.id,
        if payload.dry_run { " [dry run]" } else { "" }
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{session, strategy};

    fn brokers() -> Vec<BrokerRow> {
        vec![BrokerRow {
            id: "b1".to_string(),
            name: "Zerodha".to_string(),
        }]
    }

    fn chats() -> Vec<TelegramRow> {
        vec![TelegramRow {
            id: "t1".to_string(),
            label: Some("alerts".to_string()),
        }]
    }

    fn form(broker: Option<&str>, chat: Option<&str>, qty: Option<i64>) -> DeployForm {
        DeployForm {
            broker_id: broker.map(str::to_string),
            telegram_chat_id: chat.map(str::to_string),
            qty,
            dry_run: true,
        }
    }

    #[test]
    fn defaults_come_from_catalog() {
        let mut s = strategy("s1", "Breakout", false);
        assert_eq!(DeployForm::for_strategy(&s).qty, Some(1));
        s.default_qty = Some(25);
        let f = DeployForm::for_strategy(&s);
        assert_eq!(f.qty, Some(25));
        assert!(f.dry_run);
        assert!(f.broker_id.is_none());
    }

    #[test]
    fn broker_is_required() {
        let s = strategy("s1", "Breakout", false);
        let err = form(None, None, Some(1)).validate(&s, &brokers(), &chats());
        assert!(matches!(err, Err(DeployError::MissingBroker)));

        let blank = form(Some("  "), None, Some(1)).validate(&s, &brokers(), &chats());
        assert!(matches!(blank, Err(DeployError::MissingBroker)));
    }

    #[test]
    fn telegram_required_when_strategy_says_so() {
        let s = strategy("s1", "Signals", true);
        let err = form(Some("b1"), None, Some(1)).validate(&s, &brokers(), &chats());
        assert!(matches!(err, Err(DeployError::TelegramRequired)));
        assert!(form(Some("b1"), Some("t1"), Some(1))
            .validate(&s, &brokers(), &chats())
            .is_ok());
    }

    #[test]
    fn foreign_broker_or_chat_is_rejected() {
        let s = strategy("s1", "Breakout", false);
        assert!(matches!(
            form(Some("b9"), None, None).validate(&s, &brokers(), &chats()),
            Err(DeployError::UnknownBroker(_))
        ));
        assert!(matches!(
            form(Some("b1"), Some("t9"), None).validate(&s, &brokers(), &chats()),
            Err(DeployError::UnknownTelegramChat(_))
        ));
    }

    #[test]
    fn quantity_rules() {
        assert_eq!(form(None, None, Some(0)).quantity().unwrap(), None);
        assert_eq!(form(None, None, Some(3)).quantity().unwrap(), Some(3));
        assert!(matches!(
            form(None, None, Some(-2)).quantity(),
            Err(DeployError::InvalidQuantity(-2))
        ));
    }

    #[test]
    fn edit_form_prefills_from_deployment() {
        let d = UserStrategyRow {
            id: "us-1".to_string(),
            user_id: "user-1".to_string(),
            strategy_id: "s1".to_string(),
            broker_id: Some("b1".to_string()),
            telegram_chat_id: None,
            qty: None,
            dry_run: Some(false),
            active: Some(true),
            config_version: Some(3),
            task_arn: None,
            last_task_status: None,
            last_seen: None,
            created_at: None,
            updated_at: None,
        };
        let f = DeployForm::for_deployment(&d);
        assert_eq!(f.broker_id.as_deref(), Some("b1"));
        assert_eq!(f.qty, Some(1));
        assert!(!f.dry_run);
    }

    #[test]
    fn update_carries_every_editable_field() {
        let now = DateTime::parse_from_rfc3339("2024-05-10T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let u = form(Some("b1"), Some(" "), Some(0)).to_update(now).unwrap();
        assert_eq!(u.broker_id.as_deref(), Some("b1"));
        assert!(u.telegram_chat_id.is_none());
        assert!(u.qty.is_none());
        assert!(u.dry_run);
        assert_eq!(u.updated_at, "2024-05-10T08:30:00.000Z");

        assert!(matches!(
            form(None, None, Some(1)).to_update(now),
            Err(DeployError::MissingBroker)
        ));
    }

    #[test]
    fn payload_is_active_with_version_zero() {
        let s = strategy("s1", "Breakout", false);
        let now = DateTime::parse_from_rfc3339("2024-05-10T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let p = form(Some("b1"), Some(""), Some(2))
            .to_payload(&session(), &s, now)
            .unwrap();
        assert_eq!(p.user_id, session().user_id);
        assert_eq!(p.strategy_id, "s1");
        assert_eq!(p.broker_id, "b1");
        assert!(p.telegram_chat_id.is_none());
        assert_eq!(p.qty, Some(2));
        assert!(p.active);
        assert_eq!(p.config_version, 0);
        assert_eq!(p.updated_at, "2024-05-10T08:30:00.000Z");
    }
}
