use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

use crate::backend::{AccountStore, Session, StrategyStore, TradeLedger};
use crate::error::{BackendError, BackendResult};
use crate::models::{
    parse_timestamp, BrokerAccount, BrokerAccountPayload, BrokerRow, CatalogName,
    NewUserStrategy, StrategyRow, TelegramRow, TelegramSetup, TelegramSetupPayload, TradeRecord,
    UserStrategyRow, UserStrategyUpdate,
};

/// A backend that keeps every table in memory.
///
/// Queries apply the same user scoping and ordering as the hosted tables,
/// and an active deployment is unique per (user, strategy).
#[derive(Default)]
pub struct MemoryBackend {
    trades: RwLock<Vec<TradeRecord>>,
    catalog: RwLock<Vec<StrategyRow>>,
    brokers: RwLock<Vec<BrokerAccount>>,
    telegram_chats: RwLock<Vec<TelegramSetup>>,
    user_strategies: RwLock<Vec<UserStrategyRow>>,
    next_id: AtomicU64,
    unavailable: RwLock<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_trades(&self, trades: impl IntoIterator<Item = TradeRecord>) {
        self.trades.write().await.extend(trades);
    }

    pub async fn add_strategy(&self, row: StrategyRow) {
        self.catalog.write().await.push(row);
    }

    pub async fn add_broker(&self, account: BrokerAccount) {
        self.brokers.write().await.push(account);
    }

    pub async fn add_telegram_chat(&self, setup: TelegramSetup) {
        self.telegram_chats.write().await.push(setup);
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    /// While set, every ledger fetch fails as if the service were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn ensure_available(&self) -> BackendResult<()> {
        if *self.unavailable.read().await {
            return Err(BackendError::Api {
                status: 503,
                code: None,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn ledger_time(trade: &TradeRecord) -> Option<DateTime<Utc>> {
    parse_timestamp(trade.date_time.as_deref()?, &Utc)
}

fn check_owner(session: &Session, user_id: &str) -> BackendResult<()> {
    if user_id != session.user_id {
        return Err(BackendError::Unauthorized(
            "new row violates row-level security policy".to_string(),
        ));
    }
    Ok(())
}

fn not_found(table: &str, id: &str) -> BackendError {
    BackendError::NotFound(format!("{} {}", table, id))
}

/// Labels ascending, unlabeled last.
fn by_label(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending by time with nulls first, as the database sorts `desc`.
fn newest_first(a: &TradeRecord, b: &TradeRecord) -> Ordering {
    let (ta, tb) = (ledger_time(a), ledger_time(b));
    ta.is_some().cmp(&tb.is_some()).then(tb.cmp(&ta))
}

#[async_trait]
impl TradeLedger for MemoryBackend {
    async fn fetch_trades(&self, session: &Session) -> BackendResult<Vec<TradeRecord>> {
        self.ensure_available().await?;
        let mut rows: Vec<TradeRecord> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.user.as_deref() == Some(session.user_id.as_str()))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }
}

#[async_trait]
impl StrategyStore for MemoryBackend {
    async fn list_catalog(&self, _session: &Session) -> BackendResult<Vec<StrategyRow>> {
        let mut rows: Vec<StrategyRow> = self
            .catalog
            .read()
            .await
            .iter()
            .filter(|s| s.active == Some(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn catalog_names(
        &self,
        _session: &Session,
        ids: &[String],
    ) -> BackendResult<Vec<CatalogName>> {
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| CatalogName {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect())
    }

    async fn list_brokers(&self, session: &Session) -> BackendResult<Vec<BrokerRow>> {
        Ok(self
            .list_broker_accounts(session)
            .await?
            .into_iter()
            .map(|b| BrokerRow {
                id: b.id,
                name: b.name,
            })
            .collect())
    }

    async fn list_telegram_chats(&self, session: &Session) -> BackendResult<Vec<TelegramRow>> {
        Ok(self
            .list_telegram_setups(session)
            .await?
            .into_iter()
            .map(|t| TelegramRow {
                id: t.id,
                label: t.label,
            })
            .collect())
    }

    async fn list_user_strategies(
        &self,
        session: &Session,
    ) -> BackendResult<Vec<UserStrategyRow>> {
        let mut rows: Vec<UserStrategyRow> = self
            .user_strategies
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == session.user_id && r.active == Some(true))
            .cloned()
            .collect();
        // Insertion order is creation order.
        rows.reverse();
        Ok(rows)
    }

    async fn insert_user_strategy(
        &self,
        session: &Session,
        row: &NewUserStrategy,
    ) -> BackendResult<UserStrategyRow> {
        check_owner(session, &row.user_id)?;

        let mut table = self.user_strategies.write().await;
        let duplicate = table.iter().any(|r| {
            r.user_id == row.user_id && r.strategy_id == row.strategy_id && r.active == Some(true)
        });
        if duplicate {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }

        let stored = UserStrategyRow {
            id: self.fresh_id("us"),
            user_id: row.user_id.clone(),
            strategy_id: row.strategy_id.clone(),
            broker_id: Some(row.broker_id.clone()),
            telegram_chat_id: row.telegram_chat_id.clone(),
            qty: row.qty,
            dry_run: Some(row.dry_run),
            active: Some(row.active),
            config_version: Some(row.config_version),
            task_arn: None,
            last_task_status: None,
            last_seen: None,
            created_at: Some(row.updated_at.clone()),
            updated_at: Some(row.updated_at.clone()),
        };
        table.push(stored.clone());
        Ok(stored)
    }

    async fn update_user_strategy(
        &self,
        session: &Session,
        id: &str,
        update: &UserStrategyUpdate,
    ) -> BackendResult<UserStrategyRow> {
        let mut table = self.user_strategies.write().await;
        let row = table
            .iter_mut()
            .find(|r| r.id == id && r.user_id == session.user_id)
            .ok_or_else(|| not_found("user_strategies", id))?;
        row.broker_id = update.broker_id.clone();
        row.telegram_chat_id = update.telegram_chat_id.clone();
        row.qty = update.qty;
        row.dry_run = Some(update.dry_run);
        row.updated_at = Some(update.updated_at.clone());
        Ok(row.clone())
    }

    async fn delete_user_strategy(&self, session: &Session, id: &str) -> BackendResult<()> {
        let mut table = self.user_strategies.write().await;
        let before = table.len();
        table.retain(|r| !(r.id == id && r.user_id == session.user_id));
        if table.len() == before {
            return Err(not_found("user_strategies", id));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryBackend {
    async fn list_broker_accounts(&self, session: &Session) -> BackendResult<Vec<BrokerAccount>> {
        let mut rows: Vec<BrokerAccount> = self
            .brokers
            .read()
            .await
            .iter()
            .filter(|b| b.user_id == session.user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_broker_account(
        &self,
        session: &Session,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount> {
        check_owner(session, &payload.user_id)?;
        let mut stored = BrokerAccount {
            id: self.fresh_id("broker"),
            user_id: String::new(),
            name: String::new(),
            platform: String::new(),
            api_key: String::new(),
            api_secret: None,
            auth_token: None,
            client_id: None,
            mpin: None,
            totp: None,
            notes: None,
            created_at: Some(payload.updated_at.clone()),
            updated_at: None,
        };
        apply_broker(&mut stored, payload);
        self.brokers.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn update_broker_account(
        &self,
        session: &Session,
        id: &str,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount> {
        check_owner(session, &payload.user_id)?;
        let mut table = self.brokers.write().await;
        let row = table
            .iter_mut()
            .find(|b| b.id == id && b.user_id == session.user_id)
            .ok_or_else(|| not_found("user_brokers", id))?;
        apply_broker(row, payload);
        Ok(row.clone())
    }

    async fn delete_broker_account(&self, session: &Session, id: &str) -> BackendResult<()> {
        let mut table = self.brokers.write().await;
        let before = table.len();
        table.retain(|b| !(b.id == id && b.user_id == session.user_id));
        if table.len() == before {
            return Err(not_found("user_brokers", id));
        }
        Ok(())
    }

    async fn list_telegram_setups(&self, session: &Session) -> BackendResult<Vec<TelegramSetup>> {
        let mut rows: Vec<TelegramSetup> = self
            .telegram_chats
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == session.user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| by_label(&a.label, &b.label));
        Ok(rows)
    }

    async fn insert_telegram_setup(
        &self,
        session: &Session,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup> {
        check_owner(session, &payload.user_id)?;
        let stored = TelegramSetup {
            id: self.fresh_id("chat"),
            user_id: payload.user_id.clone(),
            bot_token: payload.bot_token.clone(),
            chat_id: payload.chat_id.clone(),
            label: payload.label.clone(),
            created_at: Some(payload.updated_at.clone()),
            updated_at: Some(payload.updated_at.clone()),
        };
        self.telegram_chats.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn update_telegram_setup(
        &self,
        session: &Session,
        id: &str,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup> {
        check_owner(session, &payload.user_id)?;
        let mut table = self.telegram_chats.write().await;
        let row = table
            .iter_mut()
            .find(|t| t.id == id && t.user_id == session.user_id)
            .ok_or_else(|| not_found("user_telegram_chats", id))?;
        row.bot_token = payload.bot_token.clone();
        row.chat_id = payload.chat_id.clone();
        row.label = payload.label.clone();
        row.updated_at = Some(payload.updated_at.clone());
        Ok(row.clone())
    }

    async fn delete_telegram_setup(&self, session: &Session, id: &str) -> BackendResult<()> {
        let mut table = self.telegram_chats.write().await;
        let before = table.len();
        table.retain(|t| !(t.id == id && t.user_id == session.user_id));
        if table.len() == before {
            return Err(not_found("user_telegram_chats", id));
        }
        Ok(())
    }
}

fn apply_broker(row: &mut BrokerAccount, payload: &BrokerAccountPayload) {
    row.user_id = payload.user_id.clone();
    row.name = payload.name.clone();
    row.platform = payload.platform.clone();
    row.api_key = payload.api_key.clone();
    row.api_secret = payload.api_secret.clone();
    row.auth_token = payload.auth_token.clone();
    row.client_id = payload.client_id.clone();
    row.mpin = payload.mpin.clone();
    row.totp = payload.totp.clone();
    row.notes = payload.notes.clone();
    row.updated_at = Some(payload.updated_at.clone());
}
