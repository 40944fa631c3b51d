pub mod memory;
pub mod supabase;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::BackendResult;
use crate::models::{
    BrokerAccount, BrokerAccountPayload, BrokerRow, CatalogName, NewUserStrategy, StrategyRow,
    TelegramRow, TelegramSetup, TelegramSetupPayload, TradeRecord, UserStrategyRow,
    UserStrategyUpdate,
};

/// The authenticated user a backend call acts for.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait TradeLedger: Send + Sync {
    /// All trades owned by the session's user, newest first.
    async fn fetch_trades(&self, session: &Session) -> BackendResult<Vec<TradeRecord>>;
}

#[async_trait]
impl<T: TradeLedger + ?Sized> TradeLedger for Arc<T> {
    async fn fetch_trades(&self, session: &Session) -> BackendResult<Vec<TradeRecord>> {
        (**self).fetch_trades(session).await
    }
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Active catalog entries ordered by name.
    async fn list_catalog(&self, session: &Session) -> BackendResult<Vec<StrategyRow>>;

    async fn catalog_names(
        &self,
        session: &Session,
        ids: &[String],
    ) -> BackendResult<Vec<CatalogName>>;

    async fn list_brokers(&self, session: &Session) -> BackendResult<Vec<BrokerRow>>;

    async fn list_telegram_chats(&self, session: &Session) -> BackendResult<Vec<TelegramRow>>;

    /// The user's active deployments, newest first.
    async fn list_user_strategies(&self, session: &Session)
        -> BackendResult<Vec<UserStrategyRow>>;

    async fn insert_user_strategy(
        &self,
        session: &Session,
        row: &NewUserStrategy,
    ) -> BackendResult<UserStrategyRow>;

    /// Patch one of the user's deployments; `NotFound` when no row matched.
    async fn update_user_strategy(
        &self,
        session: &Session,
        id: &str,
        update: &UserStrategyUpdate,
    ) -> BackendResult<UserStrategyRow>;

    async fn delete_user_strategy(&self, session: &Session, id: &str) -> BackendResult<()>;
}

/// Broker credentials and notification chats, full rows. Every write is
/// scoped by row id and the session's user id.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All of the user's broker rows, by name.
    async fn list_broker_accounts(&self, session: &Session) -> BackendResult<Vec<BrokerAccount>>;

    async fn insert_broker_account(
        &self,
        session: &Session,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount>;

    async fn update_broker_account(
        &self,
        session: &Session,
        id: &str,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount>;

    async fn delete_broker_account(&self, session: &Session, id: &str) -> BackendResult<()>;

    /// All of the user's chats, by label with unlabeled ones last.
    async fn list_telegram_setups(&self, session: &Session) -> BackendResult<Vec<TelegramSetup>>;

    async fn insert_telegram_setup(
        &self,
        session: &Session,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup>;

    async fn update_telegram_setup(
        &self,
        session: &Session,
        id: &str,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup>;

    async fn delete_telegram_setup(&self, session: &Session, id: &str) -> BackendResult<()>;
}
