use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{AccountStore, Session, StrategyStore, TradeLedger};
use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::models::{
    BrokerAccount, BrokerAccountPayload, BrokerRow, CatalogName, NewUserStrategy, StrategyRow,
    TelegramRow, TelegramSetup, TelegramSetupPayload, TradeRecord, UserStrategyRow,
    UserStrategyUpdate,
};

const REST_PATH: &str = "/rest/v1";
const UNIQUE_VIOLATION: &str = "23505";

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct RestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Client for the hosted database's REST interface. Every call carries the
/// project's anon key plus the caller's bearer token; row-level security on
/// the server does the rest.
pub struct SupabaseClient {
    client: Client,
    rest_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(cfg: &Config) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &cfg.supabase_url, &cfg.supabase_anon_key))
    }

    pub fn with_client(client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            rest_url: format!("{}{}", base_url.trim_end_matches('/'), REST_PATH),
            anon_key: anon_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        session: &Session,
        table: &str,
        query: &[(&str, String)],
    ) -> BackendResult<Vec<T>> {
        let req = self.authorize(self.client.get(self.table_url(table)), session);
        let resp = req
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to query {}", table))?;

        let resp = check_status(resp).await?;
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read {} response", table))?;
        let rows: Vec<T> = serde_json::from_str(&body)?;
        debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Send a write with `Prefer: return=representation` and decode the
    /// affected rows.
    async fn write<T: DeserializeOwned>(
        &self,
        session: &Session,
        req: RequestBuilder,
        table: &str,
    ) -> BackendResult<Vec<T>> {
        let resp = self
            .authorize(req, session)
            .header("Prefer", "return=representation")
            .send()
            .await
            .with_context(|| format!("Failed to write {}", table))?;

        let resp = check_status(resp).await?;
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read {} write response", table))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn insert<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        session: &Session,
        table: &str,
        row: &B,
    ) -> BackendResult<T> {
        let req = self.client.post(self.table_url(table)).json(&[row]);
        let rows: Vec<T> = self.write(session, req, table).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse(format!("insert into {} returned no rows", table)))
    }

    /// PATCH the user's row `id`; `NotFound` when the filters match nothing.
    async fn update<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        session: &Session,
        table: &str,
        id: &str,
        patch: &B,
    ) -> BackendResult<T> {
        let req = self
            .client
            .patch(self.table_url(table))
            .query(&owned_row(id, session))
            .json(patch);
        let rows: Vec<T> = self.write(session, req, table).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("{} {}", table, id)))
    }

    async fn delete(&self, session: &Session, table: &str, id: &str) -> BackendResult<()> {
        let req = self
            .client
            .delete(self.table_url(table))
            .query(&owned_row(id, session));
        let rows: Vec<serde_json::Value> = self.write(session, req, table).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("{} {}", table, id)));
        }
        debug!("Deleted {} from {}", id, table);
        Ok(())
    }
}

/// Pass 2xx responses through, turn everything else into a `BackendError`.
async fn check_status(resp: Response) -> BackendResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(map_error(status, &body))
}

pub(crate) fn map_error(status: StatusCode, body: &str) -> BackendError {
    let parsed: RestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .or(parsed.details.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return BackendError::Unauthorized(message);
    }
    if status == StatusCode::CONFLICT
        || parsed.code.as_deref() == Some(UNIQUE_VIOLATION)
        || message.contains("unique")
    {
        return BackendError::Conflict(message);
    }

    warn!("Backend error {}: {}", status, message);
    BackendError::Api {
        status: status.as_u16(),
        code: parsed.code,
        message,
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Filters selecting row `id` only if it belongs to the session's user.
fn owned_row(id: &str, session: &Session) -> [(&'static str, String); 2] {
    [("id", eq(id)), ("user_id", eq(&session.user_id))]
}

/// `in.(a,b,c)` filter; values are quoted so commas and dots stay literal.
fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl TradeLedger for SupabaseClient {
    async fn fetch_trades(&self, session: &Session) -> BackendResult<Vec<TradeRecord>> {
        self.select(
            session,
            "trades",
            &[
                ("select", "*".to_string()),
                ("user", eq(&session.user_id)),
                ("order", "date_time.desc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl StrategyStore for SupabaseClient {
    async fn list_catalog(&self, session: &Session) -> BackendResult<Vec<StrategyRow>> {
        self.select(
            session,
            "strategy_catalog",
            &[
                ("select", "*".to_string()),
                ("active", eq("true")),
                ("order", "name.asc".to_string()),
            ],
        )
        .await
    }

    async fn catalog_names(
        &self,
        session: &Session,
        ids: &[String],
    ) -> BackendResult<Vec<CatalogName>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            session,
            "strategy_catalog",
            &[("select", "id,name".to_string()), ("id", in_list(ids))],
        )
        .await
    }

    async fn list_brokers(&self, session: &Session) -> BackendResult<Vec<BrokerRow>> {
        self.select(
            session,
            "user_brokers",
            &[
                ("select", "id,name".to_string()),
                ("user_id", eq(&session.user_id)),
                ("order", "name.asc".to_string()),
            ],
        )
        .await
    }

    async fn list_telegram_chats(&self, session: &Session) -> BackendResult<Vec<TelegramRow>> {
        self.select(
            session,
            "user_telegram_chats",
            &[
                ("select", "id,label".to_string()),
                ("user_id", eq(&session.user_id)),
                ("order", "label.asc.nullslast".to_string()),
            ],
        )
        .await
    }

    async fn list_user_strategies(
        &self,
        session: &Session,
    ) -> BackendResult<Vec<UserStrategyRow>> {
        self.select(
            session,
            "user_strategies",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&session.user_id)),
                ("active", eq("true")),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_user_strategy(
        &self,
        session: &Session,
        row: &NewUserStrategy,
    ) -> BackendResult<UserStrategyRow> {
        self.insert(session, "user_strategies", row).await
    }

    async fn update_user_strategy(
        &self,
        session: &Session,
        id: &str,
        update: &UserStrategyUpdate,
    ) -> BackendResult<UserStrategyRow> {
        self.update(session, "user_strategies", id, update).await
    }

    async fn delete_user_strategy(&self, session: &Session, id: &str) -> BackendResult<()> {
        self.delete(session, "user_strategies", id).await
    }
}

#[async_trait]
impl AccountStore for SupabaseClient {
    async fn list_broker_accounts(&self, session: &Session) -> BackendResult<Vec<BrokerAccount>> {
        self.select(
            session,
            "user_brokers",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&session.user_id)),
                ("order", "name.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_broker_account(
        &self,
        session: &Session,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount> {
        self.insert(session, "user_brokers", payload).await
    }

    async fn update_broker_account(
        &self,
        session: &Session,
        id: &str,
        payload: &BrokerAccountPayload,
    ) -> BackendResult<BrokerAccount> {
        self.update(session, "user_brokers", id, payload).await
    }

    async fn delete_broker_account(&self, session: &Session, id: &str) -> BackendResult<()> {
        self.delete(session, "user_brokers", id).await
    }

    async fn list_telegram_setups(&self, session: &Session) -> BackendResult<Vec<TelegramSetup>> {
        self.select(
            session,
            "user_telegram_chats",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&session.user_id)),
                ("order", "label.asc.nullslast".to_string()),
            ],
        )
        .await
    }

    async fn insert_telegram_setup(
        &self,
        session: &Session,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup> {
        self.insert(session, "user_telegram_chats", payload).await
    }

    async fn update_telegram_setup(
        &self,
        session: &Session,
        id: &str,
        payload: &TelegramSetupPayload,
    ) -> BackendResult<TelegramSetup> {
        self.update(session, "user_telegram_chats", id, payload).await
    }

    async fn delete_telegram_setup(&self, session: &Session, id: &str) -> BackendResult<()> {
        self.delete(session, "user_telegram_chats", id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_conflict() {
        let body = r#"{"code":"23505","details":"Key (user_id, strategy_id) already exists.",
                       "hint":null,"message":"duplicate key value violates unique constraint"}"#;
        let err = map_error(StatusCode::CONFLICT, body);
        assert!(matches!(err, BackendError::Conflict(_)));

        let err = map_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, BackendError::Conflict(_)));
    }

    #[test]
    fn auth_failures_map_to_unauthorized() {
        let body = r#"{"code":"PGRST301","message":"JWT expired"}"#;
        match map_error(StatusCode::UNAUTHORIZED, body) {
            BackendError::Unauthorized(msg) => assert_eq!(msg, "JWT expired"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_errors_keep_status_and_code() {
        let body = r#"{"code":"42P01","message":"relation \"trades\" does not exist"}"#;
        match map_error(StatusCode::NOT_FOUND, body) {
            BackendError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code.as_deref(), Some("42P01"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_json_body_becomes_message() {
        match map_error(StatusCode::BAD_GATEWAY, "upstream down") {
            BackendError::Api { message, code, .. } => {
                assert_eq!(message, "upstream down");
                assert!(code.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn in_list_quotes_values() {
        let ids = vec!["a1".to_string(), "b,2".to_string()];
        assert_eq!(in_list(&ids), r#"in.("a1","b,2")"#);
    }

    #[test]
    fn writes_are_scoped_to_the_session_user() {
        let s = Session::new("user-9", "token");
        let filters = owned_row("row-1", &s);
        assert_eq!(filters[0], ("id", "eq.row-1".to_string()));
        assert_eq!(filters[1], ("user_id", "eq.user-9".to_string()));
    }

    #[test]
    fn table_url_strips_trailing_slash() {
        let c = SupabaseClient::with_client(Client::new(), "https://proj.supabase.co/", "anon");
        assert_eq!(
            c.table_url("trades"),
            "https://proj.supabase.co/rest/v1/trades"
        );
    }
}
