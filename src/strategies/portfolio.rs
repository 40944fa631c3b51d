use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

use crate::backend::{Session, StrategyStore};
use crate::error::{BackendError, BackendResult, DeployError};
use crate::models::{BrokerRow, CatalogName, TelegramRow, UserStrategyRow};
use crate::strategies::DeployForm;

const UNNAMED_CHAT: &str = "Unnamed";

/// A deployment with display names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioEntry {
    pub deployment: UserStrategyRow,
    pub strategy_name: String,
    pub broker_name: Option<String>,
    pub telegram_label: Option<String>,
}

/// Attach strategy, broker and chat names. Unknown strategies fall back to
/// their id; unknown brokers and chats resolve to None.
pub fn enrich(
    deployments: Vec<UserStrategyRow>,
    names: &[CatalogName],
    brokers: &[BrokerRow],
    chats: &[TelegramRow],
) -> Vec<PortfolioEntry> {
    let names: HashMap<&str, &str> = names
        .iter()
        .map(|n| (n.id.as_str(), n.name.as_str()))
        .collect();
    let brokers: HashMap<&str, &str> = brokers
        .iter()
        .map(|b| (b.id.as_str(), b.name.as_str()))
        .collect();
    let chats: HashMap<&str, &str> = chats
        .iter()
        .map(|c| (c.id.as_str(), c.label.as_deref().unwrap_or(UNNAMED_CHAT)))
        .collect();

    deployments
        .into_iter()
        .map(|d| {
            let strategy_name = names
                .get(d.strategy_id.as_str())
                .map(|n| n.to_string())
                .unwrap_or_else(|| d.strategy_id.clone());
            let broker_name = d
                .broker_id
                .as_deref()
                .and_then(|id| brokers.get(id))
                .map(|n| n.to_string());
            let telegram_label = d
                .telegram_chat_id
                .as_deref()
                .and_then(|id| chats.get(id))
                .map(|l| l.to_string());
            PortfolioEntry {
                deployment: d,
                strategy_name,
                broker_name,
                telegram_label,
            }
        })
        .collect()
}

pub async fn load_portfolio(
    store: &dyn StrategyStore,
    session: &Session,
) -> BackendResult<Vec<PortfolioEntry>> {
    let deployments = store.list_user_strategies(session).await?;
    let brokers = store.list_brokers(session).await?;
    let chats = store.list_telegram_chats(session).await?;

    let ids: Vec<String> = deployments.iter().map(|d| d.strategy_id.clone()).collect();
    let names = store.catalog_names(session, &ids).await?;

    Ok(enrich(deployments, &names, &brokers, &chats))
}

pub async fn remove_deployment(
    store: &dyn StrategyStore,
    session: &Session,
    id: &str,
) -> BackendResult<()> {
    store.delete_user_strategy(session, id).await?;
    info!("Removed deployment {}", id);
    Ok(())
}

/// One of the user's active deployments by id.
pub async fn find_deployment(
    store: &dyn StrategyStore,
    session: &Session,
    id: &str,
) -> BackendResult<UserStrategyRow> {
    store
        .list_user_strategies(session)
        .await?
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| BackendError::NotFound(format!("user_strategies {}", id)))
}

/// Change broker, chat, quantity or dry-run of a deployment. The form goes
/// through the same checks as a new deploy; a strategy that has left the
/// catalog no longer demands a chat.
pub async fn edit_deployment(
    store: &dyn StrategyStore,
    session: &Session,
    id: &str,
    form: &DeployForm,
) -> Result<UserStrategyRow, DeployError> {
    let deployment = find_deployment(store, session, id).await?;
    let requires_telegram = store
        .list_catalog(session)
        .await?
        .iter()
        .find(|s| s.id == deployment.strategy_id)
        .is_some_and(|s| s.requires_telegram());

    let brokers = store.list_brokers(session).await?;
    let chats = store.list_telegram_chats(session).await?;
    form.validate_for(requires_telegram, &brokers, &chats)?;

    let update = form.to_update(Utc::now())?;
    let row = store.update_user_strategy(session, id, &update).await?;
    info!(
        "Updated deployment {}{}",
        row.id,
        if update.dry_run { " [dry run]" } else { "" }
    );
    Ok(row)
}
