use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use trade_dashboard::accounts::{self, BrokerForm, TelegramForm};
use trade_dashboard::backend::{AccountStore, Session, StrategyStore, SupabaseClient};
use trade_dashboard::config::Config;
use trade_dashboard::models::TradeRecord;
use trade_dashboard::performance::{MonthlyPerformance, PerformanceTracker};
use trade_dashboard::strategies::{self, DeployForm};

const USAGE: &str = "usage: trade-dashboard <command>
  summary                                   monthly performance and recent trades (default)
  strategies                                strategy catalog
  portfolio                                 deployed strategies
  deploy <strategy_id> <broker_id> [telegram_chat_id] [qty] [--live]
  edit <id> [--broker ID] [--telegram ID | --no-telegram] [--qty N] [--live | --dry-run]
  remove <id>
  brokers
  add-broker <name> <platform> <api_key> [--api-secret S] [--auth-token T] [--client-id C]
             [--mpin M] [--totp T] [--notes N]
  edit-broker <id> [--name N] [--platform P] [--api-key K] [same options as add-broker]
  remove-broker <id>
  telegram
  add-telegram <bot_token> <chat_id> [label]
  edit-telegram <id> [--bot-token T] [--chat-id C] [--label L]
  remove-telegram <id>";

/// Flags that take no value.
const SWITCHES: &[&str] = &["--live", "--dry-run", "--no-telegram"];

/// Command-line arguments after the command name.
struct Args<'a> {
    positional: Vec<&'a str>,
    options: HashMap<&'a str, &'a str>,
    switches: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn parse(raw: &'a [String]) -> Result<Self> {
        let mut args = Args {
            positional: Vec::new(),
            options: HashMap::new(),
            switches: Vec::new(),
        };
        let mut iter = raw.iter().map(String::as_str);
        while let Some(arg) = iter.next() {
            if SWITCHES.contains(&arg) {
                args.switches.push(arg);
            } else if arg.starts_with("--") {
                let value = iter
                    .next()
                    .with_context(|| format!("{} needs a value", arg))?;
                args.options.insert(arg, value);
            } else {
                args.positional.push(arg);
            }
        }
        Ok(args)
    }

    fn arg(&self, index: usize) -> Result<&'a str> {
        self.positional.get(index).copied().context(USAGE)
    }

    fn option(&self, name: &str) -> Option<String> {
        self.options.get(name).map(|v| v.to_string())
    }

    fn has(&self, switch: &str) -> bool {
        self.switches.contains(&switch)
    }

    fn qty(&self, raw: Option<&str>) -> Result<Option<i64>> {
        match raw {
            Some(raw) => Ok(Some(
                raw.parse::<i64>()
                    .with_context(|| format!("Invalid qty {:?}", raw))?,
            )),
            None => Ok(None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let missing = cfg.missing();
    if !missing.is_empty() {
        bail!("Missing configuration: {} (set them in .env)", missing.join(", "));
    }

    let client = Arc::new(SupabaseClient::new(&cfg).context("Failed to build HTTP client")?);
    let session = cfg.session();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let command = raw.first().map(String::as_str).unwrap_or("summary");
    let args = Args::parse(raw.get(1..).unwrap_or_default())?;
    let store = client.as_ref();

    match command {
        "summary" => run_summary(&cfg, client.clone(), session).await,
        "strategies" => run_catalog(store, &session).await,
        "portfolio" => run_portfolio(store, &session).await,
        "deploy" => run_deploy(store, &session, &args).await,
        "edit" => run_edit(store, &session, &args).await,
        "remove" => {
            let id = args.arg(0)?;
            strategies::remove_deployment(store, &session, id).await?;
            println!("Removed deployment {}", id);
            Ok(())
        }
        "brokers" => run_brokers(store, &session).await,
        "add-broker" => {
            let mut form = BrokerForm::new(args.arg(0)?, args.arg(1)?, args.arg(2)?);
            apply_broker_options(&mut form, &args);
            let row = accounts::add_broker(store, &session, &form).await?;
            println!("Broker added successfully ({}).", row.id);
            Ok(())
        }
        "edit-broker" => {
            let id = args.arg(0)?;
            let current = accounts::find_broker(store, &session, id).await?;
            let mut form = BrokerForm::from_account(&current);
            apply_broker_options(&mut form, &args);
            accounts::update_broker(store, &session, id, &form).await?;
            println!("Broker updated successfully.");
            Ok(())
        }
        "remove-broker" => {
            let id = args.arg(0)?;
            accounts::remove_broker(store, &session, id).await?;
            println!("Broker deleted successfully.");
            Ok(())
        }
        "telegram" => run_telegram(store, &session).await,
        "add-telegram" => {
            let label = args.positional.get(2).copied();
            let form = TelegramForm::new(args.arg(0)?, args.arg(1)?, label);
            let row = accounts::add_telegram_chat(store, &session, &form).await?;
            println!("Telegram chat added successfully ({}).", row.id);
            Ok(())
        }
        "edit-telegram" => {
            let id = args.arg(0)?;
            let current = accounts::find_telegram_chat(store, &session, id).await?;
            let mut form = TelegramForm::from_setup(&current);
            if let Some(token) = args.option("--bot-token") {
                form.bot_token = token;
            }
            if let Some(chat) = args.option("--chat-id") {
                form.chat_id = chat;
            }
            if let Some(label) = args.option("--label") {
                form.label = Some(label);
            }
            accounts::update_telegram_chat(store, &session, id, &form).await?;
            println!("Telegram chat updated successfully.");
            Ok(())
        }
        "remove-telegram" => {
            let id = args.arg(0)?;
            accounts::remove_telegram_chat(store, &session, id).await?;
            println!("Telegram chat deleted successfully.");
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}

async fn run_summary(cfg: &Config, client: Arc<SupabaseClient>, session: Session) -> Result<()> {
    let mut tracker = PerformanceTracker::new(Box::new(client), session);
    let limit = cfg.recent_trades_limit;

    match cfg.tz() {
        Some(tz) => report(&mut tracker, &Utc::now().with_timezone(&tz), limit).await,
        None => report(&mut tracker, &Local::now(), limit).await,
    }
    Ok(())
}

/// Refresh and print everything in the evaluation zone of `now`.
async fn report<Tz: TimeZone>(tracker: &mut PerformanceTracker, now: &DateTime<Tz>, limit: usize)
where
    Tz::Offset: Display,
{
    let tz = now.timezone();
    tracker.refresh(now).await;
    print_performance(tracker.latest(), &tz);
    print_trades(tracker.recent_trades(limit), &tz);
}

async fn run_catalog(store: &dyn StrategyStore, session: &Session) -> Result<()> {
    let catalog = store.list_catalog(session).await?;
    if catalog.is_empty() {
        println!("No strategies available.");
        return Ok(());
    }
    println!("{:<38} {:<28} {:>5} {:>8}", "ID", "Name", "Qty", "Telegram");
    for s in &catalog {
        println!(
            "{:<38} {:<28} {:>5} {:>8}",
            s.id,
            s.name,
            s.default_qty.unwrap_or(1),
            if s.requires_telegram() { "yes" } else { "no" }
        );
        if let Some(desc) = s.description.as_deref().filter(|d| !d.is_empty()) {
            println!("    {}", desc);
        }
    }
    Ok(())
}

async fn run_portfolio(store: &dyn StrategyStore, session: &Session) -> Result<()> {
    let entries = strategies::load_portfolio(store, session).await?;
    if entries.is_empty() {
        println!("No active strategies deployed yet.");
        return Ok(());
    }
    for e in &entries {
        let d = &e.deployment;
        println!("{}  ({})", e.strategy_name, d.id);
        println!(
            "    broker: {} | telegram: {} | qty: {} | {}",
            e.broker_name.as_deref().unwrap_or("—"),
            e.telegram_label.as_deref().unwrap_or("—"),
            d.qty.map(|q| q.to_string()).unwrap_or_else(|| "—".to_string()),
            if d.dry_run.unwrap_or(true) { "dry run" } else { "live" }
        );
        if let Some(status) = d.last_task_status.as_deref() {
            println!(
                "    task: {} (last seen {})",
                status,
                d.last_seen.as_deref().unwrap_or("never")
            );
        }
    }
    Ok(())
}

async fn run_deploy(store: &dyn StrategyStore, session: &Session, args: &Args<'_>) -> Result<()> {
    let strategy_id = args.arg(0)?;
    let mut form = strategies::deploy_form(store, session, strategy_id).await?;
    form.broker_id = Some(args.arg(1)?.to_string());
    form.telegram_chat_id = args.positional.get(2).map(|s| s.to_string());
    if let Some(qty) = args.qty(args.positional.get(3).copied())? {
        form.qty = Some(qty);
    }
    form.dry_run = !args.has("--live");

    match strategies::deploy_strategy(store, session, strategy_id, &form).await {
        Ok(row) => {
            println!("Strategy deployed successfully ({}).", row.id);
            Ok(())
        }
        Err(e) => {
            error!("Deploy failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_edit(store: &dyn StrategyStore, session: &Session, args: &Args<'_>) -> Result<()> {
    let id = args.arg(0)?;
    let current = strategies::find_deployment(store, session, id).await?;
    let mut form = DeployForm::for_deployment(&current);
    if let Some(broker) = args.option("--broker") {
        form.broker_id = Some(broker);
    }
    if args.has("--no-telegram") {
        form.telegram_chat_id = None;
    } else if let Some(chat) = args.option("--telegram") {
        form.telegram_chat_id = Some(chat);
    }
    if let Some(qty) = args.qty(args.options.get("--qty").copied())? {
        form.qty = Some(qty);
    }
    if args.has("--live") {
        form.dry_run = false;
    } else if args.has("--dry-run") {
        form.dry_run = true;
    }

    match strategies::edit_deployment(store, session, id, &form).await {
        Ok(_) => {
            println!("Strategy updated successfully.");
            Ok(())
        }
        Err(e) => {
            error!("Update failed: {}", e);
            Err(e.into())
        }
    }
}

fn apply_broker_options(form: &mut BrokerForm, args: &Args<'_>) {
    if let Some(name) = args.option("--name") {
        form.name = name;
    }
    if let Some(platform) = args.option("--platform") {
        form.platform = platform;
    }
    if let Some(key) = args.option("--api-key") {
        form.api_key = key;
    }
    let optional = [
        ("--api-secret", &mut form.api_secret),
        ("--auth-token", &mut form.auth_token),
        ("--client-id", &mut form.client_id),
        ("--mpin", &mut form.mpin),
        ("--totp", &mut form.totp),
        ("--notes", &mut form.notes),
    ];
    for (flag, field) in optional {
        if let Some(value) = args.option(flag) {
            *field = Some(value);
        }
    }
}

async fn run_brokers(store: &dyn AccountStore, session: &Session) -> Result<()> {
    let brokers = store.list_broker_accounts(session).await?;
    if brokers.is_empty() {
        println!("No brokers added yet.");
        return Ok(());
    }
    println!("{:<38} {:<20} {:<12} {:<12}", "ID", "Name", "Platform", "Client ID");
    for b in &brokers {
        println!(
            "{:<38} {:<20} {:<12} {:<12}",
            b.id,
            b.name,
            b.platform,
            b.client_id.as_deref().unwrap_or("—")
        );
    }
    Ok(())
}

async fn run_telegram(store: &dyn AccountStore, session: &Session) -> Result<()> {
    let chats = store.list_telegram_setups(session).await?;
    if chats.is_empty() {
        println!("No telegram chats added yet.");
        return Ok(());
    }
    println!("{:<38} {:<20} {}", "ID", "Label", "Chat ID");
    for c in &chats {
        println!(
            "{:<38} {:<20} {}",
            c.id,
            c.label.as_deref().unwrap_or("Unnamed"),
            c.chat_id
        );
    }
    Ok(())
}

fn print_performance<Tz: TimeZone>(perf: &MonthlyPerformance, tz: &Tz)
where
    Tz::Offset: Display,
{
    let s = &perf.summary;
    println!("╔══════════════════════════════════════════════╗");
    println!("║  MONTHLY PERFORMANCE  {:<23}║", perf.label());
    println!("╠══════════════════════════════════════════════╣");
    println!("║  P&L:          {:<30}║", format!("${:+.2}", s.total_pnl));
    println!("║  Return:       {:<30}║", format!("{:+.2}%", s.return_percent));
    println!("║  Win rate:     {:<30}║", format!("{:.1}%", s.win_rate));
    println!(
        "║  Closed:       {:<30}║",
        format!("{} ({} winning)", s.trade_count, s.winning_count)
    );
    println!("╚══════════════════════════════════════════════╝");

    if !perf.open.is_empty() {
        println!();
        println!("Open positions:");
        for p in &perf.open {
            println!(
                "  {:<20} entry {}  {}",
                p.instrument,
                fmt_price(p.entry.price),
                p.entry
                    .executed_at
                    .map(|t| t.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "—".to_string())
            );
        }
    }
    println!();
}

fn print_trades<Tz: TimeZone>(trades: &[TradeRecord], tz: &Tz)
where
    Tz::Offset: Display,
{
    if trades.is_empty() {
        println!("No trades recorded yet.");
        return;
    }
    println!("{:<24} {:<10} {:>12} {}", "Stock / Option", "Position", "Price", "Date / Time");
    for t in trades {
        println!(
            "{:<24} {:<10} {:>12} {}",
            t.stock_option.as_deref().unwrap_or("—"),
            t.position.as_deref().unwrap_or("—"),
            fmt_price(t.price),
            fmt_trade_time(t, tz)
        );
    }
}

/// `date_time` read and shown in `tz`, the zone the summary uses; the raw
/// value when it does not parse.
fn fmt_trade_time<Tz: TimeZone>(trade: &TradeRecord, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    trade
        .executed_at(tz)
        .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| trade.date_time.clone().unwrap_or_else(|| "—".to_string()))
}

fn fmt_price(price: Option<f64>) -> String {
    price
        .map(|p| format!("${:.2}", p))
        .unwrap_or_else(|| "—".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date_time: Option<&str>) -> TradeRecord {
        TradeRecord {
            id: 1,
            user: Some("user-1".to_string()),
            stock_option: Some("AAPL".to_string()),
            position: Some("entry".to_string()),
            price: Some(10.0),
            date_time: date_time.map(str::to_string),
        }
    }

    #[test]
    fn trade_times_use_the_evaluation_zone() {
        let ny = chrono_tz::America::New_York;
        // Naive rows keep their wall-clock time in the evaluation zone.
        assert_eq!(
            fmt_trade_time(&row(Some("2024-05-03T10:00:00")), &ny),
            "2024-05-03 10:00:00"
        );
        // Offset rows are converted into it.
        assert_eq!(
            fmt_trade_time(&row(Some("2024-05-03T14:00:00Z")), &ny),
            "2024-05-03 10:00:00"
        );
        assert_eq!(fmt_trade_time(&row(Some("soon")), &ny), "soon");
        assert_eq!(fmt_trade_time(&row(None), &ny), "—");
    }

    #[test]
    fn args_split_into_positionals_options_and_switches() {
        let raw: Vec<String> = ["us-1", "--qty", "5", "--live", "--telegram", "-100"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let args = Args::parse(&raw).unwrap();
        assert_eq!(args.positional, vec!["us-1"]);
        assert_eq!(args.option("--telegram").as_deref(), Some("-100"));
        assert_eq!(args.qty(args.options.get("--qty").copied()).unwrap(), Some(5));
        assert!(args.has("--live"));
        assert!(!args.has("--dry-run"));

        let dangling = vec!["--broker".to_string()];
        assert!(Args::parse(&dangling).is_err());
    }
}
