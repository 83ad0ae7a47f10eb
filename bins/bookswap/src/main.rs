//! BookSwap CLI and service binary
//!
//! Entry point for the platform. `start` wires the in-memory stores, the
//! matching engine, and the two lifecycle managers together, seeds a small
//! demo inventory, and runs the expiry sweeper until Ctrl-C. `validate`
//! and `init` operate on configuration files only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cli::{Cli, Commands};
use common::{BookId, MemberId};
use config::{generate_default_config, load_config, save_config, validate_config, PlatformConfig};
use exchange::{
    ActivityLogClient, ActivityRecord, ExchangeManager, ExchangeResult, ExpirySweeper,
    InMemoryExchangeStore, InMemoryRequestStore, Notification, NotificationClient,
    NotificationKind, RequestAction, RequestManager, RequestOutcome, RequestStore,
};
use inventory::{
    Book, BookCondition, BookStore, InMemoryInventory, Member, MemberStore, WantListStore,
    WantedBook,
};
use matching::{
    InMemorySuggestionStore, MatchDirection, MatchingEngine, MatchingError, MatchingResult,
    PendingRequestGate,
};
use observability::{init_logging, init_metrics, LogFormat};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            log_format,
            metrics_port,
        } => start_platform(config, log_format, metrics_port).await,
        Commands::Validate { config } => validate_command(config).await,
        Commands::Init { output } => init_command(output).await,
    }
}

async fn start_platform<P: AsRef<Path>>(
    config_path: P,
    log_format_override: Option<String>,
    metrics_port_override: Option<u16>,
) -> Result<()> {
    let config = load_config(&config_path)?;

    // CLI override wins over the configured format
    let format_name = log_format_override
        .as_deref()
        .unwrap_or(&config.observability.log_format);
    let format = LogFormat::parse(format_name)
        .with_context(|| format!("unknown log format: {}", format_name))?;
    init_logging("bookswap", format)?;

    info!("BookSwap starting...");

    let report = validate_config(&config);
    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start platform due to configuration errors");
    }

    if let Some(port) = metrics_port_override.or(config.observability.metrics_port) {
        init_metrics(port)?;
    }

    run_platform(config).await
}

async fn run_platform(config: PlatformConfig) -> Result<()> {
    // In-memory stores back the demo deployment; production storage is an
    // external collaborator behind the same traits
    let inventory = Arc::new(InMemoryInventory::new());
    let requests = Arc::new(InMemoryRequestStore::new());
    let exchanges = Arc::new(InMemoryExchangeStore::new());
    let suggestions = Arc::new(InMemorySuggestionStore::new());
    let notifications = Arc::new(LogNotificationClient);
    let activity = Arc::new(LogActivityClient);

    let engine = MatchingEngine::new(
        inventory.clone(),
        inventory.clone(),
        inventory.clone(),
        suggestions,
        Arc::new(RequestStoreGate {
            requests: requests.clone(),
        }),
        config.matching.clone(),
        config.geography.clone(),
    );

    let request_manager = RequestManager::new(
        requests.clone(),
        exchanges.clone(),
        inventory.clone(),
        inventory.clone(),
        notifications.clone(),
        activity.clone(),
        config.trust.clone(),
        config.lifecycle.clone(),
    );

    let exchange_manager = ExchangeManager::new(
        exchanges.clone(),
        inventory.clone(),
        inventory.clone(),
        notifications.clone(),
        activity.clone(),
        config.trust.clone(),
        config.lifecycle.clone(),
    );

    if let Err(e) = run_demo(&inventory, &engine, &request_manager, &exchange_manager).await {
        warn!(error = %e, "Demo walkthrough failed");
    }

    let sweeper = ExpirySweeper::new(
        requests,
        exchanges,
        inventory.clone(),
        inventory,
        notifications,
        activity,
        config.trust.clone(),
        config.sweeper.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    info!("Platform running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    sweeper_task.await.context("Sweeper task panicked")?;

    info!("BookSwap stopped");
    Ok(())
}

/// Seed two members and walk one suggestion through the whole handshake
/// (request, accept, mutual confirmation), so a fresh `start` shows the
/// entire pipeline in the logs
async fn run_demo(
    inventory: &Arc<InMemoryInventory>,
    engine: &MatchingEngine,
    request_manager: &RequestManager,
    exchange_manager: &ExchangeManager,
) -> Result<()> {
    let mut alice = Member::new(common::UserId::new(), "alice", "london");
    alice.is_verified = true;
    let mut bob = Member::new(common::UserId::new(), "bob", "london");
    bob.trust_score = 75.0;
    bob.completed_exchanges = 12;
    bob.average_rating = 4.4;
    MemberStore::upsert(inventory.as_ref(), alice.clone()).await?;
    MemberStore::upsert(inventory.as_ref(), bob.clone()).await?;

    let alice_book = Book::new(
        alice.member_id,
        "Neuromancer",
        "William Gibson",
        BookCondition::VeryGood,
    );
    BookStore::upsert(inventory.as_ref(), alice_book.clone()).await?;
    BookStore::upsert(
        inventory.as_ref(),
        Book::new(bob.member_id, "Dune", "Frank Herbert", BookCondition::Good),
    )
    .await?;

    WantListStore::upsert(inventory.as_ref(), WantedBook::new(alice.member_id, "Dune", 8)).await?;
    WantListStore::upsert(
        inventory.as_ref(),
        WantedBook::new(bob.member_id, "Neuromancer", 6),
    )
    .await?;

    let suggestions = engine.find_matches(alice.user_id).await?;
    info!(count = suggestions.len(), "Demo: suggestions generated for alice");

    if let Some(top) = suggestions.first() {
        let requested: Vec<BookId> = top
            .pairs
            .iter()
            .filter(|p| p.direction == MatchDirection::IWantTheirs)
            .map(|p| p.book_id)
            .take(1)
            .collect();

        if !requested.is_empty() {
            let request = request_manager
                .create_request(
                    alice.user_id,
                    top.counterpart_id,
                    vec![alice_book.book_id],
                    requested,
                    Some("Saw we're a match - trade?".to_string()),
                )
                .await?;
            info!(request = %request.request_id, "Demo: request created from top suggestion");

            let outcome = request_manager
                .respond_to_request(bob.user_id, request.request_id, RequestAction::Accept)
                .await?;
            if let RequestOutcome::Accepted { exchange, .. } = outcome {
                exchange_manager
                    .confirm_exchange(alice.user_id, exchange.exchange_id)
                    .await?;
                let done = exchange_manager
                    .confirm_exchange(bob.user_id, exchange.exchange_id)
                    .await?;
                info!(
                    exchange = %done.exchange_id,
                    status = %done.status,
                    "Demo: handshake complete, ownership transferred"
                );
            }
        }
    }

    Ok(())
}

async fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Platform: {}", config.platform.name);
    println!("Version: {}", config.platform.version);
    println!("Score threshold: {}", config.matching.score_threshold);
    println!("Trust floor: {}", config.trust.floor);
    println!(
        "Request expiry: {} days, exchange expiry: {} days",
        config.lifecycle.request_expiry_days, config.lifecycle.exchange_expiry_days
    );

    Ok(())
}

async fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to tune matching and trust policy");
    println!(
        "  2. Run 'bookswap validate --config {:?}' to check it",
        output_path
    );
    println!(
        "  3. Run 'bookswap start --config {:?}' to start the platform",
        output_path
    );

    Ok(())
}

/// Bridges the matching engine's pending-request exclusion onto the live
/// request store
struct RequestStoreGate {
    requests: Arc<dyn RequestStore>,
}

#[async_trait]
impl PendingRequestGate for RequestStoreGate {
    async fn has_pending_between(&self, a: MemberId, b: MemberId) -> MatchingResult<bool> {
        self.requests
            .has_pending_between(a, b)
            .await
            .map_err(|e| MatchingError::Storage(e.to_string()))
    }
}

/// Stand-in delivery: notification transport is an external service, so
/// the binary just logs what would be sent
struct LogNotificationClient;

#[async_trait]
impl NotificationClient for LogNotificationClient {
    async fn create(
        &self,
        recipient: MemberId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> ExchangeResult<()> {
        info!(%recipient, ?kind, %payload, "notification");
        Ok(())
    }

    async fn create_batch(&self, notifications: Vec<Notification>) -> ExchangeResult<()> {
        for n in notifications {
            info!(recipient = %n.recipient, kind = ?n.kind, payload = %n.payload, "notification");
        }
        Ok(())
    }
}

/// Stand-in activity log with the same contract
struct LogActivityClient;

#[async_trait]
impl ActivityLogClient for LogActivityClient {
    async fn record(&self, record: ActivityRecord) -> ExchangeResult<()> {
        info!(
            member = %record.member_id,
            action = ?record.action,
            entity_kind = %record.entity_kind,
            entity = %record.entity_id,
            "activity"
        );
        Ok(())
    }
}
