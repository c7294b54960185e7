use std::sync::Arc;

use loan_assist::bot::LoanBot;
use loan_assist::channels::{ChannelManager, CliChannel, TelegramChannel};
use loan_assist::config::BotConfig;
use loan_assist::conversation::ConversationController;
use loan_assist::extract::PdfTextParser;
use loan_assist::scoring::RiskPricer;
use loan_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("🏦 Loan Assist v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    db.run_migrations().await?;
    eprintln!("   Database: {}", config.db_path.display());

    // ── Models ───────────────────────────────────────────────────────────
    let pricer = RiskPricer::from_dir(
        &config.models_dir,
        &config.model_pins,
        config.pricing_policy(),
    )
    .unwrap_or_else(|e| {
        eprintln!(
            "Error: Failed to load models from {}: {}",
            config.models_dir.display(),
            e
        );
        std::process::exit(1);
    });
    eprintln!("   Models: {}", config.models_dir.display());

    let controller = ConversationController::new(
        db,
        Arc::new(PdfTextParser::new()),
        pricer,
        config.apps_dir.clone(),
    )
    .with_template(config.template.clone());

    match &config.template {
        Some(path) => eprintln!("   Template: {}", path.display()),
        None => eprintln!("   Template: not configured"),
    }

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    // Always add CLI
    channels.add(Arc::new(CliChannel::new()));

    // Conditionally add Telegram if bot token is set
    if let Some(telegram) = config.telegram.clone() {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            telegram.allowed_users.join(", ")
        );
        channels.add(Arc::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    }

    for (name, health) in channels.health_check_all().await {
        if let Err(e) = health {
            tracing::warn!(channel = %name, "Channel health check failed: {}", e);
        }
    }

    eprintln!("   Send /apply to start an application. Ctrl+C to exit.\n");

    LoanBot::new(channels, controller).run().await?;

    Ok(())
}
