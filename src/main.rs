//! Tradedesk
//!
//! Trading-simulation backend: wallet balances, time-boxed trades with a
//! fixed profit, bot subscriptions and payment-rail deposits/withdrawals.

mod api;
mod config;
mod db;
mod error;
mod ledger;
mod lifecycle;
mod models;
mod sweep;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{AppConfig, TradeRules};
use crate::db::Database;
use crate::lifecycle::{
    AccountService, Registration, SubscriptionManager, TracingMailer, TradeManager,
};
use crate::sweep::ExpirySweep;

/// Tradedesk backend CLI.
#[derive(Parser)]
#[command(name = "tradedesk")]
#[command(about = "Trading-simulation backend service", long_about = None)]
struct Cli {
    /// Database URL
    #[arg(
        short,
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite:./tradedesk.db?mode=rwc"
    )]
    database: String,

    /// Log filter (trace, debug, info, warn, error or a full directive)
    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API together with the expiry sweep
    Serve {
        /// Address to bind
        #[arg(short, long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,

        /// Expiry sweep period in seconds
        #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "3600")]
        sweep_interval: u64,

        /// Frontend base URL for referral and reset links
        #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
        frontend_url: String,

        /// Ignore caller-supplied profit values on manual trade completion
        #[arg(long)]
        server_profit_only: bool,
    },

    /// Run a single expiry sweep pass and exit
    Sweep,

    /// Show the bot plan catalog
    Plans,

    /// Create a user directly in the store
    CreateUser {
        /// Full name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Already-hashed password
        #[arg(long)]
        password_hash: String,

        /// Mark the email as verified
        #[arg(long)]
        verified: bool,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// Mark a user's email as verified
    VerifyUser {
        /// Email address
        email: String,
    },

    /// Show store statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let db = Database::connect(&cli.database).await?;

    match cli.command {
        Commands::Serve {
            bind,
            sweep_interval,
            frontend_url,
            server_profit_only,
        } => {
            let config = AppConfig {
                database_url: cli.database.clone(),
                bind_addr: bind,
                sweep_interval_secs: sweep_interval,
                frontend_url,
                rules: TradeRules {
                    trust_client_profit: !server_profit_only,
                    ..TradeRules::default()
                },
            };
            serve(db, config).await?;
        }

        Commands::Sweep => {
            let rules = TradeRules::default();
            let report = sweeper(&db, rules, Duration::from_secs(3600))
                .run_once(Utc::now())
                .await?;

            println!("\n=== Expiry Sweep ===");
            println!("Trades due:             {}", report.trades_due);
            println!("Trades completed:       {}", report.trades_completed);
            println!("Subscriptions due:      {}", report.subscriptions_due);
            println!("Subscriptions expired:  {}", report.subscriptions_expired);
            println!("Failures:               {}", report.failures);
        }

        Commands::Plans => {
            let plans = SubscriptionManager::new(db.clone(), TradeRules::default()).plans();

            println!("\n{:<10} {:<14} {:>8} {:>10} {:<10}", "ID", "NAME", "PROFIT", "PRICE", "TERM");
            println!("{}", "-".repeat(56));
            for plan in plans {
                println!(
                    "{:<10} {:<14} {:>7}% {:>10} {:<10}",
                    plan.id.as_str(),
                    plan.name,
                    plan.profit_percentage,
                    plan.price,
                    plan.duration
                );
            }
        }

        Commands::CreateUser {
            name,
            email,
            password_hash,
            verified,
            admin,
        } => {
            let accounts = accounts(&db, "http://localhost:3000");
            let user = accounts
                .register(Registration {
                    full_name: name,
                    email,
                    password_hash,
                    referral_code: None,
                })
                .await?;
            if verified {
                accounts.verify_email(&user.email).await?;
            }
            if admin {
                accounts.promote_admin(&user.id).await?;
            }

            println!("Created user {} <{}>", user.id, user.email);
            println!("  Referral code: {}", user.referral_code);
            println!("  Verified:      {}", if verified { "Yes" } else { "No" });
            println!("  Admin:         {}", if admin { "Yes" } else { "No" });
        }

        Commands::VerifyUser { email } => {
            let user = accounts(&db, "http://localhost:3000")
                .verify_email(&email)
                .await?;
            println!("Verified: {} <{}>", user.full_name, user.email);
        }

        Commands::Status => {
            let users = db.count_users().await?;
            let plans = SubscriptionManager::new(db.clone(), TradeRules::default()).plans();

            println!("\n=== Tradedesk Status ===");
            println!("Database:     {}", cli.database);
            println!("Users:        {}", users);
            println!("Bot plans:    {}", plans.len());
        }
    }

    Ok(())
}

async fn serve(db: Database, config: AppConfig) -> Result<()> {
    let sweep = sweeper(
        &db,
        config.rules.clone(),
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    )
    .start();

    let state = AppState::new(
        db,
        config.rules.clone(),
        Arc::new(TracingMailer),
        config.frontend_url.clone(),
    );
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        database = %config.database_url,
        sweep_interval_secs = config.sweep_interval_secs,
        "HTTP server listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await;

    sweep.stop().await;
    served.context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

fn sweeper(db: &Database, rules: TradeRules, period: Duration) -> ExpirySweep {
    ExpirySweep::new(
        db.clone(),
        TradeManager::new(db.clone(), rules.clone()),
        SubscriptionManager::new(db.clone(), rules),
        period,
    )
}

fn accounts(db: &Database, frontend_url: &str) -> AccountService {
    AccountService::new(db.clone(), Arc::new(TracingMailer), frontend_url)
}
