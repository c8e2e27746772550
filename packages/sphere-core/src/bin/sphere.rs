//! Sphere CLI - command line access to the ledger and trading sessions.
//!
//! Every command prints an `ApiResponse` JSON document on stdout. Logs go to
//! stderr and are filtered with `RUST_LOG`.

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use sphere_core::session::{Providers, SessionStore};
use sphere_core::{
    providers::RandomSynthetic, AccountKind, ApiResponse, Ledger, OptionContract, OptionType,
    SessionStatus, SphereConfig, TradeSide, TradingEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sphere")]
#[command(about = "Sphere CLI - simulated brokerage ledger and AI trading sessions")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.sphere/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Portfolio ledger commands
    Portfolio {
        /// Use the paper (virtual) account
        #[arg(long)]
        paper: bool,
        #[command(subcommand)]
        action: PortfolioAction,
    },
    /// AI trading session commands
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum PortfolioAction {
    /// Show cash, positions and recent transactions
    Status,
    /// Buy shares
    Buy {
        #[arg(short, long)]
        symbol: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        shares: f64,
        /// Price per share
        #[arg(short, long)]
        price: f64,
    },
    /// Sell shares
    Sell {
        #[arg(short, long)]
        symbol: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        shares: f64,
        /// Price per share
        #[arg(short, long)]
        price: f64,
    },
    /// Buy or sell option contracts
    Option {
        #[arg(short, long)]
        symbol: String,
        #[arg(long = "type", value_enum)]
        option_type: CliOptionType,
        #[arg(long)]
        strike: f64,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: NaiveDate,
        /// Premium per share
        #[arg(long)]
        premium: f64,
        /// Number of contracts
        #[arg(short = 'n', long)]
        contracts: f64,
        #[arg(long, value_enum, default_value = "buy")]
        side: CliSide,
    },
    /// Reset the account to its initial cash
    Reset,
    /// Mark a held position to a new price
    Mark {
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long)]
        price: f64,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Run an offline session for a few cycles on synthetic data
    Demo {
        #[arg(short, long, default_value = "demo")]
        user: String,
        #[arg(short, long, default_value = "10000")]
        capital: f64,
        /// Symbols to trade (comma-separated, defaults to the configured set)
        #[arg(short = 'y', long)]
        symbols: Option<String>,
        /// Number of cycles to run
        #[arg(short = 'n', long, default_value = "3")]
        cycles: usize,
        /// Seed for reproducible synthetic data
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliOptionType {
    Call,
    Put,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSide {
    Buy,
    Sell,
}

impl From<CliSide> for TradeSide {
    fn from(side: CliSide) -> Self {
        match side {
            CliSide::Buy => TradeSide::Buy,
            CliSide::Sell => TradeSide::Sell,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SphereConfig::load_from_path(path),
        None => SphereConfig::load(),
    }
    .context("failed to load configuration")?;

    let output = match cli.command {
        Commands::Portfolio { paper, action } => {
            let kind = if paper { AccountKind::Paper } else { AccountKind::Live };
            handle_portfolio(kind, action, &config)
        }
        Commands::Session { action } => handle_session(action, &config).await,
    };

    println!("{}", output);
    Ok(())
}

fn render<T: Serialize>(result: sphere_core::Result<T>) -> String {
    let response = match result {
        Ok(data) => serde_json::to_value(ApiResponse::ok(data)),
        Err(e) => serde_json::to_value(ApiResponse::<()>::err(e.to_string())),
    };

    response
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|e| json!({ "ok": false, "error": e.to_string() }).to_string())
}

fn handle_portfolio(kind: AccountKind, action: PortfolioAction, config: &SphereConfig) -> String {
    let mut ledger = match Ledger::with_config(kind, &config.ledger) {
        Ok(ledger) => ledger,
        Err(e) => return render::<()>(Err(e)),
    };

    match action {
        PortfolioAction::Status => {
            let portfolio = ledger.portfolio();
            render(Ok(json!({
                "account": kind,
                "cash": portfolio.cash,
                "totalValue": portfolio.total_value,
                "positionCount": portfolio.position_count(),
                "positions": portfolio.positions.values().collect::<Vec<_>>(),
                "optionPositions": portfolio.option_positions.values().collect::<Vec<_>>(),
                "recentTransactions": portfolio.transactions.iter().take(10).collect::<Vec<_>>(),
            })))
        }
        PortfolioAction::Buy { symbol, shares, price } => {
            trade_output(&mut ledger, |l| l.execute_stock_trade(&symbol, shares, price, TradeSide::Buy))
        }
        PortfolioAction::Sell { symbol, shares, price } => {
            trade_output(&mut ledger, |l| l.execute_stock_trade(&symbol, shares, price, TradeSide::Sell))
        }
        PortfolioAction::Option {
            symbol,
            option_type,
            strike,
            expiry,
            premium,
            contracts,
            side,
        } => {
            let option_type = match option_type {
                CliOptionType::Call => OptionType::Call,
                CliOptionType::Put => OptionType::Put,
            };
            let expiry = Utc.from_utc_datetime(&expiry.and_time(NaiveTime::MIN));
            let contract = OptionContract::new(&symbol, option_type, strike, expiry, premium);
            trade_output(&mut ledger, |l| l.execute_option_trade(&contract, contracts, side.into()))
        }
        PortfolioAction::Reset => render(ledger.reset_portfolio().map(|()| {
            json!({
                "message": "Portfolio reset",
                "cash": ledger.portfolio().cash,
            })
        })),
        PortfolioAction::Mark { symbol, price } => {
            let prices = vec![(symbol.to_uppercase(), price)];
            render(ledger.update_prices(&prices).map(|updated| {
                json!({
                    "updated": updated,
                    "totalValue": ledger.portfolio().total_value,
                })
            }))
        }
    }
}

fn trade_output<F>(ledger: &mut Ledger, trade: F) -> String
where
    F: FnOnce(&mut Ledger) -> sphere_core::Result<sphere_core::Transaction>,
{
    let result = trade(&mut *ledger).map(|transaction| {
        json!({
            "transaction": transaction,
            "cash": ledger.portfolio().cash,
            "totalValue": ledger.portfolio().total_value,
        })
    });
    render(result)
}

async fn handle_session(action: SessionAction, config: &SphereConfig) -> String {
    match action {
        SessionAction::Demo {
            user,
            capital,
            symbols,
            cycles,
            seed,
        } => render(run_demo(&user, capital, symbols, cycles, seed, config).await),
    }
}

async fn run_demo(
    user: &str,
    capital: f64,
    symbols: Option<String>,
    cycles: usize,
    seed: Option<u64>,
    config: &SphereConfig,
) -> sphere_core::Result<serde_json::Value> {
    let synthetic = match seed {
        Some(seed) => RandomSynthetic::seeded(seed),
        None => RandomSynthetic::new(),
    };
    let engine = TradingEngine::new(
        Arc::new(SessionStore::new()),
        Providers::offline_with(Arc::new(synthetic)),
        config.engine.clone(),
    );

    let symbols: Vec<String> = symbols
        .map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let session = engine.create_session(user, capital, symbols).await?;
    let mut reports = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        reports.push(engine.run_cycle(&session.session_id).await?);
    }

    engine
        .update_session_status(&session.session_id, SessionStatus::Stopped)
        .await?;
    let session = engine.get_session(&session.session_id).await?;

    Ok(json!({
        "session": session,
        "cycles": reports,
    }))
}
