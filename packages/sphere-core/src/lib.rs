//! Sphere Core - simulated brokerage ledger and AI trading session engine.
//!
//! This crate provides the bookkeeping and automation behind the Sphere
//! paper-trading dashboard:
//!
//! - **Ledger**: cash, stock and option positions, transaction history
//! - **Trading sessions**: signal derivation, position sizing, simulated fills
//! - **Performance**: realised P&L, win rate, Sharpe ratio, drawdown
//! - **Providers**: quote/signal/analysis traits with labelled synthetic fallback
//!
//! # Example
//!
//! ```rust,no_run
//! use sphere_core::ledger::{AccountKind, Ledger};
//! use sphere_core::TradeSide;
//!
//! // Opens the live account (~/.sphere/tradingAppPortfolio.json by default)
//! let mut ledger = Ledger::open(AccountKind::Live).unwrap();
//!
//! ledger.execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy).unwrap();
//! println!("Cash left: {}", ledger.portfolio().cash);
//! ```

pub mod config;
pub mod ledger;
pub mod providers;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use types::{
    ApiResponse, AssetType, OptionContract, OptionDetails, OptionKey, OptionPosition,
    OptionType, Portfolio, StockPosition, TradeSide, Transaction,
};

// Re-export main functionality
pub use config::{EngineConfig, LedgerConfig, SphereConfig};
pub use ledger::{AccountKind, Ledger, NotificationSink, PortfolioStore, Severity};
pub use providers::{
    AnalysisProvider, DataSource, MarketAnalysis, Prediction, Quote, QuoteProvider,
    SignalProvider, SyntheticSource,
};
pub use session::{
    calculate_position_size, derive_trading_signals, AiTrade, SessionStatus, SessionStore,
    SignalAction, TradeStatus, TradingEngine, TradingPerformance, TradingSession, TradingSignal,
};

/// Error types for sphere-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Insufficient funds: need ${required:.2}, have ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("Insufficient {symbol} contracts: requested {requested}, held {held}")]
    InsufficientContracts {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {session_id} is not active (status: {status})")]
    SessionNotActive {
        session_id: String,
        status: session::SessionStatus,
    },

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: session::SessionStatus,
        to: session::SessionStatus,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timed out after {0:?}")]
    ProviderTimeout(std::time::Duration),

    #[error("Invalid quote for {symbol}: {price}")]
    InvalidQuote { symbol: String, price: f64 },
}

impl Error {
    /// Failures caused by a trade request that does not fit the account.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFunds { .. }
                | Error::InsufficientShares { .. }
                | Error::InsufficientContracts { .. }
                | Error::InvalidOperation(_)
        )
    }

    /// Short, user-facing title for notifications.
    pub fn title(&self) -> &'static str {
        match self {
            Error::InsufficientFunds { .. } => "Insufficient Funds",
            Error::InsufficientShares { .. } => "Insufficient Shares",
            Error::InsufficientContracts { .. } => "Insufficient Contracts",
            Error::SessionNotFound(_) => "Session Not Found",
            Error::SessionNotActive { .. } | Error::InvalidTransition { .. } => "Session Unavailable",
            _ => "Trade Failed",
        }
    }
}

/// Result type for sphere-core operations.
pub type Result<T> = std::result::Result<T, Error>;
