//! AI trading sessions.
//!
//! A session is an isolated run with its own capital and positions. The
//! [`TradingEngine`] turns model predictions into signals, sizes them, and
//! fills them against the current quote. Sessions are kept in a
//! [`SessionStore`] and are never persisted.

mod engine;
mod performance;
mod signals;
mod sizing;
mod store;
mod types;

pub use engine::{spawn_session_loop, CycleReport, Providers, TradingEngine};
pub use performance::{calculate_performance, closed_trades, max_drawdown, sharpe_ratio, ClosedTrade};
pub use signals::{derive_trading_signals, SignalRules};
pub use sizing::{calculate_position_size, SizingRules};
pub use store::{SessionHandle, SessionStore};
pub use types::{
    AiTrade, OrderSide, SessionStatus, SignalAction, TradeStatus, TradingPerformance,
    TradingSession, TradingSignal,
};
