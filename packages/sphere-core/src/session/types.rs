//! Trading session data types.

use crate::providers::DataSource;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Session lifecycle state.
///
/// ACTIVE and PAUSED switch freely; STOPPED is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "ACTIVE"),
            SessionStatus::Paused => write!(f, "PAUSED"),
            SessionStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl SessionStatus {
    /// Whether a session may move from `self` to `next`.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        *self != SessionStatus::Stopped || next == SessionStatus::Stopped
    }
}

/// What a signal recommends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// Side of a session fill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Lifecycle of a session trade. Simulated fills are always `Filled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

/// A directional trade suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradingSignal {
    pub symbol: String,
    pub action: SignalAction,
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    /// Source of the prediction the signal was derived from
    #[serde(default)]
    pub source: DataSource,
}

impl TradingSignal {
    pub fn new(symbol: &str, action: SignalAction, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            action,
            confidence,
            reasoning: reasoning.into(),
            timestamp: Utc::now(),
            source: DataSource::Live,
        }
    }
}

/// A simulated fill executed by a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiTrade {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub signal: TradingSignal,
    pub status: TradeStatus,
    /// Source of the execution price
    #[serde(default)]
    pub price_source: DataSource,
}

impl AiTrade {
    pub fn filled(signal: &TradingSignal, side: OrderSide, quantity: u64, price: f64, price_source: DataSource) -> Self {
        Self {
            id: format!("trade_{}", Uuid::new_v4().simple()),
            symbol: signal.symbol.to_uppercase(),
            side,
            quantity,
            price,
            timestamp: Utc::now(),
            signal: signal.clone(),
            status: TradeStatus::Filled,
            price_source,
        }
    }

    /// quantity * price
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Session performance, recomputed from the trade history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradingPerformance {
    /// Percent change of current over initial capital
    pub total_return: f64,
    pub sharpe_ratio: f64,
    /// Percent peak-to-trough decline of realised equity
    pub max_drawdown: f64,
    /// Fraction (0..1) of closing trades that made money
    pub win_rate: f64,
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub average_win: f64,
    /// Mean loss, as a negative amount
    pub average_loss: f64,
}

/// An automated trading run with its own capital and positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradingSession {
    pub session_id: String,
    pub user_id: String,
    pub symbols: Vec<String>,
    pub initial_capital: f64,
    pub current_capital: f64,
    /// Net shares per symbol; a sell beyond holdings goes negative
    pub positions: BTreeMap<String, i64>,
    pub trades: Vec<AiTrade>,
    pub signals: Vec<TradingSignal>,
    pub performance: TradingPerformance,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradingSession {
    /// Create an active session with untouched capital and no history.
    pub fn new(user_id: &str, initial_capital: f64, symbols: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: format!("ai_session_{}_{}", Uuid::new_v4().simple(), user_id),
            user_id: user_id.to_string(),
            symbols: symbols.into_iter().map(|s| s.to_uppercase()).collect(),
            initial_capital,
            current_capital: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            signals: Vec::new(),
            performance: TradingPerformance::default(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Fail with [`Error::SessionNotActive`] unless the session is active.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::SessionNotActive {
                session_id: self.session_id.clone(),
                status: self.status,
            })
        }
    }

    /// Net shares held for a symbol.
    pub fn position(&self, symbol: &str) -> i64 {
        self.positions
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    /// Apply a fill to positions and capital.
    pub(crate) fn apply_fill(&mut self, trade: &AiTrade) {
        let quantity = trade.quantity as i64;
        let held = self.positions.entry(trade.symbol.clone()).or_insert(0);
        match trade.side {
            OrderSide::Buy => {
                *held += quantity;
                self.current_capital -= trade.notional();
            }
            OrderSide::Sell => {
                *held -= quantity;
                self.current_capital += trade.notional();
            }
        }
        self.trades.push(trade.clone());
    }
}
