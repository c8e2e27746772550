//! Core data types for the Sphere ledger.
//!
//! Field names serialize in camelCase so a persisted portfolio keeps the
//! dashboard's JSON layout (`cash`, `totalValue`, `positions`,
//! `optionPositions`, `transactions`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Cash a freshly reset live account starts with.
pub const DEFAULT_CASH: f64 = 10_000.0;

/// Shares controlled by one option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Trade direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn verb(&self) -> &'static str {
        match self {
            TradeSide::Buy => "bought",
            TradeSide::Sell => "sold",
        }
    }
}

/// What kind of instrument a transaction touched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Option,
}

/// Option contract type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Types stored in a portfolio map but persisted as a plain JSON array.
pub trait Keyed {
    type Key: Ord;

    fn key(&self) -> Self::Key;
}

/// An open stock holding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockPosition {
    pub id: String,
    /// Ticker symbol (uppercase)
    pub symbol: String,
    pub quantity: f64,
    /// Weighted average cost per share
    pub average_price: f64,
    /// Last known market price
    pub current_price: f64,
}

impl StockPosition {
    /// Open a new position at the fill price.
    pub fn new(symbol: &str, quantity: f64, price: f64) -> Self {
        Self {
            id: format!("pos-{}", Uuid::new_v4()),
            symbol: symbol.to_uppercase(),
            quantity,
            average_price: price,
            current_price: price,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }
}

impl Keyed for StockPosition {
    type Key = String;

    fn key(&self) -> String {
        self.symbol.clone()
    }
}

/// Identity of an option holding.
///
/// Strikes are compared in cents and expiries by UTC calendar day, so two
/// contracts quoted with slightly different expiry instants on the same day
/// land in the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionKey {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike_cents: i64,
    pub expiry: NaiveDate,
}

impl OptionKey {
    pub fn new(symbol: &str, option_type: OptionType, strike: f64, expiry: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            option_type,
            strike_cents: (strike * 100.0).round() as i64,
            expiry: expiry.date_naive(),
        }
    }
}

/// An option contract offered for trading (one row of an option chain).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub symbol: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike_price: f64,
    pub expiry_date: DateTime<Utc>,
    /// Premium per share; one contract costs `premium * 100`
    pub premium: f64,
}

impl OptionContract {
    pub fn new(
        symbol: &str,
        option_type: OptionType,
        strike_price: f64,
        expiry_date: DateTime<Utc>,
        premium: f64,
    ) -> Self {
        Self {
            id: None,
            symbol: symbol.to_uppercase(),
            option_type,
            strike_price,
            expiry_date,
            premium,
        }
    }

    pub fn key(&self) -> OptionKey {
        OptionKey::new(&self.symbol, self.option_type, self.strike_price, self.expiry_date)
    }

    pub fn contract_cost(&self) -> f64 {
        self.premium * CONTRACT_MULTIPLIER
    }
}

/// An open option holding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionPosition {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike_price: f64,
    pub expiry_date: DateTime<Utc>,
    pub premium: f64,
    pub quantity: f64,
}

impl OptionPosition {
    pub fn open(contract: &OptionContract, quantity: f64) -> Self {
        Self {
            id: contract
                .id
                .clone()
                .unwrap_or_else(|| format!("opt-{}", Uuid::new_v4())),
            symbol: contract.symbol.to_uppercase(),
            option_type: contract.option_type,
            strike_price: contract.strike_price,
            expiry_date: contract.expiry_date,
            premium: contract.premium,
            quantity,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.premium * CONTRACT_MULTIPLIER
    }
}

impl Keyed for OptionPosition {
    type Key = OptionKey;

    fn key(&self) -> OptionKey {
        OptionKey::new(&self.symbol, self.option_type, self.strike_price, self.expiry_date)
    }
}

/// Contract details recorded on option transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionDetails {
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike_price: f64,
    pub expiry_date: DateTime<Utc>,
    pub premium: f64,
}

/// A single entry of the append-only transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub asset_type: AssetType,
    pub symbol: String,
    pub quantity: f64,
    /// Share price, or premium per share for options
    pub price: f64,
    /// Signed amount: positive for buys, negative for sells
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_details: Option<OptionDetails>,
}

impl Transaction {
    pub fn stock(side: TradeSide, symbol: &str, quantity: f64, price: f64) -> Self {
        let amount = quantity * price;
        Self {
            id: format!("tx-{}", Uuid::new_v4()),
            date: Utc::now(),
            side,
            asset_type: AssetType::Stock,
            symbol: symbol.to_uppercase(),
            quantity,
            price,
            total: signed(side, amount),
            option_details: None,
        }
    }

    pub fn option(side: TradeSide, contract: &OptionContract, quantity: f64) -> Self {
        let amount = contract.contract_cost() * quantity;
        Self {
            id: format!("tx-{}", Uuid::new_v4()),
            date: Utc::now(),
            side,
            asset_type: AssetType::Option,
            symbol: contract.symbol.to_uppercase(),
            quantity,
            price: contract.premium,
            total: signed(side, amount),
            option_details: Some(OptionDetails {
                option_type: contract.option_type,
                strike_price: contract.strike_price,
                expiry_date: contract.expiry_date,
                premium: contract.premium,
            }),
        }
    }
}

fn signed(side: TradeSide, amount: f64) -> f64 {
    match side {
        TradeSide::Buy => amount,
        TradeSide::Sell => -amount,
    }
}

/// The user's account: cash, holdings and transaction history.
///
/// Missing fields in a stored document take the default portfolio's values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Portfolio {
    pub cash: f64,
    /// cash + stock market value + option market value
    pub total_value: f64,
    #[serde(with = "keyed_seq")]
    pub positions: BTreeMap<String, StockPosition>,
    #[serde(with = "keyed_seq")]
    pub option_positions: BTreeMap<OptionKey, OptionPosition>,
    /// Newest first
    pub transactions: Vec<Transaction>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::with_cash(DEFAULT_CASH)
    }
}

impl Portfolio {
    /// Create an empty portfolio holding only cash.
    pub fn with_cash(cash: f64) -> Self {
        Self {
            cash,
            total_value: cash,
            positions: BTreeMap::new(),
            option_positions: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(|p| p.market_value()).sum()
    }

    pub fn options_value(&self) -> f64 {
        self.option_positions.values().map(|p| p.market_value()).sum()
    }

    /// Recompute `total_value` from cash and holdings.
    pub fn revalue(&mut self) {
        self.total_value = self.cash + self.positions_value() + self.options_value();
    }

    /// Find a stock position by symbol (case insensitive).
    pub fn position(&self, symbol: &str) -> Option<&StockPosition> {
        self.positions.get(&symbol.to_uppercase())
    }

    pub fn option_position(&self, key: &OptionKey) -> Option<&OptionPosition> {
        self.option_positions.get(key)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len() + self.option_positions.len()
    }
}

/// (De)serializes a keyed map as a JSON array of its values.
mod keyed_seq {
    use super::*;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<V::Key, V>, D::Error>
    where
        V: Keyed + Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let items = Vec::<V>::deserialize(deserializer)?;
        Ok(items.into_iter().map(|item| (item.key(), item)).collect())
    }
}

/// API response wrapper for CLI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
