//! The account ledger: validates trades and commits them atomically.

use super::notify::{LogNotifier, NotificationSink, Severity};
use super::store::{JsonFileStore, MemoryStore, PortfolioStore};
use crate::config::{data_home, LedgerConfig, SphereConfig};
use crate::providers::QuoteProvider;
use crate::types::{
    OptionContract, OptionPosition, Portfolio, StockPosition, TradeSide, Transaction,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tolerance for fractional quantities: a sale within this of the holding
/// is allowed and closes the position.
const QUANTITY_EPSILON: f64 = 1e-9;

/// Which of the user's two accounts a ledger manages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// The main simulated account
    Live,
    /// The virtual practice account
    Paper,
}

impl AccountKind {
    /// Storage key of the account's document.
    pub fn storage_key(&self) -> &'static str {
        match self {
            AccountKind::Live => "tradingAppPortfolio",
            AccountKind::Paper => "tradingAppPaperPortfolio",
        }
    }

    /// Get the default portfolio file path.
    ///
    /// Can be overridden with `SPHERE_PORTFOLIO_FILE` (live) or
    /// `SPHERE_PAPER_PORTFOLIO_FILE` (paper).
    pub fn default_path(&self, data_dir: Option<&Path>) -> PathBuf {
        let var = match self {
            AccountKind::Live => "SPHERE_PORTFOLIO_FILE",
            AccountKind::Paper => "SPHERE_PAPER_PORTFOLIO_FILE",
        };
        if let Ok(path) = env::var(var) {
            return PathBuf::from(path);
        }

        data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(data_home)
            .join(format!("{}.json", self.storage_key()))
    }

    pub fn initial_cash(&self, config: &LedgerConfig) -> f64 {
        match self {
            AccountKind::Live => config.initial_cash,
            AccountKind::Paper => config.paper_initial_cash,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AccountKind::Live => "",
            AccountKind::Paper => "Paper ",
        }
    }
}

/// Owns one account's cash, positions and transaction log.
///
/// Every trade is validated against a copy of the portfolio, persisted, and
/// only then swapped in. A failed trade leaves the portfolio untouched.
pub struct Ledger {
    kind: AccountKind,
    initial_cash: f64,
    portfolio: Portfolio,
    store: Box<dyn PortfolioStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl Ledger {
    /// Create a ledger backed by the given store.
    ///
    /// Loads the stored portfolio, or starts from `initial_cash` when the
    /// store is empty.
    pub fn new(
        kind: AccountKind,
        initial_cash: f64,
        store: Box<dyn PortfolioStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let portfolio = match store.load()? {
            Some(portfolio) => {
                debug!(account = ?kind, cash = portfolio.cash, "Loaded portfolio");
                portfolio
            }
            None => {
                let fresh = Portfolio::with_cash(initial_cash);
                if kind == AccountKind::Paper {
                    store.save(&fresh)?;
                }
                fresh
            }
        };

        Ok(Self {
            kind,
            initial_cash,
            portfolio,
            store,
            notifier,
        })
    }

    /// Open an account from the default config and file location.
    pub fn open(kind: AccountKind) -> Result<Self> {
        let config = SphereConfig::load()?;
        Self::with_config(kind, &config.ledger)
    }

    /// Open an account using explicit ledger settings.
    pub fn with_config(kind: AccountKind, config: &LedgerConfig) -> Result<Self> {
        let path = kind.default_path(config.data_dir.as_deref());
        Self::new(
            kind,
            kind.initial_cash(config),
            Box::new(JsonFileStore::new(path)),
            Arc::new(LogNotifier),
        )
    }

    /// Create an in-memory ledger (no persistence beyond the process).
    pub fn in_memory(kind: AccountKind) -> Self {
        let initial_cash = kind.initial_cash(&LedgerConfig::default());
        Self {
            kind,
            initial_cash,
            portfolio: Portfolio::with_cash(initial_cash),
            store: Box::new(MemoryStore::new()),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Get a reference to the current portfolio.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Buy or sell shares at `price`.
    ///
    /// Buys require `quantity * price <= cash` and are merged into any
    /// existing position at the weighted average cost. Sells require enough
    /// shares; a full sale removes the position, a partial one keeps the
    /// average price.
    pub fn execute_stock_trade(
        &mut self,
        symbol: &str,
        quantity: f64,
        price: f64,
        side: TradeSide,
    ) -> Result<Transaction> {
        let symbol = normalize_symbol(symbol).map_err(|e| self.reject(e))?;
        check_positive("quantity", quantity).map_err(|e| self.reject(e))?;
        check_positive("price", price).map_err(|e| self.reject(e))?;

        let total = quantity * price;
        let mut next = self.portfolio.clone();

        match side {
            TradeSide::Buy => {
                if total > next.cash {
                    return Err(self.reject(Error::InsufficientFunds {
                        required: total,
                        available: next.cash,
                    }));
                }

                next.positions
                    .entry(symbol.clone())
                    .and_modify(|pos| {
                        let new_quantity = pos.quantity + quantity;
                        pos.average_price =
                            (pos.quantity * pos.average_price + quantity * price) / new_quantity;
                        pos.quantity = new_quantity;
                        pos.current_price = price;
                    })
                    .or_insert_with(|| StockPosition::new(&symbol, quantity, price));
                next.cash -= total;
            }
            TradeSide::Sell => {
                let held = next.position(&symbol).map(|p| p.quantity).unwrap_or(0.0);
                if held <= 0.0 || quantity - held > QUANTITY_EPSILON {
                    return Err(self.reject(Error::InsufficientShares {
                        symbol,
                        requested: quantity,
                        held,
                    }));
                }

                if held - quantity <= QUANTITY_EPSILON {
                    next.positions.remove(&symbol);
                } else if let Some(pos) = next.positions.get_mut(&symbol) {
                    pos.quantity -= quantity;
                    pos.current_price = price;
                }
                next.cash += total;
            }
        }

        let transaction = Transaction::stock(side, &symbol, quantity, price);
        next.transactions.insert(0, transaction.clone());
        next.revalue();
        self.commit(next).map_err(|e| self.reject(e))?;

        info!(
            account = ?self.kind,
            %symbol,
            quantity,
            price,
            cash = self.portfolio.cash,
            "Stock trade executed"
        );
        self.notifier.notify(
            &format!("{}Trade Executed", self.kind.label()),
            &format!(
                "Successfully {} {} shares of {}",
                side.verb(),
                quantity,
                symbol
            ),
            Severity::Success,
        );

        Ok(transaction)
    }

    /// Buy or sell option contracts at the contract's premium.
    ///
    /// Positions are keyed by symbol, type, strike and expiry day. One
    /// contract costs `premium * 100`.
    pub fn execute_option_trade(
        &mut self,
        contract: &OptionContract,
        quantity: f64,
        side: TradeSide,
    ) -> Result<Transaction> {
        let symbol = normalize_symbol(&contract.symbol).map_err(|e| self.reject(e))?;
        check_positive("quantity", quantity).map_err(|e| self.reject(e))?;
        check_positive("strike price", contract.strike_price).map_err(|e| self.reject(e))?;
        check_positive("premium", contract.premium).map_err(|e| self.reject(e))?;

        let contract = OptionContract {
            symbol,
            ..contract.clone()
        };
        let key = contract.key();
        let total = contract.contract_cost() * quantity;
        let mut next = self.portfolio.clone();

        match side {
            TradeSide::Buy => {
                if total > next.cash {
                    return Err(self.reject(Error::InsufficientFunds {
                        required: total,
                        available: next.cash,
                    }));
                }

                next.option_positions
                    .entry(key)
                    .and_modify(|pos| pos.quantity += quantity)
                    .or_insert_with(|| OptionPosition::open(&contract, quantity));
                next.cash -= total;
            }
            TradeSide::Sell => {
                let held = next
                    .option_position(&key)
                    .map(|p| p.quantity)
                    .unwrap_or(0.0);
                if held <= 0.0 || quantity - held > QUANTITY_EPSILON {
                    return Err(self.reject(Error::InsufficientContracts {
                        symbol: contract.symbol.clone(),
                        requested: quantity,
                        held,
                    }));
                }

                if held - quantity <= QUANTITY_EPSILON {
                    next.option_positions.remove(&key);
                } else if let Some(pos) = next.option_positions.get_mut(&key) {
                    pos.quantity -= quantity;
                }
                next.cash += total;
            }
        }

        let transaction = Transaction::option(side, &contract, quantity);
        next.transactions.insert(0, transaction.clone());
        next.revalue();
        self.commit(next).map_err(|e| self.reject(e))?;

        info!(
            account = ?self.kind,
            symbol = %contract.symbol,
            option_type = %contract.option_type,
            strike = contract.strike_price,
            quantity,
            cash = self.portfolio.cash,
            "Option trade executed"
        );
        self.notifier.notify(
            &format!("{}Trade Executed", self.kind.label()),
            &format!(
                "Successfully {} {} {} option(s) for {}",
                side.verb(),
                quantity,
                contract.option_type,
                contract.symbol
            ),
            Severity::Success,
        );

        Ok(transaction)
    }

    /// Reset the account to its starting cash with no holdings or history.
    ///
    /// The in-memory reset always happens; the returned error only reports a
    /// failure to persist it.
    pub fn reset_portfolio(&mut self) -> Result<()> {
        self.portfolio = Portfolio::with_cash(self.initial_cash);

        let persisted = match self.kind {
            AccountKind::Live => self.store.clear(),
            AccountKind::Paper => self.store.save(&self.portfolio),
        };
        if let Err(e) = &persisted {
            warn!(account = ?self.kind, "Failed to persist portfolio reset: {}", e);
        }

        info!(account = ?self.kind, cash = self.initial_cash, "Portfolio reset");
        self.notifier.notify(
            &format!("{}Portfolio Reset", self.kind.label()),
            &format!(
                "Your portfolio has been reset with ${:.2} cash.",
                self.initial_cash
            ),
            Severity::Info,
        );

        persisted
    }

    /// Update positions with current prices and recompute the total value.
    ///
    /// Returns how many positions were updated. Unknown symbols and invalid
    /// prices are ignored.
    pub fn update_prices(&mut self, prices: &[(String, f64)]) -> Result<usize> {
        let mut next = self.portfolio.clone();
        let mut updated = 0;

        for (symbol, price) in prices {
            if !price.is_finite() || *price <= 0.0 {
                continue;
            }
            if let Some(pos) = next.positions.get_mut(&symbol.to_uppercase()) {
                pos.current_price = *price;
                updated += 1;
            }
        }

        if updated == 0 {
            return Ok(0);
        }

        next.revalue();
        self.commit(next)?;
        debug!(account = ?self.kind, updated, total_value = self.portfolio.total_value, "Prices updated");
        Ok(updated)
    }

    /// Fetch a quote for every held stock and mark the positions to market.
    ///
    /// Quotes that fail are skipped and logged.
    pub async fn refresh_quotes(&mut self, provider: &dyn QuoteProvider) -> Result<usize> {
        let symbols: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        let mut prices = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            match provider.get_quote(&symbol).await {
                Ok(quote) => prices.push((symbol, quote.price)),
                Err(e) => warn!(%symbol, "Quote unavailable: {}", e),
            }
        }

        self.update_prices(&prices)
    }

    fn commit(&mut self, next: Portfolio) -> Result<()> {
        self.store.save(&next)?;
        self.portfolio = next;
        Ok(())
    }

    fn reject(&self, error: Error) -> Error {
        warn!(account = ?self.kind, "Trade rejected: {}", error);
        self.notifier
            .notify(error.title(), &error.to_string(), Severity::Error);
        error
    }
}

fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::InvalidOperation("Symbol is required".to_string()));
    }
    Ok(symbol)
}

fn check_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidOperation(format!(
            "Invalid {}: {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::notify::RecordingNotifier;
    use crate::types::OptionType;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn ledger_with(cash: f64) -> (Ledger, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let ledger = Ledger::new(
            AccountKind::Live,
            cash,
            Box::new(MemoryStore::new()),
            notifier.clone(),
        )
        .unwrap();
        (ledger, notifier)
    }

    fn call(strike: f64, premium: f64) -> OptionContract {
        let expiry = Utc.with_ymd_and_hms(2025, 6, 20, 20, 0, 0).unwrap();
        OptionContract::new("AAPL", OptionType::Call, strike, expiry, premium)
    }

    #[test]
    fn test_buy_then_sell_round_trip() {
        let (mut ledger, _) = ledger_with(10_000.0);

        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();
        let pos = ledger.portfolio().position("AAPL").unwrap();
        assert_eq!(ledger.portfolio().cash, 8500.0);
        assert_eq!(pos.quantity, 10.0);
        assert_eq!(pos.average_price, 150.0);

        ledger
            .execute_stock_trade("AAPL", 10.0, 160.0, TradeSide::Sell)
            .unwrap();
        assert_eq!(ledger.portfolio().cash, 10_100.0);
        assert!(ledger.portfolio().position("AAPL").is_none());
        assert_eq!(ledger.portfolio().transactions.len(), 2);
        assert_eq!(ledger.portfolio().total_value, 10_100.0);
    }

    #[test]
    fn test_buy_insufficient_funds() {
        let (mut ledger, notifier) = ledger_with(1000.0);
        let before = ledger.portfolio().clone();

        let result = ledger.execute_stock_trade("AAPL", 100.0, 150.0, TradeSide::Buy);

        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert_eq!(ledger.portfolio(), &before);
        let note = notifier.last().unwrap();
        assert_eq!(note.title, "Insufficient Funds");
        assert_eq!(note.severity, Severity::Error);
    }

    #[test]
    fn test_buy_exact_cash_allowed() {
        let (mut ledger, _) = ledger_with(1500.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();
        assert_eq!(ledger.portfolio().cash, 0.0);
    }

    #[test]
    fn test_sell_without_position() {
        let (mut ledger, _) = ledger_with(10_000.0);
        let result = ledger.execute_stock_trade("AAPL", 1.0, 150.0, TradeSide::Sell);
        assert!(matches!(
            result,
            Err(Error::InsufficientShares { held, .. }) if held == 0.0
        ));
        assert!(ledger.portfolio().transactions.is_empty());
    }

    #[test]
    fn test_sell_more_than_held() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 5.0, 100.0, TradeSide::Buy)
            .unwrap();
        let before = ledger.portfolio().clone();

        let result = ledger.execute_stock_trade("AAPL", 6.0, 100.0, TradeSide::Sell);
        assert!(matches!(result, Err(Error::InsufficientShares { .. })));
        assert_eq!(ledger.portfolio(), &before);
    }

    #[test]
    fn test_cost_averaging() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_stock_trade("aapl", 5.0, 171.0, TradeSide::Buy)
            .unwrap();

        let pos = ledger.portfolio().position("AAPL").unwrap();
        assert_eq!(pos.quantity, 15.0);
        // (10 * 150 + 5 * 171) / 15 = 157
        assert_relative_eq!(pos.average_price, 157.0, epsilon = 1e-9);
        assert_eq!(ledger.portfolio().positions.len(), 1);
    }

    #[test]
    fn test_partial_sell_keeps_average_price() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("MSFT", 10.0, 300.0, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_stock_trade("MSFT", 4.0, 320.0, TradeSide::Sell)
            .unwrap();

        let pos = ledger.portfolio().position("MSFT").unwrap();
        assert_eq!(pos.quantity, 6.0);
        assert_eq!(pos.average_price, 300.0);
        assert_eq!(pos.current_price, 320.0);
        // 10000 - 3000 + 1280
        assert_eq!(ledger.portfolio().cash, 8280.0);
        assert_eq!(ledger.portfolio().total_value, 8280.0 + 6.0 * 320.0);
    }

    #[test]
    fn test_transactions_newest_first() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 1.0, 100.0, TradeSide::Buy)
            .unwrap();
        let second = ledger
            .execute_stock_trade("MSFT", 1.0, 100.0, TradeSide::Buy)
            .unwrap();

        assert_eq!(ledger.portfolio().transactions[0], second);
        assert_eq!(ledger.portfolio().transactions[1].symbol, "AAPL");
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let (mut ledger, _) = ledger_with(10_000.0);

        for (symbol, qty, price) in [("", 1.0, 10.0), ("AAPL", 0.0, 10.0), ("AAPL", 1.0, -5.0), ("AAPL", f64::NAN, 10.0)] {
            let result = ledger.execute_stock_trade(symbol, qty, price, TradeSide::Buy);
            assert!(matches!(result, Err(Error::InvalidOperation(_))));
        }
        assert_eq!(ledger.portfolio(), &Portfolio::with_cash(10_000.0));
    }

    #[test]
    fn test_success_notification() {
        let (mut ledger, notifier) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();

        let note = notifier.last().unwrap();
        assert_eq!(note.title, "Trade Executed");
        assert_eq!(note.message, "Successfully bought 10 shares of AAPL");
        assert_eq!(note.severity, Severity::Success);
    }

    #[test]
    fn test_persistence_failure_leaves_state_unchanged() {
        let store = Arc::new(MemoryStore::new());

        struct Shared(Arc<MemoryStore>);
        impl PortfolioStore for Shared {
            fn load(&self) -> Result<Option<Portfolio>> {
                self.0.load()
            }
            fn save(&self, portfolio: &Portfolio) -> Result<()> {
                self.0.save(portfolio)
            }
            fn clear(&self) -> Result<()> {
                self.0.clear()
            }
        }

        let notifier = Arc::new(RecordingNotifier::new());
        let mut ledger = Ledger::new(
            AccountKind::Live,
            10_000.0,
            Box::new(Shared(store.clone())),
            notifier.clone(),
        )
        .unwrap();

        store.fail_writes(true);
        let result = ledger.execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy);

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(ledger.portfolio(), &Portfolio::with_cash(10_000.0));
        assert_eq!(notifier.last().unwrap().title, "Trade Failed");
    }

    #[test]
    fn test_option_buy_and_sell() {
        let (mut ledger, _) = ledger_with(10_000.0);
        let contract = call(200.0, 3.5);

        let tx = ledger
            .execute_option_trade(&contract, 2.0, TradeSide::Buy)
            .unwrap();
        assert_eq!(tx.total, 700.0);
        assert_eq!(ledger.portfolio().cash, 9300.0);
        assert_eq!(ledger.portfolio().total_value, 10_000.0);

        ledger
            .execute_option_trade(&contract, 1.0, TradeSide::Buy)
            .unwrap();
        let pos = ledger.portfolio().option_position(&contract.key()).unwrap();
        assert_eq!(pos.quantity, 3.0);
        assert_eq!(ledger.portfolio().option_positions.len(), 1);

        ledger
            .execute_option_trade(&contract, 3.0, TradeSide::Sell)
            .unwrap();
        assert!(ledger.portfolio().option_positions.is_empty());
        assert_eq!(ledger.portfolio().cash, 10_000.0);
        assert_eq!(ledger.portfolio().transactions.len(), 3);
    }

    #[test]
    fn test_option_positions_keyed_by_contract() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_option_trade(&call(200.0, 1.0), 1.0, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_option_trade(&call(210.0, 1.0), 1.0, TradeSide::Buy)
            .unwrap();

        let mut put = call(200.0, 1.0);
        put.option_type = OptionType::Put;
        ledger
            .execute_option_trade(&put, 1.0, TradeSide::Buy)
            .unwrap();

        assert_eq!(ledger.portfolio().option_positions.len(), 3);
    }

    #[test]
    fn test_option_sell_more_than_held() {
        let (mut ledger, _) = ledger_with(10_000.0);
        let contract = call(200.0, 2.0);
        ledger
            .execute_option_trade(&contract, 1.0, TradeSide::Buy)
            .unwrap();

        let result = ledger.execute_option_trade(&contract, 2.0, TradeSide::Sell);
        assert!(matches!(result, Err(Error::InsufficientContracts { .. })));
        assert_eq!(ledger.portfolio().cash, 9800.0);
    }

    #[test]
    fn test_fractional_shares_close_fully() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 0.3, 100.0, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_stock_trade("AAPL", 0.1, 100.0, TradeSide::Sell)
            .unwrap();

        // 0.3 - 0.1 leaves 0.19999999999999998 behind
        ledger
            .execute_stock_trade("AAPL", 0.2, 100.0, TradeSide::Sell)
            .unwrap();

        assert!(ledger.portfolio().position("AAPL").is_none());
        assert_relative_eq!(ledger.portfolio().cash, 10_000.0, epsilon = 1e-9);

        let err = ledger
            .execute_stock_trade("AAPL", 0.1, 100.0, TradeSide::Sell)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientShares { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_oversell_beyond_tolerance_rejected() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("MSFT", 1.0, 300.0, TradeSide::Buy)
            .unwrap();

        let result = ledger.execute_stock_trade("MSFT", 1.000_000_1, 300.0, TradeSide::Sell);
        assert!(matches!(result, Err(Error::InsufficientShares { .. })));
        assert_eq!(ledger.portfolio().position("MSFT").unwrap().quantity, 1.0);
    }

    #[test]
    fn test_fractional_contracts_close_fully() {
        let (mut ledger, _) = ledger_with(10_000.0);
        let contract = call(200.0, 1.0);
        ledger
            .execute_option_trade(&contract, 0.3, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_option_trade(&contract, 0.1, TradeSide::Sell)
            .unwrap();
        ledger
            .execute_option_trade(&contract, 0.2, TradeSide::Sell)
            .unwrap();

        assert!(ledger.portfolio().option_positions.is_empty());
        assert_relative_eq!(ledger.portfolio().cash, 10_000.0, epsilon = 1e-9);

        let err = ledger
            .execute_option_trade(&contract, 0.1, TradeSide::Sell)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientContracts { .. }));
    }

    fn assert_book_consistent(portfolio: &Portfolio) {
        assert!(portfolio.cash >= 0.0, "cash went negative: {}", portfolio.cash);
        for pos in portfolio.positions.values() {
            assert!(
                pos.quantity > QUANTITY_EPSILON,
                "{} kept with quantity {}",
                pos.symbol,
                pos.quantity
            );
        }

        let expected = portfolio.cash
            + portfolio
                .positions
                .values()
                .map(|p| p.quantity * p.current_price)
                .sum::<f64>();
        assert_relative_eq!(portfolio.total_value, expected, max_relative = 1e-9);
    }

    fn run_random_trades(seed: u64, fractional: bool) {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(seed);
        let mut ledger = Ledger::in_memory(AccountKind::Live);
        let symbols = ["AAPL", "MSFT", "TSLA", "NVDA"];

        for step in 0..400 {
            let symbol = symbols[rng.gen_range(0..symbols.len())];
            let price = rng.gen_range(100..=50_000) as f64 / 100.0;
            let size = if fractional {
                rng.gen_range(1..=500) as f64 / 100.0
            } else {
                rng.gen_range(1..=25) as f64
            };
            let held = ledger
                .portfolio()
                .position(symbol)
                .map(|p| p.quantity)
                .unwrap_or(0.0);

            let (side, quantity) = match rng.gen_range(0..3) {
                0 => (TradeSide::Buy, size),
                1 => (TradeSide::Sell, size),
                // close out at the nominal size a user would type
                _ if held > 0.0 => (TradeSide::Sell, (held * 100.0).round() / 100.0),
                _ => (TradeSide::Buy, size),
            };

            let before = ledger.portfolio().clone();
            match ledger.execute_stock_trade(symbol, quantity, price, side) {
                Ok(_) => {
                    if side == TradeSide::Sell && (held - quantity).abs() <= QUANTITY_EPSILON {
                        assert!(
                            ledger.portfolio().position(symbol).is_none(),
                            "step {}: {} not closed",
                            step,
                            symbol
                        );
                    }
                }
                Err(e) => {
                    assert!(e.is_validation(), "step {}: {}", step, e);
                    assert_eq!(ledger.portfolio(), &before);
                    match side {
                        TradeSide::Buy => assert!(quantity * price > before.cash),
                        TradeSide::Sell => {
                            assert!(held <= 0.0 || quantity - held > QUANTITY_EPSILON)
                        }
                    }
                }
            }

            assert_book_consistent(ledger.portfolio());
        }
    }

    #[test]
    fn test_random_whole_share_sequences() {
        for seed in 0..5 {
            run_random_trades(seed, false);
        }
    }

    #[test]
    fn test_random_fractional_sequences() {
        for seed in 100..105 {
            run_random_trades(seed, true);
        }
    }

    #[test]
    fn test_option_insufficient_funds_and_bad_premium() {
        let (mut ledger, _) = ledger_with(100.0);

        let result = ledger.execute_option_trade(&call(200.0, 5.0), 1.0, TradeSide::Buy);
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        let result = ledger.execute_option_trade(&call(200.0, 0.0), 1.0, TradeSide::Buy);
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert!(ledger.portfolio().transactions.is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();

        ledger.reset_portfolio().unwrap();
        assert_eq!(ledger.portfolio(), &Portfolio::with_cash(10_000.0));
        ledger.reset_portfolio().unwrap();
        assert_eq!(ledger.portfolio().cash, 10_000.0);
        assert_eq!(ledger.portfolio().total_value, 10_000.0);
        assert!(ledger.portfolio().positions.is_empty());
        assert!(ledger.portfolio().option_positions.is_empty());
        assert!(ledger.portfolio().transactions.is_empty());
    }

    #[test]
    fn test_update_prices() {
        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();

        let updated = ledger
            .update_prices(&[
                ("aapl".to_string(), 175.0),
                ("MSFT".to_string(), 300.0),
                ("AAPL".to_string(), f64::NAN),
            ])
            .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(ledger.portfolio().position("AAPL").unwrap().current_price, 175.0);
        assert_eq!(ledger.portfolio().total_value, 8500.0 + 1750.0);
    }

    #[tokio::test]
    async fn test_refresh_quotes_skips_missing() {
        use crate::providers::StaticQuoteProvider;

        let (mut ledger, _) = ledger_with(10_000.0);
        ledger
            .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
            .unwrap();
        ledger
            .execute_stock_trade("TSLA", 4.0, 250.0, TradeSide::Buy)
            .unwrap();

        let provider = StaticQuoteProvider::new().with_price("AAPL", 160.0);
        let updated = ledger.refresh_quotes(&provider).await.unwrap();

        assert_eq!(updated, 1);
        assert_eq!(ledger.portfolio().position("AAPL").unwrap().current_price, 160.0);
        assert_eq!(ledger.portfolio().position("TSLA").unwrap().current_price, 250.0);
        assert_relative_eq!(ledger.portfolio().total_value, 7500.0 + 1600.0 + 1000.0);
    }

    #[test]
    fn test_persistence_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.json");

        {
            let mut ledger = Ledger::new(
                AccountKind::Live,
                10_000.0,
                Box::new(JsonFileStore::new(path.clone())),
                Arc::new(RecordingNotifier::new()),
            )
            .unwrap();
            ledger
                .execute_stock_trade("AAPL", 10.0, 150.0, TradeSide::Buy)
                .unwrap();
        }

        let ledger = Ledger::new(
            AccountKind::Live,
            10_000.0,
            Box::new(JsonFileStore::new(path)),
            Arc::new(RecordingNotifier::new()),
        )
        .unwrap();
        assert_eq!(ledger.portfolio().cash, 8500.0);
        assert_eq!(ledger.portfolio().position("AAPL").unwrap().quantity, 10.0);
    }

    #[test]
    fn test_paper_account_initialized_and_saved() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(
            AccountKind::Paper,
            100_000.0,
            Box::new(store),
            Arc::new(RecordingNotifier::new()),
        )
        .unwrap();

        assert_eq!(ledger.kind(), AccountKind::Paper);
        assert_eq!(ledger.portfolio().cash, 100_000.0);
    }

    #[test]
    fn test_paper_notification_label() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut ledger = Ledger::new(
            AccountKind::Paper,
            100_000.0,
            Box::new(MemoryStore::new()),
            notifier.clone(),
        )
        .unwrap();
        ledger
            .execute_stock_trade("NVDA", 1.0, 450.0, TradeSide::Buy)
            .unwrap();

        assert_eq!(notifier.last().unwrap().title, "Paper Trade Executed");
    }

    #[test]
    fn test_storage_paths() {
        let dir = tempdir().unwrap();
        let live = AccountKind::Live.default_path(Some(dir.path()));
        assert!(live.ends_with("tradingAppPortfolio.json"));
    }
}
