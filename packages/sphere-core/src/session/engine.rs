//! The trading session engine.
//!
//! Drives a session through one cycle: fetch quotes and predictions, ask for
//! market analysis, derive signals, size and fill trades at the quoted price,
//! then recompute performance. Provider failures never abort a cycle; the
//! engine substitutes synthetic data tagged [`DataSource::Synthetic`].

use super::performance::calculate_performance;
use super::store::SessionStore;
use super::types::{
    AiTrade, OrderSide, SessionStatus, SignalAction, TradingPerformance, TradingSession,
    TradingSignal,
};
use crate::config::EngineConfig;
use crate::providers::{
    with_timeout, AnalysisProvider, DataSource, MarketAnalysis, OfflineProvider, Prediction, Quote,
    QuoteProvider, RandomSynthetic, SignalProvider, SyntheticSource,
};
use crate::{Error, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The external collaborators an engine talks to.
#[derive(Clone)]
pub struct Providers {
    pub quotes: Arc<dyn QuoteProvider>,
    pub signals: Arc<dyn SignalProvider>,
    pub analysis: Arc<dyn AnalysisProvider>,
    pub synthetic: Arc<dyn SyntheticSource>,
}

impl Providers {
    /// No reachable services: everything comes from random synthetic data.
    pub fn offline() -> Self {
        Self::offline_with(Arc::new(RandomSynthetic::new()))
    }

    /// No reachable services, with a chosen synthetic source.
    pub fn offline_with(synthetic: Arc<dyn SyntheticSource>) -> Self {
        Self {
            quotes: Arc::new(OfflineProvider),
            signals: Arc::new(OfflineProvider),
            analysis: Arc::new(OfflineProvider),
            synthetic,
        }
    }
}

/// Everything one trading cycle produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub session_id: String,
    pub market_data: HashMap<String, Quote>,
    pub predictions: Vec<Prediction>,
    pub analysis: MarketAnalysis,
    pub signals: Vec<TradingSignal>,
    pub trades: Vec<AiTrade>,
    pub performance: TradingPerformance,
}

/// Runs trading sessions against a set of providers.
pub struct TradingEngine {
    store: Arc<SessionStore>,
    providers: Providers,
    config: EngineConfig,
}

impl TradingEngine {
    pub fn new(store: Arc<SessionStore>, providers: Providers, config: EngineConfig) -> Self {
        Self {
            store,
            providers,
            config,
        }
    }

    /// Engine with its own empty registry and offline providers.
    pub fn offline(config: EngineConfig) -> Self {
        Self::new(Arc::new(SessionStore::new()), Providers::offline(), config)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a new ACTIVE session.
    ///
    /// An empty symbol list falls back to the configured default symbols.
    pub async fn create_session(
        &self,
        user_id: &str,
        initial_capital: f64,
        symbols: Vec<String>,
    ) -> Result<TradingSession> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidOperation("user id must not be empty".to_string()));
        }
        if !initial_capital.is_finite() || initial_capital <= 0.0 {
            return Err(Error::InvalidOperation(format!(
                "initial capital must be positive, got {}",
                initial_capital
            )));
        }

        let symbols = if symbols.is_empty() {
            self.config.default_symbols.clone()
        } else {
            symbols
        };
        let session = TradingSession::new(user_id, initial_capital, symbols);
        info!(
            session_id = %session.session_id,
            user_id,
            initial_capital,
            symbols = ?session.symbols,
            "Trading session created"
        );

        self.store.insert(session.clone());
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<TradingSession> {
        self.store.snapshot(session_id).await
    }

    pub async fn get_user_sessions(&self, user_id: &str) -> Vec<TradingSession> {
        self.store.user_sessions(user_id).await
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.store.ids()
    }

    /// Predictions for `symbols`, or synthetic ones if the provider fails or
    /// times out.
    pub async fn get_predictions(&self, symbols: &[String]) -> Vec<Prediction> {
        let call = self.providers.signals.get_predictions(symbols);
        match with_timeout(self.config.provider_timeout(), call).await {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!("Prediction provider unavailable, using synthetic predictions: {}", e);
                symbols
                    .iter()
                    .map(|symbol| self.providers.synthetic.prediction(symbol))
                    .collect()
            }
        }
    }

    /// Market analysis, or a deterministic synthetic one if the provider
    /// fails or times out.
    pub async fn get_market_analysis(
        &self,
        symbols: &[String],
        market_data: &HashMap<String, Quote>,
        predictions: &[Prediction],
    ) -> MarketAnalysis {
        let call = self
            .providers
            .analysis
            .get_market_analysis(symbols, market_data, predictions);
        match with_timeout(self.config.provider_timeout(), call).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis provider unavailable, using synthetic analysis: {}", e);
                self.providers.synthetic.analysis(symbols, predictions)
            }
        }
    }

    /// Quote for one symbol, or a synthetic one if the provider fails or
    /// times out.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        let call = self.providers.quotes.get_quote(symbol);
        match with_timeout(self.config.provider_timeout(), call).await {
            Ok(quote) => quote,
            Err(e) => {
                debug!(%symbol, "Quote unavailable, using synthetic quote: {}", e);
                self.providers.synthetic.quote(symbol)
            }
        }
    }

    /// Quotes for every symbol, fetched concurrently.
    pub async fn get_market_data(&self, symbols: &[String]) -> HashMap<String, Quote> {
        let quotes = join_all(symbols.iter().map(|symbol| self.get_quote(symbol))).await;
        symbols
            .iter()
            .map(|s| s.to_uppercase())
            .zip(quotes)
            .collect()
    }

    /// Derive signals with the configured thresholds.
    pub fn derive_trading_signals(
        &self,
        predictions: &[Prediction],
        analysis: &MarketAnalysis,
    ) -> Vec<TradingSignal> {
        self.config.signal_rules().derive(predictions, analysis)
    }

    /// Fill `signals` against the session at the current quoted price.
    ///
    /// The session must be ACTIVE when the call starts. HOLD signals are
    /// skipped. BUYs are not checked against capital and SELLs are not
    /// checked against holdings, so capital and positions may go negative.
    /// A non-positive quote stops the batch with [`Error::InvalidQuote`];
    /// fills made before it are kept.
    pub async fn execute_session_trades(
        &self,
        session_id: &str,
        signals: &[TradingSignal],
    ) -> Result<Vec<AiTrade>> {
        let handle = self.store.handle(session_id)?;
        let mut session = handle.lock().await;
        session.ensure_active()?;

        let sizing = self.config.sizing();
        let mut executed = Vec::new();

        for signal in signals {
            let side = match signal.action {
                SignalAction::Buy => OrderSide::Buy,
                SignalAction::Sell => OrderSide::Sell,
                SignalAction::Hold => continue,
            };

            let quantity = sizing.position_size(
                session.current_capital,
                signal.confidence,
                session.position(&signal.symbol),
            );

            let quote = self.get_quote(&signal.symbol).await;
            if !quote.price.is_finite() || quote.price <= 0.0 {
                session.updated_at = Utc::now();
                warn!(%session_id, symbol = %signal.symbol, price = quote.price, "Rejecting batch on invalid quote");
                return Err(Error::InvalidQuote {
                    symbol: signal.symbol.clone(),
                    price: quote.price,
                });
            }

            let trade = AiTrade::filled(signal, side, quantity, quote.price, quote.source);
            session.apply_fill(&trade);
            info!(
                %session_id,
                symbol = %trade.symbol,
                side = ?trade.side,
                quantity,
                price = trade.price,
                synthetic = (trade.price_source == DataSource::Synthetic),
                capital = session.current_capital,
                "Session trade filled"
            );
            executed.push(trade);
        }

        session.updated_at = Utc::now();
        Ok(executed)
    }

    /// Recompute and store the session's performance. Works in any status.
    pub async fn update_performance(&self, session_id: &str) -> Result<TradingPerformance> {
        let handle = self.store.handle(session_id)?;
        let mut session = handle.lock().await;

        let performance =
            calculate_performance(session.initial_capital, session.current_capital, &session.trades);
        session.performance = performance.clone();
        session.updated_at = Utc::now();
        debug!(%session_id, total_return = performance.total_return, "Performance updated");

        Ok(performance)
    }

    /// Move a session to `status` and return the previous status.
    ///
    /// STOPPED is terminal; leaving it fails with
    /// [`Error::InvalidTransition`].
    pub async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<SessionStatus> {
        let handle = self.store.handle(session_id)?;
        let mut session = handle.lock().await;

        let previous = session.status;
        if !previous.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: previous,
                to: status,
            });
        }

        session.status = status;
        session.updated_at = Utc::now();
        info!(%session_id, from = %previous, to = %status, "Session status changed");

        Ok(previous)
    }

    /// Run one full cycle for an ACTIVE session.
    pub async fn run_cycle(&self, session_id: &str) -> Result<CycleReport> {
        let symbols = {
            let handle = self.store.handle(session_id)?;
            let session = handle.lock().await;
            session.ensure_active()?;
            session.symbols.clone()
        };

        let market_data = self.get_market_data(&symbols).await;
        let predictions = self.get_predictions(&symbols).await;
        let analysis = self.get_market_analysis(&symbols, &market_data, &predictions).await;
        let signals = self.derive_trading_signals(&predictions, &analysis);

        {
            let handle = self.store.handle(session_id)?;
            let mut session = handle.lock().await;
            session.ensure_active()?;
            session.signals.extend(signals.iter().cloned());
        }

        let trades = self.execute_session_trades(session_id, &signals).await?;
        let performance = self.update_performance(session_id).await?;

        info!(
            %session_id,
            signals = signals.len(),
            trades = trades.len(),
            "Trading cycle complete"
        );

        Ok(CycleReport {
            session_id: session_id.to_string(),
            market_data,
            predictions,
            analysis,
            signals,
            trades,
            performance,
        })
    }
}

/// Run cycles for a session every `period` until it is STOPPED or removed.
///
/// PAUSED sessions are skipped. A failed cycle is logged and the loop keeps
/// going.
pub fn spawn_session_loop(
    engine: Arc<TradingEngine>,
    session_id: String,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let status = match engine.get_session(&session_id).await {
                Ok(session) => session.status,
                Err(e) => {
                    warn!(%session_id, "Stopping session loop: {}", e);
                    break;
                }
            };

            match status {
                SessionStatus::Stopped => {
                    info!(%session_id, "Session stopped, loop exiting");
                    break;
                }
                SessionStatus::Paused => continue,
                SessionStatus::Active => {
                    if let Err(e) = engine.run_cycle(&session_id).await {
                        warn!(%session_id, "Trading cycle failed: {}", e);
                    }
                }
            }
        }
    })
}
