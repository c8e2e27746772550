//! External collaborators of the ledger and the trading engine.
//!
//! Quotes, model predictions and market analysis come from outside the
//! crate. Each is a trait so the engine can be wired to real services, to
//! the offline adapters in this module, or to test doubles.
//!
//! Every value carries a [`DataSource`] so synthetic fallback data can always
//! be told apart from provider data.

mod offline;
mod synthetic;

pub use offline::{OfflineProvider, StaticQuoteProvider};
pub use synthetic::{base_price, fallback_analysis, FixedSynthetic, RandomSynthetic, SyntheticSource};

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

/// Where a value came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Returned by a provider
    #[default]
    Live,
    /// Generated locally because the provider was unavailable
    Synthetic,
}

/// Current market data for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    #[serde(default)]
    pub source: DataSource,
}

/// A directional model prediction for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub symbol: String,
    /// -1 (strong sell) to 1 (strong buy)
    pub prediction: f64,
    /// 0 to 1
    pub confidence: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: DataSource,
}

/// Qualitative market context used to explain signals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub market_context: String,
    pub opportunities: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: DataSource,
}

/// Returns the current quote for a symbol.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;
}

/// Returns model predictions for a batch of symbols.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    async fn get_predictions(&self, symbols: &[String]) -> Result<Vec<Prediction>>;
}

/// Returns qualitative analysis for a batch of symbols.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn get_market_analysis(
        &self,
        symbols: &[String],
        market_data: &HashMap<String, Quote>,
        predictions: &[Prediction],
    ) -> Result<MarketAnalysis>;
}

/// Run a provider call, failing with [`Error::ProviderTimeout`] if it takes
/// longer than `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::ProviderTimeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);

        let err = with_timeout::<(), _>(Duration::from_secs(1), async {
            Err(Error::Provider("down".to_string()))
        })
        .await;
        assert!(matches!(err, Err(Error::Provider(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        })
        .await;

        assert!(matches!(result, Err(Error::ProviderTimeout(_))));
    }

    #[test]
    fn test_quote_json() {
        let quote: Quote = serde_json::from_str(
            r#"{"symbol":"AAPL","price":150.0,"change":1.5,"changePercent":1.0,"volume":1000}"#,
        )
        .unwrap();
        assert_eq!(quote.source, DataSource::Live);
        assert_eq!(quote.change_percent, 1.0);
    }
}
