//! Providers that need no network.

use super::{AnalysisProvider, MarketAnalysis, Prediction, Quote, QuoteProvider, SignalProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Quotes from a fixed price table.
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteProvider {
    prices: HashMap<String, f64>,
}

impl StaticQuoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_uppercase(), price);
        self
    }

    pub fn set_price(&mut self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_uppercase(), price);
    }
}

#[async_trait]
impl QuoteProvider for StaticQuoteProvider {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let symbol = symbol.to_uppercase();
        let price = self
            .prices
            .get(&symbol)
            .copied()
            .ok_or_else(|| Error::Provider(format!("no quote for {}", symbol)))?;

        Ok(Quote {
            symbol,
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 0,
            source: Default::default(),
        })
    }
}

/// A provider that is never reachable. Every call fails, so callers fall
/// back to synthetic data.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl QuoteProvider for OfflineProvider {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        Err(Error::Provider(format!("offline: no quote for {}", symbol)))
    }
}

#[async_trait]
impl SignalProvider for OfflineProvider {
    async fn get_predictions(&self, _symbols: &[String]) -> Result<Vec<Prediction>> {
        Err(Error::Provider("offline: prediction service unavailable".to_string()))
    }
}

#[async_trait]
impl AnalysisProvider for OfflineProvider {
    async fn get_market_analysis(
        &self,
        _symbols: &[String],
        _market_data: &HashMap<String, Quote>,
        _predictions: &[Prediction],
    ) -> Result<MarketAnalysis> {
        Err(Error::Provider("offline: analysis service unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DataSource;

    #[tokio::test]
    async fn test_static_quotes() {
        let provider = StaticQuoteProvider::new().with_price("nvda", 450.0);

        let quote = provider.get_quote("NVDA").await.unwrap();
        assert_eq!(quote.price, 450.0);
        assert_eq!(quote.source, DataSource::Live);

        assert!(matches!(
            provider.get_quote("AAPL").await,
            Err(Error::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_set_price_overrides() {
        let mut provider = StaticQuoteProvider::new().with_price("AAPL", 150.0);
        provider.set_price("aapl", 155.5);
        provider.set_price("MSFT", 320.0);

        assert_eq!(provider.get_quote("AAPL").await.unwrap().price, 155.5);
        assert_eq!(provider.get_quote("msft").await.unwrap().symbol, "MSFT");
    }

    #[tokio::test]
    async fn test_offline_always_fails() {
        let provider = OfflineProvider;
        let symbols = vec!["AAPL".to_string()];

        assert!(provider.get_quote("AAPL").await.is_err());
        assert!(provider.get_predictions(&symbols).await.is_err());
        assert!(provider
            .get_market_analysis(&symbols, &HashMap::new(), &[])
            .await
            .is_err());
    }
}
