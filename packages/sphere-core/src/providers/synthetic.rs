//! Synthetic stand-ins used when a provider is unavailable.
//!
//! All values produced here are tagged [`DataSource::Synthetic`].

use super::{DataSource, MarketAnalysis, Prediction, Quote};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Strategy for generating fallback data.
pub trait SyntheticSource: Send + Sync {
    /// A bounded prediction: confidence in 0.5..=0.9, prediction in -1..=1.
    fn prediction(&self, symbol: &str) -> Prediction;

    /// A quote near the symbol's reference price.
    fn quote(&self, symbol: &str) -> Quote;

    /// Analysis derived from the predictions alone.
    fn analysis(&self, symbols: &[String], predictions: &[Prediction]) -> MarketAnalysis {
        fallback_analysis(symbols, predictions)
    }
}

/// Reference price for the demo universe; 100 for anything else.
pub fn base_price(symbol: &str) -> f64 {
    match symbol.to_uppercase().as_str() {
        "AAPL" => 150.0,
        "MSFT" => 320.0,
        "GOOGL" => 2850.0,
        "TSLA" => 250.0,
        "NVDA" => 450.0,
        "AMZN" => 3300.0,
        "META" => 280.0,
        "NFLX" => 500.0,
        _ => 100.0,
    }
}

/// Deterministic analysis built from prediction counts.
pub fn fallback_analysis(symbols: &[String], predictions: &[Prediction]) -> MarketAnalysis {
    let bullish = predictions.iter().filter(|p| p.prediction > 0.3).count();
    let bearish = predictions.iter().filter(|p| p.prediction < -0.3).count();

    MarketAnalysis {
        market_context: format!(
            "Analyzing {} symbols with {} bullish and {} bearish signals",
            symbols.len(),
            bullish,
            bearish
        ),
        opportunities: symbols
            .iter()
            .take(3)
            .map(|s| format!("{} shows potential based on technical analysis", s))
            .collect(),
        risk_factors: vec![
            "Market volatility".to_string(),
            "Economic uncertainty".to_string(),
            "Sector rotation".to_string(),
        ],
        recommendations: vec![
            "Diversify portfolio".to_string(),
            "Use stop-loss orders".to_string(),
            "Monitor market conditions".to_string(),
        ],
        reasoning: "Analysis based on model predictions and technical indicators".to_string(),
        timestamp: Utc::now(),
        source: DataSource::Synthetic,
    }
}

/// Random fallback data, optionally seeded for reproducible runs.
#[derive(Debug)]
pub struct RandomSynthetic {
    rng: Mutex<StdRng>,
}

impl RandomSynthetic {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Two sources built from the same seed produce the same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        match self.rng.lock() {
            Ok(mut rng) => f(&mut rng),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for RandomSynthetic {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource for RandomSynthetic {
    fn prediction(&self, symbol: &str) -> Prediction {
        self.with_rng(|rng| {
            let mut features = BTreeMap::new();
            features.insert("feature_1".to_string(), rng.gen::<f64>());
            features.insert("feature_2".to_string(), rng.gen::<f64>());

            Prediction {
                symbol: symbol.to_uppercase(),
                prediction: rng.gen_range(-1.0..=1.0),
                confidence: rng.gen_range(0.5..=0.9),
                features,
                timestamp: Utc::now(),
                source: DataSource::Synthetic,
            }
        })
    }

    fn quote(&self, symbol: &str) -> Quote {
        let base = base_price(symbol);
        self.with_rng(|rng| {
            // ±5% around the reference price
            let variation: f64 = rng.gen_range(-0.05..0.05);
            let price = base * (1.0 + variation);
            Quote {
                symbol: symbol.to_uppercase(),
                price,
                change: price - base,
                change_percent: variation * 100.0,
                volume: rng.gen_range(1_000_000..50_000_000),
                source: DataSource::Synthetic,
            }
        })
    }
}

/// Constant fallback data: the same prediction for every symbol and quotes
/// exactly at the reference price.
#[derive(Debug, Clone, Copy)]
pub struct FixedSynthetic {
    pub prediction: f64,
    pub confidence: f64,
}

impl Default for FixedSynthetic {
    fn default() -> Self {
        Self {
            prediction: 0.0,
            confidence: 0.5,
        }
    }
}

impl SyntheticSource for FixedSynthetic {
    fn prediction(&self, symbol: &str) -> Prediction {
        Prediction {
            symbol: symbol.to_uppercase(),
            prediction: self.prediction.clamp(-1.0, 1.0),
            confidence: self.confidence.clamp(0.5, 0.9),
            features: BTreeMap::new(),
            timestamp: Utc::now(),
            source: DataSource::Synthetic,
        }
    }

    fn quote(&self, symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_uppercase(),
            price: base_price(symbol),
            change: 0.0,
            change_percent: 0.0,
            volume: 0,
            source: DataSource::Synthetic,
        }
    }
}
