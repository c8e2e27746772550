//! Turning predictions into trade signals.

use super::types::{SignalAction, TradingSignal};
use crate::providers::{MarketAnalysis, Prediction};
use chrono::Utc;
use tracing::debug;

/// Thresholds a prediction must clear to become a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRules {
    pub confidence_threshold: f64,
    pub prediction_threshold: f64,
}

impl Default for SignalRules {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            prediction_threshold: 0.3,
        }
    }
}

impl SignalRules {
    /// BUY above +threshold, SELL below -threshold, both only with enough
    /// confidence. Everything else is HOLD.
    pub fn classify(&self, prediction: &Prediction) -> SignalAction {
        if prediction.confidence <= self.confidence_threshold {
            return SignalAction::Hold;
        }

        if prediction.prediction > self.prediction_threshold {
            SignalAction::Buy
        } else if prediction.prediction < -self.prediction_threshold {
            SignalAction::Sell
        } else {
            SignalAction::Hold
        }
    }

    /// Derive BUY/SELL signals. HOLD predictions are left out.
    pub fn derive(&self, predictions: &[Prediction], analysis: &MarketAnalysis) -> Vec<TradingSignal> {
        predictions
            .iter()
            .filter_map(|prediction| {
                let action = self.classify(prediction);
                let reasoning = match action {
                    SignalAction::Buy => format!(
                        "Strong buy signal from prediction model (confidence: {:.1}%). {}",
                        prediction.confidence * 100.0,
                        analysis.recommendations.join(" ")
                    ),
                    SignalAction::Sell => format!(
                        "Strong sell signal from prediction model (confidence: {:.1}%). {}",
                        prediction.confidence * 100.0,
                        analysis.risk_factors.join(" ")
                    ),
                    SignalAction::Hold => {
                        debug!(symbol = %prediction.symbol, "Holding");
                        return None;
                    }
                };

                Some(TradingSignal {
                    symbol: prediction.symbol.to_uppercase(),
                    action,
                    confidence: prediction.confidence,
                    reasoning,
                    timestamp: Utc::now(),
                    source: prediction.source,
                })
            })
            .collect()
    }
}

/// Derive signals with the default thresholds (confidence > 0.7,
/// |prediction| > 0.3).
pub fn derive_trading_signals(predictions: &[Prediction], analysis: &MarketAnalysis) -> Vec<TradingSignal> {
    SignalRules::default().derive(predictions, analysis)
}
