//! Position sizing.

/// Capital fractions used to size a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRules {
    /// Share of capital turned into the base share count
    pub base_fraction: f64,
    /// Share of capital capping the share count
    pub max_fraction: f64,
    /// Smallest size ever returned
    pub min_position: u64,
}

impl Default for SizingRules {
    fn default() -> Self {
        Self {
            base_fraction: 0.02,
            max_fraction: 0.10,
            min_position: 1,
        }
    }
}

impl SizingRules {
    /// Number of shares to trade.
    ///
    /// `floor(floor(capital * base) * confidence)`, capped at
    /// `floor(capital * max)` and floored at `min_position`. The floor wins
    /// when the cap is below it, so tiny or negative capital still yields
    /// `min_position`. The current holding does not change the size.
    pub fn position_size(&self, available_capital: f64, confidence: f64, _current_holding: i64) -> u64 {
        let base = (available_capital * self.base_fraction).floor();
        let adjusted = (base * confidence).floor();
        let max = (available_capital * self.max_fraction).floor();

        // f64::min/max ignore NaN operands
        let size = adjusted.min(max).max(self.min_position as f64);
        if size.is_finite() {
            size as u64
        } else {
            self.min_position
        }
    }
}

/// Size a position with the default rules (2% base, 10% cap, at least 1).
pub fn calculate_position_size(available_capital: f64, confidence: f64, current_holding: i64) -> u64 {
    SizingRules::default().position_size(available_capital, confidence, current_holding)
}
