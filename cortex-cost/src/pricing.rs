//! Per-token pricing lookup.

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Per-million-token input/output rates (USD), keyed by exact model name.
///
/// Models absent from the table price at zero — cost accounting still
/// records token counts accurately, it simply can't assign a dollar
/// figure to a model it doesn't recognize.
pub struct PricingTable {
    rates: HashMap<String, (Decimal, Decimal)>,
}

impl PricingTable {
    /// An empty table: every model prices at zero.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Register a per-million-token input/output rate for a model.
    pub fn with_rate(mut self, model: impl Into<String>, input: Decimal, output: Decimal) -> Self {
        self.rates.insert(model.into(), (input, output));
        self
    }

    /// Look up the cost of `input_tokens`/`output_tokens` against a model's
    /// registered rate, or zero if the model is unknown.
    pub fn cost_for(&self, model: &str, input_tokens: u64, output_tokens: u64) -> (Decimal, Decimal) {
        match self.rates.get(model) {
            Some((input_rate, output_rate)) => {
                let input_cost = input_rate * Decimal::from(input_tokens) / Decimal::from(1_000_000u32);
                let output_cost = output_rate * Decimal::from(output_tokens) / Decimal::from(1_000_000u32);
                (input_cost, output_cost)
            }
            None => (Decimal::ZERO, Decimal::ZERO),
        }
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::empty()
            .with_rate("claude-opus-4", Decimal::new(15, 0), Decimal::new(75, 0))
            .with_rate("claude-sonnet-4", Decimal::new(3, 0), Decimal::new(15, 0))
            .with_rate("gpt-4o", Decimal::new(5, 0), Decimal::new(15, 0))
            .with_rate("gpt-4o-mini", Decimal::new(15, 2), Decimal::new(6, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_prices_zero() {
        let table = PricingTable::empty();
        let (input, output) = table.cost_for("mystery-model", 1000, 1000);
        assert_eq!(input, Decimal::ZERO);
        assert_eq!(output, Decimal::ZERO);
    }

    #[test]
    fn known_model_prices_proportionally() {
        let table = PricingTable::empty().with_rate("test-model", Decimal::new(1_000_000, 0), Decimal::ZERO);
        let (input, _) = table.cost_for("test-model", 1_000_000, 0);
        assert_eq!(input, Decimal::new(1_000_000, 0));
    }

    #[test]
    fn default_table_has_known_rates() {
        let table = PricingTable::default();
        let (input, output) = table.cost_for("claude-opus-4", 1_000_000, 1_000_000);
        assert_eq!(input, Decimal::new(15, 0));
        assert_eq!(output, Decimal::new(75, 0));
    }
}
