//! Cost estimation collaborator.
//!
//! Pricing is optional and fails open: the runner records `0.0` whenever no
//! price is known.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Converts token usage into an estimated monetary cost.
pub trait Pricing {
    fn calculate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64>;
}

/// USD per one million tokens.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Price list keyed by provider, then model.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PriceTable {
    providers: BTreeMap<String, BTreeMap<String, ModelPrice>>,
}

impl PriceTable {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read pricing {}", path.display()))?;
        serde_json::from_slice(&bytes).context("parse pricing JSON")
    }

    pub fn insert(&mut self, provider: &str, model: &str, price: ModelPrice) {
        self.providers
            .entry(provider.to_string())
            .or_default()
            .insert(model.to_string(), price);
    }
}

impl Pricing for PriceTable {
    fn calculate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64> {
        let price = self
            .providers
            .get(provider)
            .and_then(|models| models.get(model))
            .ok_or_else(|| anyhow!("no price for {provider} model {model}"))?;
        let cost = (input_tokens as f64 * price.input + output_tokens as f64 * price.output)
            / 1_000_000.0;
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_prices_per_million_tokens() {
        let table: PriceTable = serde_json::from_value(serde_json::json!({
            "openai": {"gpt-4o-mini": {"input": 0.15, "output": 0.6}}
        }))
        .expect("parse table");
        let cost = table
            .calculate_cost("openai", "gpt-4o-mini", 1_000_000, 500_000)
            .expect("priced");
        assert!((cost - 0.45).abs() < 1e-9);
        assert!(table.calculate_cost("openai", "unknown", 1, 1).is_err());
    }
}
