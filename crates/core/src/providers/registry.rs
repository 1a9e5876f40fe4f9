use super::coincap::CoinCapProvider;
use super::traits::PriceOracle;
use crate::models::settings::Settings;

/// Ordered chain of price oracles.
///
/// The price service asks them in registration order and only moves on to
/// the next one when an oracle fails outright.
pub struct PriceOracleRegistry {
    oracles: Vec<Box<dyn PriceOracle>>,
}

impl PriceOracleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            oracles: Vec::new(),
        }
    }

    /// Create a registry with CoinCap configured from `settings`.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CoinCapProvider::from_settings(settings)));
        registry
    }

    /// Append an oracle to the end of the chain.
    pub fn register(&mut self, oracle: Box<dyn PriceOracle>) {
        self.oracles.push(oracle);
    }

    /// All oracles, in priority order.
    pub fn oracles(&self) -> impl Iterator<Item = &dyn PriceOracle> {
        self.oracles.iter().map(|o| o.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.oracles.iter().map(|o| o.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}

impl Default for PriceOracleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
