use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::errors::CoreError;
use crate::models::price::{CoinMarketData, PricePoint};

/// Trait abstraction for market data sources.
///
/// `Ok(None)` means the oracle answered and has no data for the coin;
/// `Err` means the oracle could not be asked (network, parse, outage).
/// Implementations must never fabricate prices.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Human-readable name of this oracle (for logs/errors).
    fn name(&self) -> &str;

    /// Every coin identifier this oracle can price.
    async fn list_known_assets(&self) -> Result<HashSet<String>, CoreError>;

    /// Current market data (price plus rank, supply, volume, ...).
    async fn current_asset_data(&self, coin_id: &str) -> Result<Option<CoinMarketData>, CoreError>;

    /// Current USD price of a coin.
    async fn current_price(&self, coin_id: &str) -> Result<Option<Decimal>, CoreError> {
        Ok(self.current_asset_data(coin_id).await?.map(|d| d.price_usd))
    }

    /// Daily USD prices for the closed range `[start, end]`, ascending by date.
    /// May be empty.
    async fn historical_prices(
        &self,
        coin_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;
}
