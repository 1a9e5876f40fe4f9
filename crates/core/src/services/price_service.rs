use chrono::{Days, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::{last_price_on_or_before, CoinMarketData, PriceCache, PricePoint};
use crate::models::settings::Settings;
use crate::providers::registry::PriceOracleRegistry;

/// Fetches market data from the oracle chain with TTL caching.
///
/// Cache strategy:
/// - **Known asset list**: one entry, refreshed after `known_assets_ttl`.
/// - **Current data**: per coin, refreshed after `current_price_ttl`.
/// - **Historical series**: per (coin, window), refreshed after `historical_price_ttl`.
///
/// Every oracle call is bounded by `oracle_timeout`. A failing oracle hands
/// over to the next one in the registry; a "no data" answer does not.
pub struct PriceService {
    registry: PriceOracleRegistry,
    cache: Mutex<PriceCache>,
    timeout: Duration,
    lookback_days: u32,
}

impl PriceService {
    pub fn new(registry: PriceOracleRegistry, settings: &Settings) -> Self {
        let cache = PriceCache::new(
            settings.known_assets_ttl(),
            settings.current_price_ttl(),
            settings.historical_price_ttl(),
        );
        Self {
            registry,
            cache: Mutex::new(cache),
            timeout: settings.oracle_timeout(),
            lookback_days: settings.history_lookback_days,
        }
    }

    /// Names of the registered oracles, in fallback order.
    pub fn oracle_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Every coin identifier the oracle chain recognizes.
    pub async fn known_assets(&self) -> Result<HashSet<String>, CoreError> {
        let cached = { self.lock_cache().known_assets.get(&()) };
        if let Some(assets) = cached {
            debug!("Known asset list served from cache ({} coins)", assets.len());
            return Ok(assets);
        }

        let mut last_error = None;
        for oracle in self.registry.oracles() {
            match self.bounded(oracle.name(), oracle.list_known_assets()).await {
                Ok(assets) => {
                    self.lock_cache().known_assets.insert((), assets.clone());
                    return Ok(assets);
                }
                Err(e) => {
                    warn!("Oracle {} failed to list assets: {e}", oracle.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    pub async fn is_known_coin(&self, coin_id: &str) -> Result<bool, CoreError> {
        Ok(self.known_assets().await?.contains(coin_id))
    }

    /// Current market data for a coin, `None` if the oracle has none.
    pub async fn asset_data(&self, coin_id: &str) -> Result<Option<CoinMarketData>, CoreError> {
        let cached = { self.lock_cache().current.get(&coin_id.to_string()) };
        if let Some(data) = cached {
            debug!("Market data for {coin_id} served from cache");
            return Ok(Some(data));
        }

        let mut last_error = None;
        for oracle in self.registry.oracles() {
            match self.bounded(oracle.name(), oracle.current_asset_data(coin_id)).await {
                Ok(Some(data)) => {
                    if data.price_usd.is_sign_negative() {
                        last_error = Some(CoreError::Api {
                            provider: oracle.name().to_string(),
                            message: format!(
                                "Invalid price returned for {coin_id}: {} (must be non-negative)",
                                data.price_usd
                            ),
                        });
                        continue;
                    }
                    self.lock_cache()
                        .current
                        .insert(coin_id.to_string(), data.clone());
                    return Ok(Some(data));
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!("Oracle {} failed for {coin_id}: {e}", oracle.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    /// Current USD price, usable for a trade: present and non-zero.
    pub async fn current_price(&self, coin_id: &str) -> Result<Decimal, CoreError> {
        let data = self
            .asset_data(coin_id)
            .await?
            .ok_or_else(|| CoreError::CoinDataNotFound(coin_id.to_string()))?;
        if data.price_usd.is_zero() {
            return Err(CoreError::ZeroPrice(coin_id.to_string()));
        }
        Ok(data.price_usd)
    }

    /// Daily price series for `[start, end]`, ascending. May be empty.
    pub async fn historical_prices(
        &self,
        coin_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let key = (coin_id.to_string(), start, end);
        let cached = { self.lock_cache().history.get(&key) };
        if let Some(points) = cached {
            debug!("History for {coin_id} ({start}..{end}) served from cache");
            return Ok(points);
        }

        let mut last_error = None;
        for oracle in self.registry.oracles() {
            match self
                .bounded(oracle.name(), oracle.historical_prices(coin_id, start, end))
                .await
            {
                Ok(mut points) => {
                    points.sort_by_key(|p| p.date);
                    self.lock_cache().history.insert(key, points.clone());
                    return Ok(points);
                }
                Err(e) => {
                    warn!("Oracle {} failed history for {coin_id}: {e}", oracle.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }

    /// USD price of a coin on `date`: the last daily point at or before it,
    /// searched within the configured lookback window.
    pub async fn price_on(&self, coin_id: &str, date: NaiveDate) -> Result<Decimal, CoreError> {
        let start = date
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(date);
        let points = self.historical_prices(coin_id, start, date).await?;

        let point = last_price_on_or_before(&points, date).ok_or_else(|| {
            CoreError::PriceNotAvailable {
                coin: coin_id.to_string(),
                date: date.to_string(),
            }
        })?;
        if point.price.is_sign_negative() {
            return Err(CoreError::Api {
                provider: self.registry.names().join(","),
                message: format!("Negative historical price for {coin_id} on {}", point.date),
            });
        }
        Ok(point.price)
    }

    // ── Cache management ────────────────────────────────────────────

    pub fn cache_entries(&self) -> usize {
        self.lock_cache().total_entries()
    }

    /// Drop expired cache entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.lock_cache().purge_expired()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    // ── Internal ────────────────────────────────────────────────────

    fn lock_cache(&self) -> MutexGuard<'_, PriceCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn bounded<T>(
        &self,
        oracle: &str,
        call: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                provider: oracle.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
