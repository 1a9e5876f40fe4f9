// ═══════════════════════════════════════════════════════════════════
// Provider Tests: PriceOracleRegistry, PriceService fallback,
// caching, timeouts, historical lookups
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crypto_wallet_core::errors::CoreError;
use crypto_wallet_core::models::price::{CoinMarketData, PricePoint};
use crypto_wallet_core::models::settings::Settings;
use crypto_wallet_core::providers::registry::PriceOracleRegistry;
use crypto_wallet_core::providers::traits::PriceOracle;
use crypto_wallet_core::services::price_service::PriceService;

// ═══════════════════════════════════════════════════════════════════
// Mock Oracles
// ═══════════════════════════════════════════════════════════════════

/// Oracle answering from fixed tables and counting calls.
struct TableOracle {
    name: String,
    prices: HashMap<String, Decimal>,
    history: HashMap<String, Vec<PricePoint>>,
    calls: Arc<AtomicUsize>,
}

impl TableOracle {
    fn new(name: &str, prices: &[(&str, Decimal)]) -> Self {
        Self {
            name: name.to_string(),
            prices: prices.iter().map(|(c, p)| (c.to_string(), *p)).collect(),
            history: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_history(mut self, coin: &str, points: Vec<PricePoint>) -> Self {
        self.history.insert(coin.to_string(), points);
        self
    }

    fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PriceOracle for TableOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_known_assets(&self) -> Result<HashSet<String>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.prices.keys().cloned().collect())
    }

    async fn current_asset_data(&self, coin_id: &str) -> Result<Option<CoinMarketData>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .prices
            .get(coin_id)
            .map(|p| CoinMarketData::price_only(coin_id, *p)))
    }

    async fn historical_prices(
        &self,
        coin_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .history
            .get(coin_id)
            .map(|pts| {
                pts.iter()
                    .filter(|p| p.date >= start && p.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Oracle that is always down.
struct DownOracle;

#[async_trait]
impl PriceOracle for DownOracle {
    fn name(&self) -> &str {
        "Down"
    }

    async fn list_known_assets(&self) -> Result<HashSet<String>, CoreError> {
        Err(CoreError::Network("connection refused".into()))
    }

    async fn current_asset_data(&self, _coin_id: &str) -> Result<Option<CoinMarketData>, CoreError> {
        Err(CoreError::Network("connection refused".into()))
    }

    async fn historical_prices(
        &self,
        _coin_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        Err(CoreError::Network("connection refused".into()))
    }
}

/// Oracle that never answers within any sane timeout.
struct SlowOracle;

#[async_trait]
impl PriceOracle for SlowOracle {
    fn name(&self) -> &str {
        "Slow"
    }

    async fn list_known_assets(&self) -> Result<HashSet<String>, CoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(HashSet::new())
    }

    async fn current_asset_data(&self, _coin_id: &str) -> Result<Option<CoinMarketData>, CoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn historical_prices(
        &self,
        _coin_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn service(oracles: Vec<Box<dyn PriceOracle>>) -> PriceService {
    let mut registry = PriceOracleRegistry::new();
    for oracle in oracles {
        registry.register(oracle);
    }
    PriceService::new(registry, &Settings::default())
}

// ═══════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════

mod registry {
    use super::*;

    #[test]
    fn new_is_empty() {
        let registry = PriceOracleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn keeps_registration_order() {
        let mut registry = PriceOracleRegistry::default();
        registry.register(Box::new(TableOracle::new("Primary", &[])));
        registry.register(Box::new(TableOracle::new("Backup", &[])));
        assert_eq!(registry.names(), vec!["Primary", "Backup"]);
    }

    #[test]
    fn defaults_register_coincap() {
        let registry = PriceOracleRegistry::new_with_defaults(&Settings::default());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["CoinCap"]);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Current prices
// ═══════════════════════════════════════════════════════════════════

mod current {
    use super::*;

    #[tokio::test]
    async fn falls_back_when_first_oracle_fails() {
        let svc = service(vec![
            Box::new(DownOracle),
            Box::new(TableOracle::new("Backup", &[("bitcoin", dec!(60000))])),
        ]);
        assert_eq!(svc.current_price("bitcoin").await.unwrap(), dec!(60000));
    }

    #[tokio::test]
    async fn no_data_does_not_fall_back() {
        let svc = service(vec![
            Box::new(TableOracle::new("Primary", &[])),
            Box::new(TableOracle::new("Backup", &[("bitcoin", dec!(60000))])),
        ]);
        assert!(svc.asset_data("bitcoin").await.unwrap().is_none());
        assert!(matches!(
            svc.current_price("bitcoin").await,
            Err(CoreError::CoinDataNotFound(_))
        ));
    }

    #[tokio::test]
    async fn every_oracle_failing_surfaces_last_error() {
        let svc = service(vec![Box::new(DownOracle)]);
        assert!(matches!(
            svc.current_price("bitcoin").await,
            Err(CoreError::Network(_))
        ));
    }

    #[tokio::test]
    async fn empty_registry_is_no_provider() {
        let svc = service(Vec::new());
        assert!(matches!(svc.known_assets().await, Err(CoreError::NoProvider)));
    }

    #[tokio::test]
    async fn zero_price_is_rejected() {
        let svc = service(vec![Box::new(TableOracle::new("T", &[("dust", Decimal::ZERO)]))]);
        assert!(matches!(
            svc.current_price("dust").await,
            Err(CoreError::ZeroPrice(_))
        ));
    }

    #[tokio::test]
    async fn negative_price_is_an_oracle_error() {
        let svc = service(vec![Box::new(TableOracle::new("T", &[("broken", dec!(-1))]))]);
        assert!(matches!(
            svc.asset_data("broken").await,
            Err(CoreError::Api { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let oracle = TableOracle::new("T", &[("bitcoin", dec!(60000))]);
        let calls = oracle.counter();
        let svc = service(vec![Box::new(oracle)]);

        svc.current_price("bitcoin").await.unwrap();
        svc.current_price("bitcoin").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(svc.cache_entries(), 1);

        svc.clear_cache();
        svc.current_price("bitcoin").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out() {
        let svc = service(vec![Box::new(SlowOracle)]);
        match svc.asset_data("bitcoin").await {
            Err(CoreError::Timeout { provider, seconds }) => {
                assert_eq!(provider, "Slow");
                assert_eq!(seconds, 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_hands_over_to_backup() {
        let svc = service(vec![
            Box::new(SlowOracle),
            Box::new(TableOracle::new("Backup", &[("bitcoin", dec!(1))])),
        ]);
        assert_eq!(svc.current_price("bitcoin").await.unwrap(), dec!(1));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Known assets
// ═══════════════════════════════════════════════════════════════════

mod known_assets {
    use super::*;

    #[tokio::test]
    async fn membership() {
        let svc = service(vec![Box::new(TableOracle::new(
            "T",
            &[("bitcoin", dec!(1)), ("xrp", dec!(1))],
        ))]);
        assert!(svc.is_known_coin("xrp").await.unwrap());
        assert!(!svc.is_known_coin("notacoin").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_cached() {
        let oracle = TableOracle::new("T", &[("bitcoin", dec!(1))]);
        let calls = oracle.counter();
        let svc = service(vec![Box::new(oracle)]);

        svc.known_assets().await.unwrap();
        svc.known_assets().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Historical prices
// ═══════════════════════════════════════════════════════════════════

mod history {
    use super::*;

    fn oracle() -> TableOracle {
        TableOracle::new("T", &[("bitcoin", dec!(70000))]).with_history(
            "bitcoin",
            vec![
                PricePoint { date: d(2024, 3, 1), price: dec!(61000) },
                PricePoint { date: d(2024, 3, 2), price: dec!(62000) },
                PricePoint { date: d(2024, 3, 4), price: dec!(64000) },
            ],
        )
    }

    #[tokio::test]
    async fn exact_day() {
        let svc = service(vec![Box::new(oracle())]);
        assert_eq!(svc.price_on("bitcoin", d(2024, 3, 2)).await.unwrap(), dec!(62000));
    }

    #[tokio::test]
    async fn gap_uses_previous_day() {
        let svc = service(vec![Box::new(oracle())]);
        assert_eq!(svc.price_on("bitcoin", d(2024, 3, 3)).await.unwrap(), dec!(62000));
    }

    #[tokio::test]
    async fn outside_lookback_window_is_not_available() {
        let svc = service(vec![Box::new(oracle())]);
        assert!(matches!(
            svc.price_on("bitcoin", d(2024, 3, 20)).await,
            Err(CoreError::PriceNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn before_series_start_is_not_available() {
        let svc = service(vec![Box::new(oracle())]);
        assert!(matches!(
            svc.price_on("bitcoin", d(2024, 2, 1)).await,
            Err(CoreError::PriceNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn windows_are_cached() {
        let oracle = oracle();
        let calls = oracle.counter();
        let svc = service(vec![Box::new(oracle)]);

        svc.price_on("bitcoin", d(2024, 3, 3)).await.unwrap();
        svc.price_on("bitcoin", d(2024, 3, 3)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
