use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::errors::CoreError;

/// A single daily price data point (date → USD price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Current market data for one coin, as reported by a price oracle.
///
/// Only `price_usd` is guaranteed; everything else is best-effort metadata
/// used for display and sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarketData {
    /// Oracle identifier (e.g., "bitcoin")
    pub id: String,
    /// Ticker symbol (e.g., "BTC")
    pub symbol: String,
    pub name: String,
    pub rank: Option<u32>,
    pub price_usd: Decimal,
    pub supply: Option<Decimal>,
    pub max_supply: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24hr: Option<Decimal>,
    pub change_percent_24hr: Option<Decimal>,
    pub vwap_24hr: Option<Decimal>,
}

impl CoinMarketData {
    /// Market data carrying only a price. Handy for oracles without metadata.
    pub fn price_only(id: impl Into<String>, price_usd: Decimal) -> Self {
        let id = id.into();
        Self {
            symbol: id.to_uppercase(),
            name: id.clone(),
            id,
            rank: None,
            price_usd,
            supply: None,
            max_supply: None,
            market_cap_usd: None,
            volume_usd_24hr: None,
            change_percent_24hr: None,
            vwap_24hr: None,
        }
    }
}

/// Map whose entries expire a fixed time after insertion.
///
/// Eviction is time-based only: expired entries are dropped when read
/// and by [`TtlCache::purge_expired`]. There is no size bound.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as if the current time were `now`.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some((inserted, _)) => now.saturating_duration_since(*inserted) >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, (now, value));
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, (inserted, _)| now.saturating_duration_since(*inserted) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Cache key for a historical series: (coin id, start date, end date).
pub type HistoryKey = (String, NaiveDate, NaiveDate);

/// Oracle response cache owned by the price service.
///
/// Three independent TTL maps: the known-asset list, current market
/// data per coin and historical series per requested window.
#[derive(Debug, Clone)]
pub struct PriceCache {
    pub known_assets: TtlCache<(), HashSet<String>>,
    pub current: TtlCache<String, CoinMarketData>,
    pub history: TtlCache<HistoryKey, Vec<PricePoint>>,
}

impl PriceCache {
    pub fn new(known_assets_ttl: Duration, current_ttl: Duration, history_ttl: Duration) -> Self {
        Self {
            known_assets: TtlCache::new(known_assets_ttl),
            current: TtlCache::new(current_ttl),
            history: TtlCache::new(history_ttl),
        }
    }

    pub fn total_entries(&self) -> usize {
        self.known_assets.len() + self.current.len() + self.history.len()
    }

    pub fn purge_expired(&mut self) -> usize {
        self.known_assets.purge_expired() + self.current.purge_expired() + self.history.purge_expired()
    }

    pub fn clear(&mut self) {
        self.known_assets.clear();
        self.current.clear();
        self.history.clear();
    }
}

/// Last price at or before `date` in an ascending series.
pub fn last_price_on_or_before(points: &[PricePoint], date: NaiveDate) -> Option<&PricePoint> {
    let idx = points.partition_point(|p| p.date <= date);
    idx.checked_sub(1).map(|i| &points[i])
}

/// Decimal places kept for USD amounts derived by multiplication.
pub const USD_DECIMALS: u32 = 4;

/// Round a derived USD amount (cost, proceeds, value) to [`USD_DECIMALS`].
pub fn round_usd(value: Decimal) -> Decimal {
    value.round_dp(USD_DECIMALS)
}

fn out_of_range(what: &str) -> CoreError {
    CoreError::ValidationError(format!("Amount out of range while computing {what}"))
}

/// `quantity × price` rounded to [`USD_DECIMALS`], failing instead of
/// overflowing the decimal range.
pub fn usd_value(quantity: Decimal, price: Decimal) -> Result<Decimal, CoreError> {
    quantity
        .checked_mul(price)
        .map(round_usd)
        .ok_or_else(|| out_of_range("a USD value"))
}

/// `a + b`, failing instead of overflowing.
pub fn checked_add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, CoreError> {
    a.checked_add(b).ok_or_else(|| out_of_range(what))
}

/// Sum of `values`, failing instead of overflowing.
pub fn checked_total<I>(values: I) -> Result<Decimal, CoreError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_add(acc, v, "a total"))
}

/// `amount × part / whole` rounded to [`USD_DECIMALS`]; used to scale a
/// cost basis down to the units still held.
pub fn prorate_usd(amount: Decimal, part: Decimal, whole: Decimal) -> Result<Decimal, CoreError> {
    amount
        .checked_mul(part)
        .and_then(|scaled| scaled.checked_div(whole))
        .map(round_usd)
        .ok_or_else(|| out_of_range("a cost basis"))
}
