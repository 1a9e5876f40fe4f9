use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use super::traits::PriceOracle;
use crate::errors::CoreError;
use crate::models::price::{CoinMarketData, PricePoint};
use crate::models::settings::Settings;

const PROVIDER: &str = "CoinCap";

/// Maximum page size CoinCap accepts on `/assets`.
const ASSET_LIST_LIMIT: u32 = 2000;

/// CoinCap API oracle for cryptocurrency prices.
///
/// - **Data**: 2000+ cryptocurrencies, real-time and daily history.
/// - **Endpoints**: `/assets`, `/assets/{id}`, `/assets/{id}/history`
///
/// CoinCap ids are lowercase slugs ("bitcoin", "ethereum", "xrp"), which is
/// exactly what the wallet stores as a coin identifier.
pub struct CoinCapProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinCapProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.coincap_base_url.clone(),
            settings.coincap_api_key.clone(),
            settings.oracle_timeout(),
        )
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn api_error(message: String) -> CoreError {
        CoreError::Api {
            provider: PROVIDER.into(),
            message,
        }
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// CoinCap encodes every number as a string, occasionally in scientific notation.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_opt_decimal(raw: &Option<String>) -> Option<Decimal> {
    raw.as_deref().and_then(parse_decimal)
}

fn day_bounds_millis(from: NaiveDate, to: NaiveDate) -> Option<(i64, i64)> {
    let start = from.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
    let end = to.and_hms_opt(23, 59, 59)?.and_utc().timestamp_millis();
    Some((start, end))
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetListResponse {
    data: Vec<AssetListEntry>,
}

#[derive(Deserialize)]
struct AssetListEntry {
    id: String,
}

#[derive(Deserialize)]
struct AssetResponse {
    data: AssetData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetData {
    id: String,
    rank: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    supply: Option<String>,
    max_supply: Option<String>,
    market_cap_usd: Option<String>,
    #[serde(rename = "volumeUsd24Hr")]
    volume_usd_24hr: Option<String>,
    price_usd: Option<String>,
    #[serde(rename = "changePercent24Hr")]
    change_percent_24hr: Option<String>,
    #[serde(rename = "vwap24Hr")]
    vwap_24hr: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    data: Vec<HistoryPoint>,
}

#[derive(Deserialize)]
struct HistoryPoint {
    #[serde(rename = "priceUsd")]
    price_usd: String,
    time: i64, // unix timestamp in milliseconds
}

#[async_trait]
impl PriceOracle for CoinCapProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn list_known_assets(&self) -> Result<HashSet<String>, CoreError> {
        let url = format!("{}/assets?limit={ASSET_LIST_LIMIT}", self.base_url);
        debug!("Fetching known asset list from CoinCap");

        let resp = self.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(format!(
                "Asset list request failed with status {}",
                resp.status()
            )));
        }
        let body: AssetListResponse = resp
            .json()
            .await
            .map_err(|e| Self::api_error(format!("Failed to parse asset list: {e}")))?;

        Ok(body.data.into_iter().map(|a| a.id.to_lowercase()).collect())
    }

    async fn current_asset_data(&self, coin_id: &str) -> Result<Option<CoinMarketData>, CoreError> {
        let url = format!("{}/assets/{coin_id}", self.base_url);
        debug!("Fetching current market data for {coin_id} from CoinCap");

        let resp = self.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::api_error(format!(
                "Asset request for {coin_id} failed with status {}",
                resp.status()
            )));
        }
        let body: AssetResponse = resp
            .json()
            .await
            .map_err(|e| Self::api_error(format!("Failed to parse response for {coin_id}: {e}")))?;

        let data = body.data;
        let price_usd = match data.price_usd.as_deref() {
            Some(raw) => parse_decimal(raw).ok_or_else(|| {
                Self::api_error(format!("Invalid price format for {coin_id}: {raw}"))
            })?,
            None => return Ok(None),
        };

        Ok(Some(CoinMarketData {
            symbol: data.symbol.unwrap_or_else(|| data.id.to_uppercase()),
            name: data.name.unwrap_or_else(|| data.id.clone()),
            rank: data.rank.as_deref().and_then(|r| r.parse().ok()),
            price_usd,
            supply: parse_opt_decimal(&data.supply),
            max_supply: parse_opt_decimal(&data.max_supply),
            market_cap_usd: parse_opt_decimal(&data.market_cap_usd),
            volume_usd_24hr: parse_opt_decimal(&data.volume_usd_24hr),
            change_percent_24hr: parse_opt_decimal(&data.change_percent_24hr),
            vwap_24hr: parse_opt_decimal(&data.vwap_24hr),
            id: data.id,
        }))
    }

    async fn historical_prices(
        &self,
        coin_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let (start_ms, end_ms) = day_bounds_millis(start, end).ok_or_else(|| {
            CoreError::ValidationError(format!("Invalid history window {start}..{end}"))
        })?;

        let url = format!(
            "{}/assets/{coin_id}/history?interval=d1&start={start_ms}&end={end_ms}",
            self.base_url
        );
        debug!("Fetching daily history for {coin_id} ({start}..{end}) from CoinCap");

        let resp = self.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(Self::api_error(format!(
                "History request for {coin_id} failed with status {}",
                resp.status()
            )));
        }
        let body: HistoryResponse = resp
            .json()
            .await
            .map_err(|e| Self::api_error(format!("Failed to parse history for {coin_id}: {e}")))?;

        let mut points: Vec<PricePoint> = body
            .data
            .iter()
            .filter_map(|p| {
                let price = parse_decimal(&p.price_usd)?;
                let dt = chrono::DateTime::from_timestamp_millis(p.time)?;
                Some(PricePoint {
                    date: dt.date_naive(),
                    price,
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_scientific_decimals() {
        assert_eq!(parse_decimal("2.3878"), Decimal::from_str("2.3878").ok());
        assert_eq!(parse_decimal("1.5e-3"), Decimal::from_str("0.0015").ok());
        assert_eq!(parse_decimal("not-a-number"), None);
    }

    #[test]
    fn day_bounds_cover_whole_days() {
        let from = NaiveDate::from_ymd_opt(2025, 3, 23).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 3, 24).unwrap();
        let (start, end) = day_bounds_millis(from, to).unwrap();
        assert_eq!(start, 1_742_688_000_000);
        assert_eq!(end, 1_742_860_799_000);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let provider = CoinCapProvider::new("http://localhost:1/v2/", None, Duration::from_secs(1));
        assert_eq!(provider.base_url, "http://localhost:1/v2");
    }
}
