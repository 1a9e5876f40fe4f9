use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

/// What happens to a wallet's history when the wallet is deleted.
/// Assets are removed in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Remove transactions and snapshots together with the wallet
    #[default]
    Cascade,
    /// Keep transactions and snapshots; the wallet stays as a tombstone
    RetainHistory,
}

/// Runtime configuration. Every field has a default, so a partial JSON
/// document (or `{}`) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the CoinCap REST API
    pub coincap_base_url: String,

    /// Optional CoinCap API key, sent as a bearer token
    pub coincap_api_key: Option<String>,

    /// Upper bound for any single price oracle call
    pub oracle_timeout_secs: u64,

    pub current_price_ttl_secs: u64,
    pub historical_price_ttl_secs: u64,
    pub known_assets_ttl_secs: u64,

    /// Page size used when the caller does not pass one
    pub default_page_limit: usize,
    pub max_page_limit: usize,

    /// Days of history fetched before a requested date when reconstructing
    /// a past valuation (covers days the oracle has no point for)
    pub history_lookback_days: u32,

    pub wallet_deletion: DeletionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coincap_base_url: "https://api.coincap.io/v2".to_string(),
            coincap_api_key: None,
            oracle_timeout_secs: 10,
            current_price_ttl_secs: 60,
            historical_price_ttl_secs: 3600,
            known_assets_ttl_secs: 3600,
            default_page_limit: 10,
            max_page_limit: 100,
            history_lookback_days: 7,
            wallet_deletion: DeletionPolicy::Cascade,
        }
    }
}

impl Settings {
    /// Parse settings from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::ValidationError(format!("Invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.oracle_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "oracle_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return Err(CoreError::ValidationError(
                "page limits must be greater than zero".into(),
            ));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(CoreError::ValidationError(format!(
                "default_page_limit ({}) exceeds max_page_limit ({})",
                self.default_page_limit, self.max_page_limit
            )));
        }
        if self.coincap_base_url.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "coincap_base_url must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn current_price_ttl(&self) -> Duration {
        Duration::from_secs(self.current_price_ttl_secs)
    }

    pub fn historical_price_ttl(&self) -> Duration {
        Duration::from_secs(self.historical_price_ttl_secs)
    }

    pub fn known_assets_ttl(&self) -> Duration {
        Duration::from_secs(self.known_assets_ttl_secs)
    }
}
