use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::CoreError;

/// Fields a wallet listing may be sorted by. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    CoinName,
    Quantity,
    PurchaseValueUsd,
    CurrentPriceUsd,
    CurrentValueUsd,
    NetGainLoss,
    InitialPurchaseDate,
    CoinCapRank,
    CoinCapSymbol,
    MarketCapUsd,
    VolumeUsd24Hr,
    ChangePercent24Hr,
}

impl SortField {
    pub const ALL: [SortField; 12] = [
        SortField::CoinName,
        SortField::Quantity,
        SortField::PurchaseValueUsd,
        SortField::CurrentPriceUsd,
        SortField::CurrentValueUsd,
        SortField::NetGainLoss,
        SortField::InitialPurchaseDate,
        SortField::CoinCapRank,
        SortField::CoinCapSymbol,
        SortField::MarketCapUsd,
        SortField::VolumeUsd24Hr,
        SortField::ChangePercent24Hr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CoinName => "coin_name",
            SortField::Quantity => "quantity",
            SortField::PurchaseValueUsd => "purchase_value_usd",
            SortField::CurrentPriceUsd => "current_price_usd",
            SortField::CurrentValueUsd => "current_value_usd",
            SortField::NetGainLoss => "net_gain_loss",
            SortField::InitialPurchaseDate => "initial_purchase_date",
            SortField::CoinCapRank => "coin_cap_rank",
            SortField::CoinCapSymbol => "coin_cap_symbol",
            SortField::MarketCapUsd => "market_cap_usd",
            SortField::VolumeUsd24Hr => "volume_usd_24hr",
            SortField::ChangePercent24Hr => "change_percent_24hr",
        }
    }

    /// Comma-separated list of every accepted field name.
    pub fn allowed_names() -> String {
        Self::ALL
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ascending comparison of two listing rows on this field.
    /// Missing oracle metadata sorts before present values.
    pub fn compare(&self, a: &AssetValuation, b: &AssetValuation) -> Ordering {
        match self {
            SortField::CoinName => a.coin_id.cmp(&b.coin_id),
            SortField::Quantity => a.quantity.cmp(&b.quantity),
            SortField::PurchaseValueUsd => a.purchase_value_usd.cmp(&b.purchase_value_usd),
            SortField::CurrentPriceUsd => a.current_price_usd.cmp(&b.current_price_usd),
            SortField::CurrentValueUsd => a.current_value_usd.cmp(&b.current_value_usd),
            SortField::NetGainLoss => a.net_gain_loss.cmp(&b.net_gain_loss),
            SortField::InitialPurchaseDate => a.initial_purchase_date.cmp(&b.initial_purchase_date),
            SortField::CoinCapRank => a.coin_cap_rank.cmp(&b.coin_cap_rank),
            SortField::CoinCapSymbol => a.coin_cap_symbol.cmp(&b.coin_cap_symbol),
            SortField::MarketCapUsd => a.market_cap_usd.cmp(&b.market_cap_usd),
            SortField::VolumeUsd24Hr => a.volume_usd_24hr.cmp(&b.volume_usd_24hr),
            SortField::ChangePercent24Hr => a.change_percent_24hr.cmp(&b.change_percent_24hr),
        }
    }
}

impl FromStr for SortField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CoreError::InvalidSortField {
                field: s.to_string(),
                allowed: Self::allowed_names(),
            })
    }
}

impl std::fmt::Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(CoreError::InvalidSortOrder(s.to_string())),
        }
    }
}

/// A held asset enriched with live oracle data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetValuation {
    pub asset_id: Uuid,
    pub coin_id: String,
    pub quantity: Decimal,
    pub purchase_value_usd: Decimal,
    pub current_price_usd: Decimal,
    /// `quantity × current_price_usd`
    pub current_value_usd: Decimal,
    /// `current_value_usd - purchase_value_usd`
    pub net_gain_loss: Decimal,
    pub initial_purchase_date: DateTime<Utc>,
    pub coin_cap_rank: Option<u32>,
    pub coin_cap_symbol: String,
    pub coin_cap_name: String,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24hr: Option<Decimal>,
    pub change_percent_24hr: Option<Decimal>,
}

/// One page of a wallet's current holdings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletListing {
    /// Number of priced assets across all pages
    pub total_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    /// Sum of `current_value_usd` across all pages
    pub total_wallet_value: Decimal,
    pub assets: Vec<AssetValuation>,
}

/// Number of pages needed for `total` items at `limit` per page.
pub fn total_pages(total: usize, limit: usize) -> usize {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}

/// Slice out 1-indexed `page` of `items`. Pages past the end are empty.
pub fn page_slice<T: Clone>(items: &[T], page: usize, limit: usize) -> Vec<T> {
    let offset = page.saturating_sub(1).saturating_mul(limit);
    items.iter().skip(offset).take(limit).cloned().collect()
}
