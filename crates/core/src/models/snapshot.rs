use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::price::checked_total;
use super::wallet::WalletId;
use crate::errors::CoreError;

/// Per-coin line of a valuation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHolding {
    pub quantity: Decimal,
    pub purchase_value_usd: Decimal,
    /// `quantity × live price` at the moment the snapshot was taken
    pub value_on_date_usd: Decimal,
}

/// Point-in-time record of a wallet's complete holdings and total value.
///
/// Written once per successful trade and never edited afterwards.
/// Several snapshots may share a calendar date; the one with the
/// greatest `taken_at` is authoritative for that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub id: Uuid,
    pub wallet_id: WalletId,
    pub taken_at: DateTime<Utc>,
    /// coin id → holding detail, ordered by coin id
    pub holdings: BTreeMap<String, SnapshotHolding>,
    pub total_value_usd: Decimal,
}

impl ValuationSnapshot {
    /// Build a snapshot whose total is the sum of its per-coin values.
    pub fn new(
        wallet_id: WalletId,
        taken_at: DateTime<Utc>,
        holdings: BTreeMap<String, SnapshotHolding>,
    ) -> Result<Self, CoreError> {
        let total_value_usd = checked_total(holdings.values().map(|h| h.value_on_date_usd))?;
        Ok(Self {
            id: Uuid::new_v4(),
            wallet_id,
            taken_at,
            holdings,
            total_value_usd,
        })
    }
}
