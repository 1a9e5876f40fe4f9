use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::wallet::WalletId;

/// Where the snapshot used for a valuation sits relative to the requested date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotRelation {
    /// Snapshot taken on the requested date itself
    Current,
    /// Latest snapshot before the requested date; value reconstructed from history
    Past,
    /// Earliest snapshot after the requested date; reported as-is
    Future,
}

impl std::fmt::Display for SnapshotRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotRelation::Current => write!(f, "current"),
            SnapshotRelation::Past => write!(f, "past"),
            SnapshotRelation::Future => write!(f, "future"),
        }
    }
}

/// One coin of a resolved valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedHolding {
    pub quantity: Decimal,
    pub purchase_value_usd: Decimal,
    /// Value recorded in the snapshot
    pub value_on_snapshot_date_usd: Decimal,
    /// Value on the requested date (equal to the snapshot value unless reconstructed)
    pub value_on_requested_date_usd: Decimal,
}

/// Answer to "what was this wallet worth on date D?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletValuation {
    pub wallet_id: WalletId,
    pub requested_date: NaiveDate,
    pub snapshot_date: DateTime<Utc>,
    pub relation: SnapshotRelation,
    pub holdings: BTreeMap<String, ValuedHolding>,
    pub total_value_usd_on_snapshot_date: Decimal,
    pub date_requested_total_value: Decimal,
    /// `date_requested_total_value - total_value_usd_on_snapshot_date`
    pub net_gain_loss: Decimal,
}
