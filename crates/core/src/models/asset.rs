use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wallet::WalletId;

/// Normalize a user-supplied coin identifier ("  Bitcoin " → "bitcoin").
/// Oracle identifiers are lowercase slugs.
pub fn normalize_coin_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Current holding of one coin inside one wallet.
///
/// `(wallet_id, coin_id)` is unique. The row exists only while
/// `quantity > 0`; a sale that brings it to exactly zero removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,

    pub wallet_id: WalletId,

    /// Oracle coin identifier, lowercase (e.g., "bitcoin", "xrp")
    pub coin_id: String,

    /// Units held (always positive while the row exists)
    pub quantity: Decimal,

    /// Cost in USD of the units currently held
    pub purchase_value_usd: Decimal,

    /// When the first unit of this coin was bought into the wallet
    pub initial_purchase_date: DateTime<Utc>,
}

impl Asset {
    pub fn new(
        wallet_id: WalletId,
        coin_id: impl Into<String>,
        quantity: Decimal,
        purchase_value_usd: Decimal,
        initial_purchase_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            coin_id: coin_id.into(),
            quantity,
            purchase_value_usd,
            initial_purchase_date,
        }
    }
}
