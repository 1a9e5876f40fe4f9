use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::asset::Asset;
use crate::models::price::usd_value;
use crate::models::snapshot::{SnapshotHolding, ValuationSnapshot};
use crate::models::wallet::WalletId;
use crate::services::price_service::PriceService;

/// Values a wallet's holdings at live prices to produce the snapshot
/// appended after every trade.
pub struct SnapshotService {
    price_service: Arc<PriceService>,
}

impl SnapshotService {
    pub fn new(price_service: Arc<PriceService>) -> Self {
        Self { price_service }
    }

    /// Build a snapshot of `assets` (the wallet's post-trade holdings).
    ///
    /// `known_prices` holds prices already fetched during the trade so the
    /// traded coin is valued at exactly its trade price. Every other coin is
    /// priced from the oracle; a coin the oracle cannot price fails the
    /// snapshot, and with it the trade.
    pub async fn build_snapshot(
        &self,
        wallet_id: WalletId,
        assets: &[Asset],
        known_prices: &HashMap<String, Decimal>,
        taken_at: DateTime<Utc>,
    ) -> Result<ValuationSnapshot, CoreError> {
        let mut holdings = BTreeMap::new();

        for asset in assets {
            let price = match known_prices.get(&asset.coin_id) {
                Some(price) => *price,
                None => self
                    .price_service
                    .asset_data(&asset.coin_id)
                    .await?
                    .ok_or_else(|| CoreError::CoinDataNotFound(asset.coin_id.clone()))?
                    .price_usd,
            };

            holdings.insert(
                asset.coin_id.clone(),
                SnapshotHolding {
                    quantity: asset.quantity,
                    purchase_value_usd: asset.purchase_value_usd,
                    value_on_date_usd: usd_value(asset.quantity, price)?,
                },
            );
        }

        let snapshot = ValuationSnapshot::new(wallet_id, taken_at, holdings)?;
        debug!(
            "Built snapshot for wallet {wallet_id}: {} coins, total {} USD",
            snapshot.holdings.len(),
            snapshot.total_value_usd
        );
        Ok(snapshot)
    }
}
