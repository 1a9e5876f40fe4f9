use chrono::Utc;
use log::info;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::asset::{normalize_coin_id, Asset};
use crate::models::price::{checked_add, prorate_usd, usd_value};
use crate::models::transaction::{PurchaseTransaction, SaleTransaction, TradeRecord};
use crate::models::wallet::{UserId, WalletId};
use crate::services::price_service::PriceService;
use crate::services::snapshot_service::SnapshotService;
use crate::services::wallet_service::owned_wallet;
use crate::storage::repository::{AssetChange, LedgerStore, TradeBatch};

/// Purchases and sales.
///
/// A trade runs under the wallet's lock: read the held asset, price it,
/// derive the new asset row, the transaction record and the post-trade
/// snapshot, then hand all three to the store in one [`TradeBatch`].
/// Nothing is written until every step has succeeded.
pub struct TradeService {
    store: Arc<dyn LedgerStore>,
    price_service: Arc<PriceService>,
    snapshot_service: SnapshotService,
}

impl TradeService {
    pub fn new(store: Arc<dyn LedgerStore>, price_service: Arc<PriceService>) -> Self {
        let snapshot_service = SnapshotService::new(Arc::clone(&price_service));
        Self {
            store,
            price_service,
            snapshot_service,
        }
    }

    pub async fn purchase(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        coin: &str,
        quantity: Decimal,
    ) -> Result<PurchaseTransaction, CoreError> {
        let coin_id = normalize_coin_id(coin);
        check_quantity(quantity)?;
        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;

        if coin_id.is_empty() || !self.price_service.is_known_coin(&coin_id).await? {
            return Err(CoreError::UnknownCoin(coin.to_string()));
        }

        let _guard = self.store.lock_wallet(wallet_id).await;

        let price = self.price_service.current_price(&coin_id).await?;
        let cost = usd_value(quantity, price)?;
        let now = Utc::now();

        let asset = match self.store.get_asset(wallet_id, &coin_id).await? {
            Some(mut held) => {
                held.quantity = checked_add(held.quantity, quantity, "the held quantity")?;
                held.purchase_value_usd =
                    checked_add(held.purchase_value_usd, cost, "the purchase value")?;
                held
            }
            None => Asset::new(wallet_id, coin_id.clone(), quantity, cost, now),
        };

        let record = PurchaseTransaction {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            asset_id: asset.id,
            coin_id: coin_id.clone(),
            quantity_purchased: quantity,
            purchase_price: price,
            total_purchase_price: cost,
            updated_quantity: asset.quantity,
            purchase_date: now,
        };

        let change = AssetChange::Upsert(asset);
        self.commit(wallet_id, &coin_id, price, change, TradeRecord::Purchase(record.clone()))
            .await?;

        info!(
            "Purchased {quantity} {coin_id} at {price} USD in wallet {wallet_id} (now holding {})",
            record.updated_quantity
        );
        Ok(record)
    }

    pub async fn sell(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        coin: &str,
        quantity: Decimal,
    ) -> Result<SaleTransaction, CoreError> {
        let coin_id = normalize_coin_id(coin);
        check_quantity(quantity)?;
        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;

        let _guard = self.store.lock_wallet(wallet_id).await;

        let held = self
            .store
            .get_asset(wallet_id, &coin_id)
            .await?
            .ok_or_else(|| CoreError::AssetNotFound {
                wallet: wallet_id.to_string(),
                coin: coin_id.clone(),
            })?;
        if quantity > held.quantity {
            return Err(CoreError::InsufficientQuantity {
                coin: coin_id,
                requested: quantity,
                held: held.quantity,
            });
        }

        let price = self.price_service.current_price(&coin_id).await?;
        let proceeds = usd_value(quantity, price)?;
        let remaining = held.quantity - quantity;
        let now = Utc::now();
        let asset_id = held.id;

        // Average cost: the cost basis shrinks in proportion to units sold.
        let change = if remaining.is_zero() {
            AssetChange::Remove {
                wallet_id,
                coin_id: coin_id.clone(),
            }
        } else {
            let purchase_value_usd = prorate_usd(held.purchase_value_usd, remaining, held.quantity)?;
            AssetChange::Upsert(Asset {
                quantity: remaining,
                purchase_value_usd,
                ..held
            })
        };

        let record = SaleTransaction {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            asset_id,
            coin_id: coin_id.clone(),
            quantity_sold: quantity,
            sale_price: price,
            total_sale_price: proceeds,
            remaining_quantity: remaining,
            sale_date: now,
        };

        self.commit(wallet_id, &coin_id, price, change, TradeRecord::Sale(record.clone()))
            .await?;

        info!("Sold {quantity} {coin_id} at {price} USD from wallet {wallet_id} ({remaining} left)");
        Ok(record)
    }

    /// Value the post-trade holdings and commit the whole trade.
    async fn commit(
        &self,
        wallet_id: WalletId,
        coin_id: &str,
        price: Decimal,
        change: AssetChange,
        record: TradeRecord,
    ) -> Result<(), CoreError> {
        let mut assets: Vec<Asset> = self
            .store
            .list_assets(wallet_id)
            .await?
            .into_iter()
            .filter(|a| a.coin_id != coin_id)
            .collect();
        if let AssetChange::Upsert(asset) = &change {
            assets.push(asset.clone());
        }

        let known_prices = HashMap::from([(coin_id.to_string(), price)]);
        let taken_at = match &record {
            TradeRecord::Purchase(p) => p.purchase_date,
            TradeRecord::Sale(s) => s.sale_date,
        };
        let snapshot = self
            .snapshot_service
            .build_snapshot(wallet_id, &assets, &known_prices, taken_at)
            .await?;

        self.store
            .commit_trade(TradeBatch {
                wallet_id,
                asset_change: change,
                record,
                snapshot,
            })
            .await
    }
}

fn check_quantity(quantity: Decimal) -> Result<(), CoreError> {
    if quantity <= Decimal::ZERO {
        return Err(CoreError::ValidationError(format!(
            "Quantity must be greater than zero, got {quantity}"
        )));
    }
    Ok(())
}
