use log::{info, warn};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::listing::{page_slice, total_pages, AssetValuation, SortField, SortOrder, WalletListing};
use crate::models::price::{checked_total, usd_value};
use crate::models::settings::Settings;
use crate::models::transaction::{TransactionPage, TransactionRecord};
use crate::models::wallet::{UserId, Wallet, WalletId};
use crate::services::price_service::PriceService;
use crate::storage::repository::LedgerStore;

/// Resolve `wallet_id` for `user_id`, checking in order that the user
/// exists, the wallet exists and the user owns it.
pub async fn owned_wallet(
    store: &dyn LedgerStore,
    user_id: UserId,
    wallet_id: WalletId,
) -> Result<Wallet, CoreError> {
    if !store.user_exists(user_id).await? {
        return Err(CoreError::UserNotFound(user_id.to_string()));
    }
    let wallet = store
        .get_wallet(wallet_id)
        .await?
        .ok_or_else(|| CoreError::WalletNotFound(wallet_id.to_string()))?;
    if !wallet.is_owned_by(user_id) {
        return Err(CoreError::PermissionDenied {
            wallet: wallet_id.to_string(),
            user: user_id.to_string(),
        });
    }
    Ok(wallet)
}

/// Wallet lifecycle plus the read-side listings (holdings and history).
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
    price_service: Arc<PriceService>,
    settings: Settings,
}

impl WalletService {
    pub fn new(store: Arc<dyn LedgerStore>, price_service: Arc<PriceService>, settings: Settings) -> Self {
        Self {
            store,
            price_service,
            settings,
        }
    }

    pub async fn create_wallet(&self, user_id: UserId) -> Result<Wallet, CoreError> {
        if !self.store.user_exists(user_id).await? {
            return Err(CoreError::UserNotFound(user_id.to_string()));
        }
        let wallet = Wallet::new(user_id);
        self.store.insert_wallet(wallet.clone()).await?;
        info!("Created wallet {} for user {user_id}", wallet.id);
        Ok(wallet)
    }

    pub async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, CoreError> {
        if !self.store.user_exists(user_id).await? {
            return Err(CoreError::UserNotFound(user_id.to_string()));
        }
        self.store.list_wallets(user_id).await
    }

    /// Delete a wallet and its assets. Transactions and snapshots follow
    /// the configured [`crate::models::settings::DeletionPolicy`].
    pub async fn delete_wallet(&self, user_id: UserId, wallet_id: WalletId) -> Result<(), CoreError> {
        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;
        let _guard = self.store.lock_wallet(wallet_id).await;
        self.store
            .delete_wallet(wallet_id, self.settings.wallet_deletion)
            .await?;
        info!(
            "Deleted wallet {wallet_id} for user {user_id} ({:?})",
            self.settings.wallet_deletion
        );
        Ok(())
    }

    /// Current holdings valued at live prices, sorted over the complete list
    /// and then paginated.
    ///
    /// Assets the oracle has no data for are logged and left out; an oracle
    /// failure fails the whole listing.
    pub async fn list_holdings(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        page: usize,
        limit: Option<usize>,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<WalletListing, CoreError> {
        let field: SortField = sort_by.parse()?;
        let order: SortOrder = sort_order.parse()?;
        let limit = self.check_paging(page, limit)?;

        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;

        let assets = self.store.list_assets(wallet_id).await?;
        if assets.is_empty() {
            return Err(CoreError::NoAssets(wallet_id.to_string()));
        }

        let mut rows = Vec::with_capacity(assets.len());
        for asset in assets {
            let data = match self.price_service.asset_data(&asset.coin_id).await? {
                Some(data) => data,
                None => {
                    warn!(
                        "No market data for {} in wallet {wallet_id}, skipping",
                        asset.coin_id
                    );
                    continue;
                }
            };

            let current_value_usd = usd_value(asset.quantity, data.price_usd)?;
            rows.push(AssetValuation {
                asset_id: asset.id,
                net_gain_loss: current_value_usd - asset.purchase_value_usd,
                current_value_usd,
                current_price_usd: data.price_usd,
                coin_id: asset.coin_id,
                quantity: asset.quantity,
                purchase_value_usd: asset.purchase_value_usd,
                initial_purchase_date: asset.initial_purchase_date,
                coin_cap_rank: data.rank,
                coin_cap_symbol: data.symbol,
                coin_cap_name: data.name,
                market_cap_usd: data.market_cap_usd,
                volume_usd_24hr: data.volume_usd_24hr,
                change_percent_24hr: data.change_percent_24hr,
            });
        }

        // Coin id breaks ties so descending is the exact reverse of ascending.
        match order {
            SortOrder::Asc => rows.sort_by(|a, b| {
                field.compare(a, b).then_with(|| a.coin_id.cmp(&b.coin_id))
            }),
            SortOrder::Desc => rows.sort_by(|a, b| {
                field.compare(b, a).then_with(|| b.coin_id.cmp(&a.coin_id))
            }),
        }

        let total_wallet_value = checked_total(rows.iter().map(|r| r.current_value_usd))?;
        Ok(WalletListing {
            total_count: rows.len(),
            total_pages: total_pages(rows.len(), limit),
            current_page: page,
            total_wallet_value,
            assets: page_slice(&rows, page, limit),
        })
    }

    /// Purchases and sales merged, newest first, then paginated.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        page: usize,
        limit: Option<usize>,
    ) -> Result<TransactionPage, CoreError> {
        let limit = self.check_paging(page, limit)?;
        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;

        let purchases = self.store.list_purchases(wallet_id).await?;
        let sales = self.store.list_sales(wallet_id).await?;

        let mut records: Vec<TransactionRecord> = purchases
            .iter()
            .map(TransactionRecord::from)
            .chain(sales.iter().map(TransactionRecord::from))
            .collect();
        if records.is_empty() {
            return Err(CoreError::NoTransactions(wallet_id.to_string()));
        }
        records.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));

        Ok(TransactionPage {
            total_transactions: records.len(),
            total_pages: total_pages(records.len(), limit),
            current_page: page,
            transactions: page_slice(&records, page, limit),
        })
    }

    fn check_paging(&self, page: usize, limit: Option<usize>) -> Result<usize, CoreError> {
        if page == 0 {
            return Err(CoreError::ValidationError("Page numbers start at 1".into()));
        }
        let limit = limit.unwrap_or(self.settings.default_page_limit);
        if limit == 0 || limit > self.settings.max_page_limit {
            return Err(CoreError::ValidationError(format!(
                "Page limit must be between 1 and {}, got {limit}",
                self.settings.max_page_limit
            )));
        }
        Ok(limit)
    }
}
