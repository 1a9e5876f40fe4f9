use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::errors::CoreError;
use crate::models::asset::Asset;
use crate::models::settings::DeletionPolicy;
use crate::models::snapshot::ValuationSnapshot;
use crate::models::transaction::{PurchaseTransaction, SaleTransaction, TradeRecord};
use crate::models::wallet::{UserId, Wallet, WalletId};

/// Read-only view of the external user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn insert_wallet(&self, wallet: Wallet) -> Result<(), CoreError>;

    /// Active wallet by id. Tombstoned wallets are reported as `None`.
    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, CoreError>;

    /// Active wallets owned by `user_id`, oldest first.
    async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, CoreError>;

    /// Remove a wallet and its assets; history follows `policy`.
    async fn delete_wallet(&self, wallet_id: WalletId, policy: DeletionPolicy) -> Result<(), CoreError>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn get_asset(&self, wallet_id: WalletId, coin_id: &str) -> Result<Option<Asset>, CoreError>;

    /// Current holdings of a wallet, ordered by coin id.
    async fn list_assets(&self, wallet_id: WalletId) -> Result<Vec<Asset>, CoreError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn list_purchases(&self, wallet_id: WalletId) -> Result<Vec<PurchaseTransaction>, CoreError>;

    async fn list_sales(&self, wallet_id: WalletId) -> Result<Vec<SaleTransaction>, CoreError>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// All snapshots of a wallet, ascending by `taken_at`.
    async fn list_snapshots(&self, wallet_id: WalletId) -> Result<Vec<ValuationSnapshot>, CoreError>;
}

/// Change applied to the asset row touched by a trade.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetChange {
    /// Insert the asset or replace the existing `(wallet, coin)` row
    Upsert(Asset),
    /// Quantity reached zero: the row ceases to exist
    Remove { wallet_id: WalletId, coin_id: String },
}

/// Every write a single trade produces. Committed all together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeBatch {
    pub wallet_id: WalletId,
    pub asset_change: AssetChange,
    pub record: TradeRecord,
    pub snapshot: ValuationSnapshot,
}

/// Write side of a trade.
#[async_trait]
pub trait TradeCommitter: Send + Sync {
    /// Exclusive lock on a wallet's trade path. Held for the whole
    /// read-price-write cycle so concurrent trades on the same wallet
    /// never observe stale quantities. Different wallets never contend.
    async fn lock_wallet(&self, wallet_id: WalletId) -> OwnedMutexGuard<()>;

    /// Apply a trade atomically.
    async fn commit_trade(&self, batch: TradeBatch) -> Result<(), CoreError>;
}

/// Everything the services need from persistence.
pub trait LedgerStore:
    UserDirectory
    + WalletRepository
    + AssetRepository
    + TransactionRepository
    + SnapshotRepository
    + TradeCommitter
{
}

impl<T> LedgerStore for T where
    T: UserDirectory
        + WalletRepository
        + AssetRepository
        + TransactionRepository
        + SnapshotRepository
        + TradeCommitter
{
}
