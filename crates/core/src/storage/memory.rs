use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::OwnedMutexGuard;

use super::repository::{
    AssetChange, AssetRepository, SnapshotRepository, TradeBatch, TradeCommitter,
    TransactionRepository, UserDirectory, WalletRepository,
};
use crate::errors::CoreError;
use crate::models::asset::Asset;
use crate::models::ledger::{LedgerData, WalletLedger};
use crate::models::settings::DeletionPolicy;
use crate::models::snapshot::ValuationSnapshot;
use crate::models::transaction::{PurchaseTransaction, SaleTransaction, TradeRecord};
use crate::models::wallet::{UserId, Wallet, WalletId};

/// In-process ledger store.
///
/// All state sits behind one `RwLock`: readers clone what they need under a
/// read lock, and a trade commit validates its whole batch before touching
/// anything under the write lock, so a half-applied trade is never visible.
/// Trades are additionally serialized per wallet via [`TradeCommitter::lock_wallet`].
pub struct MemoryStore {
    data: RwLock<LedgerData>,
    wallet_locks: Mutex<HashMap<WalletId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_data(LedgerData::default())
    }

    /// Wrap previously persisted state.
    pub fn from_data(data: LedgerData) -> Self {
        Self {
            data: RwLock::new(data),
            wallet_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Consistent copy of the whole ledger (for persistence).
    pub fn export_data(&self) -> Result<LedgerData, CoreError> {
        Ok(self.read()?.clone())
    }

    /// Number of wallets with a trade lock currently allocated.
    pub fn wallet_lock_count(&self) -> usize {
        self.wallet_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Make a user id known to the store.
    pub fn register_user(&self, user_id: UserId) -> Result<(), CoreError> {
        self.write()?.users.insert(user_id);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerData>, CoreError> {
        self.data
            .read()
            .map_err(|_| CoreError::Storage("ledger lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerData>, CoreError> {
        self.data
            .write()
            .map_err(|_| CoreError::Storage("ledger lock poisoned".into()))
    }

    /// Run `f` against an active wallet's ledger, or return `default` when
    /// the wallet is unknown or tombstoned.
    fn with_active<T>(
        &self,
        wallet_id: WalletId,
        default: T,
        f: impl FnOnce(&WalletLedger) -> T,
    ) -> Result<T, CoreError> {
        let data = self.read()?;
        Ok(match data.wallets.get(&wallet_id) {
            Some(ledger) if ledger.wallet.is_active() => f(ledger),
            _ => default,
        })
    }

    /// History is readable for tombstoned wallets too.
    fn with_any<T>(
        &self,
        wallet_id: WalletId,
        default: T,
        f: impl FnOnce(&WalletLedger) -> T,
    ) -> Result<T, CoreError> {
        let data = self.read()?;
        Ok(data.wallets.get(&wallet_id).map(f).unwrap_or(default))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject a batch whose parts do not all belong to the same wallet,
/// or whose asset removal targets a row that does not exist.
fn validate_batch(ledger: &WalletLedger, batch: &TradeBatch) -> Result<(), CoreError> {
    let wallet_id = batch.wallet_id;
    if batch.record.wallet_id() != wallet_id || batch.snapshot.wallet_id != wallet_id {
        return Err(CoreError::Storage(format!(
            "trade batch for wallet {wallet_id} contains records of another wallet"
        )));
    }
    match &batch.asset_change {
        AssetChange::Upsert(asset) if asset.wallet_id != wallet_id => Err(CoreError::Storage(
            format!("asset {} does not belong to wallet {wallet_id}", asset.id),
        )),
        AssetChange::Remove { coin_id, .. } if !ledger.assets.contains_key(coin_id) => {
            Err(CoreError::Storage(format!(
                "cannot remove missing asset {coin_id} from wallet {wallet_id}"
            )))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, CoreError> {
        Ok(self.read()?.users.contains(&user_id))
    }
}

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn insert_wallet(&self, wallet: Wallet) -> Result<(), CoreError> {
        let mut data = self.write()?;
        if data.wallets.contains_key(&wallet.id) {
            return Err(CoreError::Storage(format!("wallet {} already exists", wallet.id)));
        }
        data.wallets.insert(wallet.id, WalletLedger::new(wallet));
        Ok(())
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, CoreError> {
        self.with_active(wallet_id, None, |l| Some(l.wallet.clone()))
    }

    async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, CoreError> {
        let data = self.read()?;
        let mut wallets: Vec<Wallet> = data
            .wallets
            .values()
            .map(|l| &l.wallet)
            .filter(|w| w.is_active() && w.is_owned_by(user_id))
            .cloned()
            .collect();
        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    async fn delete_wallet(&self, wallet_id: WalletId, policy: DeletionPolicy) -> Result<(), CoreError> {
        let mut data = self.write()?;
        let active = data
            .wallets
            .get(&wallet_id)
            .is_some_and(|l| l.wallet.is_active());
        if !active {
            return Err(CoreError::WalletNotFound(wallet_id.to_string()));
        }

        match policy {
            DeletionPolicy::Cascade => {
                data.wallets.remove(&wallet_id);
            }
            DeletionPolicy::RetainHistory => {
                if let Some(ledger) = data.wallets.get_mut(&wallet_id) {
                    ledger.assets.clear();
                    ledger.wallet.deleted_at = Some(Utc::now());
                }
            }
        }
        drop(data);

        // A deleted wallet never trades again; in-flight holders keep their Arc.
        self.wallet_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&wallet_id);
        debug!("Deleted wallet {wallet_id} ({policy:?})");
        Ok(())
    }
}

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn get_asset(&self, wallet_id: WalletId, coin_id: &str) -> Result<Option<Asset>, CoreError> {
        self.with_active(wallet_id, None, |l| l.assets.get(coin_id).cloned())
    }

    async fn list_assets(&self, wallet_id: WalletId) -> Result<Vec<Asset>, CoreError> {
        self.with_active(wallet_id, Vec::new(), |l| l.assets.values().cloned().collect())
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn list_purchases(&self, wallet_id: WalletId) -> Result<Vec<PurchaseTransaction>, CoreError> {
        self.with_any(wallet_id, Vec::new(), |l| l.purchases.clone())
    }

    async fn list_sales(&self, wallet_id: WalletId) -> Result<Vec<SaleTransaction>, CoreError> {
        self.with_any(wallet_id, Vec::new(), |l| l.sales.clone())
    }
}

#[async_trait]
impl SnapshotRepository for MemoryStore {
    async fn list_snapshots(&self, wallet_id: WalletId) -> Result<Vec<ValuationSnapshot>, CoreError> {
        self.with_any(wallet_id, Vec::new(), |l| l.snapshots.clone())
    }
}

#[async_trait]
impl TradeCommitter for MemoryStore {
    async fn lock_wallet(&self, wallet_id: WalletId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.wallet_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(wallet_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn commit_trade(&self, batch: TradeBatch) -> Result<(), CoreError> {
        let mut data = self.write()?;
        let ledger = match data.wallets.get_mut(&batch.wallet_id) {
            Some(ledger) if ledger.wallet.is_active() => ledger,
            _ => return Err(CoreError::WalletNotFound(batch.wallet_id.to_string())),
        };

        if let Err(e) = validate_batch(ledger, &batch) {
            error!("Rejected trade commit for wallet {}: {e}", batch.wallet_id);
            return Err(e);
        }

        match batch.asset_change {
            AssetChange::Upsert(asset) => {
                ledger.assets.insert(asset.coin_id.clone(), asset);
            }
            AssetChange::Remove { coin_id, .. } => {
                ledger.assets.remove(&coin_id);
            }
        }
        match batch.record {
            TradeRecord::Purchase(p) => ledger.purchases.push(p),
            TradeRecord::Sale(s) => ledger.sales.push(s),
        }
        ledger.push_snapshot(batch.snapshot);
        Ok(())
    }
}
