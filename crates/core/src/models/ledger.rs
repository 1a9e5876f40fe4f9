use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::asset::Asset;
use super::snapshot::ValuationSnapshot;
use super::transaction::{PurchaseTransaction, SaleTransaction};
use super::wallet::{UserId, Wallet, WalletId};

/// Everything recorded for a single wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletLedger {
    pub wallet: Wallet,

    /// Current holdings: coin id → asset
    pub assets: BTreeMap<String, Asset>,

    /// Append-only, in commit order
    pub purchases: Vec<PurchaseTransaction>,

    /// Append-only, in commit order
    pub sales: Vec<SaleTransaction>,

    /// Append-only, ascending by `taken_at`
    pub snapshots: Vec<ValuationSnapshot>,
}

impl WalletLedger {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            wallet,
            assets: BTreeMap::new(),
            purchases: Vec::new(),
            sales: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Insert a snapshot keeping `snapshots` sorted by timestamp.
    /// Equal timestamps keep insertion order.
    pub fn push_snapshot(&mut self, snapshot: ValuationSnapshot) {
        let pos = self
            .snapshots
            .partition_point(|s| s.taken_at <= snapshot.taken_at);
        self.snapshots.insert(pos, snapshot);
    }
}

/// The full persisted state. Everything in here gets serialized,
/// encrypted and saved to the portable ledger file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerData {
    /// Ids of users known to exist
    pub users: BTreeSet<UserId>,

    pub wallets: BTreeMap<WalletId, WalletLedger>,
}
