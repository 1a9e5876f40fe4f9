use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate identifier of a wallet.
pub type WalletId = Uuid;

/// Identifier of the acting user. Users live outside this crate;
/// we only ever compare ids and ask the store whether one exists.
pub type UserId = Uuid;

/// A user's wallet. Owns assets, transactions and valuation snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,

    /// Owner of the wallet
    pub user_id: UserId,

    pub created_at: DateTime<Utc>,

    /// Set when the wallet was deleted but its history was kept for audit.
    /// A tombstoned wallet behaves as missing for every operation.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
