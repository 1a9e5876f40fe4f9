use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wallet::{UserId, WalletId};

/// Immutable record of a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub asset_id: Uuid,
    pub coin_id: String,
    pub quantity_purchased: Decimal,
    /// Price per unit at trade time
    pub purchase_price: Decimal,
    pub total_purchase_price: Decimal,
    /// Quantity held after this purchase
    pub updated_quantity: Decimal,
    pub purchase_date: DateTime<Utc>,
}

/// Immutable record of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub asset_id: Uuid,
    pub coin_id: String,
    pub quantity_sold: Decimal,
    /// Price per unit at trade time
    pub sale_price: Decimal,
    pub total_sale_price: Decimal,
    /// Quantity left after this sale (zero on full liquidation)
    pub remaining_quantity: Decimal,
    pub sale_date: DateTime<Utc>,
}

/// Either side of a trade, as written to the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeRecord {
    Purchase(PurchaseTransaction),
    Sale(SaleTransaction),
}

impl TradeRecord {
    pub fn wallet_id(&self) -> WalletId {
        match self {
            TradeRecord::Purchase(p) => p.wallet_id,
            TradeRecord::Sale(s) => s.wallet_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Sale,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Purchase => write!(f, "purchase"),
            TransactionKind::Sale => write!(f, "sale"),
        }
    }
}

/// Flattened view of a purchase or sale for transaction history listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub coin_id: String,
    pub quantity: Decimal,
    pub price_per_coin: Decimal,
    pub total_price: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub kind: TransactionKind,
}

impl From<&PurchaseTransaction> for TransactionRecord {
    fn from(p: &PurchaseTransaction) -> Self {
        Self {
            id: p.id,
            coin_id: p.coin_id.clone(),
            quantity: p.quantity_purchased,
            price_per_coin: p.purchase_price,
            total_price: p.total_purchase_price,
            transaction_date: p.purchase_date,
            kind: TransactionKind::Purchase,
        }
    }
}

impl From<&SaleTransaction> for TransactionRecord {
    fn from(s: &SaleTransaction) -> Self {
        Self {
            id: s.id,
            coin_id: s.coin_id.clone(),
            quantity: s.quantity_sold,
            price_per_coin: s.sale_price,
            total_price: s.total_sale_price,
            transaction_date: s.sale_date,
            kind: TransactionKind::Sale,
        }
    }
}

/// One page of a wallet's transaction history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionRecord>,
    pub total_transactions: usize,
    pub total_pages: usize,
    pub current_page: usize,
}
