use chrono::{Days, NaiveDate, NaiveTime};
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::price::{checked_add, usd_value};
use crate::models::snapshot::ValuationSnapshot;
use crate::models::valuation::{SnapshotRelation, ValuedHolding, WalletValuation};
use crate::models::wallet::{UserId, WalletId};
use crate::services::price_service::PriceService;
use crate::services::wallet_service::owned_wallet;
use crate::storage::repository::LedgerStore;

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_requested_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidDate(raw.to_string()))
}

/// Pick the snapshot that answers a valuation on `date`.
///
/// `snapshots` must be ascending by `taken_at`. Tiers, first match wins:
/// 1. latest snapshot taken on `date` itself → [`SnapshotRelation::Current`]
/// 2. latest snapshot before `date` → [`SnapshotRelation::Past`]
/// 3. earliest snapshot after `date` → [`SnapshotRelation::Future`]
pub fn locate_snapshot(
    snapshots: &[ValuationSnapshot],
    date: NaiveDate,
) -> Option<(SnapshotRelation, &ValuationSnapshot)> {
    let day_start = date.and_time(NaiveTime::MIN).and_utc();
    let next_day_start = date
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(NaiveTime::MIN).and_utc());

    let before = snapshots.partition_point(|s| s.taken_at < day_start);
    let through_day = match next_day_start {
        Some(end) => snapshots.partition_point(|s| s.taken_at < end),
        None => snapshots.len(),
    };

    if through_day > before {
        return Some((SnapshotRelation::Current, &snapshots[through_day - 1]));
    }
    if before > 0 {
        return Some((SnapshotRelation::Past, &snapshots[before - 1]));
    }
    snapshots
        .get(through_day)
        .map(|s| (SnapshotRelation::Future, s))
}

/// Answers "what was this wallet worth on date D?" from the snapshot series,
/// reconstructing from historical prices when D has no snapshot of its own.
pub struct ValuationService {
    store: Arc<dyn LedgerStore>,
    price_service: Arc<PriceService>,
}

impl ValuationService {
    pub fn new(store: Arc<dyn LedgerStore>, price_service: Arc<PriceService>) -> Self {
        Self {
            store,
            price_service,
        }
    }

    pub async fn get_valuation(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        date: &str,
    ) -> Result<WalletValuation, CoreError> {
        let requested_date = parse_requested_date(date)?;
        owned_wallet(self.store.as_ref(), user_id, wallet_id).await?;

        let mut snapshots = self.store.list_snapshots(wallet_id).await?;
        snapshots.sort_by_key(|s| s.taken_at);

        let (relation, snapshot) = locate_snapshot(&snapshots, requested_date)
            .ok_or_else(|| CoreError::NoSnapshots(wallet_id.to_string()))?;
        debug!(
            "Valuing wallet {wallet_id} on {requested_date} from {relation} snapshot taken {}",
            snapshot.taken_at
        );

        match relation {
            SnapshotRelation::Current | SnapshotRelation::Future => {
                Ok(as_recorded(wallet_id, requested_date, relation, snapshot))
            }
            SnapshotRelation::Past => self.reconstruct(wallet_id, requested_date, snapshot).await,
        }
    }

    /// Value the snapshot's holdings at historical prices on `date`.
    async fn reconstruct(
        &self,
        wallet_id: WalletId,
        date: NaiveDate,
        snapshot: &ValuationSnapshot,
    ) -> Result<WalletValuation, CoreError> {
        let mut holdings = BTreeMap::new();
        let mut requested_total = Decimal::ZERO;

        for (coin_id, held) in &snapshot.holdings {
            let price = self.price_service.price_on(coin_id, date).await?;
            let value = usd_value(held.quantity, price)?;
            requested_total = checked_add(requested_total, value, "the requested-date total")?;
            holdings.insert(
                coin_id.clone(),
                ValuedHolding {
                    quantity: held.quantity,
                    purchase_value_usd: held.purchase_value_usd,
                    value_on_snapshot_date_usd: held.value_on_date_usd,
                    value_on_requested_date_usd: value,
                },
            );
        }

        Ok(WalletValuation {
            wallet_id,
            requested_date: date,
            snapshot_date: snapshot.taken_at,
            relation: SnapshotRelation::Past,
            holdings,
            total_value_usd_on_snapshot_date: snapshot.total_value_usd,
            date_requested_total_value: requested_total,
            net_gain_loss: requested_total - snapshot.total_value_usd,
        })
    }
}

/// Report a snapshot as-is: both totals equal, no gain or loss.
fn as_recorded(
    wallet_id: WalletId,
    requested_date: NaiveDate,
    relation: SnapshotRelation,
    snapshot: &ValuationSnapshot,
) -> WalletValuation {
    let holdings = snapshot
        .holdings
        .iter()
        .map(|(coin_id, held)| {
            (
                coin_id.clone(),
                ValuedHolding {
                    quantity: held.quantity,
                    purchase_value_usd: held.purchase_value_usd,
                    value_on_snapshot_date_usd: held.value_on_date_usd,
                    value_on_requested_date_usd: held.value_on_date_usd,
                },
            )
        })
        .collect();

    WalletValuation {
        wallet_id,
        requested_date,
        snapshot_date: snapshot.taken_at,
        relation,
        holdings,
        total_value_usd_on_snapshot_date: snapshot.total_value_usd,
        date_requested_total_value: snapshot.total_value_usd,
        net_gain_loss: Decimal::ZERO,
    }
}
