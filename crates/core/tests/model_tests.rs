// ═══════════════════════════════════════════════════════════════════
// Model Tests: listing sort/pagination, TTL cache, snapshots,
// settings, snapshot location
// ═══════════════════════════════════════════════════════════════════

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crypto_wallet_core::errors::CoreError;
use crypto_wallet_core::models::asset::normalize_coin_id;
use crypto_wallet_core::models::ledger::WalletLedger;
use crypto_wallet_core::models::listing::{
    page_slice, total_pages, AssetValuation, SortField, SortOrder,
};
use crypto_wallet_core::models::price::{
    checked_total, last_price_on_or_before, prorate_usd, round_usd, usd_value, PricePoint,
    TtlCache,
};
use crypto_wallet_core::models::settings::{DeletionPolicy, Settings};
use crypto_wallet_core::models::snapshot::{SnapshotHolding, ValuationSnapshot};
use crypto_wallet_core::models::valuation::SnapshotRelation;
use crypto_wallet_core::models::wallet::Wallet;
use crypto_wallet_core::services::valuation_service::{locate_snapshot, parse_requested_date};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
}

fn snapshot_at(taken_at: DateTime<Utc>, value: Decimal) -> ValuationSnapshot {
    let mut holdings = BTreeMap::new();
    holdings.insert(
        "bitcoin".to_string(),
        SnapshotHolding {
            quantity: dec!(1),
            purchase_value_usd: dec!(100),
            value_on_date_usd: value,
        },
    );
    ValuationSnapshot::new(Uuid::new_v4(), taken_at, holdings).unwrap()
}

fn row(coin: &str, quantity: Decimal, rank: Option<u32>) -> AssetValuation {
    AssetValuation {
        asset_id: Uuid::new_v4(),
        coin_id: coin.to_string(),
        quantity,
        purchase_value_usd: dec!(10),
        current_price_usd: dec!(1),
        current_value_usd: quantity,
        net_gain_loss: quantity - dec!(10),
        initial_purchase_date: at(2024, 1, 1, 0, 0),
        coin_cap_rank: rank,
        coin_cap_symbol: coin.to_uppercase(),
        coin_cap_name: coin.to_string(),
        market_cap_usd: None,
        volume_usd_24hr: None,
        change_percent_24hr: None,
    }
}

// ═══════════════════════════════════════════════════════════════════
// Sorting
// ═══════════════════════════════════════════════════════════════════

mod sorting {
    use super::*;

    #[test]
    fn every_allowed_name_parses_back() {
        for field in SortField::ALL {
            let parsed: SortField = field.as_str().parse().unwrap();
            assert_eq!(parsed, field);
        }
    }

    #[test]
    fn unknown_field_lists_allowed_names() {
        let err = "price".parse::<SortField>().unwrap_err();
        match err {
            CoreError::InvalidSortField { field, allowed } => {
                assert_eq!(field, "price");
                assert!(allowed.starts_with("coin_name, quantity"));
                assert!(allowed.contains("change_percent_24hr"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn field_names_are_case_sensitive() {
        assert!("Quantity".parse::<SortField>().is_err());
    }

    #[test]
    fn sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!(SortOrder::default(), SortOrder::Asc);
        assert!(matches!(
            "sideways".parse::<SortOrder>(),
            Err(CoreError::InvalidSortOrder(_))
        ));
    }

    #[test]
    fn compare_by_quantity() {
        let a = row("bitcoin", dec!(1), Some(1));
        let b = row("ethereum", dec!(5), Some(2));
        assert!(SortField::Quantity.compare(&a, &b).is_lt());
        assert!(SortField::Quantity.compare(&b, &a).is_gt());
    }

    #[test]
    fn missing_rank_sorts_first() {
        let ranked = row("bitcoin", dec!(1), Some(1));
        let unranked = row("obscure", dec!(1), None);
        assert!(SortField::CoinCapRank.compare(&unranked, &ranked).is_lt());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Pagination
// ═══════════════════════════════════════════════════════════════════

mod pagination {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn slices_are_one_indexed() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(page_slice(&items, 1, 10), (1..=10).collect::<Vec<_>>());
        assert_eq!(page_slice(&items, 3, 10), (21..=25).collect::<Vec<_>>());
    }

    #[test]
    fn page_past_end_is_empty() {
        let items: Vec<u32> = (1..=25).collect();
        assert!(page_slice(&items, 4, 10).is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Prices & TTL cache
// ═══════════════════════════════════════════════════════════════════

mod prices {
    use super::*;

    #[test]
    fn cache_entry_expires_after_ttl() {
        let mut cache: TtlCache<String, Decimal> = TtlCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("bitcoin".into(), dec!(50000), t0);

        assert_eq!(
            cache.get_at(&"bitcoin".to_string(), t0 + Duration::from_secs(59)),
            Some(dec!(50000))
        );
        assert_eq!(
            cache.get_at(&"bitcoin".to_string(), t0 + Duration::from_secs(60)),
            None
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_drops_only_expired() {
        let mut cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at(1, 1, t0);
        cache.insert_at(2, 2, t0 + Duration::from_secs(8));

        let removed = cache.purge_expired_at(t0 + Duration::from_secs(12));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn last_price_at_or_before() {
        let points = vec![
            PricePoint { date: d(2024, 3, 1), price: dec!(10) },
            PricePoint { date: d(2024, 3, 3), price: dec!(30) },
            PricePoint { date: d(2024, 3, 5), price: dec!(50) },
        ];
        assert_eq!(last_price_on_or_before(&points, d(2024, 3, 3)).unwrap().price, dec!(30));
        assert_eq!(last_price_on_or_before(&points, d(2024, 3, 4)).unwrap().price, dec!(30));
        assert!(last_price_on_or_before(&points, d(2024, 2, 28)).is_none());
        assert!(last_price_on_or_before(&[], d(2024, 3, 3)).is_none());
    }

    #[test]
    fn usd_rounding_keeps_four_places() {
        assert_eq!(round_usd(dec!(1.23456)), dec!(1.2346));
        assert_eq!(round_usd(dec!(0.3) * dec!(3)), dec!(0.9));
    }

    #[test]
    fn checked_amounts() {
        assert_eq!(usd_value(dec!(0.5), dec!(3000.12345)).unwrap(), dec!(1500.0617));
        assert_eq!(prorate_usd(dec!(100), dec!(1), dec!(3)).unwrap(), dec!(33.3333));
        assert_eq!(checked_total([dec!(1.5), dec!(2.25)]).unwrap(), dec!(3.75));
    }

    #[test]
    fn out_of_range_amounts_are_invalid_input() {
        assert!(matches!(
            usd_value(Decimal::MAX, dec!(50000)),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            prorate_usd(Decimal::MAX, dec!(2), dec!(3)),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            checked_total([Decimal::MAX, dec!(1)]),
            Err(CoreError::ValidationError(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Snapshots & ledger
// ═══════════════════════════════════════════════════════════════════

mod snapshots {
    use super::*;

    #[test]
    fn total_is_sum_of_holdings() {
        let mut holdings = BTreeMap::new();
        for (coin, value) in [("bitcoin", dec!(100.5)), ("ethereum", dec!(20.25))] {
            holdings.insert(
                coin.to_string(),
                SnapshotHolding {
                    quantity: dec!(1),
                    purchase_value_usd: dec!(0),
                    value_on_date_usd: value,
                },
            );
        }
        let snap = ValuationSnapshot::new(Uuid::new_v4(), Utc::now(), holdings).unwrap();
        assert_eq!(snap.total_value_usd, dec!(120.75));
    }

    #[test]
    fn total_out_of_range_is_rejected() {
        let mut holdings = BTreeMap::new();
        for coin in ["a", "b"] {
            holdings.insert(
                coin.to_string(),
                SnapshotHolding {
                    quantity: dec!(1),
                    purchase_value_usd: dec!(0),
                    value_on_date_usd: Decimal::MAX,
                },
            );
        }
        assert!(matches!(
            ValuationSnapshot::new(Uuid::new_v4(), Utc::now(), holdings),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn empty_snapshot_totals_zero() {
        let snap = ValuationSnapshot::new(Uuid::new_v4(), Utc::now(), BTreeMap::new()).unwrap();
        assert_eq!(snap.total_value_usd, Decimal::ZERO);
    }

    #[test]
    fn ledger_keeps_snapshots_ordered() {
        let mut ledger = WalletLedger::new(Wallet::new(Uuid::new_v4()));
        ledger.push_snapshot(snapshot_at(at(2024, 5, 2, 9, 0), dec!(2)));
        ledger.push_snapshot(snapshot_at(at(2024, 5, 1, 9, 0), dec!(1)));
        ledger.push_snapshot(snapshot_at(at(2024, 5, 3, 9, 0), dec!(3)));

        let totals: Vec<Decimal> = ledger.snapshots.iter().map(|s| s.total_value_usd).collect();
        assert_eq!(totals, vec![dec!(1), dec!(2), dec!(3)]);
    }

    #[test]
    fn coin_ids_are_normalized() {
        assert_eq!(normalize_coin_id("  Bitcoin "), "bitcoin");
        assert_eq!(normalize_coin_id("XRP"), "xrp");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Snapshot location
// ═══════════════════════════════════════════════════════════════════

mod locate {
    use super::*;

    #[test]
    fn latest_snapshot_of_the_day_wins() {
        let snaps = vec![
            snapshot_at(at(2024, 5, 1, 8, 0), dec!(1)),
            snapshot_at(at(2024, 5, 1, 17, 30), dec!(2)),
            snapshot_at(at(2024, 5, 2, 0, 0), dec!(3)),
        ];
        let (relation, snap) = locate_snapshot(&snaps, d(2024, 5, 1)).unwrap();
        assert_eq!(relation, SnapshotRelation::Current);
        assert_eq!(snap.total_value_usd, dec!(2));
    }

    #[test]
    fn midnight_belongs_to_its_own_day() {
        let snaps = vec![snapshot_at(at(2024, 5, 2, 0, 0), dec!(3))];
        let (relation, _) = locate_snapshot(&snaps, d(2024, 5, 2)).unwrap();
        assert_eq!(relation, SnapshotRelation::Current);
    }

    #[test]
    fn past_prefers_latest_before() {
        let snaps = vec![
            snapshot_at(at(2024, 5, 1, 8, 0), dec!(1)),
            snapshot_at(at(2024, 5, 3, 8, 0), dec!(3)),
            snapshot_at(at(2024, 5, 9, 8, 0), dec!(9)),
        ];
        let (relation, snap) = locate_snapshot(&snaps, d(2024, 5, 5)).unwrap();
        assert_eq!(relation, SnapshotRelation::Past);
        assert_eq!(snap.total_value_usd, dec!(3));
    }

    #[test]
    fn future_takes_earliest_after() {
        let snaps = vec![
            snapshot_at(at(2024, 5, 9, 8, 0), dec!(9)),
            snapshot_at(at(2024, 5, 12, 8, 0), dec!(12)),
        ];
        let (relation, snap) = locate_snapshot(&snaps, d(2024, 5, 5)).unwrap();
        assert_eq!(relation, SnapshotRelation::Future);
        assert_eq!(snap.total_value_usd, dec!(9));
    }

    #[test]
    fn nothing_to_locate() {
        assert!(locate_snapshot(&[], d(2024, 5, 5)).is_none());
    }

    #[test]
    fn date_parsing() {
        assert_eq!(parse_requested_date("2024-02-29").unwrap(), d(2024, 2, 29));
        assert!(matches!(
            parse_requested_date("2023-02-29"),
            Err(CoreError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_requested_date("05/01/2024"),
            Err(CoreError::InvalidDate(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.default_page_limit, 10);
        assert_eq!(s.wallet_deletion, DeletionPolicy::Cascade);
        assert_eq!(s.oracle_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s = Settings::from_json(r#"{"max_page_limit": 50, "wallet_deletion": "retain_history"}"#)
            .unwrap();
        assert_eq!(s.max_page_limit, 50);
        assert_eq!(s.default_page_limit, 10);
        assert_eq!(s.wallet_deletion, DeletionPolicy::RetainHistory);
    }

    #[test]
    fn default_limit_above_max_is_rejected() {
        let err = Settings::from_json(r#"{"default_page_limit": 200}"#).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn malformed_json_is_invalid_input() {
        let err = Settings::from_json(r#"{"max_page_limit": "many"}"#).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert!(!err.is_retryable());

        assert!(matches!(
            Settings::from_json("{not json"),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let s = Settings {
            oracle_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
