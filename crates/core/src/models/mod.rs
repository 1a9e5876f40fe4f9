pub mod asset;
pub mod ledger;
pub mod listing;
pub mod price;
pub mod settings;
pub mod snapshot;
pub mod transaction;
pub mod valuation;
pub mod wallet;
