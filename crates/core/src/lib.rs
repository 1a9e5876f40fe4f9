pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use errors::CoreError;
use models::{
    ledger::LedgerData,
    listing::WalletListing,
    settings::Settings,
    transaction::{PurchaseTransaction, SaleTransaction, TransactionPage},
    valuation::WalletValuation,
    wallet::{UserId, Wallet, WalletId},
};
use providers::registry::PriceOracleRegistry;
use services::{
    price_service::PriceService, trade_service::TradeService,
    valuation_service::ValuationService, wallet_service::WalletService,
};
use storage::manager::StorageManager;
use storage::memory::MemoryStore;
use storage::repository::LedgerStore;

/// Main entry point for the crypto wallet core library.
/// Holds the ledger store and all services operating on it.
///
/// Every operation takes plain ids and strings and returns plain records;
/// transport and authentication live outside this crate.
#[must_use]
pub struct WalletTracker {
    settings: Settings,
    store: Arc<MemoryStore>,
    price_service: Arc<PriceService>,
    wallet_service: WalletService,
    trade_service: TradeService,
    valuation_service: ValuationService,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: AtomicBool,
}

impl std::fmt::Debug for WalletTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletTracker")
            .field("settings", &self.settings)
            .field("oracles", &self.price_service.oracle_names())
            .field("cached_entries", &self.price_service.cache_entries())
            .field("dirty", &self.has_unsaved_changes())
            .finish()
    }
}

impl WalletTracker {
    /// Empty ledger, CoinCap as the price oracle.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        let registry = PriceOracleRegistry::new_with_defaults(&settings);
        Self::with_registry(settings, registry)
    }

    /// Empty ledger with a caller-supplied oracle chain.
    pub fn with_registry(settings: Settings, registry: PriceOracleRegistry) -> Result<Self, CoreError> {
        Self::restore(settings, registry, LedgerData::default())
    }

    /// Resume from previously persisted ledger state.
    pub fn restore(
        settings: Settings,
        registry: PriceOracleRegistry,
        data: LedgerData,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        if registry.is_empty() {
            return Err(CoreError::NoProvider);
        }

        let store = Arc::new(MemoryStore::from_data(data));
        let price_service = Arc::new(PriceService::new(registry, &settings));
        let ledger: Arc<dyn LedgerStore> = store.clone();

        Ok(Self {
            wallet_service: WalletService::new(
                Arc::clone(&ledger),
                Arc::clone(&price_service),
                settings.clone(),
            ),
            trade_service: TradeService::new(Arc::clone(&ledger), Arc::clone(&price_service)),
            valuation_service: ValuationService::new(ledger, Arc::clone(&price_service)),
            settings,
            store,
            price_service,
            dirty: AtomicBool::new(false),
        })
    }

    /// Load a ledger from encrypted bytes (password required).
    pub fn load_from_bytes(
        encrypted: &[u8],
        password: &str,
        settings: Settings,
        registry: PriceOracleRegistry,
    ) -> Result<Self, CoreError> {
        let data = StorageManager::load_from_bytes(encrypted, password)?;
        Self::restore(settings, registry, data)
    }

    /// Load a ledger from an encrypted file on disk.
    pub fn load_from_file(
        path: &str,
        password: &str,
        settings: Settings,
        registry: PriceOracleRegistry,
    ) -> Result<Self, CoreError> {
        let data = StorageManager::load_from_file(path, password)?;
        Self::restore(settings, registry, data)
    }

    /// Encrypt the current ledger. Clears the unsaved-changes flag on success.
    pub fn save_to_bytes(&self, password: &str) -> Result<Vec<u8>, CoreError> {
        let bytes = StorageManager::save_to_bytes(&self.store.export_data()?, password)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(bytes)
    }

    /// Encrypt the current ledger to a file. Clears the unsaved-changes flag on success.
    pub fn save_to_file(&self, path: &str, password: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.store.export_data()?, path, password)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Make a user id known. Users are owned by an external directory;
    /// this only records that the id exists.
    pub fn register_user(&self, user_id: UserId) -> Result<(), CoreError> {
        self.store.register_user(user_id)?;
        self.mark_dirty();
        Ok(())
    }

    // ── Wallets ─────────────────────────────────────────────────────

    pub async fn create_wallet(&self, user_id: UserId) -> Result<Wallet, CoreError> {
        let wallet = self.wallet_service.create_wallet(user_id).await?;
        self.mark_dirty();
        Ok(wallet)
    }

    pub async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, CoreError> {
        self.wallet_service.list_wallets(user_id).await
    }

    pub async fn delete_wallet(&self, user_id: UserId, wallet_id: WalletId) -> Result<(), CoreError> {
        self.wallet_service.delete_wallet(user_id, wallet_id).await?;
        self.mark_dirty();
        Ok(())
    }

    // ── Trades ──────────────────────────────────────────────────────

    /// Buy `quantity` units of `coin` at the current oracle price.
    pub async fn purchase_asset(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        coin: &str,
        quantity: Decimal,
    ) -> Result<PurchaseTransaction, CoreError> {
        let record = self
            .trade_service
            .purchase(user_id, wallet_id, coin, quantity)
            .await?;
        self.mark_dirty();
        Ok(record)
    }

    /// Sell `quantity` units of `coin` at the current oracle price.
    pub async fn sell_asset(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        coin: &str,
        quantity: Decimal,
    ) -> Result<SaleTransaction, CoreError> {
        let record = self.trade_service.sell(user_id, wallet_id, coin, quantity).await?;
        self.mark_dirty();
        Ok(record)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Current holdings valued at live prices, sorted then paginated.
    /// `limit` falls back to the configured default page size.
    pub async fn get_wallet(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        page: usize,
        limit: Option<usize>,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<WalletListing, CoreError> {
        self.wallet_service
            .list_holdings(user_id, wallet_id, page, limit, sort_by, sort_order)
            .await
    }

    /// Purchases and sales, newest first.
    pub async fn get_transactions(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        page: usize,
        limit: Option<usize>,
    ) -> Result<TransactionPage, CoreError> {
        self.wallet_service
            .list_transactions(user_id, wallet_id, page, limit)
            .await
    }

    /// Wallet value on a `YYYY-MM-DD` date.
    pub async fn get_valuation(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        date: &str,
    ) -> Result<WalletValuation, CoreError> {
        self.valuation_service.get_valuation(user_id, wallet_id, date).await
    }

    // ── Cache Management ────────────────────────────────────────────

    #[must_use]
    pub fn cache_total_entries(&self) -> usize {
        self.price_service.cache_entries()
    }

    /// Drop expired oracle responses. Returns the number removed.
    pub fn cache_purge_expired(&self) -> usize {
        self.price_service.purge_expired()
    }

    pub fn cache_clear(&self) {
        self.price_service.clear_cache();
    }

    // ── Settings & State ────────────────────────────────────────────

    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns `true` if the ledger has been modified since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Consistent copy of the whole ledger.
    pub fn export_data(&self) -> Result<LedgerData, CoreError> {
        self.store.export_data()
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}
