use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the entire crypto-wallet-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Not found ───────────────────────────────────────────────────
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("{coin} asset not found in wallet {wallet}")]
    AssetNotFound { wallet: String, coin: String },

    #[error("No market data available for {0}")]
    CoinDataNotFound(String),

    #[error("No assets in wallet {0}... try buying a coin")]
    NoAssets(String),

    #[error("No transactions for wallet {0}... try buying a coin")]
    NoTransactions(String),

    #[error("No wallet activity data found for wallet {0} on the given date or nearby dates")]
    NoSnapshots(String),

    #[error("Price not available for {coin} on {date}")]
    PriceNotAvailable { coin: String, date: String },

    // ── Permission ──────────────────────────────────────────────────
    #[error("Wallet {wallet} does not belong to user {user}")]
    PermissionDenied { wallet: String, user: String },

    // ── Invalid input ───────────────────────────────────────────────
    #[error("Invalid date format '{0}'. Expected format: YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid sort field: {field}. Must be one of [{allowed}]")]
    InvalidSortField { field: String, allowed: String },

    #[error("Invalid sort order: {0}. Must be one of [asc, desc]")]
    InvalidSortOrder(String),

    #[error("Invalid coin identifier '{0}' (e.g. 'bitcoin', 'ethereum', 'xrp')")]
    UnknownCoin(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ── Business rules ──────────────────────────────────────────────
    #[error("Insufficient quantity to sell: requested {requested} {coin}, holding {held}")]
    InsufficientQuantity {
        coin: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("Price oracle reported a zero price for {0}")]
    ZeroPrice(String),

    // ── Persistence ─────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong password or corrupted file")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── Price oracle / network ──────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Price oracle {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("No price oracle registered")]
    NoProvider,
}

/// Stable classification of a [`CoreError`] that callers can branch on
/// without parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Permission,
    InvalidInput,
    BusinessRule,
    Infrastructure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Permission => write!(f, "permission"),
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::BusinessRule => write!(f, "business_rule"),
            ErrorKind::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::UserNotFound(_)
            | CoreError::WalletNotFound(_)
            | CoreError::AssetNotFound { .. }
            | CoreError::CoinDataNotFound(_)
            | CoreError::NoAssets(_)
            | CoreError::NoTransactions(_)
            | CoreError::NoSnapshots(_)
            | CoreError::PriceNotAvailable { .. } => ErrorKind::NotFound,

            CoreError::PermissionDenied { .. } => ErrorKind::Permission,

            CoreError::InvalidDate(_)
            | CoreError::InvalidSortField { .. }
            | CoreError::InvalidSortOrder(_)
            | CoreError::UnknownCoin(_)
            | CoreError::ValidationError(_) => ErrorKind::InvalidInput,

            CoreError::InsufficientQuantity { .. } | CoreError::ZeroPrice(_) => {
                ErrorKind::BusinessRule
            }

            CoreError::Storage(_)
            | CoreError::InvalidFileFormat(_)
            | CoreError::UnsupportedVersion(_)
            | CoreError::Encryption(_)
            | CoreError::Decryption
            | CoreError::Serialization(_)
            | CoreError::Deserialization(_)
            | CoreError::FileIO(_)
            | CoreError::Api { .. }
            | CoreError::Network(_)
            | CoreError::Timeout { .. }
            | CoreError::NoProvider => ErrorKind::Infrastructure,
        }
    }

    /// Infrastructure failures are the only ones worth re-submitting unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest messages embed the full URL; keep API keys out of logs.
        let msg = e.to_string();
        let sanitized = match msg.find('?') {
            Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
            None => msg,
        };
        CoreError::Network(sanitized)
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}
