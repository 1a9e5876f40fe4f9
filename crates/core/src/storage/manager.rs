use log::debug;

use super::encryption::{self, KdfParams};
use super::format::{self, LedgerHeader};
use crate::errors::CoreError;
use crate::models::ledger::LedgerData;

/// Save/load the ledger to/from encrypted bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// LedgerData → bincode → AES-256-GCM(Argon2id(password)) → CWLT bytes
    pub fn save_to_bytes(ledger: &LedgerData, password: &str) -> Result<Vec<u8>, CoreError> {
        Self::save_with_params(ledger, password, KdfParams::default())
    }

    /// Same as [`Self::save_to_bytes`] with explicit KDF cost parameters.
    pub fn save_with_params(
        ledger: &LedgerData,
        password: &str,
        kdf_params: KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let plaintext = bincode::serialize(ledger)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize ledger: {e}")))?;

        let header = LedgerHeader {
            version: format::CURRENT_VERSION,
            kdf_params,
            salt: encryption::random_bytes()?,
            nonce: encryption::random_bytes()?,
        };
        let key = encryption::derive_key(password, &header.salt, &header.kdf_params)?;
        let ciphertext = encryption::seal(&plaintext, &key, &header.nonce)?;

        debug!(
            "Encrypted ledger with {} wallets ({} bytes)",
            ledger.wallets.len(),
            ciphertext.len()
        );
        Ok(format::encode(&header, &ciphertext))
    }

    /// CWLT bytes → header → Argon2id(password, salt) → AES-256-GCM → bincode → LedgerData
    pub fn load_from_bytes(data: &[u8], password: &str) -> Result<LedgerData, CoreError> {
        let (header, ciphertext) = format::decode(data)?;
        let key = encryption::derive_key(password, &header.salt, &header.kdf_params)?;
        let plaintext = encryption::open(ciphertext, &key, &header.nonce)?;

        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize ledger: {e}")))
    }

    pub fn save_to_file(ledger: &LedgerData, path: &str, password: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(ledger, password)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_from_file(path: &str, password: &str) -> Result<LedgerData, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, password)
    }
}
