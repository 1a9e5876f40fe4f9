use super::encryption::{KdfParams, NONCE_LEN, SALT_LEN};
use crate::errors::CoreError;

/// Magic bytes identifying a crypto wallet ledger file.
pub const MAGIC: &[u8; 4] = b"CWLT";

pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf(12) + salt(16) + nonce(12) + ciphertext_len(8)
pub const HEADER_LEN: usize = 4 + 2 + 12 + SALT_LEN + NONCE_LEN + 8;

/// Parsed header of a ledger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerHeader {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

/// Assemble a ledger file.
///
/// ```text
/// [CWLT] [version u16 LE] [memory_cost u32 LE] [time_cost u32 LE]
/// [parallelism u32 LE] [salt 16B] [nonce 12B] [ciphertext_len u64 LE]
/// [ciphertext + GCM tag]
/// ```
pub fn encode(header: &LedgerHeader, ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&header.version.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.memory_cost.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.time_cost.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.parallelism.to_le_bytes());
    buf.extend_from_slice(&header.salt);
    buf.extend_from_slice(&header.nonce);
    buf.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    buf.extend_from_slice(ciphertext);
    buf
}

/// Sequential little-endian reader over the header bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], CoreError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| CoreError::InvalidFileFormat(format!("Truncated header reading {what}")))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u16(&mut self, what: &str) -> Result<u16, CoreError> {
        Ok(u16::from_le_bytes(self.take(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32, CoreError> {
        Ok(u32::from_le_bytes(self.take(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64, CoreError> {
        Ok(u64::from_le_bytes(self.take(what)?))
    }
}

/// Split a ledger file into its header and ciphertext.
pub fn decode(data: &[u8]) -> Result<(LedgerHeader, &[u8]), CoreError> {
    if data.len() < HEADER_LEN {
        return Err(CoreError::InvalidFileFormat(
            "File too small to be a ledger file".into(),
        ));
    }
    if &data[..4] != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes, not a ledger file".into(),
        ));
    }

    let mut cur = Cursor { data, pos: 4 };
    let version = cur.u16("version")?;
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let kdf_params = KdfParams {
        memory_cost: cur.u32("memory_cost")?,
        time_cost: cur.u32("time_cost")?,
        parallelism: cur.u32("parallelism")?,
    };
    kdf_params.check_bounds()?;

    let salt = cur.take::<SALT_LEN>("salt")?;
    let nonce = cur.take::<NONCE_LEN>("nonce")?;
    let len = usize::try_from(cur.u64("ciphertext length")?)
        .map_err(|_| CoreError::InvalidFileFormat("Ciphertext length overflow".into()))?;

    let body = &data[cur.pos..];
    if body.len() < len {
        return Err(CoreError::InvalidFileFormat(format!(
            "File truncated: expected {len} bytes of ciphertext, got {}",
            body.len()
        )));
    }

    let header = LedgerHeader {
        version,
        kdf_params,
        salt,
        nonce,
    };
    Ok((header, &body[..len]))
}
