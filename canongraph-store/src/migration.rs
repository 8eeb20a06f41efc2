//! Schema version bookkeeping
//!
//! Every database carries a `_db_version` key (u32, little endian). A fresh
//! database is stamped with the current version; a database written by a
//! newer release is refused rather than misread.

use rocksdb::DB;

use crate::error::{KnowledgeError, Result};

/// Database version stored in metadata
pub const DB_VERSION_KEY: &[u8] = b"_db_version";
pub const CURRENT_VERSION: u32 = 1;

/// Read the stored version, stamping fresh databases
pub fn ensure_schema(db: &DB) -> Result<u32> {
    let stored = match db.get(DB_VERSION_KEY)? {
        Some(bytes) => {
            let bytes_slice: &[u8] = bytes.as_ref();
            let version_bytes: [u8; 4] = bytes_slice
                .try_into()
                .map_err(|_| KnowledgeError::invalid_input("Invalid version format"))?;
            Some(u32::from_le_bytes(version_bytes))
        }
        None => None,
    };

    match stored {
        None => {
            db.put(DB_VERSION_KEY, CURRENT_VERSION.to_le_bytes())?;
            log::debug!("Stamped new database with schema v{}", CURRENT_VERSION);
            Ok(CURRENT_VERSION)
        }
        Some(version) if version > CURRENT_VERSION => Err(KnowledgeError::invalid_input(format!(
            "Database schema v{} is newer than supported v{}",
            version, CURRENT_VERSION
        ))),
        Some(version) => {
            log::debug!("Database version: {} (current: {})", version, CURRENT_VERSION);
            Ok(version)
        }
    }
}
