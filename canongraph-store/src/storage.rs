//! RocksDB plumbing shared by the persistent graph store and vector index
//!
//! Both stores use LZ4-compressed RocksDB instances with a schema version
//! key checked on open.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, DB};

use crate::error::Result;

/// Open (creating if needed) a RocksDB instance and verify its schema version
pub fn open_db(path: impl AsRef<Path>) -> Result<Arc<DB>> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)?;

    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.set_max_background_jobs(2);
    opts.set_bytes_per_sync(1048576); // 1MB
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

    let db = DB::open(&opts, path)?;
    crate::migration::ensure_schema(&db)?;

    log::info!("RocksDB opened at: {}", path.display());
    Ok(Arc::new(db))
}

/// All `(suffix, value)` pairs whose key starts with `prefix`
///
/// Keys that are not valid UTF-8 are skipped.
pub fn scan_prefix(db: &DB, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    let iter = db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));

    for item in iter {
        let (key, value) = item?;
        if !key.starts_with(prefix.as_bytes()) {
            break;
        }
        match std::str::from_utf8(&key[prefix.len()..]) {
            Ok(suffix) => out.push((suffix.to_string(), value.to_vec())),
            Err(_) => log::warn!("Skipping non-UTF-8 key under prefix {}", prefix),
        }
    }

    Ok(out)
}
