// src/storage.rs
// Host key-value stores: in-memory, RocksDB-backed, prefixed views and the
// block-scoped write cache

use crate::error::{Result, TierFeeError};
use parking_lot::{Mutex, RwLock};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// One entry of an atomic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Byte-keyed store. Implementations use interior mutability, the same way a
/// RocksDB handle does.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Apply every op or none of them.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()>;
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).prefix_scan(prefix)
    }
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        (**self).write_batch(ops)
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).prefix_scan(prefix)
    }
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        (**self).write_batch(ops)
    }
}

/// Put a JSON-encoded value under a byte key.
pub fn put_json<S: KvStore + ?Sized, V: Serialize>(store: &S, key: &[u8], val: &V) -> Result<()> {
    let bytes = serde_json::to_vec(val)?;
    store.set(key, &bytes)
}

/// Get and decode a JSON value stored under a byte key.
pub fn get_json<S: KvStore + ?Sized, T: DeserializeOwned>(store: &S, key: &[u8]) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Shared in-memory store. Clones see the same data.
#[derive(Clone, Default, Debug)]
pub struct MemStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, for state comparisons.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.inner.read().clone()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self.inner.read();
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut map = self.inner.write();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => {
                    map.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    map.remove(&k);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RocksDB store
// ---------------------------------------------------------------------------

/// RocksDB handle (Arc for cheap cloning).
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    /// Open RocksDB with retry/backoff; another process may still hold the lock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut attempt = 0u32;
        let max_attempts = 8u32;
        let mut wait = 250u64;

        loop {
            match open_rocksdb_internal(path) {
                Ok(db) => return Ok(Self { db: Arc::new(db) }),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(TierFeeError::Store(format!(
                            "failed to open RocksDB at '{}' after {} attempts: {}",
                            path.display(),
                            attempt,
                            e
                        )));
                    }
                    log::warn!(
                        "open_db attempt {}/{} failed: {}, retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        wait
                    );
                    sleep(Duration::from_millis(wait));
                    wait = std::cmp::min(wait * 2, 2000);
                }
            }
        }
    }
}

fn open_rocksdb_internal(path: &Path) -> std::result::Result<DB, rocksdb::Error> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.set_max_open_files(256);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    DB::open(&opts, path)
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Ok(self.db.delete(key)?)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let iter = self.db.iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (k, v) = item?;
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => batch.put(k, v),
                BatchOp::Delete(k) => batch.delete(k),
            }
        }
        Ok(self.db.write(batch)?)
    }
}

// ---------------------------------------------------------------------------
// Prefixed view
// ---------------------------------------------------------------------------

/// Scopes every key of `inner` under a fixed prefix (a module store key or a
/// parameter subspace).
#[derive(Clone, Debug)]
pub struct PrefixStore<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S: KvStore> PrefixStore<S> {
    pub fn new(inner: S, prefix: &[u8]) -> Self {
        Self {
            inner,
            prefix: prefix.to_vec(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut k = Vec::with_capacity(self.prefix.len() + key.len());
        k.extend_from_slice(&self.prefix);
        k.extend_from_slice(key);
        k
    }
}

impl<S: KvStore> KvStore for PrefixStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(&self.full_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let strip = self.prefix.len();
        Ok(self
            .inner
            .prefix_scan(&self.full_key(prefix))?
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let ops = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put(k, v) => BatchOp::Put(self.full_key(&k), v),
                BatchOp::Delete(k) => BatchOp::Delete(self.full_key(&k)),
            })
            .collect();
        self.inner.write_batch(ops)
    }
}

// ---------------------------------------------------------------------------
// Block-scoped write cache
// ---------------------------------------------------------------------------

/// Buffers writes over a base store. Reads see pending writes first.
/// `commit` flushes everything as one atomic batch; `discard` drops it.
pub struct CacheStore<S> {
    base: S,
    pending: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<S: KvStore> CacheStore<S> {
    pub fn new(base: S) -> Self {
        Self {
            base,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Pending writes are kept until the base accepts the batch, so a failed
    /// commit can be retried.
    pub fn commit(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }
        let ops = pending
            .iter()
            .map(|(k, v)| match v {
                Some(v) => BatchOp::Put(k.clone(), v.clone()),
                None => BatchOp::Delete(k.clone()),
            })
            .collect();
        self.base.write_batch(ops)?;
        pending.clear();
        Ok(())
    }

    pub fn discard(&self) {
        self.pending.lock().clear();
    }
}

impl<S: KvStore> KvStore for CacheStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.lock().get(key) {
            return Ok(entry.clone());
        }
        self.base.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.pending.lock().insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.pending.lock().insert(key.to_vec(), None);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.base.prefix_scan(prefix)?.into_iter().collect();
        let pending = self.pending.lock();
        for (k, v) in pending.range(prefix.to_vec()..).take_while(|(k, _)| k.starts_with(prefix)) {
            match v {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut pending = self.pending.lock();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => pending.insert(k, Some(v)),
                BatchOp::Delete(k) => pending.insert(k, None),
            };
        }
        Ok(())
    }
}
