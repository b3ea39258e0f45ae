//! A single database: string values plus per-key expiry.
//!
//! ## Design Decisions
//!
//! 1. **One lock per keyspace**: the value map and the expiry map live
//!    together behind one `RwLock`. Multi-key operations such as `MSETNX`
//!    check and write under the same guard, so no other client can slip a
//!    write in between.
//! 2. **Lazy + active expiry**: a key whose deadline is at or before "now" is
//!    invisible to every operation. Writers purge it on contact, and the
//!    [`ExpirySweeper`](crate::storage::ExpirySweeper) purges the rest.
//! 3. **Separate expiry map**: only keys with a timeout pay for one, and the
//!    sweeper scans just those keys.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Keyspace (db N)                          │
//! │  RwLock<KeyspaceInner>                   │
//! │   ├── values:  HashMap<Bytes, Bytes>     │
//! │   └── expires: HashMap<Bytes, Instant>   │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Invariant: every key in `expires` is also in `values`.

use crate::storage::error::{KeyspaceError, PersistError};
use crate::storage::pattern::GlobPattern;
use crate::storage::snapshot;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::trace;

/// Longest timeout honoured; larger requests are clamped so that deadline
/// arithmetic on `Instant` cannot overflow.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist or has already expired.
    Missing,
    /// The key exists and has no timeout.
    Persistent,
    /// The key exists and expires after this much time.
    Remaining(Duration),
}

#[derive(Debug, Default)]
struct KeyspaceInner {
    values: HashMap<Bytes, Bytes>,
    expires: HashMap<Bytes, Instant>,
}

impl KeyspaceInner {
    #[inline]
    fn is_expired(&self, key: &[u8], now: Instant) -> bool {
        self.expires.get(key).is_some_and(|&at| at <= now)
    }

    #[inline]
    fn is_live(&self, key: &[u8], now: Instant) -> bool {
        self.values.contains_key(key) && !self.is_expired(key, now)
    }

    /// Removes `key` if its deadline has passed. Returns true if it did.
    fn purge_if_expired(&mut self, key: &[u8], now: Instant) -> bool {
        if self.is_expired(key, now) {
            self.values.remove(key);
            self.expires.remove(key);
            true
        } else {
            false
        }
    }

    fn live_value(&self, key: &[u8], now: Instant) -> Option<&Bytes> {
        if self.is_expired(key, now) {
            None
        } else {
            self.values.get(key)
        }
    }

    fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.expires.remove(key);
        self.values.remove(key)
    }
}

fn deadline(now: Instant, ttl: Duration) -> Instant {
    now + ttl.min(MAX_TTL)
}

fn parse_integer(value: &[u8]) -> Result<i64, KeyspaceError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(KeyspaceError::NotAnInteger)
}

/// One logical database.
///
/// Designed to be shared behind an `Arc` by every connection task and by
/// the expiry sweeper. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use quillkv::storage::{Keyspace, Ttl};
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let db = Keyspace::new(0);
/// db.set(Bytes::from("name"), Bytes::from("quill"));
/// assert_eq!(db.get(b"name"), Some(Bytes::from("quill")));
///
/// db.set_with_ttl(Bytes::from("session"), Bytes::from("abc"), Duration::from_secs(60));
/// assert!(matches!(db.ttl(b"session"), Ttl::Remaining(_)));
/// assert_eq!(db.ttl(b"name"), Ttl::Persistent);
/// assert_eq!(db.ttl(b"nope"), Ttl::Missing);
/// ```
#[derive(Debug)]
pub struct Keyspace {
    id: usize,
    inner: RwLock<KeyspaceInner>,
    /// Held by the running sweeper for its whole lifetime.
    sweep_gate: tokio::sync::Mutex<()>,
}

impl Keyspace {
    /// Creates an empty keyspace for database `id`.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            inner: RwLock::new(KeyspaceInner::default()),
            sweep_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The database index this keyspace serves.
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn sweep_gate(&self) -> &tokio::sync::Mutex<()> {
        &self.sweep_gate
    }

    /// Gets the value for a key.
    ///
    /// An expired key reads as absent and is removed on the way out.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();

        {
            let inner = self.inner.read();
            match inner.values.get(key) {
                None => return None,
                Some(value) if !inner.is_expired(key, now) => return Some(value.clone()),
                Some(_) => {}
            }
        }

        // Expired: take the write lock and re-check, a writer may have
        // replaced the key in between.
        let mut inner = self.inner.write();
        if inner.purge_if_expired(key, now) {
            trace!(db = self.id, "Lazily expired key");
            return None;
        }
        inner.values.get(key).cloned()
    }

    /// Sets a value.
    ///
    /// A live timeout on the key is kept; a timeout that has already fired is
    /// discarded together with the stale value.
    pub fn set(&self, key: Bytes, value: Bytes) {
        let now = Instant::now();
        let mut inner = self.inner.write();
        inner.purge_if_expired(&key, now);
        inner.values.insert(key, value);
    }

    /// Sets a value that expires `ttl` from now, replacing any prior timeout.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.write();
        inner.expires.insert(key.clone(), deadline(now, ttl));
        inner.values.insert(key, value);
    }

    /// Installs `value` and returns the previous live value.
    ///
    /// The key ends up without a timeout.
    pub fn getset(&self, key: Bytes, value: Bytes) -> Option<Bytes> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        inner.purge_if_expired(&key, now);
        inner.expires.remove(&key);
        inner.values.insert(key, value)
    }

    /// Removes a key and returns its live value.
    pub fn getdel(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if inner.purge_if_expired(key, now) {
            return None;
        }
        inner.remove(key)
    }

    /// Sets every pair in argument order. Each write is visible as soon as
    /// it is applied.
    pub fn mset(&self, pairs: Vec<(Bytes, Bytes)>) {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    /// Sets every pair only if none of the keys exists.
    ///
    /// The existence check and the writes happen under one write lock.
    pub fn msetnx(&self, pairs: Vec<(Bytes, Bytes)>) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write();

        if pairs.iter().any(|(key, _)| inner.is_live(key, now)) {
            return false;
        }

        for (key, value) in pairs {
            inner.purge_if_expired(&key, now);
            inner.values.insert(key, value);
        }
        true
    }

    /// Looks up several keys at once; one slot per requested key, in order.
    pub fn mget(&self, keys: &[Bytes]) -> Vec<Option<Bytes>> {
        let now = Instant::now();
        let inner = self.inner.read();
        keys.iter()
            .map(|key| inner.live_value(key, now).cloned())
            .collect()
    }

    /// Deletes a key. Returns true if a live key was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if inner.purge_if_expired(key, now) {
            return false;
        }
        inner.remove(key).is_some()
    }

    /// Deletes several keys and returns how many were live.
    pub fn delete_many(&self, keys: &[Bytes]) -> u64 {
        keys.iter().filter(|key| self.delete(key)).count() as u64
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        self.inner.read().is_live(key, now)
    }

    /// Counts how many of the given keys exist. Repeated keys count again.
    pub fn exists_many(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let inner = self.inner.read();
        keys.iter().filter(|key| inner.is_live(key, now)).count() as u64
    }

    /// Adds `delta` to the integer stored at `key`.
    ///
    /// A missing key counts as `0`. The new value is stored as decimal text
    /// and the key's timeout is left alone.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64, KeyspaceError> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        inner.purge_if_expired(key, now);

        let current = match inner.values.get(key) {
            Some(value) => parse_integer(value)?,
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or(KeyspaceError::Overflow)?;

        let value = Bytes::from(updated.to_string());
        match inner.values.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                inner.values.insert(Bytes::copy_from_slice(key), value);
            }
        }
        Ok(updated)
    }

    pub fn incr(&self, key: &[u8]) -> Result<i64, KeyspaceError> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: &[u8]) -> Result<i64, KeyspaceError> {
        self.incr_by(key, -1)
    }

    pub fn decr_by(&self, key: &[u8], delta: i64) -> Result<i64, KeyspaceError> {
        let delta = delta.checked_neg().ok_or(KeyspaceError::Overflow)?;
        self.incr_by(key, delta)
    }

    /// Sets a timeout on an existing key.
    ///
    /// A zero `ttl` expires the key immediately. Returns false if the key
    /// does not exist.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write();
        inner.purge_if_expired(key, now);

        let Some((owned_key, _)) = inner.values.get_key_value(key) else {
            return false;
        };
        let owned_key = owned_key.clone();
        inner.expires.insert(owned_key, deadline(now, ttl));
        true
    }

    /// Removes the timeout from a key.
    ///
    /// Returns false if the key does not exist or had no timeout.
    pub fn persist(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if inner.purge_if_expired(key, now) {
            return false;
        }
        inner.expires.remove(key).is_some()
    }

    /// Reports how long a key has left to live.
    pub fn ttl(&self, key: &[u8]) -> Ttl {
        let now = Instant::now();
        let inner = self.inner.read();

        if !inner.is_live(key, now) {
            return Ttl::Missing;
        }
        match inner.expires.get(key) {
            Some(&at) => Ttl::Remaining(at - now),
            None => Ttl::Persistent,
        }
    }

    /// Returns every live key matching a glob pattern.
    ///
    /// This walks the entire keyspace; there is no index.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let now = Instant::now();
        let pattern = GlobPattern::new(pattern);
        let inner = self.inner.read();

        inner
            .values
            .keys()
            .filter(|key| !inner.is_expired(key, now) && pattern.matches(key))
            .cloned()
            .collect()
    }

    /// Removes every key.
    pub fn flush(&self) {
        let mut inner = self.inner.write();
        inner.values.clear();
        inner.expires.clear();
    }

    /// Number of stored keys, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys visible to clients.
    pub fn live_len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read();
        let expired = inner.expires.values().filter(|&&at| at <= now).count();
        inner.values.len() - expired
    }

    /// Number of keys that currently carry a timeout.
    pub fn expiring_len(&self) -> usize {
        self.inner.read().expires.len()
    }

    /// Purges every key whose deadline is at or before now.
    ///
    /// Called by the background sweeper. Returns how many keys were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut inner = self.inner.write();

        let expired: Vec<Bytes> = inner
            .expires
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        expired.len() as u64
    }

    /// Writes the keyspace to `path`. Returns the number of keys written.
    ///
    /// The contents are copied under the read lock; the file is written
    /// after the lock is released.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize, PersistError> {
        let (values, expires, now) = {
            let inner = self.inner.read();
            (inner.values.clone(), inner.expires.clone(), Instant::now())
        };
        snapshot::write_snapshot(path, &values, &expires, now)
    }

    /// Replaces the keyspace contents with the snapshot at `path`.
    ///
    /// The file is read before the write lock is taken. On error the current
    /// contents are left untouched. Returns the number of keys loaded.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, PersistError> {
        let image = snapshot::read_snapshot(path, Instant::now())?;
        let loaded = image.values.len();

        let mut inner = self.inner.write();
        inner.values = image.values;
        inner.expires = image.expires;
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_and_get() {
        let db = Keyspace::new(0);
        db.set(b("key"), b("value"));
        assert_eq!(db.get(b"key"), Some(b("value")));
        assert_eq!(db.get(b"missing"), None);
    }

    #[test]
    fn test_empty_value_is_not_absent() {
        let db = Keyspace::new(0);
        db.set(b("empty"), Bytes::new());
        assert_eq!(db.get(b"empty"), Some(Bytes::new()));
        assert!(db.exists(b"empty"));
        assert_eq!(db.mget(&[b("empty")]), vec![Some(Bytes::new())]);
        assert_eq!(db.delete_many(&[b("empty")]), 1);
    }

    #[test]
    fn test_zero_ttl_is_immediately_absent() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("k"), b("v"), Duration::ZERO);
        assert_eq!(db.get(b"k"), None);
        assert!(!db.exists(b"k"));
        assert_eq!(db.ttl(b"k"), Ttl::Missing);
        assert!(db.is_empty(), "lazy read should have purged the key");
    }

    #[test]
    fn test_expiry_after_wait() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("k"), b("v"), Duration::from_millis(30));
        assert!(db.exists(b"k"));

        thread::sleep(Duration::from_millis(60));

        assert!(!db.exists(b"k"));
        assert_eq!(db.mget(&[b("k")]), vec![None]);
        assert_eq!(db.get(b"k"), None);
    }

    #[test]
    fn test_set_keeps_live_ttl_and_drops_stale_one() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("live"), b("1"), Duration::from_secs(100));
        db.set(b("live"), b("2"));
        assert!(matches!(db.ttl(b"live"), Ttl::Remaining(_)));

        db.set_with_ttl(b("stale"), b("1"), Duration::ZERO);
        db.set(b("stale"), b("2"));
        assert_eq!(db.ttl(b"stale"), Ttl::Persistent);
        assert_eq!(db.get(b"stale"), Some(b("2")));
    }

    #[test]
    fn test_getset() {
        let db = Keyspace::new(0);
        assert_eq!(db.getset(b("k"), b("1")), None);
        assert_eq!(db.getset(b("k"), b("2")), Some(b("1")));
        assert_eq!(db.get(b"k"), Some(b("2")));

        db.set_with_ttl(b("t"), b("old"), Duration::from_secs(100));
        assert_eq!(db.getset(b("t"), b("new")), Some(b("old")));
        assert_eq!(db.ttl(b"t"), Ttl::Persistent);

        db.set_with_ttl(b("gone"), b("old"), Duration::ZERO);
        assert_eq!(db.getset(b("gone"), b("new")), None);
    }

    #[test]
    fn test_getdel() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("k"), b("v"), Duration::from_secs(100));
        assert_eq!(db.getdel(b"k"), Some(b("v")));
        assert_eq!(db.getdel(b"k"), None);
        assert_eq!(db.expiring_len(), 0);
    }

    #[test]
    fn test_mset_and_mget_order() {
        let db = Keyspace::new(0);
        db.mset(vec![(b("k1"), b("a")), (b("k1"), b("b")), (b("k3"), b("c"))]);
        assert_eq!(
            db.mget(&[b("k1"), b("k2"), b("k1"), b("k3")]),
            vec![Some(b("b")), None, Some(b("b")), Some(b("c"))]
        );
    }

    #[test]
    fn test_msetnx_guard() {
        let db = Keyspace::new(0);
        db.set(b("taken"), b("x"));

        assert!(!db.msetnx(vec![(b("new1"), b("1")), (b("taken"), b("2"))]));
        assert_eq!(db.get(b"new1"), None);
        assert_eq!(db.get(b"taken"), Some(b("x")));

        assert!(db.msetnx(vec![(b("new1"), b("1")), (b("new2"), b("2"))]));
        assert_eq!(db.get(b"new1"), Some(b("1")));
        assert_eq!(db.get(b"new2"), Some(b("2")));
    }

    #[test]
    fn test_msetnx_ignores_expired_keys() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("old"), b("x"), Duration::ZERO);
        assert!(db.msetnx(vec![(b("old"), b("fresh"))]));
        assert_eq!(db.get(b"old"), Some(b("fresh")));
        assert_eq!(db.ttl(b"old"), Ttl::Persistent);
    }

    #[test]
    fn test_delete_counts_live_keys_only() {
        let db = Keyspace::new(0);
        db.set(b("a"), b("1"));
        db.set(b("b"), b("2"));
        db.set_with_ttl(b("c"), b("3"), Duration::ZERO);
        assert_eq!(db.delete_many(&[b("a"), b("b"), b("c"), b("d"), b("a")]), 2);
        assert!(db.is_empty());
    }

    #[test]
    fn test_exists_many_counts_duplicates() {
        let db = Keyspace::new(0);
        db.set(b("a"), b("1"));
        assert_eq!(db.exists_many(&[b("a"), b("a"), b("b")]), 2);
    }

    #[test]
    fn test_incr_family() {
        let db = Keyspace::new(0);
        assert_eq!(db.incr(b"ctr"), Ok(1));
        assert_eq!(db.incr_by(b"ctr", 9), Ok(10));
        assert_eq!(db.decr(b"ctr"), Ok(9));
        assert_eq!(db.decr_by(b"ctr", 20), Ok(-11));
        assert_eq!(db.get(b"ctr"), Some(b("-11")));
    }

    #[test]
    fn test_incr_rejects_non_integer() {
        let db = Keyspace::new(0);
        db.set(b("text"), b("hello"));
        assert_eq!(db.incr(b"text"), Err(KeyspaceError::NotAnInteger));
        assert_eq!(db.get(b"text"), Some(b("hello")));

        db.set(b("spaced"), b(" 1"));
        assert_eq!(db.incr(b"spaced"), Err(KeyspaceError::NotAnInteger));
    }

    #[test]
    fn test_incr_overflow() {
        let db = Keyspace::new(0);
        db.set(b("max"), Bytes::from(i64::MAX.to_string()));
        assert_eq!(db.incr(b"max"), Err(KeyspaceError::Overflow));
        assert_eq!(db.decr_by(b"x", i64::MIN), Err(KeyspaceError::Overflow));
    }

    #[test]
    fn test_incr_keeps_ttl_and_restarts_expired() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("t"), b("5"), Duration::from_secs(100));
        assert_eq!(db.incr(b"t"), Ok(6));
        assert!(matches!(db.ttl(b"t"), Ttl::Remaining(_)));

        db.set_with_ttl(b("e"), b("5"), Duration::ZERO);
        assert_eq!(db.incr(b"e"), Ok(1));
        assert_eq!(db.ttl(b"e"), Ttl::Persistent);
    }

    #[test]
    fn test_expire_ttl_persist() {
        let db = Keyspace::new(0);
        assert!(!db.expire(b"missing", Duration::from_secs(10)));
        assert!(!db.persist(b"missing"));

        db.set(b("a"), b("1"));
        assert_eq!(db.ttl(b"a"), Ttl::Persistent);
        assert!(!db.persist(b"a"));

        assert!(db.expire(b"a", Duration::from_secs(100)));
        match db.ttl(b"a") {
            Ttl::Remaining(left) => {
                assert!(left > Duration::from_secs(99) && left <= Duration::from_secs(100))
            }
            other => panic!("expected a timeout, got {:?}", other),
        }

        assert!(db.persist(b"a"));
        assert_eq!(db.ttl(b"a"), Ttl::Persistent);
        assert_eq!(db.get(b"a"), Some(b("1")));
    }

    #[test]
    fn test_expire_zero_removes_key() {
        let db = Keyspace::new(0);
        db.set(b("a"), b("1"));
        assert!(db.expire(b"a", Duration::ZERO));
        assert_eq!(db.get(b"a"), None);
        assert!(!db.expire(b"a", Duration::from_secs(1)));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("k"), b("v"), Duration::MAX);
        assert!(matches!(db.ttl(b"k"), Ttl::Remaining(left) if left <= MAX_TTL));
    }

    #[test]
    fn test_keys_glob() {
        let db = Keyspace::new(0);
        db.set(b("a1"), b("x"));
        db.set(b("a2"), b("x"));
        db.set(b("b1"), b("x"));
        db.set_with_ttl(b("a3"), b("x"), Duration::ZERO);

        let found: HashSet<Bytes> = db.keys(b"a*").into_iter().collect();
        assert_eq!(found, HashSet::from([b("a1"), b("a2")]));
        assert_eq!(db.keys(b"*").len(), 3);
        assert!(db.keys(b"z?").is_empty());
        assert_eq!(db.live_len(), 3);
        assert_eq!(db.len(), 4);
    }

    #[test]
    fn test_flush() {
        let db = Keyspace::new(0);
        db.set(b("a"), b("1"));
        db.set_with_ttl(b("b"), b("2"), Duration::from_secs(10));
        db.flush();
        assert!(db.is_empty());
        assert_eq!(db.expiring_len(), 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let db = Keyspace::new(0);
        db.set_with_ttl(b("key1"), b("v"), Duration::from_millis(10));
        db.set_with_ttl(b("key2"), b("v"), Duration::from_millis(10));
        db.set_with_ttl(b("key3"), b("v"), Duration::from_secs(100));
        db.set(b("key4"), b("v"));

        thread::sleep(Duration::from_millis(40));

        assert_eq!(db.len(), 4);
        assert_eq!(db.cleanup_expired(), 2);
        assert_eq!(db.len(), 2);
        assert_eq!(db.expiring_len(), 1);
        assert!(db.exists(b"key3"));
        assert!(db.exists(b"key4"));
    }

    #[test]
    fn test_snapshot_restore_replaces_state() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("dump-0.qkv");

        let db = Keyspace::new(0);
        db.set(b("keep"), b("1"));
        db.set(b("empty"), Bytes::new());
        db.set_with_ttl(b("timed"), b("2"), Duration::from_secs(100));
        assert_eq!(db.save_snapshot(&path).unwrap(), 3);

        db.flush();
        db.set(b("extra"), b("should vanish"));

        assert_eq!(db.load_snapshot(&path).unwrap(), 3);
        assert_eq!(db.get(b"keep"), Some(b("1")));
        assert_eq!(db.get(b"empty"), Some(Bytes::new()));
        assert_eq!(db.get(b"extra"), None);
        match db.ttl(b"timed") {
            Ttl::Remaining(left) => assert!(left > Duration::from_secs(98)),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_restore_leaves_state_untouched() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db = Keyspace::new(0);
        db.set(b("a"), b("1"));

        assert!(db.load_snapshot(&dir.path().join("missing.qkv")).is_err());
        assert_eq!(db.get(b"a"), Some(b("1")));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let db = Arc::new(Keyspace::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for _ in 0..500 {
                        db.incr(b"ctr").unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(db.get(b"ctr"), Some(b("4000")));
    }

    #[test]
    fn test_concurrent_msetnx_single_winner() {
        let db = Arc::new(Keyspace::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    db.msetnx(vec![
                        (b("shared"), Bytes::from(i.to_string())),
                        (Bytes::from(format!("own{}", i)), b("x")),
                    ])
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(db.len(), 2);
    }
}
