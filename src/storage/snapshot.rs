//! On-disk snapshot of one keyspace.
//!
//! A snapshot is a bincode image of the value map and the expiry map.
//! Expiry instants are monotonic and meaningless across processes, so they
//! are written as absolute Unix-epoch milliseconds and converted back to
//! `Instant`s on load. Entries whose deadline has passed by load time are
//! dropped.
//!
//! Files are written to `<file name>.tmp` and renamed into place, so a crash
//! mid-write never leaves a truncated snapshot behind.

use crate::storage::error::PersistError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Bumped whenever the on-disk layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedKeyspace {
    version: u32,
    values: Vec<(Vec<u8>, Vec<u8>)>,
    /// Key → deadline in milliseconds since the Unix epoch.
    expires: Vec<(Vec<u8>, u64)>,
}

/// The in-memory form of a loaded snapshot.
#[derive(Debug, Default)]
pub struct SnapshotImage {
    pub values: HashMap<Bytes, Bytes>,
    pub expires: HashMap<Bytes, Instant>,
}

fn instant_to_unix_ms(at: Instant, now: Instant, wall_now: SystemTime) -> u64 {
    let remaining = at.saturating_duration_since(now);
    (wall_now + remaining)
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns `None` if the deadline is already in the past.
fn unix_ms_to_instant(ms: u64, now: Instant, wall_now: SystemTime) -> Option<Instant> {
    let target = SystemTime::UNIX_EPOCH + Duration::from_millis(ms);
    let remaining = target.duration_since(wall_now).ok()?;
    if remaining.is_zero() {
        return None;
    }
    now.checked_add(remaining)
}

/// Writes the live contents of a keyspace to `path`.
///
/// Keys whose expiry is at or before `now` are skipped. Returns the number
/// of keys written.
pub fn write_snapshot(
    path: &Path,
    values: &HashMap<Bytes, Bytes>,
    expires: &HashMap<Bytes, Instant>,
    now: Instant,
) -> Result<usize, PersistError> {
    let wall_now = SystemTime::now();

    let mut persisted = PersistedKeyspace {
        version: SNAPSHOT_VERSION,
        values: Vec::with_capacity(values.len()),
        expires: Vec::with_capacity(expires.len()),
    };

    for (key, value) in values {
        match expires.get(key) {
            Some(&at) if at <= now => continue,
            Some(&at) => persisted
                .expires
                .push((key.to_vec(), instant_to_unix_ms(at, now, wall_now))),
            None => {}
        }
        persisted.values.push((key.to_vec(), value.to_vec()));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let mut writer = BufWriter::new(File::create(&tmp)?);
    bincode::serialize_into(&mut writer, &persisted)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    Ok(persisted.values.len())
}

/// `<file name>.tmp` beside `path`, unique per target file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads a snapshot from `path`.
pub fn read_snapshot(path: &Path, now: Instant) -> Result<SnapshotImage, PersistError> {
    let reader = BufReader::new(File::open(path)?);
    let persisted: PersistedKeyspace = bincode::deserialize_from(reader)?;

    if persisted.version != SNAPSHOT_VERSION {
        return Err(PersistError::Version {
            found: persisted.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let wall_now = SystemTime::now();
    let mut image = SnapshotImage::default();
    let mut expired = HashSet::new();

    for (key, ms) in persisted.expires {
        let key = Bytes::from(key);
        match unix_ms_to_instant(ms, now, wall_now) {
            Some(at) => {
                image.expires.insert(key, at);
            }
            None => {
                expired.insert(key);
            }
        }
    }

    for (key, value) in persisted.values {
        let key = Bytes::from(key);
        if expired.contains(&key) {
            continue;
        }
        image.values.insert(key, Bytes::from(value));
    }

    // An expiry with no value would break the "every expiring key has a
    // value" invariant.
    image.expires.retain(|key, _| image.values.contains_key(key));

    Ok(image)
}
