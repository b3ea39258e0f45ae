//! The database registry.
//!
//! Holds the sixteen keyspaces and the server-wide selected index. The
//! selected keyspace is the only one with a running expiry sweeper; other
//! keyspaces rely on lazy expiry until they are selected again.

use crate::storage::error::PersistError;
use crate::storage::expiry::{ExpiryConfig, ExpirySweeper};
use crate::storage::keyspace::Keyspace;
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of logical databases.
pub const DATABASE_COUNT: usize = 16;

/// Settings for the registry.
#[derive(Debug, Clone)]
pub struct DatabasesConfig {
    /// Directory SAVE and LOAD resolve file names against
    pub data_dir: PathBuf,
    pub expiry: ExpiryConfig,
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            expiry: ExpiryConfig::default(),
        }
    }
}

#[derive(Debug)]
struct Selection {
    index: usize,
    sweeper: Option<ExpirySweeper>,
    /// Set once `start_sweeper` has been called and until `shutdown`.
    sweeping: bool,
}

/// Sixteen keyspaces plus the selected index.
///
/// # Example
///
/// ```
/// use quillkv::storage::{Databases, DatabasesConfig};
/// use bytes::Bytes;
///
/// let dbs = Databases::new(DatabasesConfig::default());
/// dbs.selected().set(Bytes::from("k"), Bytes::from("zero"));
///
/// dbs.select(1);
/// assert_eq!(dbs.selected_index(), 1);
/// assert_eq!(dbs.selected().get(b"k"), None);
///
/// dbs.select(0);
/// assert_eq!(dbs.selected().get(b"k"), Some(Bytes::from("zero")));
/// ```
#[derive(Debug)]
pub struct Databases {
    keyspaces: Vec<Arc<Keyspace>>,
    selection: Mutex<Selection>,
    config: DatabasesConfig,
}

impl Databases {
    /// Creates sixteen empty keyspaces with database 0 selected and no
    /// sweeper running.
    pub fn new(config: DatabasesConfig) -> Self {
        let keyspaces = (0..DATABASE_COUNT)
            .map(|id| Arc::new(Keyspace::new(id)))
            .collect();

        Self {
            keyspaces,
            selection: Mutex::new(Selection {
                index: 0,
                sweeper: None,
                sweeping: false,
            }),
            config,
        }
    }

    /// Starts the sweeper for the selected keyspace and keeps one running
    /// across later selections.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_sweeper(&self) {
        let mut selection = self.selection.lock();
        selection.sweeping = true;
        if selection.sweeper.is_none() {
            let keyspace = Arc::clone(&self.keyspaces[selection.index]);
            selection.sweeper = Some(ExpirySweeper::start(keyspace, self.config.expiry.clone()));
        }
    }

    /// Makes `index` the selected database for every client.
    ///
    /// # Panics
    ///
    /// Panics if `index >= DATABASE_COUNT`. Callers validate user input.
    pub fn select(&self, index: usize) {
        assert!(
            index < DATABASE_COUNT,
            "database index {} out of range",
            index
        );

        let mut selection = self.selection.lock();
        if selection.index == index {
            return;
        }

        if let Some(old) = selection.sweeper.take() {
            old.stop();
        }

        selection.index = index;
        if selection.sweeping {
            let keyspace = Arc::clone(&self.keyspaces[index]);
            selection.sweeper = Some(ExpirySweeper::start(keyspace, self.config.expiry.clone()));
        }

        debug!(db = index, "Selected database");
    }

    /// The currently selected keyspace.
    pub fn selected(&self) -> Arc<Keyspace> {
        self.selected_with_index().1
    }

    pub fn selected_index(&self) -> usize {
        self.selection.lock().index
    }

    /// The selected index and its keyspace, read under one lock.
    pub fn selected_with_index(&self) -> (usize, Arc<Keyspace>) {
        let selection = self.selection.lock();
        (selection.index, Arc::clone(&self.keyspaces[selection.index]))
    }

    /// The keyspace for `index`, if it exists.
    pub fn keyspace(&self, index: usize) -> Option<Arc<Keyspace>> {
        self.keyspaces.get(index).cloned()
    }

    pub fn flush_selected(&self) {
        self.selected().flush();
    }

    pub fn flush_all(&self) {
        for keyspace in &self.keyspaces {
            keyspace.flush();
        }
    }

    /// Resolves a snapshot file for database `index`.
    ///
    /// A user-supplied name must be a single plain file name and is placed
    /// in the data directory; without one the default `dump-<index>.qkv` is
    /// used.
    pub fn snapshot_path(&self, index: usize, file: Option<&[u8]>) -> Result<PathBuf, PersistError> {
        let Some(name) = file else {
            return Ok(self.config.data_dir.join(default_snapshot_name(index)));
        };

        let name = String::from_utf8_lossy(name);
        let mut components = Path::new(&*name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file_name)), None) => Ok(self.config.data_dir.join(file_name)),
            _ => Err(PersistError::InvalidFileName),
        }
    }

    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(&self) {
        let sweeper = {
            let mut selection = self.selection.lock();
            selection.sweeping = false;
            selection.sweeper.take()
        };

        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
        info!("Database registry shut down");
    }
}

/// Default snapshot file name for database `index`.
pub fn default_snapshot_name(index: usize) -> String {
    format!("dump-{}.qkv", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn fast_config() -> DatabasesConfig {
        DatabasesConfig {
            data_dir: PathBuf::from("data"),
            expiry: ExpiryConfig {
                interval: Duration::from_millis(10),
            },
        }
    }

    #[test]
    fn test_new_registry() {
        let dbs = Databases::new(DatabasesConfig::default());
        assert_eq!(dbs.selected_index(), 0);
        for i in 0..DATABASE_COUNT {
            let keyspace = dbs.keyspace(i).unwrap();
            assert_eq!(keyspace.id(), i);
            assert!(keyspace.is_empty());
        }
        assert!(dbs.keyspace(DATABASE_COUNT).is_none());
    }

    #[test]
    fn test_databases_are_isolated() {
        let dbs = Databases::new(DatabasesConfig::default());
        dbs.selected().set(Bytes::from("k"), Bytes::from("zero"));

        dbs.select(5);
        assert_eq!(dbs.selected().get(b"k"), None);
        dbs.selected().set(Bytes::from("k"), Bytes::from("five"));

        dbs.select(0);
        assert_eq!(dbs.selected().get(b"k"), Some(Bytes::from("zero")));
        assert_eq!(
            dbs.keyspace(5).unwrap().get(b"k"),
            Some(Bytes::from("five"))
        );
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_select_out_of_range_panics() {
        let dbs = Databases::new(DatabasesConfig::default());
        dbs.select(DATABASE_COUNT);
    }

    #[test]
    fn test_flush_selected_and_all() {
        let dbs = Databases::new(DatabasesConfig::default());
        dbs.keyspace(0).unwrap().set(Bytes::from("a"), Bytes::from("1"));
        dbs.keyspace(1).unwrap().set(Bytes::from("b"), Bytes::from("2"));
        dbs.keyspace(2).unwrap().set(Bytes::from("c"), Bytes::from("3"));

        dbs.select(1);
        dbs.flush_selected();
        assert!(dbs.keyspace(1).unwrap().is_empty());
        assert_eq!(dbs.keyspace(0).unwrap().len(), 1);

        dbs.flush_all();
        assert!((0..DATABASE_COUNT).all(|i| dbs.keyspace(i).unwrap().is_empty()));
    }

    #[test]
    fn test_snapshot_path() {
        let dbs = Databases::new(fast_config());
        assert_eq!(
            dbs.snapshot_path(3, None).unwrap(),
            PathBuf::from("data").join("dump-3.qkv")
        );
        assert_eq!(
            dbs.snapshot_path(3, Some(b"backup.qkv")).unwrap(),
            PathBuf::from("data").join("backup.qkv")
        );
    }

    #[test]
    fn test_snapshot_path_rejects_names_outside_data_dir() {
        let dbs = Databases::new(fast_config());
        for name in [
            &b"/tmp/elsewhere.qkv"[..],
            b"../escape.qkv",
            b"nested/dump.qkv",
            b"..",
            b".",
            b"",
        ] {
            assert!(
                matches!(dbs.snapshot_path(0, Some(name)), Err(PersistError::InvalidFileName)),
                "accepted {:?}",
                String::from_utf8_lossy(name)
            );
        }
    }

    #[tokio::test]
    async fn test_sweeper_follows_selection() {
        let dbs = Databases::new(fast_config());
        dbs.start_sweeper();

        let db0 = dbs.keyspace(0).unwrap();
        let db1 = dbs.keyspace(1).unwrap();

        dbs.select(1);
        tokio::time::sleep(Duration::from_millis(20)).await;

        db0.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_millis(5));
        db1.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Only the selected database is swept.
        assert_eq!(db1.len(), 0);
        assert_eq!(db0.len(), 1);

        dbs.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeping() {
        let dbs = Databases::new(fast_config());
        dbs.start_sweeper();
        dbs.shutdown().await;

        let db0 = dbs.keyspace(0).unwrap();
        assert!(db0.sweep_gate().try_lock().is_ok());

        // Selecting after shutdown does not restart a sweeper.
        dbs.select(2);
        dbs.keyspace(2)
            .unwrap()
            .set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(dbs.keyspace(2).unwrap().len(), 1);
    }
}
