//! Background Expiry Sweeper
//!
//! Lazy expiry only purges keys that are touched again. A key that expires
//! and is never read would sit in memory forever, so a background task
//! periodically purges every expired key of one keyspace ("active expiry").
//!
//! ## Lifecycle
//!
//! A sweeper is bound to exactly one [`Keyspace`]. It is started when that
//! keyspace becomes the selected database and stopped when another one is
//! selected, when its handle is dropped, or at shutdown.
//!
//! Stopping is cooperative: the task notices the signal on its next wakeup.
//! Each keyspace carries a gate that the task holds for its whole lifetime,
//! so a sweeper started for the same keyspace before the previous one has
//! exited waits for it instead of running alongside it.

use crate::storage::keyspace::Keyspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Time between sweeps (default: 1s)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to a running expiry sweeper.
///
/// When this handle is dropped, the sweeper task is told to stop.
#[derive(Debug)]
pub struct ExpirySweeper {
    db: usize,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts a sweeper for `keyspace` as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```
    /// use quillkv::storage::{ExpiryConfig, ExpirySweeper, Keyspace};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let keyspace = Arc::new(Keyspace::new(0));
    /// let sweeper = ExpirySweeper::start(keyspace, ExpiryConfig::default());
    ///
    /// // Sweeper runs in the background...
    ///
    /// sweeper.shutdown().await;
    /// # }
    /// ```
    pub fn start(keyspace: Arc<Keyspace>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let db = keyspace.id();

        let handle = tokio::spawn(sweeper_loop(keyspace, config, shutdown_rx));

        debug!(db, "Expiry sweeper started");

        Self {
            db,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// The database index this sweeper is bound to.
    pub fn db(&self) -> usize {
        self.db
    }

    /// Signals the sweeper to stop without waiting for it.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            debug!(db = self.db, "Expiry sweeper stopped");
        }
    }

    /// Signals the sweeper to stop and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    keyspace: Arc<Keyspace>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let db = keyspace.id();

    // Wait out any previous sweeper on this keyspace.
    let _gate = tokio::select! {
        guard = keyspace.sweep_gate().lock() => guard,
        _ = wait_for_stop(&mut shutdown_rx) => return,
    };

    if *shutdown_rx.borrow() {
        return;
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wait_for_stop(&mut shutdown_rx) => {
                trace!(db, "Expiry sweeper received shutdown signal");
                return;
            }
        }

        let expired = keyspace.cleanup_expired();

        if expired > 0 {
            debug!(
                db,
                expired,
                keys_remaining = keyspace.len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!(db, "Sweep found nothing to expire");
        }
    }
}

/// Resolves once a stop has been requested or the handle is gone.
async fn wait_for_stop(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn fast() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let keyspace = Arc::new(Keyspace::new(0));

        for i in 0..10 {
            keyspace.set_with_ttl(
                Bytes::from(format!("key{}", i)),
                Bytes::from("value"),
                Duration::from_millis(30),
            );
        }
        keyspace.set(Bytes::from("persistent"), Bytes::from("value"));
        assert_eq!(keyspace.len(), 11);

        let sweeper = ExpirySweeper::start(Arc::clone(&keyspace), fast());

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Purged without any reads touching the keys.
        assert_eq!(keyspace.len(), 1);
        assert!(keyspace.exists(b"persistent"));

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let keyspace = Arc::new(Keyspace::new(0));

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&keyspace), fast());
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        keyspace.set_with_ttl(
            Bytes::from("key"),
            Bytes::from("value"),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nobody swept it; it is still stored but reads as absent.
        assert_eq!(keyspace.len(), 1);
        assert!(keyspace.get(b"key").is_none());
        assert_eq!(keyspace.len(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_task() {
        let keyspace = Arc::new(Keyspace::new(0));
        let sweeper = ExpirySweeper::start(Arc::clone(&keyspace), fast());
        assert_eq!(sweeper.db(), 0);

        sweeper.shutdown().await;

        // The gate is free once the task has exited.
        assert!(keyspace.sweep_gate().try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_second_sweeper_waits_for_first() {
        let keyspace = Arc::new(Keyspace::new(3));

        let first = ExpirySweeper::start(Arc::clone(&keyspace), fast());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = ExpirySweeper::start(Arc::clone(&keyspace), fast());

        first.shutdown().await;

        keyspace.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(150)).await;

        // The second sweeper took over once the first released the gate.
        assert_eq!(keyspace.len(), 0);
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_before_start_never_sweeps() {
        let keyspace = Arc::new(Keyspace::new(0));
        let holder = keyspace.sweep_gate().lock().await;

        let sweeper = ExpirySweeper::start(Arc::clone(&keyspace), fast());
        sweeper.stop();
        drop(holder);

        keyspace.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(keyspace.len(), 1);

        sweeper.shutdown().await;
    }
}
