//! Store fixtures backed by temporary directories.

use std::time::{Duration, Instant};

use weft_db::{Db, DbConfig};

/// A store in a tempdir, cleaned up on drop.
pub struct TempStore {
    pub db: Db,
    // Held for its Drop.
    _dir: tempfile::TempDir,
}

impl TempStore {
    /// Open a fresh store with default config.
    pub fn new() -> Self {
        Self::with_config(DbConfig::default())
    }

    /// Open a fresh store with the given config.
    pub fn with_config(config: DbConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Db::open(dir.path(), config, None).expect("open store");
        Self { db, _dir: dir }
    }

    /// Block until the store reaches steady state, panicking after `timeout`.
    pub fn wait_settled(&self, timeout: Duration) {
        let start = Instant::now();
        while self.db.has_pending() {
            assert!(
                start.elapsed() < timeout,
                "store did not settle within {timeout:?}"
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}
