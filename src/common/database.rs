use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    common::Catalog,
    error::MiniError,
    optimizer::{TableStats, IO_COST_PER_PAGE},
    storage::BufferPool,
    transaction::{ConcurrentStatus, LogManager},
    types::Pod,
    utils::HandyRwLock,
};

/// The database context: one value owning every shared subsystem.
///
/// There is deliberately no global instance. The context is threaded
/// through operators and iterators as `Arc<Database>`, and tests build
/// a fresh one per case so nothing leaks between them.
pub struct Database {
    dir: PathBuf,

    buffer_pool: Pod<BufferPool>,
    catalog: Pod<Catalog>,
    concurrent_status: Pod<ConcurrentStatus>,
    log_manager: Pod<LogManager>,

    table_stats: Pod<HashMap<u32, Arc<TableStats>>>,
}

impl Database {
    /// Open a database rooted at `dir`, creating the directory and the
    /// write-ahead log when missing.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).expect("failed to create database directory");

        let log_path = dir.join("wal.log");
        let log_manager = LogManager::new(&log_path).expect("failed to open write-ahead log");

        Self {
            dir,
            buffer_pool: Arc::new(RwLock::new(BufferPool::new())),
            catalog: Arc::new(RwLock::new(Catalog::new())),
            concurrent_status: Arc::new(RwLock::new(ConcurrentStatus::new())),
            log_manager: Arc::new(RwLock::new(log_manager)),
            table_stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get_dir(&self) -> &Path {
        &self.dir
    }

    pub fn buffer_pool(&self) -> RwLockReadGuard<'_, BufferPool> {
        self.buffer_pool.rl()
    }

    pub fn mut_buffer_pool(&self) -> RwLockWriteGuard<'_, BufferPool> {
        self.buffer_pool.wl()
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.rl()
    }

    pub fn mut_catalog(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.wl()
    }

    pub fn concurrent_status(&self) -> RwLockReadGuard<'_, ConcurrentStatus> {
        self.concurrent_status.rl()
    }

    pub fn mut_concurrent_status(&self) -> RwLockWriteGuard<'_, ConcurrentStatus> {
        self.concurrent_status.wl()
    }

    pub fn log_manager(&self) -> RwLockReadGuard<'_, LogManager> {
        self.log_manager.rl()
    }

    pub fn mut_log_manager(&self) -> RwLockWriteGuard<'_, LogManager> {
        self.log_manager.wl()
    }

    /// Statistics for the table, computed on first use and cached in
    /// the context.
    pub fn table_stats(db: &Arc<Database>, table_id: u32) -> Result<Arc<TableStats>, MiniError> {
        if let Some(stats) = db.table_stats.rl().get(&table_id) {
            return Ok(Arc::clone(stats));
        }

        let stats = Arc::new(TableStats::new(db, table_id, IO_COST_PER_PAGE)?);
        db.table_stats.wl().insert(table_id, Arc::clone(&stats));
        Ok(stats)
    }
}
