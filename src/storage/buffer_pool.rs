use std::sync::{Arc, RwLock};

use log::debug;
use lru::LruCache;

use crate::{
    common::Database,
    error::MiniError,
    storage::{heap_page::HeapPage, page_id::HeapPageID, tuple::Tuple},
    transaction::{ConcurrentStatus, Permission, Transaction},
    types::{MiniResult, Pod, ResultPod},
    utils::HandyRwLock,
};

pub const PAGE_SIZE: usize = 4096;

/// Default number of pages the pool may cache.
pub const DEFAULT_PAGES: usize = 50;

/// Bounded LRU cache of heap pages, and the chokepoint every page
/// access goes through.
///
/// The cache runs NO-STEAL / FORCE: a dirty page is never evicted
/// before its transaction commits, and commit flushes all of the
/// transaction's dirty pages. Capacity is enforced by `evict_page`
/// rather than by the LRU structure itself, so eviction can skip dirty
/// entries.
pub struct BufferPool {
    buffer: LruCache<HeapPageID, Pod<HeapPage>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: LruCache::unbounded(),
            capacity,
        }
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Retrieve a page with the given permission on behalf of `tx`.
    ///
    /// The page lock is acquired before the pool's own mutex is taken:
    /// a transaction blocked on a page lock must not hold up unrelated
    /// cache traffic. Lock waits are bounded; a timeout aborts the
    /// requesting transaction.
    pub fn get_page(
        db: &Database,
        tx: &Transaction,
        perm: Permission,
        pid: &HeapPageID,
    ) -> ResultPod<HeapPage> {
        ConcurrentStatus::acquire_lock(db, tx, &perm.to_lock(), pid)?;

        let mut pool = db.mut_buffer_pool();
        if let Some(page_rc) = pool.buffer.get(pid) {
            // cache hit, promoted to most-recently-used
            return Ok(Arc::clone(page_rc));
        }

        let page_rc = Self::load_page(db, pid)?;
        pool.put_page(*pid, Arc::clone(&page_rc))?;
        Ok(page_rc)
    }

    fn load_page(db: &Database, pid: &HeapPageID) -> ResultPod<HeapPage> {
        let table_rc = db.catalog().get_table(&pid.table_id)?;
        let page = table_rc.rl().read_page(pid)?;
        Ok(Arc::new(RwLock::new(page)))
    }

    /// Put a page into the cache, evicting if it is full. The page is
    /// promoted to most-recently-used.
    pub(crate) fn put_page(&mut self, pid: HeapPageID, page_rc: Pod<HeapPage>) -> MiniResult {
        if !self.buffer.contains(&pid) && self.buffer.len() >= self.capacity {
            self.evict_page()?;
        }
        self.buffer.put(pid, page_rc);
        Ok(())
    }

    /// Evict the least-recently-used clean page. Fails when every
    /// cached page is dirty (NO-STEAL: correctness over liveness).
    fn evict_page(&mut self) -> MiniResult {
        let victim = self
            .buffer
            .iter()
            .rev()
            .find(|(_, page_rc)| page_rc.rl().is_dirty().is_none())
            .map(|(pid, _)| *pid);

        match victim {
            Some(pid) => {
                debug!("evicting {}", pid);
                self.buffer.pop(&pid);
                Ok(())
            }
            None => Err(MiniError::CacheFull),
        }
    }

    /// Drop a page from the cache without writing it, regardless of its
    /// dirty state. Used when rolling back.
    pub fn discard_page(&mut self, pid: &HeapPageID) {
        self.buffer.pop(pid);
    }

    /// Insert a tuple into the table on behalf of `tx`, marking every
    /// page the operation touched dirty and re-caching it so future
    /// readers see the modification.
    pub fn insert_tuple(
        db: &Database,
        tx: &Transaction,
        table_id: u32,
        tuple: &mut Tuple,
    ) -> MiniResult {
        let table_rc = db.catalog().get_table(&table_id)?;
        let dirtied = table_rc.rl().insert_tuple(db, tx, tuple)?;

        let mut pool = db.mut_buffer_pool();
        for page_rc in dirtied {
            page_rc.wl().mark_dirty(Some(tx.get_id()));
            let pid = page_rc.rl().get_pid();
            pool.put_page(pid, page_rc)?;
        }
        Ok(())
    }

    /// Delete a tuple on behalf of `tx`. The table is resolved from the
    /// tuple's record id.
    pub fn delete_tuple(db: &Database, tx: &Transaction, tuple: &Tuple) -> MiniResult {
        let record_id = tuple
            .get_record_id()
            .ok_or_else(|| MiniError::NotOnPage("tuple has no record id".to_string()))?;

        let table_rc = db.catalog().get_table(&record_id.page_id.table_id)?;
        let page_rc = table_rc.rl().delete_tuple(db, tx, tuple)?;

        page_rc.wl().mark_dirty(Some(tx.get_id()));
        let pid = page_rc.rl().get_pid();
        db.mut_buffer_pool().put_page(pid, page_rc)?;
        Ok(())
    }

    /// Commit or abort `tx`.
    ///
    /// Commit: every page the transaction dirtied is logged (before-
    /// and after-image), forced to disk, and gets a fresh before-image.
    /// Abort: every such page is discarded and re-read from disk.
    /// Either way all of the transaction's locks are released at the
    /// end.
    pub fn transaction_complete(db: &Database, tx: &Transaction, commit: bool) -> MiniResult {
        let dirtied: Vec<(HeapPageID, Pod<HeapPage>)> = {
            let pool = db.buffer_pool();
            pool.buffer
                .iter()
                .filter(|(_, page_rc)| page_rc.rl().is_dirty() == Some(tx.get_id()))
                .map(|(pid, page_rc)| (*pid, Arc::clone(page_rc)))
                .collect()
        };

        if commit {
            for (pid, page_rc) in &dirtied {
                // log first, then force the page (NO-STEAL / FORCE)
                {
                    let page = page_rc.rl();
                    db.mut_log_manager().log_update(
                        tx,
                        pid,
                        &page.get_before_image_data(),
                        &page.get_page_data(),
                    )?;
                }
                let table_rc = db.catalog().get_table(&pid.table_id)?;
                let mut page = page_rc.wl();
                table_rc.rl().write_page(&mut page)?;
                page.set_before_image();
            }
            db.mut_log_manager().log_commit(tx)?;
            debug!("{} committed, {} pages flushed", tx, dirtied.len());
        } else {
            for (pid, _) in &dirtied {
                let table_rc = db.catalog().get_table(&pid.table_id)?;
                let page = table_rc.rl().read_page(pid)?;

                let mut pool = db.mut_buffer_pool();
                pool.discard_page(pid);
                pool.put_page(*pid, Arc::new(RwLock::new(page)))?;
            }
            db.mut_log_manager().log_abort(tx)?;
            debug!("{} aborted, {} pages reverted", tx, dirtied.len());
        }

        db.mut_concurrent_status().release_all(tx);
        Ok(())
    }

    /// Force every dirty page to disk, regardless of owner. Breaks
    /// NO-STEAL when used mid-transaction; meant for shutdown and
    /// tests.
    pub fn flush_all_pages(db: &Database) -> MiniResult {
        let dirtied: Vec<(HeapPageID, Pod<HeapPage>)> = {
            let pool = db.buffer_pool();
            pool.buffer
                .iter()
                .filter(|(_, page_rc)| page_rc.rl().is_dirty().is_some())
                .map(|(pid, page_rc)| (*pid, Arc::clone(page_rc)))
                .collect()
        };

        for (pid, page_rc) in dirtied {
            let table_rc = db.catalog().get_table(&pid.table_id)?;
            let mut page = page_rc.wl();
            table_rc.rl().write_page(&mut page)?;
            page.set_before_image();
        }
        Ok(())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Schema;

    fn new_page(pid: HeapPageID) -> Pod<HeapPage> {
        let schema = Arc::new(Schema::small_int_schema(2, ""));
        Arc::new(RwLock::new(HeapPage::new(
            &pid,
            &HeapPage::empty_page_data(),
            &schema,
        )))
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut pool = BufferPool::with_capacity(2);
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);
        let p2 = HeapPageID::new(1, 2);

        pool.put_page(p0, new_page(p0)).unwrap();
        pool.put_page(p1, new_page(p1)).unwrap();
        pool.put_page(p2, new_page(p2)).unwrap();

        // p0 was least recently used
        assert_eq!(pool.size(), 2);
        assert!(!pool.buffer.contains(&p0));
        assert!(pool.buffer.contains(&p1));
        assert!(pool.buffer.contains(&p2));
    }

    #[test]
    fn test_access_promotes() {
        let mut pool = BufferPool::with_capacity(2);
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);
        let p2 = HeapPageID::new(1, 2);

        pool.put_page(p0, new_page(p0)).unwrap();
        pool.put_page(p1, new_page(p1)).unwrap();
        // touch p0 so p1 becomes the eviction candidate
        pool.buffer.get(&p0);
        pool.put_page(p2, new_page(p2)).unwrap();

        assert!(pool.buffer.contains(&p0));
        assert!(!pool.buffer.contains(&p1));
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut pool = BufferPool::with_capacity(2);
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);

        pool.put_page(p0, new_page(p0)).unwrap();
        pool.put_page(p1, new_page(p1)).unwrap();
        // refreshing a cached entry in a full cache must not evict
        pool.put_page(p0, new_page(p0)).unwrap();

        assert_eq!(pool.size(), 2);
        assert!(pool.buffer.contains(&p0));
        assert!(pool.buffer.contains(&p1));
    }

    #[test]
    fn test_eviction_skips_dirty_pages() {
        let mut pool = BufferPool::with_capacity(2);
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);
        let p2 = HeapPageID::new(1, 2);

        let dirty = new_page(p0);
        dirty.wl().mark_dirty(Some(42));
        pool.put_page(p0, dirty).unwrap();
        pool.put_page(p1, new_page(p1)).unwrap();
        pool.put_page(p2, new_page(p2)).unwrap();

        // p0 is older but dirty, so p1 had to go
        assert!(pool.buffer.contains(&p0));
        assert!(!pool.buffer.contains(&p1));
        assert!(pool.buffer.contains(&p2));
    }

    #[test]
    fn test_cache_full_of_dirty_pages() {
        let mut pool = BufferPool::with_capacity(2);
        for i in 0..2 {
            let pid = HeapPageID::new(1, i);
            let page_rc = new_page(pid);
            page_rc.wl().mark_dirty(Some(7));
            pool.put_page(pid, page_rc).unwrap();
        }

        let pid = HeapPageID::new(1, 9);
        assert!(matches!(
            pool.put_page(pid, new_page(pid)),
            Err(MiniError::CacheFull)
        ));
    }
}
