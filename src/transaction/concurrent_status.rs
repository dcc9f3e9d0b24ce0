use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    thread::sleep,
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    common::Database,
    error::MiniError,
    storage::HeapPageID,
    transaction::{Transaction, TransactionID},
    types::MiniResult,
};

/// How long a single lock request may wait before the requesting
/// transaction is aborted. Deadlock handling is timeout-only; no
/// wait-for graph is maintained.
pub(crate) const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(500);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Lock {
    SLock,
    XLock,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

/// Page-granularity lock table.
///
/// Per page: any number of shared holders, or a single exclusive
/// holder. A transaction holds at most one mode per page; an upgrade
/// replaces the shared entry and a downgrade replaces the exclusive
/// one.
pub struct ConcurrentStatus {
    s_lock_map: HashMap<HeapPageID, HashSet<TransactionID>>,
    x_lock_map: HashMap<HeapPageID, TransactionID>,

    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            s_lock_map: HashMap::new(),
            x_lock_map: HashMap::new(),
            hold_pages: HashMap::new(),
        }
    }

    /// Request a lock on the given page. Blocking: polls `try_acquire`
    /// until it succeeds or the deadline passes, at which point the
    /// transaction is told to abort.
    ///
    /// The lock table's own mutex is only held for the duration of a
    /// single attempt, never across the sleep.
    pub(crate) fn acquire_lock(
        db: &Database,
        tx: &Transaction,
        lock: &Lock,
        pid: &HeapPageID,
    ) -> MiniResult {
        let start = Instant::now();
        loop {
            {
                let mut concurrent_status = db.mut_concurrent_status();
                if concurrent_status.try_acquire(tx, lock, pid) {
                    return Ok(());
                }
            }

            if start.elapsed() >= ACQUIRE_TIMEOUT {
                debug!(
                    "lock acquisition timed out, tx: {}, lock: {:?}, pid: {}",
                    tx, lock, pid
                );
                return Err(MiniError::TransactionAborted);
            }

            sleep(RETRY_INTERVAL);
        }
    }

    /// One non-blocking grant attempt. Returns whether the lock is held
    /// by `tx` in the requested mode (or stronger) afterwards.
    pub fn try_acquire(&mut self, tx: &Transaction, lock: &Lock, pid: &HeapPageID) -> bool {
        let tx_id = tx.get_id();

        if let Some(holder) = self.x_lock_map.get(pid) {
            if *holder != tx_id {
                // any other exclusive holder blocks both modes
                return false;
            }
            match lock {
                // re-grant is idempotent
                Lock::XLock => return true,
                // downgrade: replace the exclusive entry with a shared one
                Lock::SLock => {
                    self.x_lock_map.remove(pid);
                    self.s_lock_map.entry(*pid).or_default().insert(tx_id);
                    return true;
                }
            }
        }

        match lock {
            Lock::SLock => {
                self.s_lock_map.entry(*pid).or_default().insert(tx_id);
            }
            Lock::XLock => {
                if let Some(holders) = self.s_lock_map.get(pid) {
                    let sole_holder = holders.len() == 1 && holders.contains(&tx_id);
                    if !holders.is_empty() && !sole_holder {
                        return false;
                    }
                }
                // upgrade (sole shared holder) or fresh grant
                if let Some(holders) = self.s_lock_map.get_mut(pid) {
                    holders.remove(&tx_id);
                    if holders.is_empty() {
                        self.s_lock_map.remove(pid);
                    }
                }
                self.x_lock_map.insert(*pid, tx_id);
            }
        }

        self.hold_pages.entry(tx_id).or_default().insert(*pid);
        true
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        self.hold_pages
            .get(&tx.get_id())
            .map_or(false, |pages| pages.contains(pid))
    }

    pub fn release_lock(&mut self, tx: &Transaction, pid: &HeapPageID) {
        let tx_id = tx.get_id();

        if let Some(holders) = self.s_lock_map.get_mut(pid) {
            holders.remove(&tx_id);
            if holders.is_empty() {
                self.s_lock_map.remove(pid);
            }
        }
        if self.x_lock_map.get(pid) == Some(&tx_id) {
            self.x_lock_map.remove(pid);
        }

        if let Some(pages) = self.hold_pages.get_mut(&tx_id) {
            pages.remove(pid);
            if pages.is_empty() {
                self.hold_pages.remove(&tx_id);
            }
        }
    }

    /// Release every lock the transaction holds.
    pub fn release_all(&mut self, tx: &Transaction) {
        if let Some(pages) = self.hold_pages.remove(&tx.get_id()) {
            for pid in pages {
                let tx_id = tx.get_id();
                if let Some(holders) = self.s_lock_map.get_mut(&pid) {
                    holders.remove(&tx_id);
                    if holders.is_empty() {
                        self.s_lock_map.remove(&pid);
                    }
                }
                if self.x_lock_map.get(&pid) == Some(&tx_id) {
                    self.x_lock_map.remove(&pid);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.s_lock_map.clear();
        self.x_lock_map.clear();
        self.hold_pages.clear();
    }
}

impl Default for ConcurrentStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "s_lock_map: {{")?;
        for (pid, holders) in &self.s_lock_map {
            writeln!(f, "\t{} -> {:?}", pid, holders)?;
        }
        writeln!(f, "}}")?;
        writeln!(f, "x_lock_map: {{")?;
        for (pid, holder) in &self.x_lock_map {
            writeln!(f, "\t{} -> tx_{}", pid, holder)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: usize) -> HeapPageID {
        HeapPageID::new(1, i)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let mut cs = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(cs.try_acquire(&t1, &Lock::SLock, &pid(0)));
        assert!(cs.try_acquire(&t2, &Lock::SLock, &pid(0)));
        assert!(cs.holds_lock(&t1, &pid(0)));
        assert!(cs.holds_lock(&t2, &pid(0)));
    }

    #[test]
    fn test_exclusive_blocks_everyone_else() {
        let mut cs = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(cs.try_acquire(&t1, &Lock::XLock, &pid(0)));
        assert!(!cs.try_acquire(&t2, &Lock::SLock, &pid(0)));
        assert!(!cs.try_acquire(&t2, &Lock::XLock, &pid(0)));

        // re-grant to the holder is idempotent
        assert!(cs.try_acquire(&t1, &Lock::XLock, &pid(0)));
    }

    #[test]
    fn test_upgrade_requires_sole_holder() {
        let mut cs = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(cs.try_acquire(&t1, &Lock::SLock, &pid(0)));
        assert!(cs.try_acquire(&t2, &Lock::SLock, &pid(0)));
        // two shared holders, no upgrade
        assert!(!cs.try_acquire(&t1, &Lock::XLock, &pid(0)));

        cs.release_lock(&t2, &pid(0));
        // sole holder now, upgrade succeeds
        assert!(cs.try_acquire(&t1, &Lock::XLock, &pid(0)));
        // shared requests from others are blocked after the upgrade
        assert!(!cs.try_acquire(&t2, &Lock::SLock, &pid(0)));
    }

    #[test]
    fn test_downgrade() {
        let mut cs = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(cs.try_acquire(&t1, &Lock::XLock, &pid(0)));
        assert!(cs.try_acquire(&t1, &Lock::SLock, &pid(0)));
        // after the downgrade, other readers may enter
        assert!(cs.try_acquire(&t2, &Lock::SLock, &pid(0)));
    }

    #[test]
    fn test_release_all() {
        let mut cs = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(cs.try_acquire(&t1, &Lock::XLock, &pid(0)));
        assert!(cs.try_acquire(&t1, &Lock::SLock, &pid(1)));
        cs.release_all(&t1);

        assert!(!cs.holds_lock(&t1, &pid(0)));
        assert!(cs.try_acquire(&t2, &Lock::XLock, &pid(0)));
        assert!(cs.try_acquire(&t2, &Lock::XLock, &pid(1)));
    }
}
