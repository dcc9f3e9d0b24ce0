use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{common::Database, storage::BufferPool, types::MiniResult};

pub type TransactionID = u32;

static NEXT_TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

/// A unit of work under strict two-phase locking.
///
/// A transaction is driven by a single thread. Its locks are held until
/// `commit` or `abort`, both of which funnel into
/// `BufferPool::transaction_complete`.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Transaction {
    // increases monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        Self { id }
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }

    /// Flush this transaction's dirty pages (logging each one first),
    /// then release all of its locks.
    pub fn commit(&self, db: &Database) -> MiniResult {
        BufferPool::transaction_complete(db, self, true)
    }

    /// Revert this transaction's dirty pages to their on-disk content,
    /// then release all of its locks.
    pub fn abort(&self, db: &Database) -> MiniResult {
        BufferPool::transaction_complete(db, self, false)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
