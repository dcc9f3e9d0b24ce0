use thiserror::Error;

/// Error taxonomy of the engine.
///
/// `PageFull` is the only variant that is routinely handled instead of
/// propagated: the heap file catches it and moves on to the next page.
#[derive(Error, Debug)]
pub enum MiniError {
    /// A lock request exceeded its deadline. The caller must abort the
    /// transaction via `transaction_complete`.
    #[error("transaction aborted: lock acquisition timed out")]
    TransactionAborted,

    #[error("{0}")]
    Internal(String),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// All slots of the page are in use.
    #[error("no empty slot on page {0}")]
    PageFull(String),

    #[error("tuple is not on the page: {0}")]
    NotOnPage(String),

    #[error("page {0} is out of range")]
    PageOutOfRange(String),

    /// Every cached page is dirty, so nothing can be evicted without
    /// violating the NO-STEAL policy.
    #[error("buffer pool is full of dirty pages")]
    CacheFull,

    #[error("unsupported aggregate: {0}")]
    InvalidAggregate(String),
}
