pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod join;
pub mod predicate;
pub mod seq_scan;
pub mod tuple_iterator;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use predicate::{JoinPredicate, Op, Predicate};
pub use seq_scan::SeqScan;
pub use tuple_iterator::TupleIterator;

use std::sync::Arc;

use crate::{error::MiniError, storage::{Schema, Tuple}, types::MiniResult};

/// A pull-based operator in the query execution tree.
///
/// `next` is only defined between `open` and `close`; `has_next` is
/// idempotent between calls to `next`. End of stream is reported by
/// `has_next` returning false; calling `next` past that point fails
/// with `NoSuchElement`.
pub trait OpIterator {
    fn open(&mut self) -> MiniResult;

    fn close(&mut self);

    /// Restart the stream from the beginning. Only valid while open.
    fn rewind(&mut self) -> MiniResult;

    fn has_next(&mut self) -> Result<bool, MiniError>;

    fn next(&mut self) -> Result<Tuple, MiniError>;

    /// Schema of the tuples this operator emits.
    fn get_schema(&self) -> &Arc<Schema>;
}

pub(crate) fn not_open_error() -> MiniError {
    MiniError::Internal("operator is not open".to_string())
}

pub(crate) fn exhausted_error() -> MiniError {
    MiniError::NoSuchElement("iterator is exhausted".to_string())
}
