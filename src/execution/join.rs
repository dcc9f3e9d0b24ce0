use std::sync::Arc;

use crate::{
    error::MiniError,
    execution::{exhausted_error, not_open_error, JoinPredicate, OpIterator},
    storage::{Schema, Tuple},
    types::MiniResult,
};

/// Nested-loop join. For every left tuple the right child is replayed
/// in full; matches are emitted as the concatenation of both sides.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator>,
    right: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    current_left: Option<Tuple>,
    opened: bool,
    next_tuple: Option<Tuple>,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn OpIterator>,
        right: Box<dyn OpIterator>,
    ) -> Self {
        let schema = Arc::new(Schema::merge(left.get_schema(), right.get_schema()));
        Self {
            predicate,
            left,
            right,
            schema,
            current_left: None,
            opened: false,
            next_tuple: None,
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, MiniError> {
        loop {
            if self.current_left.is_none() {
                if !self.left.has_next()? {
                    return Ok(None);
                }
                self.current_left = Some(self.left.next()?);
            }

            // replay the right side against the current left tuple
            while self.right.has_next()? {
                let right_tuple = self.right.next()?;
                if let Some(left_tuple) = &self.current_left {
                    if self.predicate.filter(left_tuple, &right_tuple) {
                        return Ok(Some(Tuple::merge(left_tuple, &right_tuple, &self.schema)));
                    }
                }
            }

            self.right.rewind()?;
            self.current_left = None;
        }
    }
}

impl OpIterator for Join {
    fn open(&mut self) -> MiniResult {
        self.left.open()?;
        self.right.open()?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.opened = false;
        self.current_left = None;
        self.next_tuple = None;
    }

    fn rewind(&mut self) -> MiniResult {
        if !self.opened {
            return Err(not_open_error());
        }
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        self.next_tuple = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, MiniError> {
        if !self.opened {
            return Err(not_open_error());
        }
        if self.next_tuple.is_none() {
            self.next_tuple = self.fetch_next()?;
        }
        Ok(self.next_tuple.is_some())
    }

    fn next(&mut self) -> Result<Tuple, MiniError> {
        self.has_next()?;
        self.next_tuple.take().ok_or_else(exhausted_error)
    }

    fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
