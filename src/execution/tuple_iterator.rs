use std::sync::Arc;

use crate::{
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator},
    storage::{Schema, Tuple},
    types::MiniResult,
};

/// An operator over an in-memory list of tuples. Used as a leaf for
/// pre-materialized inputs, mostly in tests and as the feed of `Insert`.
pub struct TupleIterator {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl TupleIterator {
    pub fn new(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
            opened: false,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> MiniResult {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn rewind(&mut self) -> MiniResult {
        if !self.opened {
            return Err(not_open_error());
        }
        self.cursor = 0;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, MiniError> {
        if !self.opened {
            return Err(not_open_error());
        }
        Ok(self.cursor < self.tuples.len())
    }

    fn next(&mut self) -> Result<Tuple, MiniError> {
        if !self.has_next()? {
            return Err(exhausted_error());
        }
        let tuple = self.tuples[self.cursor].clone();
        self.cursor += 1;
        Ok(tuple)
    }

    fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
