use std::sync::Arc;

use crate::{
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator, Predicate},
    storage::{Schema, Tuple},
    types::MiniResult,
};

/// Emits the child tuples the predicate accepts.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    opened: bool,
    next_tuple: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            opened: false,
            next_tuple: None,
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, MiniError> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> MiniResult {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
        self.next_tuple = None;
    }

    fn rewind(&mut self) -> MiniResult {
        if !self.opened {
            return Err(not_open_error());
        }
        self.child.rewind()?;
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
        self.child.get_schema()
    }
}
