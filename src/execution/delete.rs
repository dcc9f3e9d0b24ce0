use std::sync::Arc;

use crate::{
    common::Database,
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator},
    storage::{BufferPool, Cell, Field, Schema, Tuple, Type},
    transaction::Transaction,
    types::MiniResult,
};

/// Deletes every child tuple from its table. The target table is
/// resolved from each tuple's record id, so the child must produce
/// scanned tuples. Emits a single count tuple, like `Insert`.
pub struct Delete {
    db: Arc<Database>,
    tx: Transaction,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    done: bool,
    opened: bool,
    next_tuple: Option<Tuple>,
}

impl Delete {
    pub fn new(db: &Arc<Database>, tx: &Transaction, child: Box<dyn OpIterator>) -> Self {
        Self {
            db: Arc::clone(db),
            tx: tx.clone(),
            child,
            schema: Arc::new(Schema::new(vec![Field::new(
                "delete_nums",
                Type::Int,
                false,
            )])),
            done: false,
            opened: false,
            next_tuple: None,
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, MiniError> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            BufferPool::delete_tuple(&self.db, &self.tx, &tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(
            Arc::clone(&self.schema),
            vec![Cell::Int(count)],
        )))
    }
}

impl OpIterator for Delete {
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
        &self.schema
    }
}
