use std::sync::Arc;

use crate::{
    common::Database,
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator},
    storage::{BufferPool, Cell, Field, Schema, Tuple, Type},
    transaction::Transaction,
    types::MiniResult,
    utils::HandyRwLock,
};

/// Inserts every child tuple into a table. The first fetch drains the
/// child and emits a single tuple holding the number of rows inserted;
/// after that the stream is empty.
pub struct Insert {
    db: Arc<Database>,
    tx: Transaction,
    child: Box<dyn OpIterator>,
    table_id: u32,
    schema: Arc<Schema>,
    done: bool,
    opened: bool,
    next_tuple: Option<Tuple>,
}

impl Insert {
    pub fn new(
        db: &Arc<Database>,
        tx: &Transaction,
        child: Box<dyn OpIterator>,
        table_id: u32,
    ) -> Result<Self, MiniError> {
        let table_schema = db.catalog().get_table(&table_id)?.rl().get_schema();
        if child.get_schema().as_ref() != table_schema.as_ref() {
            return Err(MiniError::SchemaMismatch(format!(
                "child schema does not match table {}",
                table_id
            )));
        }

        Ok(Self {
            db: Arc::clone(db),
            tx: tx.clone(),
            child,
            table_id,
            schema: Arc::new(Schema::new(vec![Field::new(
                "insert_nums",
                Type::Int,
                false,
            )])),
            done: false,
            opened: false,
            next_tuple: None,
        })
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, MiniError> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            BufferPool::insert_tuple(&self.db, &self.tx, self.table_id, &mut tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(
            Arc::clone(&self.schema),
            vec![Cell::Int(count)],
        )))
    }
}

impl OpIterator for Insert {
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
