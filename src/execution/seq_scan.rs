use std::sync::Arc;

use crate::{
    common::Database,
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator},
    storage::{Field, HeapFileIterator, Schema, Tuple},
    transaction::Transaction,
    types::MiniResult,
    utils::HandyRwLock,
};

/// Full scan of one table through the buffer pool, under read-only
/// permission.
pub struct SeqScan {
    schema: Arc<Schema>,
    iter: HeapFileIterator,
    opened: bool,
    next_tuple: Option<Tuple>,
}

impl SeqScan {
    /// `table_alias` prefixes the output field names (`alias.field`);
    /// an empty alias leaves them untouched.
    pub fn new(
        db: &Arc<Database>,
        tx: &Transaction,
        table_id: u32,
        table_alias: &str,
    ) -> Result<Self, MiniError> {
        let table_rc = db.catalog().get_table(&table_id)?;
        let table_schema = table_rc.rl().get_schema();

        let fields = table_schema
            .get_fields()
            .iter()
            .map(|f| {
                let name = if table_alias.is_empty() {
                    f.name.clone()
                } else {
                    format!("{}.{}", table_alias, f.name)
                };
                Field::new(&name, f.field_type, f.is_primary)
            })
            .collect();

        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            iter: HeapFileIterator::new(Arc::clone(db), tx.clone(), table_id),
            opened: false,
            next_tuple: None,
        })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> MiniResult {
        self.iter.open()?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.iter.close();
        self.opened = false;
        self.next_tuple = None;
    }

    fn rewind(&mut self) -> MiniResult {
        if !self.opened {
            return Err(not_open_error());
        }
        self.iter.rewind()?;
        self.next_tuple = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, MiniError> {
        if !self.opened {
            return Err(not_open_error());
        }
        if self.next_tuple.is_none() {
            self.next_tuple = self.iter.next()?;
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
