use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    common::Database,
    error::MiniError,
    execution::Op,
    optimizer::{IntHistogram, StringHistogram},
    storage::{Cell, Type},
    transaction::Transaction,
    utils::HandyRwLock,
};

/// Cost charged per page read, in arbitrary units.
pub const IO_COST_PER_PAGE: usize = 1000;

/// Buckets per histogram.
pub const NUM_HIST_BINS: usize = 100;

/// Per-table statistics: one histogram per column, fed by two full
/// scans (the first finds the int ranges, the second fills the
/// buckets). Built under its own read-only transaction, committed on
/// exit.
pub struct TableStats {
    io_cost_per_page: usize,
    num_pages: usize,
    total_tuples: usize,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    pub fn new(
        db: &Arc<Database>,
        table_id: u32,
        io_cost_per_page: usize,
    ) -> Result<Self, MiniError> {
        let tx = Transaction::new();
        let result = Self::build(db, &tx, table_id, io_cost_per_page);
        match result {
            Ok(stats) => {
                tx.commit(db)?;
                Ok(stats)
            }
            Err(e) => {
                tx.abort(db)?;
                Err(e)
            }
        }
    }

    fn build(
        db: &Arc<Database>,
        tx: &Transaction,
        table_id: u32,
        io_cost_per_page: usize,
    ) -> Result<Self, MiniError> {
        let table_rc = db.catalog().get_table(&table_id)?;
        let schema = table_rc.rl().get_schema();
        let num_pages = table_rc.rl().num_pages()?;

        // pass 1: int ranges and string histograms
        let mut mins: HashMap<usize, i32> = HashMap::new();
        let mut maxs: HashMap<usize, i32> = HashMap::new();
        let mut string_histograms: HashMap<usize, StringHistogram> = HashMap::new();
        for (i, field) in schema.get_fields().iter().enumerate() {
            if field.field_type == Type::Str {
                string_histograms.insert(i, StringHistogram::new(NUM_HIST_BINS));
            }
        }

        let mut total_tuples = 0;
        let mut iter = table_rc.rl().iter(db, tx);
        iter.open()?;
        while let Some(tuple) = iter.next()? {
            total_tuples += 1;
            for (i, field) in schema.get_fields().iter().enumerate() {
                match field.field_type {
                    Type::Int => {
                        let v = tuple.get_cell(i).get_int()?;
                        mins.entry(i).and_modify(|m| *m = (*m).min(v)).or_insert(v);
                        maxs.entry(i).and_modify(|m| *m = (*m).max(v)).or_insert(v);
                    }
                    Type::Str => {
                        let s = tuple.get_cell(i).get_string()?;
                        if let Some(hist) = string_histograms.get_mut(&i) {
                            hist.add_value(&s);
                        }
                    }
                }
            }
        }

        // pass 2: fill the int histograms
        let mut int_histograms: HashMap<usize, IntHistogram> = HashMap::new();
        for (i, field) in schema.get_fields().iter().enumerate() {
            if field.field_type == Type::Int {
                let min = mins.get(&i).copied().unwrap_or(0);
                let max = maxs.get(&i).copied().unwrap_or(0);
                int_histograms.insert(i, IntHistogram::new(NUM_HIST_BINS, min, max));
            }
        }

        iter.rewind()?;
        while let Some(tuple) = iter.next()? {
            for (i, field) in schema.get_fields().iter().enumerate() {
                if field.field_type == Type::Int {
                    let v = tuple.get_cell(i).get_int()?;
                    if let Some(hist) = int_histograms.get_mut(&i) {
                        hist.add_value(v);
                    }
                }
            }
        }
        iter.close();

        debug!(
            "collected stats for table {}: {} tuples over {} pages",
            table_id, total_tuples, num_pages
        );

        Ok(Self {
            io_cost_per_page,
            num_pages,
            total_tuples,
            int_histograms,
            string_histograms,
        })
    }

    /// Cost of a full scan. The table is read twice by the stats pass
    /// itself, which is the model this estimate carries over.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page * 2) as f64
    }

    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    /// Mean selectivity of `op` on the field, over the field's own
    /// distribution.
    pub fn avg_selectivity(&self, field: usize, op: &Op) -> f64 {
        if let Some(hist) = self.int_histograms.get(&field) {
            return hist.avg_selectivity(op);
        }
        if let Some(hist) = self.string_histograms.get(&field) {
            return hist.avg_selectivity(op);
        }
        1.0
    }

    /// Estimated fraction of the table satisfying `field op constant`.
    pub fn estimate_selectivity(&self, field: usize, op: &Op, constant: &Cell) -> f64 {
        match constant {
            Cell::Int(v) => self
                .int_histograms
                .get(&field)
                .map_or(1.0, |hist| hist.estimate_selectivity(op, *v)),
            Cell::Str(s) => self
                .string_histograms
                .get(&field)
                .map_or(1.0, |hist| hist.estimate_selectivity(op, s)),
        }
    }
}
