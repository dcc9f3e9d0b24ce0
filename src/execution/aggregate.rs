use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::MiniError,
    execution::{exhausted_error, not_open_error, OpIterator},
    storage::{Cell, Field, Schema, Tuple, Type},
    types::MiniResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    // declared but not implemented
    SumCount,
    ScAvg,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::SumCount => "sum_count",
            AggregateOp::ScAvg => "sc_avg",
        };
        write!(f, "{}", name)
    }
}

/// Folds tuples into per-group summaries. Implementations own their
/// accumulator map; `results` clones it into plain tuples so the
/// operator's iterator keeps no reference back into the aggregator.
trait Aggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> MiniResult;

    fn results(&self, schema: &Arc<Schema>) -> Vec<Tuple>;
}

/// Running state of one group. All statistics are tracked; the
/// requested one is picked when results are emitted.
struct AggState {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl AggState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    fn merge(&mut self, value: i32) {
        self.count += 1;
        self.sum += value as i64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn result(&self, op: &AggregateOp) -> i32 {
        match op {
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
            AggregateOp::Sum => self.sum as i32,
            // integer division
            AggregateOp::Avg => (self.sum / self.count) as i32,
            AggregateOp::Count => self.count as i32,
            AggregateOp::SumCount | AggregateOp::ScAvg => {
                unreachable!("rejected at construction")
            }
        }
    }
}

/// Aggregator over an int column; supports every implemented op.
struct IntegerAggregator {
    group_field: Option<usize>,
    agg_field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Cell>, AggState>,
}

impl IntegerAggregator {
    fn new(group_field: Option<usize>, agg_field: usize, op: AggregateOp) -> Self {
        Self {
            group_field,
            agg_field,
            op,
            groups: HashMap::new(),
        }
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> MiniResult {
        let value = tuple.get_cell(self.agg_field).get_int()?;
        let key = self.group_field.map(|g| tuple.get_cell(g));
        self.groups.entry(key).or_insert_with(AggState::new).merge(value);
        Ok(())
    }

    fn results(&self, schema: &Arc<Schema>) -> Vec<Tuple> {
        self.groups
            .iter()
            .map(|(key, state)| {
                let agg_cell = Cell::Int(state.result(&self.op));
                let cells = match key {
                    Some(group_cell) => vec![group_cell.clone(), agg_cell],
                    None => vec![agg_cell],
                };
                Tuple::new(Arc::clone(schema), cells)
            })
            .collect()
    }
}

/// Aggregator over a string column; only counting is supported.
struct StringAggregator {
    group_field: Option<usize>,
    groups: HashMap<Option<Cell>, i64>,
}

impl StringAggregator {
    fn new(group_field: Option<usize>) -> Self {
        Self {
            group_field,
            groups: HashMap::new(),
        }
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> MiniResult {
        let key = self.group_field.map(|g| tuple.get_cell(g));
        *self.groups.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn results(&self, schema: &Arc<Schema>) -> Vec<Tuple> {
        self.groups
            .iter()
            .map(|(key, count)| {
                let agg_cell = Cell::Int(*count as i32);
                let cells = match key {
                    Some(group_cell) => vec![group_cell.clone(), agg_cell],
                    None => vec![agg_cell],
                };
                Tuple::new(Arc::clone(schema), cells)
            })
            .collect()
    }
}

/// Grouping aggregate. The whole child is consumed on `open`; the
/// operator then iterates over `(group, aggregate)` tuples, or a single
/// `(aggregate)` tuple stream when no grouping field is given.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    schema: Arc<Schema>,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, MiniError> {
        if matches!(op, AggregateOp::SumCount | AggregateOp::ScAvg) {
            return Err(MiniError::InvalidAggregate(format!(
                "{} is declared but not implemented",
                op
            )));
        }

        let child_schema = child.get_schema();
        let agg_column = child_schema.get_field(agg_field);
        if agg_column.field_type == Type::Str && op != AggregateOp::Count {
            return Err(MiniError::InvalidAggregate(format!(
                "{} over a string column",
                op
            )));
        }

        let agg_output = Field::new(
            &format!("{}({})", op, agg_column.name),
            Type::Int,
            false,
        );
        let fields = match group_field {
            Some(g) => vec![child_schema.get_field(g).clone(), agg_output],
            None => vec![agg_output],
        };

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            schema: Arc::new(Schema::new(fields)),
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> MiniResult {
        self.child.open()?;

        let agg_type = self.child.get_schema().get_field(self.agg_field).field_type;
        let mut aggregator: Box<dyn Aggregator> = match agg_type {
            Type::Int => Box::new(IntegerAggregator::new(
                self.group_field,
                self.agg_field,
                self.op,
            )),
            Type::Str => Box::new(StringAggregator::new(self.group_field)),
        };

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            aggregator.merge_tuple(&tuple)?;
        }

        self.results = aggregator.results(&self.schema);
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results = Vec::new();
        self.cursor = 0;
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
        Ok(self.cursor < self.results.len())
    }

    fn next(&mut self) -> Result<Tuple, MiniError> {
        if !self.has_next()? {
            return Err(exhausted_error());
        }
        let tuple = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(tuple)
    }

    fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TupleIterator;

    fn int_table(rows: &[(i32, i32)]) -> Box<dyn OpIterator> {
        let schema = Arc::new(Schema::small_int_schema(2, ""));
        let tuples = rows
            .iter()
            .map(|(g, v)| {
                Tuple::new(Arc::clone(&schema), vec![Cell::Int(*g), Cell::Int(*v)])
            })
            .collect();
        Box::new(TupleIterator::new(schema, tuples))
    }

    fn drain(op: &mut dyn OpIterator) -> Vec<Tuple> {
        let mut out = Vec::new();
        while op.has_next().unwrap() {
            out.push(op.next().unwrap());
        }
        out
    }

    #[test]
    fn test_count_without_grouping() {
        let child = int_table(&[(1, 10), (1, 20), (2, 30)]);
        let mut agg = Aggregate::new(child, 1, None, AggregateOp::Count).unwrap();
        agg.open().unwrap();

        let results = drain(&mut agg);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_cell(0), Cell::Int(3));
    }

    #[test]
    fn test_sum_with_grouping() {
        let child = int_table(&[(1, 10), (1, 20), (2, 30)]);
        let mut agg = Aggregate::new(child, 1, Some(0), AggregateOp::Sum).unwrap();
        agg.open().unwrap();

        let mut results: Vec<(i32, i32)> = drain(&mut agg)
            .iter()
            .map(|t| {
                (
                    t.get_cell(0).get_int().unwrap(),
                    t.get_cell(1).get_int().unwrap(),
                )
            })
            .collect();
        results.sort();
        assert_eq!(results, vec![(1, 30), (2, 30)]);
    }

    #[test]
    fn test_avg_uses_integer_division() {
        let child = int_table(&[(1, 5), (1, 6), (1, 6)]);
        let mut agg = Aggregate::new(child, 1, None, AggregateOp::Avg).unwrap();
        agg.open().unwrap();

        let results = drain(&mut agg);
        // (5 + 6 + 6) / 3 = 17 / 3 = 5
        assert_eq!(results[0].get_cell(0), Cell::Int(5));
    }

    #[test]
    fn test_min_max() {
        for (op, expected) in [(AggregateOp::Min, -7), (AggregateOp::Max, 42)] {
            let child = int_table(&[(1, 42), (2, -7), (3, 0)]);
            let mut agg = Aggregate::new(child, 1, None, op).unwrap();
            agg.open().unwrap();
            assert_eq!(drain(&mut agg)[0].get_cell(0), Cell::Int(expected));
        }
    }

    #[test]
    fn test_string_column_counts_only() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("g", Type::Int, false),
            Field::new("s", Type::Str, false),
        ]));
        let tuples: Vec<Tuple> = ["a", "b", "c"]
            .iter()
            .map(|s| {
                Tuple::new(
                    Arc::clone(&schema),
                    vec![Cell::Int(1), Cell::Str(s.to_string())],
                )
            })
            .collect();

        let child = Box::new(TupleIterator::new(Arc::clone(&schema), tuples.clone()));
        let mut agg = Aggregate::new(child, 1, Some(0), AggregateOp::Count).unwrap();
        agg.open().unwrap();
        let results = drain(&mut agg);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_cell(1), Cell::Int(3));

        // anything but count over strings is rejected
        let child = Box::new(TupleIterator::new(Arc::clone(&schema), tuples));
        assert!(matches!(
            Aggregate::new(child, 1, None, AggregateOp::Sum),
            Err(MiniError::InvalidAggregate(_))
        ));
    }

    #[test]
    fn test_reserved_ops_are_rejected() {
        for op in [AggregateOp::SumCount, AggregateOp::ScAvg] {
            let child = int_table(&[(1, 1)]);
            assert!(matches!(
                Aggregate::new(child, 1, None, op),
                Err(MiniError::InvalidAggregate(_))
            ));
        }
    }

    #[test]
    fn test_rewind_replays_results() {
        let child = int_table(&[(1, 10), (2, 20)]);
        let mut agg = Aggregate::new(child, 1, Some(0), AggregateOp::Max).unwrap();
        agg.open().unwrap();

        let first = drain(&mut agg);
        agg.rewind().unwrap();
        let second = drain(&mut agg);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
