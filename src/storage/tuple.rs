use std::{fmt, sync::Arc};

use crate::{
    error::MiniError,
    execution::Op,
    io::{MiniReader, MiniWriter},
    storage::{
        page_id::RecordID,
        schema::{Schema, Type, MAX_STRING_LEN},
    },
};

/// A typed field value.
///
/// The variant order gives `Ord` a total order; cells of different
/// types never meet in practice because tuples are schema-typed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cell {
    Int(i32),
    Str(String),
}

impl Cell {
    pub fn get_type(&self) -> Type {
        match self {
            Cell::Int(_) => Type::Int,
            Cell::Str(_) => Type::Str,
        }
    }

    pub fn get_int(&self) -> Result<i32, MiniError> {
        match self {
            Cell::Int(v) => Ok(*v),
            _ => Err(MiniError::Internal(format!("not an int cell: {:?}", self))),
        }
    }

    pub fn get_string(&self) -> Result<String, MiniError> {
        match self {
            Cell::Str(v) => Ok(v.clone()),
            _ => Err(MiniError::Internal(format!(
                "not a string cell: {:?}",
                self
            ))),
        }
    }

    /// Evaluate `self op other`.
    ///
    /// `Like` is substring match on strings and plain equality on ints.
    pub fn compare(&self, op: &Op, other: &Cell) -> bool {
        match op {
            Op::Equals => self == other,
            Op::NotEquals => self != other,
            Op::LessThan => self < other,
            Op::LessThanOrEq => self <= other,
            Op::GreaterThan => self > other,
            Op::GreaterThanOrEq => self >= other,
            Op::Like => match (self, other) {
                (Cell::Str(s), Cell::Str(pattern)) => s.contains(pattern.as_str()),
                _ => self == other,
            },
        }
    }

    /// Serialize into the on-disk format: ints as 4 big-endian bytes,
    /// strings as a 4-byte length prefix plus zero-padded content.
    pub fn encode(&self, writer: &mut MiniWriter) {
        match self {
            Cell::Int(v) => writer.write(v),
            Cell::Str(s) => {
                // oversized strings are truncated to the declared width
                let bytes = s.as_bytes();
                let len = bytes.len().min(MAX_STRING_LEN);
                writer.write(&(len as i32));
                writer.write_bytes(&bytes[..len]);
                for _ in len..MAX_STRING_LEN {
                    writer.write_bytes(&[0]);
                }
            }
        }
    }

    pub fn read_from(reader: &mut MiniReader, field_type: &Type) -> Self {
        match field_type {
            Type::Int => Cell::Int(reader.read_i32()),
            Type::Str => {
                let len = reader.read_i32() as usize;
                let bytes = reader.read_exact(MAX_STRING_LEN);
                let content = String::from_utf8_lossy(&bytes[..len.min(MAX_STRING_LEN)]);
                Cell::Str(content.into_owned())
            }
        }
    }

    /// The zero value of the given type, used to fill empty slots.
    pub fn default_of(field_type: &Type) -> Self {
        match field_type {
            Type::Int => Cell::Int(0),
            Type::Str => Cell::Str(String::new()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// A row with a fixed schema and an optional on-disk location.
#[derive(Clone, Debug)]
pub struct Tuple {
    schema: Arc<Schema>,
    cells: Vec<Cell>,
    record_id: Option<RecordID>,
}

impl Tuple {
    pub fn new(schema: Arc<Schema>, cells: Vec<Cell>) -> Self {
        debug_assert_eq!(schema.field_count(), cells.len());
        Self {
            schema,
            cells,
            record_id: None,
        }
    }

    /// A tuple of zero values, used to back empty page slots.
    pub fn empty(schema: Arc<Schema>) -> Self {
        let cells = schema
            .get_fields()
            .iter()
            .map(|f| Cell::default_of(&f.field_type))
            .collect();
        Self {
            schema,
            cells,
            record_id: None,
        }
    }

    pub fn read_from(reader: &mut MiniReader, schema: &Arc<Schema>) -> Self {
        let cells = schema
            .get_fields()
            .iter()
            .map(|f| Cell::read_from(reader, &f.field_type))
            .collect();
        Self {
            schema: Arc::clone(schema),
            cells,
            record_id: None,
        }
    }

    pub fn encode(&self, writer: &mut MiniWriter) {
        for cell in &self.cells {
            cell.encode(writer);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = MiniWriter::new();
        self.encode(&mut writer);
        writer.into_bytes()
    }

    pub fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn set_cell(&mut self, i: usize, cell: Cell) {
        self.cells[i] = cell;
    }

    pub fn get_record_id(&self) -> Option<RecordID> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordID>) {
        self.record_id = record_id;
    }

    /// Concatenate two tuples under a pre-merged schema.
    pub fn merge(a: &Tuple, b: &Tuple, schema: &Arc<Schema>) -> Tuple {
        let mut cells = a.cells.clone();
        cells.extend(b.cells.iter().cloned());
        Tuple::new(Arc::clone(schema), cells)
    }
}

/// Record ids are deliberately left out: a scanned copy of a tuple and
/// a freshly built one with the same content are the same row.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.cells == other.cells
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content: Vec<String> = self.cells.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", content.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Field;

    fn int_tuple(values: &[i32]) -> Tuple {
        let schema = Arc::new(Schema::small_int_schema(values.len(), ""));
        Tuple::new(schema, values.iter().map(|v| Cell::Int(*v)).collect())
    }

    #[test]
    fn test_compare_ints() {
        let a = Cell::Int(3);
        let b = Cell::Int(5);
        assert!(a.compare(&Op::LessThan, &b));
        assert!(a.compare(&Op::NotEquals, &b));
        assert!(b.compare(&Op::GreaterThanOrEq, &b));
        assert!(a.compare(&Op::Like, &Cell::Int(3)));
        assert!(!a.compare(&Op::Like, &b));
    }

    #[test]
    fn test_compare_strings() {
        let s = Cell::Str("database".to_string());
        assert!(s.compare(&Op::Like, &Cell::Str("base".to_string())));
        assert!(!s.compare(&Op::Like, &Cell::Str("postgres".to_string())));
        assert!(s.compare(&Op::LessThan, &Cell::Str("zzz".to_string())));
    }

    #[test]
    fn test_cell_round_trip() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", Type::Int, true),
            Field::new("name", Type::Str, false),
        ]));
        let tuple = Tuple::new(
            Arc::clone(&schema),
            vec![Cell::Int(-42), Cell::Str("hello".to_string())],
        );

        let bytes = tuple.to_bytes();
        assert_eq!(bytes.len(), schema.get_tuple_size());

        let mut reader = MiniReader::new(&bytes);
        let decoded = Tuple::read_from(&mut reader, &schema);
        assert_eq!(tuple, decoded);
    }

    #[test]
    fn test_equality_ignores_record_id() {
        use crate::storage::page_id::HeapPageID;

        let mut a = int_tuple(&[1, 2]);
        let b = int_tuple(&[1, 2]);
        a.set_record_id(Some(RecordID {
            page_id: HeapPageID::new(7, 0),
            slot: 3,
        }));
        assert_eq!(a, b);
    }
}
