use std::fmt;

/// Identity of a page within a table.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct HeapPageID {
    pub table_id: u32,
    pub page_index: usize,
}

impl HeapPageID {
    pub fn new(table_id: u32, page_index: usize) -> Self {
        Self {
            table_id,
            page_index,
        }
    }
}

impl fmt::Display for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "page_{}_{}", self.table_id, self.page_index)
    }
}

impl fmt::Debug for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Identity of a record within a page.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordID {
    pub page_id: HeapPageID,
    pub slot: usize,
}

impl RecordID {
    pub fn new(page_id: HeapPageID, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_slot_{}", self.page_id, self.slot)
    }
}

impl fmt::Debug for RecordID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
