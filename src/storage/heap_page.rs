use std::sync::Arc;

use bit_vec::BitVec;
use log::debug;

use crate::{
    error::MiniError,
    io::{MiniReader, MiniWriter},
    storage::{
        buffer_pool::PAGE_SIZE,
        page_id::{HeapPageID, RecordID},
        schema::Schema,
        tuple::Tuple,
    },
    transaction::TransactionID,
    types::MiniResult,
};

/// A decoded heap page.
///
/// On disk a page is `[header][slot 0][slot 1]...`, where the header is
/// a bitmap with one bit per slot (bit `i` lives in byte `i / 8` at bit
/// position `i % 8`, least significant bit first) and every slot holds
/// one serialized tuple. Empty slots still occupy `tuple_size` bytes;
/// their content is unspecified and skipped on read.
pub struct HeapPage {
    pid: HeapPageID,
    schema: Arc<Schema>,

    // slot occupancy bitmap, true means used
    header: BitVec,

    // all slots, including the empty ones
    tuples: Vec<Tuple>,

    num_slots: usize,

    dirty_by: Option<TransactionID>,

    // serialized content as of transaction start or the last flush
    before_image: Vec<u8>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Arc<Schema>) -> Self {
        debug_assert_eq!(bytes.len(), PAGE_SIZE);

        let num_slots = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(num_slots);

        let mut header = BitVec::from_elem(num_slots, false);
        for i in 0..num_slots {
            let bit = (bytes[i / 8] >> (i % 8)) & 1;
            header.set(i, bit == 1);
        }

        let tuple_size = schema.get_tuple_size();
        let mut tuples = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            let start = header_size + i * tuple_size;
            if header[i] {
                let mut reader = MiniReader::new(&bytes[start..start + tuple_size]);
                let mut tuple = Tuple::read_from(&mut reader, schema);
                tuple.set_record_id(Some(RecordID::new(*pid, i)));
                tuples.push(tuple);
            } else {
                tuples.push(Tuple::empty(Arc::clone(schema)));
            }
        }

        Self {
            pid: *pid,
            schema: Arc::clone(schema),
            header,
            tuples,
            num_slots,
            dirty_by: None,
            before_image: bytes.to_vec(),
        }
    }

    /// Content of a freshly allocated page.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; PAGE_SIZE]
    }

    /// Number of tuple slots a page holds for the given schema. Each
    /// slot costs its tuple size plus one header bit.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        (PAGE_SIZE * 8) / (schema.get_tuple_size() * 8 + 1)
    }

    pub(crate) fn calculate_header_size(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get_num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn get_empty_slots_count(&self) -> usize {
        self.header.iter().filter(|used| !used).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header[slot]
    }

    fn mark_slot_status(&mut self, slot: usize, used: bool) {
        self.header.set(slot, used);
    }

    /// Serialize the page back into its on-disk image.
    pub fn get_page_data(&self) -> Vec<u8> {
        let header_size = Self::calculate_header_size(self.num_slots);
        let tuple_size = self.schema.get_tuple_size();

        let mut header_bytes = vec![0u8; header_size];
        for i in 0..self.num_slots {
            if self.header[i] {
                header_bytes[i / 8] |= 1 << (i % 8);
            }
        }

        let mut writer = MiniWriter::new();
        writer.write_bytes(&header_bytes);
        for i in 0..self.num_slots {
            if self.header[i] {
                self.tuples[i].encode(&mut writer);
            } else {
                writer.write_bytes(&vec![0; tuple_size]);
            }
        }
        writer.into_padded(PAGE_SIZE)
    }

    /// Put the tuple into the lowest empty slot and bind its record id
    /// to this page.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> MiniResult {
        if tuple.get_schema().as_ref() != self.schema.as_ref() {
            return Err(MiniError::SchemaMismatch(format!(
                "tuple schema does not match page {}",
                self.pid
            )));
        }

        for slot in 0..self.num_slots {
            if !self.header[slot] {
                tuple.set_record_id(Some(RecordID::new(self.pid, slot)));
                self.tuples[slot] = tuple.clone();
                self.mark_slot_status(slot, true);
                debug!("tuple inserted into {} slot {}", self.pid, slot);
                return Ok(());
            }
        }

        Err(MiniError::PageFull(self.pid.to_string()))
    }

    /// Clear the slot the tuple's record id points at.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> MiniResult {
        let record_id = tuple
            .get_record_id()
            .ok_or_else(|| MiniError::NotOnPage("tuple has no record id".to_string()))?;

        if record_id.page_id != self.pid {
            return Err(MiniError::NotOnPage(format!(
                "tuple belongs to {}, not {}",
                record_id.page_id, self.pid
            )));
        }
        if record_id.slot >= self.num_slots || !self.header[record_id.slot] {
            return Err(MiniError::NotOnPage(format!(
                "slot {} of {} is empty",
                record_id.slot, self.pid
            )));
        }
        if self.tuples[record_id.slot] != *tuple {
            return Err(MiniError::NotOnPage(format!(
                "slot {} of {} holds a different tuple",
                record_id.slot, self.pid
            )));
        }

        self.mark_slot_status(record_id.slot, false);
        Ok(())
    }

    /// Tuples of the used slots, in ascending slot order.
    pub fn iter(&self) -> HeapPageIter<'_> {
        HeapPageIter {
            page: self,
            cursor: 0,
        }
    }

    pub fn mark_dirty(&mut self, tx: Option<TransactionID>) {
        self.dirty_by = tx;
    }

    pub fn is_dirty(&self) -> Option<TransactionID> {
        self.dirty_by
    }

    /// The page as it looked before the current transaction touched it.
    pub fn get_before_image(&self) -> HeapPage {
        HeapPage::new(&self.pid, &self.before_image, &self.schema)
    }

    pub fn get_before_image_data(&self) -> Vec<u8> {
        self.before_image.clone()
    }

    /// Capture the current content as the new before-image. Called
    /// after a successful flush.
    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }
}

pub struct HeapPageIter<'page> {
    page: &'page HeapPage,
    cursor: usize,
}

impl Iterator for HeapPageIter<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.num_slots {
            let slot = self.cursor;
            self.cursor += 1;
            if self.page.header[slot] {
                return Some(self.page.tuples[slot].clone());
            }
        }
        None
    }
}
