use std::path::Path;

use log::debug;

use crate::{
    error::MiniError,
    io::{MiniFile, MiniWriter},
    storage::HeapPageID,
    transaction::Transaction,
    types::MiniResult,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
enum RecordType {
    Update = 0,
    Commit = 1,
    Abort = 2,
}

/// Append-only write-ahead log.
///
/// The buffer pool calls `log_update` with the page's before- and
/// after-image right before each commit-time flush; `log_commit` /
/// `log_abort` seal the transaction. Replay is handled elsewhere; this
/// side only guarantees the records hit disk in order.
pub struct LogManager {
    file: MiniFile,
    total_records: usize,
}

impl LogManager {
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, MiniError> {
        Ok(Self {
            file: MiniFile::new(file_path)?,
            total_records: 0,
        })
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    /// Record a page modification: `[type][tx_id][table_id][page_index]
    /// [before image][after image]`, all integers big-endian.
    pub fn log_update(
        &mut self,
        tx: &Transaction,
        pid: &HeapPageID,
        before_image: &[u8],
        after_image: &[u8],
    ) -> MiniResult {
        let mut writer = MiniWriter::new();
        writer.write(&(RecordType::Update as u8));
        writer.write(&tx.get_id());
        writer.write(&pid.table_id);
        writer.write(&(pid.page_index as u64));
        writer.write_bytes(before_image);
        writer.write_bytes(after_image);

        self.append(writer)?;
        debug!("logged update of {} by {}", pid, tx);
        Ok(())
    }

    pub fn log_commit(&mut self, tx: &Transaction) -> MiniResult {
        self.log_marker(RecordType::Commit, tx)
    }

    pub fn log_abort(&mut self, tx: &Transaction) -> MiniResult {
        self.log_marker(RecordType::Abort, tx)
    }

    fn log_marker(&mut self, record_type: RecordType, tx: &Transaction) -> MiniResult {
        let mut writer = MiniWriter::new();
        writer.write(&(record_type as u8));
        writer.write(&tx.get_id());
        self.append(writer)
    }

    fn append(&mut self, writer: MiniWriter) -> MiniResult {
        self.file.append(&writer.into_bytes())?;
        self.total_records += 1;
        Ok(())
    }

    /// Drop all records, used by tests.
    pub fn reset(&mut self) -> MiniResult {
        self.file.truncate()?;
        self.total_records = 0;
        Ok(())
    }

    pub fn get_size(&self) -> Result<u64, MiniError> {
        self.file.get_size()
    }
}
