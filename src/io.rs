use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use crate::{error::MiniError, types::MiniResult};

/// Values that serialize themselves into the engine's big-endian wire
/// format.
pub trait Encodeable {
    fn to_bytes(&self) -> Vec<u8>;
}

impl Encodeable for u8 {
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self]
    }
}

impl Encodeable for u32 {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl Encodeable for u64 {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl Encodeable for i32 {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

/// Cursor over an in-memory page image.
pub struct MiniReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> MiniReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Read exactly `n` bytes, advancing the cursor.
    ///
    /// Panics when the read runs past the end of the buffer; page images
    /// have a fixed size, so an overrun is a bug in the caller, not a
    /// recoverable condition.
    pub fn read_exact(&mut self, n: usize) -> &'a [u8] {
        let start = self.cursor;
        let end = start + n;
        if end > self.buf.len() {
            panic!("read out of boundary, cursor: {}, request: {}", start, n);
        }
        self.cursor = end;
        &self.buf[start..end]
    }

    pub fn read_i32(&mut self) -> i32 {
        let b = self.read_exact(4);
        i32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn read_u32(&mut self) -> u32 {
        let b = self.read_exact(4);
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }
}

/// Append-only byte buffer used to build page images and log records.
pub struct MiniWriter {
    buf: Vec<u8>,
}

impl MiniWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(&obj.to_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Consume the writer and pad the result with zero bytes up to
    /// `size`. Panics if the content is already larger than `size`.
    pub fn into_padded(mut self, size: usize) -> Vec<u8> {
        if self.buf.len() > size {
            panic!(
                "content size {} exceeds target size {}",
                self.buf.len(),
                size
            );
        }
        self.buf.resize(size, 0);
        self.buf
    }
}

impl Default for MiniWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared, append-oriented file handle (used by the log manager).
pub struct MiniFile {
    file: Mutex<File>,
    path: PathBuf,
}

impl MiniFile {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MiniError> {
        // append mode: reopening an existing log never clobbers records
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
        })
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn append(&self, buf: &[u8]) -> MiniResult {
        let mut file = self.get_file();
        file.write_all(buf)?;
        file.sync_data()?;
        Ok(())
    }

    pub fn get_size(&self) -> Result<u64, MiniError> {
        let file = self.get_file();
        Ok(file.metadata()?.len())
    }

    /// Discard all content, keeping the handle open.
    pub fn truncate(&self) -> MiniResult {
        let file = self.get_file();
        file.set_len(0)?;
        Ok(())
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }
}
