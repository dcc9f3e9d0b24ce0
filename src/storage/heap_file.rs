use std::{
    collections::hash_map::DefaultHasher,
    fs::OpenOptions,
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use log::debug;

use crate::{
    common::Database,
    error::MiniError,
    storage::{
        buffer_pool::{BufferPool, PAGE_SIZE},
        heap_page::HeapPage,
        page_id::HeapPageID,
        schema::Schema,
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    types::{MiniResult, Pod, ResultPod},
    utils::HandyRwLock,
};

/// A file of consecutive heap pages backing one table.
///
/// The file is opened per operation; no descriptor is shared between
/// threads. Appends are serialized with a private mutex so two
/// transactions cannot claim the same new page index.
pub struct HeapFile {
    file_path: PathBuf,
    table_id: u32,
    schema: Arc<Schema>,

    append_lock: Mutex<()>,

    // how many pages were fetched from disk, used by cache tests
    read_count: AtomicUsize,
}

impl HeapFile {
    /// Open (or create) the backing file. The table id is a stable hash
    /// of the absolute path, so reopening the same file after a restart
    /// yields the same id.
    pub fn new(file_path: impl AsRef<Path>, schema: Schema) -> Result<Self, MiniError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(file_path.as_ref())?;

        let absolute = file_path.as_ref().canonicalize()?;
        let table_id = Self::hash_path(&absolute);

        Ok(Self {
            file_path: absolute,
            table_id,
            schema: Arc::new(schema),
            append_lock: Mutex::new(()),
            read_count: AtomicUsize::new(0),
        })
    }

    fn hash_path(path: &Path) -> u32 {
        // DefaultHasher with the default keys is deterministic across
        // processes, which keeps table ids stable after a restart.
        let mut hasher = DefaultHasher::new();
        path.to_string_lossy().hash(&mut hasher);
        hasher.finish() as u32
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn get_path(&self) -> &Path {
        &self.file_path
    }

    pub fn get_read_count(&self) -> usize {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Number of whole pages in the file. A trailing partial page (an
    /// interrupted append) is ignored.
    pub fn num_pages(&self) -> Result<usize, MiniError> {
        let len = std::fs::metadata(&self.file_path)?.len();
        Ok(len as usize / PAGE_SIZE)
    }

    /// Read one page from disk, bypassing the buffer pool.
    pub fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, MiniError> {
        let mut file = OpenOptions::new().read(true).open(&self.file_path)?;

        let offset = pid.page_index * PAGE_SIZE;
        if (offset + PAGE_SIZE) as u64 > file.metadata()?.len() {
            return Err(MiniError::PageOutOfRange(pid.to_string()));
        }

        file.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buf)?;

        self.read_count.fetch_add(1, Ordering::Relaxed);
        debug!("read {} from {:?}", pid, self.file_path);
        Ok(HeapPage::new(pid, &buf, &self.schema))
    }

    /// Write the page back to its slot in the file and clear its dirty
    /// bit.
    pub fn write_page(&self, page: &mut HeapPage) -> MiniResult {
        let mut file = OpenOptions::new().write(true).open(&self.file_path)?;

        let pid = page.get_pid();
        file.seek(SeekFrom::Start((pid.page_index * PAGE_SIZE) as u64))?;
        file.write_all(&page.get_page_data())?;
        file.sync_data()?;

        page.mark_dirty(None);
        debug!("wrote {} to {:?}", pid, self.file_path);
        Ok(())
    }

    /// Extend the file by one zeroed page, returning the new page's
    /// index.
    fn append_empty_page(&self) -> Result<usize, MiniError> {
        let _guard = self.append_lock.lock().unwrap();

        let index = self.num_pages()?;
        let mut file = OpenOptions::new().write(true).open(&self.file_path)?;
        file.seek(SeekFrom::Start((index * PAGE_SIZE) as u64))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.sync_data()?;

        debug!("appended page {} to {:?}", index, self.file_path);
        Ok(index)
    }

    /// Insert the tuple into the first page with a free slot, extending
    /// the file when every existing page is full. Returns the pages the
    /// operation dirtied.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &mut Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, MiniError> {
        let num_pages = self.num_pages()?;
        for index in 0..num_pages {
            let pid = HeapPageID::new(self.table_id, index);
            let page_rc = BufferPool::get_page(db, tx, Permission::ReadWrite, &pid)?;
            let result = page_rc.wl().insert_tuple(tuple);
            match result {
                Ok(()) => return Ok(vec![page_rc]),
                Err(MiniError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        // every existing page is full
        let index = self.append_empty_page()?;
        let pid = HeapPageID::new(self.table_id, index);
        let page_rc = BufferPool::get_page(db, tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().insert_tuple(tuple)?;
        Ok(vec![page_rc])
    }

    /// Delete the tuple from the page its record id points at,
    /// returning the dirtied page.
    pub fn delete_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> ResultPod<HeapPage> {
        let record_id = tuple
            .get_record_id()
            .ok_or_else(|| MiniError::NotOnPage("tuple has no record id".to_string()))?;

        let page_rc = BufferPool::get_page(db, tx, Permission::ReadWrite, &record_id.page_id)?;
        page_rc.wl().delete_tuple(tuple)?;
        Ok(page_rc)
    }

    /// A cursor over all tuples of the table, reading pages through the
    /// buffer pool under read-only permission.
    pub fn iter(&self, db: &Arc<Database>, tx: &Transaction) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(db), tx.clone(), self.table_id)
    }
}

pub struct HeapFileIterator {
    db: Arc<Database>,
    tx: Transaction,
    table_id: u32,

    // pages visible to this cursor, snapshotted at open()
    num_pages: usize,
    page_index: usize,
    page_tuples: std::vec::IntoIter<Tuple>,
    opened: bool,
}

impl HeapFileIterator {
    pub(crate) fn new(db: Arc<Database>, tx: Transaction, table_id: u32) -> Self {
        Self {
            db,
            tx,
            table_id,
            num_pages: 0,
            page_index: 0,
            page_tuples: Vec::new().into_iter(),
            opened: false,
        }
    }

    pub fn open(&mut self) -> MiniResult {
        let table_rc = self.db.catalog().get_table(&self.table_id)?;
        self.num_pages = table_rc.rl().num_pages()?;
        self.page_index = 0;
        self.page_tuples = if self.num_pages > 0 {
            self.load_page(0)?
        } else {
            Vec::new().into_iter()
        };
        self.opened = true;
        Ok(())
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.page_tuples = Vec::new().into_iter();
    }

    pub fn rewind(&mut self) -> MiniResult {
        self.close();
        self.open()
    }

    /// The next tuple, or `None` once the last page is exhausted.
    pub fn next(&mut self) -> Result<Option<Tuple>, MiniError> {
        if !self.opened {
            return Err(MiniError::Internal("iterator is not open".to_string()));
        }

        loop {
            if let Some(tuple) = self.page_tuples.next() {
                return Ok(Some(tuple));
            }
            if self.page_index + 1 >= self.num_pages {
                return Ok(None);
            }
            self.page_index += 1;
            self.page_tuples = self.load_page(self.page_index)?;
        }
    }

    fn load_page(&self, index: usize) -> Result<std::vec::IntoIter<Tuple>, MiniError> {
        let pid = HeapPageID::new(self.table_id, index);
        let page_rc = BufferPool::get_page(&self.db, &self.tx, Permission::ReadOnly, &pid)?;
        let tuples: Vec<Tuple> = page_rc.rl().iter().collect();
        Ok(tuples.into_iter())
    }
}
