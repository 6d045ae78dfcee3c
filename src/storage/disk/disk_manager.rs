use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::catalog::Catalog;
use crate::common::{FileId, PageId, Result, VellumError, FRAME_SIZE};

/// DiskManager performs fixed-size positional page I/O over the files the
/// catalog knows about. Files are opened lazily on first access and the
/// handles are retained for the life of the manager.
///
/// The manager is safe to call from multiple threads, but under normal use
/// the DiskScheduler serializes all calls through its single worker.
pub struct DiskManager {
    catalog: Arc<Catalog>,
    /// Map of FileId -> open handle. The outer lock is only written while
    /// opening a file; per-file access goes through the inner mutex.
    files: RwLock<HashMap<FileId, Arc<Mutex<File>>>>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            files: RwLock::new(HashMap::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        }
    }

    /// Reads exactly `FRAME_SIZE` bytes at the page's offset into `data`.
    /// A read past end-of-file zero-fills the unread tail; a short read of a
    /// page the file length says exists is `UnexpectedEof`.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        if data.len() != FRAME_SIZE {
            return Err(VellumError::InvalidArgument(format!(
                "read buffer is {} bytes, expected {}",
                data.len(),
                FRAME_SIZE
            )));
        }

        let handle = self.file_handle(page_id.file_id())?;
        let offset = page_id.page_number() as u64 * FRAME_SIZE as u64;

        let mut file = handle.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut bytes_read = 0;
        while bytes_read < FRAME_SIZE {
            match file.read(&mut data[bytes_read..])? {
                0 => break,
                n => bytes_read += n,
            }
        }

        if bytes_read < FRAME_SIZE {
            // Short read at end-of-file means a newly allocated page; anything
            // else means the file lied about its length.
            let file_len = file.metadata()?.len();
            if offset + FRAME_SIZE as u64 <= file_len {
                return Err(VellumError::UnexpectedEof(page_id));
            }
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes exactly `FRAME_SIZE` bytes at the page's offset. The file is
    /// extended implicitly by a write past its current end.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != FRAME_SIZE {
            return Err(VellumError::InvalidArgument(format!(
                "write buffer is {} bytes, expected {}",
                data.len(),
                FRAME_SIZE
            )));
        }

        let handle = self.file_handle(page_id.file_id())?;
        let offset = page_id.page_number() as u64 * FRAME_SIZE as u64;

        let mut file = handle.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forces durability (data and metadata) of the file backing the page.
    pub fn flush(&self, page_id: PageId) -> Result<()> {
        let handle = self.file_handle(page_id.file_id())?;
        let file = handle.lock();
        file.sync_all()?;
        Ok(())
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the open handle for a file, opening it on first access.
    /// The open itself is guarded by the map's write lock so two racing
    /// callers cannot open the same file twice.
    fn file_handle(&self, file_id: FileId) -> Result<Arc<Mutex<File>>> {
        if let Some(handle) = self.files.read().get(&file_id) {
            return Ok(Arc::clone(handle));
        }

        let mut files = self.files.write();
        if let Some(handle) = files.get(&file_id) {
            return Ok(Arc::clone(handle));
        }

        let (path, _) = self.catalog.get_file(file_id)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        debug!(file_id = file_id.as_u32(), path = %path.display(), "opened backing file");

        let handle = Arc::new(Mutex::new(file));
        files.insert(file_id, Arc::clone(&handle));
        Ok(handle)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let files = self.files.get_mut();
        for handle in files.values() {
            let file = handle.lock();
            let _ = file.sync_all();
        }
    }
}
