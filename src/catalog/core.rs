use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{FileId, Result, VellumError};

/// What a backing file stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Table,
    Index,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    path: PathBuf,
    kind: FileKind,
}

/// Catalog maps file ids to backing file paths. Ids are issued
/// monotonically starting at 1; id 0 is reserved. Entries are never
/// removed.
pub struct Catalog {
    base_dir: PathBuf,
    next_file_id: AtomicU32,
    entries: Mutex<HashMap<FileId, CatalogEntry>>,
}

impl Catalog {
    /// Creates a catalog rooted at the given directory. The directory is
    /// created if it does not exist; backing files live at `<base>/<name>.db`.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            next_file_id: AtomicU32::new(1),
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Registers a new table file and returns its id.
    pub fn create_table(&self, name: &str) -> Result<FileId> {
        self.create_file(name, FileKind::Table)
    }

    /// Registers a new index file and returns its id.
    pub fn create_index(&self, name: &str) -> Result<FileId> {
        self.create_file(name, FileKind::Index)
    }

    /// Returns the backing path and kind for a file id.
    pub fn get_file(&self, file_id: FileId) -> Result<(PathBuf, FileKind)> {
        let entries = self.entries.lock();
        entries
            .get(&file_id)
            .map(|e| (e.path.clone(), e.kind))
            .ok_or(VellumError::UnknownFile(file_id))
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn create_file(&self, name: &str, kind: FileKind) -> Result<FileId> {
        let mut entries = self.entries.lock();

        if entries.values().any(|e| e.name == name) {
            return Err(VellumError::TableExists(name.to_string()));
        }

        let file_id = FileId::new(self.next_file_id.fetch_add(1, Ordering::SeqCst));
        let path = self.base_dir.join(format!("{}.db", name));

        entries.insert(
            file_id,
            CatalogEntry {
                name: name.to_string(),
                path,
                kind,
            },
        );

        Ok(file_id)
    }
}
