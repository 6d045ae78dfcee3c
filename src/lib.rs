//! Vellum - the storage core of a disk-oriented relational database.
//!
//! The crate mediates between on-disk fixed-size pages and the in-memory
//! working set: callers pin pages through the buffer pool, mutate their
//! bytes, and release them; everything below decides what stays resident
//! and when bytes move to and from disk.
//!
//! # Architecture
//!
//! - **Catalog** (`catalog`): maps file ids to backing file paths.
//! - **Storage layer** (`storage`):
//!   - `DiskManager`: positional page reads and writes over catalog files
//!   - `DiskScheduler`: unbounded request queue drained by one worker
//!   - `SlottedPage` / B+-tree page views: the physical page format
//! - **Buffer pool** (`buffer`):
//!   - `BufferPoolManager`: page table, pinning, lazy write-back
//!   - `ArcReplacer`: adaptive replacement with ghost lists
//!   - `PageGuard`: RAII handle to a pinned, latched page
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vellum::buffer::BufferPoolManager;
//! use vellum::catalog::Catalog;
//! use vellum::storage::disk::DiskManager;
//! use vellum::PageId;
//!
//! let catalog = Arc::new(Catalog::new("data").unwrap());
//! let file_id = catalog.create_table("demo").unwrap();
//!
//! let disk_manager = Arc::new(DiskManager::new(catalog));
//! let bpm = BufferPoolManager::with_default_capacity(disk_manager);
//!
//! // Pin a page, write some bytes, release it dirty
//! {
//!     let mut guard = bpm.read_page(PageId::new(file_id, 0)).unwrap();
//!     guard.data_mut()[0] = 0xAB;
//! }
//!
//! bpm.flush_all().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FileId, FrameId, PageId, Result, Rid, VellumError};
