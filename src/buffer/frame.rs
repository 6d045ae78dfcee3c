use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, FRAME_SIZE};

/// Frame is a single in-memory slot of the buffer pool. It holds the bytes
/// of at most one resident page plus the metadata the pool tracks for it.
/// The byte buffer is allocated once and reused across residencies.
pub struct Frame {
    /// Index of this frame in the pool's frame array
    frame_id: FrameId,
    /// The logical page currently resident, if any
    page_id: RwLock<Option<PageId>>,
    /// Number of live pins
    pin_count: AtomicU32,
    /// Whether the bytes differ from what is on disk
    is_dirty: AtomicBool,
    /// The page bytes; the latch serializes consumers of the page
    pub(crate) data: RwLock<Box<[u8; FRAME_SIZE]>>,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; FRAME_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.read()
    }

    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.write() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value, or None if it
    /// was already zero.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns the frame to its free-list state: no page, no pins, clean,
    /// zeroed bytes.
    pub fn reset(&self) {
        *self.page_id.write() = None;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
