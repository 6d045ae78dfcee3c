use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::RwLockWriteGuard;

use crate::common::{PageId, FRAME_SIZE};

use super::Frame;

/// Callback run when the guard releases its page
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// RAII handle to a pinned page returned by `BufferPoolManager::read_page`.
///
/// The guard holds the frame's write latch for its whole lifetime, so two
/// consumers of the same page serialize. Mutating the bytes through
/// `data_mut` marks the guard dirty; dropping it releases the latch and then
/// unpins the page, carrying the dirty flag back to the pool.
pub struct PageGuard {
    page_id: PageId,
    /// Keeps the frame alive for the transmuted latch guard below
    _frame: Arc<Frame>,
    data: Option<RwLockWriteGuard<'static, Box<[u8; FRAME_SIZE]>>>,
    is_dirty: bool,
    release: Option<ReleaseCallback>,
}

impl PageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives the guard; the `Arc` held
    /// by the guard guarantees this.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>, release: ReleaseCallback) -> Self {
        let data = frame.data.write();
        // The latch guard borrows the frame, which the Arc pins in place for
        // the guard's lifetime.
        let data: RwLockWriteGuard<'static, Box<[u8; FRAME_SIZE]>> = std::mem::transmute(data);

        Self {
            page_id,
            _frame: frame,
            data: Some(data),
            is_dirty: false,
            release: Some(release),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    /// Mutable access to the page bytes; marks the guard dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data.as_mut().unwrap()[..]
    }

    /// Marks the page dirty without touching the bytes.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Deref for PageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for PageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        // Release the latch before unpinning so the pool can hand the frame
        // to the next waiter.
        self.data.take();
        if let Some(release) = self.release.take() {
            release(self.page_id, self.is_dirty);
        }
    }
}
