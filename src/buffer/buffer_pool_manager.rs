use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{FrameId, PageId, Result, VellumError, FRAME_SIZE, MAX_BUFFER_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{ArcReplacer, Frame, PageGuard};

/// Page table and free list, guarded together. The mutex is held across the
/// whole miss path (including the disk round-trip) so two requesters missing
/// on the same page cannot both read it.
struct PoolInner {
    /// Maps resident pages to their frame
    page_table: HashMap<PageId, FrameId>,
    /// Frames with no resident page
    free_list: VecDeque<FrameId>,
}

/// State shared with page-guard release callbacks
struct PoolState {
    frames: Vec<Arc<Frame>>,
    inner: Mutex<PoolInner>,
    /// Lock order: `inner` first, `replacer` second, never the reverse.
    replacer: Mutex<ArcReplacer>,
}

/// BufferPoolManager keeps a bounded set of pages resident in a fixed array
/// of frames, using ARC replacement to pick eviction victims and the disk
/// scheduler for all physical I/O. Write-back is lazy: dirty pages reach
/// disk when evicted or flushed.
pub struct BufferPoolManager {
    capacity: usize,
    state: Arc<PoolState>,
    scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool with `capacity` frames, all initially free.
    pub fn new(capacity: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(capacity);
        let mut free_list = VecDeque::with_capacity(capacity);

        for i in 0..capacity {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: Mutex::new(ArcReplacer::new(capacity)),
        });

        Self {
            capacity,
            state,
            scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Creates a pool with the default number of frames.
    pub fn with_default_capacity(disk_manager: Arc<DiskManager>) -> Self {
        Self::new(MAX_BUFFER_SIZE, disk_manager)
    }

    /// Pins a page and returns a guard holding its frame latch. On a miss
    /// the page is read from disk, evicting (and writing back) another page
    /// if no frame is free. Fails with `AllPinned` when every frame is
    /// pinned, and with the underlying error when I/O fails; a failed read
    /// installs nothing.
    pub fn read_page(&self, page_id: PageId) -> Result<PageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        let state = Arc::clone(&self.state);
        let guard = unsafe {
            PageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| {
                    Self::release(&state, pid, is_dirty);
                }),
            )
        };

        Ok(guard)
    }

    /// Drops one pin on a page, folding in the caller's dirty flag. When the
    /// last pin goes away the page becomes evictable. No-op if the page is
    /// not resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) {
        Self::release(&self.state, page_id, is_dirty);
    }

    /// Removes a resident, unpinned page: its on-disk image is zeroed and
    /// its frame returns to the free list. Returns false (and does nothing)
    /// if the page is pinned; an unknown page is an `InvalidArgument` error.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                return Err(VellumError::InvalidArgument(format!(
                    "delete of non-resident page {}",
                    page_id
                )))
            }
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        let zeros = [0u8; FRAME_SIZE];
        self.scheduler.write_page_sync(page_id, &zeros)?;

        inner.page_table.remove(&page_id);
        self.state.replacer.lock().remove(page_id);
        frame.reset();
        inner.free_list.push_back(frame_id);
        trace!(page = %page_id, "deleted page");

        Ok(true)
    }

    /// Writes a resident dirty page back to disk and clears its dirty bit.
    /// No-op for clean or non-resident pages.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let inner = self.state.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            self.flush_frame(page_id, frame_id)?;
        }
        Ok(())
    }

    /// Flushes every resident dirty page.
    pub fn flush_all(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        for (&page_id, &frame_id) in inner.page_table.iter() {
            self.flush_frame(page_id, frame_id)?;
        }
        Ok(())
    }

    /// Current pin count of a page, or None if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Shuts the disk scheduler down. Pending and future I/O fails with
    /// `SchedulerClosed`; resident pages stay readable from memory.
    pub fn close(&self) {
        self.scheduler.shutdown();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.scheduler.disk_manager()
    }

    /// Unpin logic shared by `unpin_page` and guard drops.
    fn release(state: &PoolState, page_id: PageId, is_dirty: bool) {
        let inner = state.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &state.frames[frame_id.as_usize()];
            if is_dirty {
                frame.set_dirty(true);
            }
            if let Some(0) = frame.unpin() {
                state.replacer.lock().set_evictable(page_id, true);
            }
        }
    }

    /// Returns the frame holding `page_id`, pinning it. Misses read the page
    /// into a free or evicted frame under the pool mutex.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            let mut replacer = self.state.replacer.lock();
            replacer.record_access(page_id);
            replacer.set_evictable(page_id, false);
            return Ok(frame_id);
        }

        let frame_id = match inner.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => self.evict_into_free(&mut inner)?,
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        {
            // Latch held across submit + await: the worker owns the buffer
            // until the completion fires.
            let mut data = frame.data.write();
            if let Err(e) = self.scheduler.read_page_sync(page_id, &mut data[..]) {
                drop(data);
                frame.reset();
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        }

        frame.set_page_id(Some(page_id));
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        let mut replacer = self.state.replacer.lock();
        replacer.record_access(page_id);
        replacer.set_evictable(page_id, false);

        Ok(frame_id)
    }

    /// Evicts a victim chosen by the replacer, writing it back first when
    /// dirty, and hands its frame to the caller. A failed write-back leaves
    /// the victim resident and dirty.
    fn evict_into_free(&self, inner: &mut PoolInner) -> Result<FrameId> {
        let victim = self
            .state
            .replacer
            .lock()
            .evict()
            .ok_or(VellumError::AllPinned)?;

        let frame_id = *inner
            .page_table
            .get(&victim)
            .expect("replacer victim must be resident");
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.is_dirty() {
            let data = frame.data.read();
            if let Err(e) = self.scheduler.write_page_sync(victim, &data[..]) {
                drop(data);
                // The victim is already demoted to a ghost list; a fresh
                // access re-registers it so it stays tracked and evictable.
                let mut replacer = self.state.replacer.lock();
                replacer.record_access(victim);
                replacer.set_evictable(victim, true);
                return Err(e);
            }
            frame.set_dirty(false);
        }

        inner.page_table.remove(&victim);
        frame.reset();
        trace!(page = %victim, frame = %frame_id, "evicted for reuse");

        Ok(frame_id)
    }

    fn flush_frame(&self, page_id: PageId, frame_id: FrameId) -> Result<()> {
        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.is_dirty() {
            let data = frame.data.read();
            self.scheduler.write_page_sync(page_id, &data[..])?;
            drop(data);
            frame.set_dirty(false);
        }
        Ok(())
    }
}
