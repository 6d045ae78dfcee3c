use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

use crate::common::{PageId, Result, VellumError, FRAME_SIZE};

use super::DiskManager;

/// Kind of disk operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOp {
    Read,
    Write,
}

/// A disk I/O request processed by the scheduler's worker.
///
/// For reads the worker writes into the buffer; for writes it reads from it.
/// The caller must not touch the buffer between submit and completion; the
/// buffer pool enforces this by holding the frame latch across both.
pub struct DiskRequest {
    pub op: DiskOp,
    pub page_id: PageId,
    /// Pointer to a FRAME_SIZE byte buffer owned by the caller.
    pub data: *mut u8,
    /// Fulfilled with the outcome of the operation.
    pub completion: Option<std::sync::mpsc::Sender<Result<()>>>,
}

// Safety: the buffer pointer is only dereferenced by the worker thread, and
// the submitting caller keeps the buffer alive and untouched until the
// completion is fulfilled.
unsafe impl Send for DiskRequest {}

impl DiskRequest {
    pub fn read(page_id: PageId, data: *mut u8) -> Self {
        Self {
            op: DiskOp::Read,
            page_id,
            data,
            completion: None,
        }
    }

    pub fn write(page_id: PageId, data: *const u8) -> Self {
        Self {
            op: DiskOp::Write,
            page_id,
            // The worker only reads through this pointer for writes.
            data: data as *mut u8,
            completion: None,
        }
    }

    pub fn with_completion(mut self, completion: std::sync::mpsc::Sender<Result<()>>) -> Self {
        self.completion = Some(completion);
        self
    }
}

/// DiskScheduler fronts the DiskManager with an unbounded request queue
/// drained by a single worker thread in FIFO order. `schedule` never blocks
/// for capacity; requests complete through their per-request channel.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Sender<DiskRequest>,
    closed: Arc<AtomicBool>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a scheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = unbounded::<DiskRequest>();
        let closed = Arc::new(AtomicBool::new(false));

        let dm = Arc::clone(&disk_manager);
        let closed_flag = Arc::clone(&closed);

        let worker_handle = thread::spawn(move || {
            Self::worker_loop(dm, receiver, closed_flag);
        });

        Self {
            disk_manager,
            request_sender: sender,
            closed,
            worker_handle: Some(worker_handle),
        }
    }

    /// Enqueues a request. Returns immediately; after `shutdown` the request
    /// is rejected and its completion fails with `SchedulerClosed`.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Self::fail_request(request);
            return Err(VellumError::SchedulerClosed);
        }

        self.request_sender.send(request).map_err(|e| {
            Self::fail_request(e.into_inner());
            VellumError::SchedulerClosed
        })
    }

    /// Schedules a read and blocks until it completes.
    pub fn read_page_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        debug_assert_eq!(data.len(), FRAME_SIZE);

        let (tx, rx) = std::sync::mpsc::channel();
        self.schedule(DiskRequest::read(page_id, data.as_mut_ptr()).with_completion(tx))?;

        rx.recv().map_err(|_| VellumError::SchedulerClosed)?
    }

    /// Schedules a write and blocks until it completes.
    pub fn write_page_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), FRAME_SIZE);

        let (tx, rx) = std::sync::mpsc::channel();
        self.schedule(DiskRequest::write(page_id, data.as_ptr()).with_completion(tx))?;

        rx.recv().map_err(|_| VellumError::SchedulerClosed)?
    }

    /// Closes the queue. Requests not yet picked up by the worker fail with
    /// `SchedulerClosed`; the worker exits once the queue is drained.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    fn worker_loop(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        closed: Arc<AtomicBool>,
    ) {
        loop {
            if closed.load(Ordering::Acquire) {
                // Fail whatever is still queued, then exit.
                while let Ok(request) = receiver.try_recv() {
                    Self::fail_request(request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(50)) {
                Ok(request) => Self::process_request(&disk_manager, request),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        trace!(op = ?request.op, page = %request.page_id, "processing disk request");

        let result = match request.op {
            DiskOp::Write => {
                // Safety: the submitter guarantees the buffer is FRAME_SIZE
                // bytes and stays valid until the completion fires.
                let data = unsafe { std::slice::from_raw_parts(request.data, FRAME_SIZE) };
                disk_manager.write_page(request.page_id, data)
            }
            DiskOp::Read => {
                // Safety: as above, and the submitter holds the only other
                // reference behind a write latch.
                let data = unsafe { std::slice::from_raw_parts_mut(request.data, FRAME_SIZE) };
                disk_manager.read_page(request.page_id, data)
            }
        };

        if let Some(completion) = request.completion {
            let _ = completion.send(result);
        }
    }

    fn fail_request(request: DiskRequest) {
        if let Some(completion) = request.completion {
            let _ = completion.send(Err(VellumError::SchedulerClosed));
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
