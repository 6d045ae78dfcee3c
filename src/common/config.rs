/// Size of a page frame in bytes (8 KB)
pub const FRAME_SIZE: usize = 8192;

/// Default number of frames in the buffer pool
pub const MAX_BUFFER_SIZE: usize = 128;

/// Sentinel page number used inside page bytes for "no page"
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

/// File id 0 is reserved; the catalog issues ids starting at 1
pub const RESERVED_FILE_ID: u32 = 0;
