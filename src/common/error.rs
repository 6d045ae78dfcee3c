use thiserror::Error;

use super::types::{FileId, PageId};

/// Storage core error types
#[derive(Error, Debug)]
pub enum VellumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("all frames are pinned, no evictable page available")]
    AllPinned,

    #[error("disk scheduler is closed")]
    SchedulerClosed,

    #[error("unexpected end of file reading {0}")]
    UnexpectedEof(PageId),

    #[error("unknown file id: {0}")]
    UnknownFile(FileId),

    #[error("table {0:?} already exists")]
    TableExists(String),

    #[error("page is full")]
    PageFull,

    #[error("invalid slot index: {0}")]
    InvalidSlot(u16),
}

pub type Result<T> = std::result::Result<T, VellumError>;
