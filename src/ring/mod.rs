// src/ring/mod.rs
pub mod channel;
pub mod export;
pub mod framed;
pub mod header;
pub mod primitive;

use serde::Serialize;

pub use channel::{FrameInfo, RecordChannel};
pub use export::{OutputLock, RecordView};
pub use framed::{Dequeued, Enqueue, FramedRing, RecordWriter};
pub use header::{HEADER_LEN, MAX_PAYLOAD_LEN, RecordHeader, RecordTag};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub capacity: usize,
    /// Occupied bytes, headers included.
    pub used: usize,
    pub records: usize,
    pub enqueued: u64,
    pub dropped: u64,
    pub dropped_bytes: u64,
}
