use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::status::Status;
use crate::core::sync::Signal;
use crate::ring::export::OutputLock;
use crate::ring::framed::{Enqueue, FramedRing, RecordWriter};
use crate::ring::header::RecordTag;
use crate::ring::RingStats;

/// What a consumer learns about the record it just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// Bytes copied into the caller's buffer.
    pub copied: usize,
    /// True payload length of the record; `copied < frame_size` means the
    /// record was truncated, not that something failed.
    pub frame_size: usize,
    pub key: bool,
    pub pts: u32,
    pub tag: RecordTag,
}

impl FrameInfo {
    pub fn is_truncated(&self) -> bool {
        self.copied < self.frame_size
    }
}

/// Producer/consumer synchronizer over one [`FramedRing`].
///
/// Producers never block: a record is either stored (and the waiting reader
/// signaled) or dropped. The single reader blocks up to a caller-chosen
/// timeout, and is released early when the owning codec stops.
pub struct RecordChannel {
    ring: Signal<FramedRing>,
    status: Arc<Status>,
}

impl RecordChannel {
    pub fn new(name: &str, capacity: usize, status: Arc<Status>) -> Self {
        Self {
            ring: Signal::new(FramedRing::new(name, capacity), "record channel"),
            status,
        }
    }

    pub fn push(&self, tag: RecordTag, payload: &[u8], timestamp: u32) -> Enqueue {
        self.with_ring(|ring| ring.enqueue(tag, payload, timestamp))
    }

    pub fn push_with<F>(&self, tag: RecordTag, payload_len: usize, timestamp: u32, fill: F) -> Enqueue
    where
        F: FnOnce(&mut RecordWriter<'_>),
    {
        self.with_ring(|ring| ring.enqueue_with(tag, payload_len, timestamp, fill))
    }

    /// Runs `f` under the ring lock and signals the reader if `f` stored
    /// anything.
    pub fn with_ring<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut FramedRing) -> R,
    {
        let mut ring = self.ring.lock();
        let before = ring.enqueued();
        let result = f(&mut *ring);
        if ring.enqueued() != before {
            self.ring.notify();
        }
        result
    }

    /// Takes the next record, waiting up to `timeout` while the ring is empty
    /// and the owner is started. A zero timeout polls.
    pub fn read(&self, dst: &mut [u8], timeout: Duration) -> Option<FrameInfo> {
        let mut ring = self.ring.lock();
        if !timeout.is_zero() {
            let status = &self.status;
            ring = self.ring.wait_while_for(ring, timeout, |ring| {
                ring.is_empty() && status.is_started() && !status.is_exiting()
            });
        }

        let record = ring.dequeue(dst)?;
        Some(FrameInfo {
            copied: record.copied,
            frame_size: record.header.payload_len,
            key: record.header.tag.is_key(),
            pts: record.header.timestamp,
            tag: record.header.tag,
        })
    }

    /// Flips the started flag under the lock and wakes a blocked reader.
    pub fn set_started(&self, started: bool) {
        let _ring = self.ring.lock();
        self.status.set_started(started);
        self.ring.notify_all();
    }

    /// Sets `flag` under the lock and wakes a blocked reader.
    pub fn raise(&self, flag: u8) {
        let _ring = self.ring.lock();
        self.status.set(flag);
        self.ring.notify_all();
    }

    pub fn clear(&self) {
        self.ring.lock().clear();
    }

    pub fn lock_output(&self) -> OutputLock<'_> {
        OutputLock::new(self.ring.lock())
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn stats(&self) -> RingStats {
        self.ring.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn channel(capacity: usize) -> (RecordChannel, Arc<Status>) {
        let status = Arc::new(Status::new());
        (RecordChannel::new("test", capacity, status.clone()), status)
    }

    #[test]
    fn zero_timeout_polls() {
        let (ch, _status) = channel(64);
        ch.set_started(true);
        let start = Instant::now();
        assert!(ch.read(&mut [0u8; 8], Duration::ZERO).is_none());
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn read_returns_buffered_record_when_not_started() {
        let (ch, _status) = channel(64);
        assert!(ch.push(RecordTag::Audio, &[1, 2], 3).is_stored());
        let info = ch.read(&mut [0u8; 8], Duration::from_secs(5)).unwrap();
        assert_eq!(info.frame_size, 2);
        assert_eq!(info.pts, 3);
        assert!(info.key);
    }

    #[test]
    fn not_started_does_not_wait() {
        let (ch, _status) = channel(64);
        let start = Instant::now();
        assert!(ch.read(&mut [0u8; 8], Duration::from_secs(5)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn truncation_is_reported() {
        let (ch, _status) = channel(64);
        assert!(ch.push(RecordTag::VideoDelta, &[9; 10], 1).is_stored());
        let mut small = [0u8; 4];
        let info = ch.read(&mut small, Duration::ZERO).unwrap();
        assert!(info.is_truncated());
        assert_eq!(info.copied, 4);
        assert_eq!(info.frame_size, 10);
        assert!(!info.key);
        assert!(ch.is_empty());
    }
}
