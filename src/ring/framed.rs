use crate::core::logging::{ComponentLogger, LogContext};
use crate::ring::header::{HEADER_LEN, MAX_PAYLOAD_LEN, RecordHeader, RecordTag};
use crate::ring::primitive::{copy_in, copy_out};
use crate::ring::RingStats;

/// Result of a producer-side enqueue. Dropping is a normal outcome.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Stored { record_len: usize },
    Dropped { record_len: usize, free: usize },
}

impl Enqueue {
    pub fn is_stored(&self) -> bool {
        matches!(self, Enqueue::Stored { .. })
    }
}

/// A record taken off the ring by [`FramedRing::dequeue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dequeued {
    pub header: RecordHeader,
    /// Payload bytes actually copied; less than `header.payload_len` when the
    /// caller's buffer was too small. The rest was skipped.
    pub copied: usize,
}

/// Byte cursor handed to [`FramedRing::enqueue_with`] for writing a payload
/// straight into ring storage.
pub struct RecordWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
    remaining: usize,
}

impl RecordWriter<'_> {
    /// Appends `bytes`, silently clipped to the announced payload length.
    pub fn put(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.remaining);
        self.offset = copy_in(self.buf, self.offset, &bytes[..n]);
        self.remaining -= n;
    }

    pub fn put_u8(&mut self, byte: u8) {
        if self.remaining == 0 {
            return;
        }
        self.buf[self.offset] = byte;
        self.offset += 1;
        if self.offset == self.buf.len() {
            self.offset = 0;
        }
        self.remaining -= 1;
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

/// Fixed-capacity circular byte store holding
/// `(timestamp, tag+length, payload)` records.
///
/// Not synchronized itself: every method assumes the caller holds the lock of
/// the owning [`RecordChannel`](crate::ring::RecordChannel).
pub struct FramedRing {
    name: String,
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
    size: usize,
    enqueued: u64,
    dropped: u64,
    dropped_bytes: u64,
}

impl FramedRing {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            size: 0,
            enqueued: 0,
            dropped: 0,
            dropped_bytes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn free(&self) -> usize {
        self.buf.len() - self.size
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Records stored since construction.
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Checks whether a record with `payload_len` bytes would fit right now.
    pub fn fits(&self, payload_len: usize) -> bool {
        payload_len <= MAX_PAYLOAD_LEN && HEADER_LEN + payload_len <= self.free()
    }

    pub fn enqueue(&mut self, tag: RecordTag, payload: &[u8], timestamp: u32) -> Enqueue {
        self.enqueue_with(tag, payload.len(), timestamp, |w| w.put(payload))
    }

    /// Enqueues one record whose payload is the concatenation of `parts`.
    pub fn enqueue_parts(&mut self, tag: RecordTag, parts: &[&[u8]], timestamp: u32) -> Enqueue {
        let len = parts.iter().map(|p| p.len()).sum();
        self.enqueue_with(tag, len, timestamp, |w| {
            for part in parts {
                w.put(part);
            }
        })
    }

    /// Enqueues a record of exactly `payload_len` bytes produced by `fill`.
    ///
    /// Either the whole record is stored or nothing is. If `fill` writes fewer
    /// than `payload_len` bytes the remainder is zeroed so framing stays intact.
    pub fn enqueue_with<F>(&mut self, tag: RecordTag, payload_len: usize, timestamp: u32, fill: F) -> Enqueue
    where
        F: FnOnce(&mut RecordWriter<'_>),
    {
        let record_len = HEADER_LEN + payload_len;
        if !self.fits(payload_len) {
            let free = self.free();
            self.dropped += 1;
            self.dropped_bytes += record_len as u64;
            self.warn(&format!(
                "drop {:?} record: {} bytes, {} free",
                tag, record_len, free
            ));
            return Enqueue::Dropped { record_len, free };
        }

        let header = RecordHeader::new(tag, payload_len, timestamp);
        self.tail = copy_in(&mut self.buf, self.tail, &header.encode());

        let mut writer = RecordWriter {
            buf: &mut self.buf[..],
            offset: self.tail,
            remaining: payload_len,
        };
        fill(&mut writer);
        while writer.remaining() > 0 {
            writer.put_u8(0);
        }
        self.tail = writer.offset;

        self.size += record_len;
        self.enqueued += 1;
        Enqueue::Stored { record_len }
    }

    /// Reads the header at `head` without consuming anything.
    pub fn peek_header(&self) -> Option<RecordHeader> {
        if self.size < HEADER_LEN {
            return None;
        }
        let mut raw = [0u8; HEADER_LEN];
        copy_out(&self.buf, self.head, Some(&mut raw), HEADER_LEN);
        Some(RecordHeader::decode(&raw))
    }

    /// Takes the oldest record, copying as much payload as fits in `dst` and
    /// skipping the rest. `size` always shrinks by the full record length.
    pub fn dequeue(&mut self, dst: &mut [u8]) -> Option<Dequeued> {
        let header = self.peek_header()?;
        let copied = dst.len().min(header.payload_len);

        self.head = (self.head + HEADER_LEN) % self.capacity();
        self.head = copy_out(&self.buf, self.head, Some(&mut dst[..copied]), copied);
        self.head = copy_out(&self.buf, self.head, None, header.payload_len - copied);
        self.size = self.size.saturating_sub(header.record_len());

        Some(Dequeued { header, copied })
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.size = 0;
    }

    pub fn storage(&self) -> &[u8] {
        &self.buf
    }

    /// Overwrites the index triple. The caller has validated it.
    pub(crate) fn set_indices(&mut self, head: usize, tail: usize, size: usize) {
        self.head = head;
        self.tail = tail;
        self.size = size;
    }

    /// Number of complete records currently stored.
    pub fn records(&self) -> usize {
        let cap = self.capacity();
        let mut offset = self.head;
        let mut left = self.size;
        let mut count = 0;
        while left >= HEADER_LEN {
            let mut raw = [0u8; HEADER_LEN];
            copy_out(&self.buf, offset, Some(&mut raw), HEADER_LEN);
            let header = RecordHeader::decode(&raw);
            if header.record_len() > left {
                break;
            }
            offset = (offset + header.record_len()) % cap;
            left -= header.record_len();
            count += 1;
        }
        count
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity: self.capacity(),
            used: self.size,
            records: self.records(),
            enqueued: self.enqueued,
            dropped: self.dropped,
            dropped_bytes: self.dropped_bytes,
        }
    }
}

impl ComponentLogger for FramedRing {
    fn log_context(&self) -> LogContext {
        LogContext::new("FramedRing", &self.name)
    }
}
