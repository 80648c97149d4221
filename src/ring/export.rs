use std::sync::MutexGuard;

use anyhow::{Result, bail};

use crate::ring::framed::FramedRing;
use crate::ring::header::{HEADER_LEN, RecordHeader};
use crate::ring::primitive::{copy_out, slices_at};

/// One record viewed in place. `payload.1` is non-empty only when the payload
/// wraps past the end of storage.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    pub header: RecordHeader,
    pub payload: (&'a [u8], &'a [u8]),
}

impl RecordView<'_> {
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.payload_len);
        out.extend_from_slice(self.payload.0);
        out.extend_from_slice(self.payload.1);
        out
    }
}

/// Zero-copy access to an output ring.
///
/// Holding an `OutputLock` holds the ring mutex: producers block on it until
/// the lock is committed or dropped. Dropping without [`commit`](Self::commit)
/// releases the ring unchanged.
pub struct OutputLock<'a> {
    ring: MutexGuard<'a, FramedRing>,
    head: usize,
    size: usize,
}

impl<'a> OutputLock<'a> {
    pub(crate) fn new(ring: MutexGuard<'a, FramedRing>) -> Self {
        let head = ring.head();
        let size = ring.len();
        Self { ring, head, size }
    }

    /// Raw ring storage. Must not outlive the lock.
    pub fn storage(&self) -> &[u8] {
        self.ring.storage()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Read offset as of lock time (not advanced by [`next_record`](Self::next_record)).
    pub fn head(&self) -> usize {
        self.ring.head()
    }

    pub fn tail(&self) -> usize {
        self.ring.tail()
    }

    pub fn size(&self) -> usize {
        self.ring.len()
    }

    /// Walks to the next record after the locally consumed ones, advancing the
    /// local head/size. Nothing changes in the ring until
    /// [`commit_local`](Self::commit_local).
    pub fn next_record(&mut self) -> Option<RecordView<'_>> {
        if self.size < HEADER_LEN {
            return None;
        }
        let storage = self.ring.storage();
        let cap = storage.len();
        let mut raw = [0u8; HEADER_LEN];
        let payload_at = copy_out(storage, self.head, Some(&mut raw), HEADER_LEN);
        let header = RecordHeader::decode(&raw);
        if header.record_len() > self.size {
            return None;
        }

        self.head = (payload_at + header.payload_len) % cap;
        self.size -= header.record_len();

        Some(RecordView {
            header,
            payload: slices_at(self.ring.storage(), payload_at, header.payload_len),
        })
    }

    /// Writes back caller-advanced indices and releases the ring.
    pub fn commit(mut self, head: usize, tail: usize, size: usize) -> Result<()> {
        validate(self.ring.capacity(), head, tail, size)?;
        self.ring.set_indices(head, tail, size);
        Ok(())
    }

    /// Commits what [`next_record`](Self::next_record) consumed.
    pub fn commit_local(self) -> Result<()> {
        let (head, size) = (self.head, self.size);
        let tail = self.ring.tail();
        self.commit(head, tail, size)
    }
}

fn validate(capacity: usize, head: usize, tail: usize, size: usize) -> Result<()> {
    if capacity == 0 {
        if head != 0 || tail != 0 || size != 0 {
            bail!("non-zero indices for an empty ring");
        }
        return Ok(());
    }
    if head >= capacity || tail >= capacity {
        bail!("offsets out of range: head={} tail={} capacity={}", head, tail, capacity);
    }
    if size > capacity {
        bail!("size {} exceeds capacity {}", size, capacity);
    }
    // a full ring has head == tail as well
    if (head + size) % capacity != tail {
        bail!("inconsistent indices: head={} size={} tail={}", head, size, tail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::header::RecordTag;
    use std::sync::Mutex;

    fn filled(capacity: usize, records: &[&[u8]]) -> Mutex<FramedRing> {
        let mut ring = FramedRing::new("test", capacity);
        for (i, payload) in records.iter().enumerate() {
            assert!(ring.enqueue(RecordTag::Audio, payload, i as u32).is_stored());
        }
        Mutex::new(ring)
    }

    #[test]
    fn walk_and_commit_local() {
        let ring = filled(64, &[&[1, 2], &[3]]);
        {
            let mut lock = OutputLock::new(ring.lock().unwrap());
            let first = lock.next_record().unwrap();
            assert_eq!(first.header.timestamp, 0);
            assert_eq!(first.to_vec(), vec![1, 2]);
            lock.commit_local().unwrap();
        }
        let ring = ring.lock().unwrap();
        assert_eq!(ring.len(), 9);
        assert_eq!(ring.head(), 10);
    }

    #[test]
    fn drop_without_commit_leaves_ring_unchanged() {
        let ring = filled(64, &[&[1, 2]]);
        {
            let mut lock = OutputLock::new(ring.lock().unwrap());
            assert!(lock.next_record().is_some());
            assert!(lock.next_record().is_none());
        }
        assert_eq!(ring.lock().unwrap().len(), 10);
    }

    #[test]
    fn inconsistent_commit_is_rejected() {
        let ring = filled(64, &[&[1, 2]]);
        let lock = OutputLock::new(ring.lock().unwrap());
        assert!(lock.commit(0, 3, 10).is_err());
        assert_eq!(ring.lock().unwrap().len(), 10);
    }

    #[test]
    fn wrapped_payload_is_split() {
        let mut ring = FramedRing::new("test", 20);
        ring.enqueue(RecordTag::Audio, &[0; 2], 0).is_stored();
        ring.dequeue(&mut [0u8; 2]).unwrap();
        ring.enqueue(RecordTag::Audio, &[1, 2, 3, 4, 5, 6, 7, 8], 1).is_stored();
        let ring = Mutex::new(ring);

        let mut lock = OutputLock::new(ring.lock().unwrap());
        let view = lock.next_record().unwrap();
        assert_eq!(view.header.payload_len, 8);
        assert_eq!(view.payload.0, &[1, 2]);
        assert_eq!(view.payload.1, &[3, 4, 5, 6, 7, 8]);
        assert_eq!(view.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
