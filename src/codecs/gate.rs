use crate::core::status::{Status, TS_KEYFRAME_DROPPED};
use crate::ring::{FramedRing, RecordTag};

/// Outcome of offering one encoded frame to the output ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Stored,
    /// No room in the ring.
    Dropped,
    /// Delta frame discarded because the keyframe it depends on was lost.
    Suppressed,
}

/// Keeps the key -> delta dependency chain intact on the output side.
///
/// When a keyframe does not fit, every following delta frame is discarded
/// until a keyframe is stored again. Lost delta frames are not remembered.
/// The state is the `TS_KEYFRAME_DROPPED` bit of the owner's [`Status`].
pub struct KeyframeGate<'a> {
    status: &'a Status,
}

impl<'a> KeyframeGate<'a> {
    pub fn new(status: &'a Status) -> Self {
        Self { status }
    }

    pub fn is_blocked(&self) -> bool {
        self.status.contains(TS_KEYFRAME_DROPPED)
    }

    /// Offers one frame made of `parts`. Must be called with the ring lock held.
    pub fn offer(&self, ring: &mut FramedRing, key: bool, parts: &[&[u8]], timestamp: u32) -> Publish {
        if self.is_blocked() && !key {
            return Publish::Suppressed;
        }

        let tag = if key { RecordTag::VideoKey } else { RecordTag::VideoDelta };
        if ring.enqueue_parts(tag, parts, timestamp).is_stored() {
            if key {
                self.status.clear(TS_KEYFRAME_DROPPED);
            }
            Publish::Stored
        } else {
            if key {
                self.status.set(TS_KEYFRAME_DROPPED);
            }
            Publish::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_keyframe_blocks_deltas_until_next_keyframe() {
        let status = Status::new();
        let gate = KeyframeGate::new(&status);
        let mut ring = FramedRing::new("test", 64);

        // fill the ring so the keyframe cannot fit
        assert!(ring.enqueue(RecordTag::VideoKey, &[0; 40], 0).is_stored());
        assert_eq!(gate.offer(&mut ring, true, &[&[1u8; 20][..]], 1), Publish::Dropped);
        assert!(gate.is_blocked());

        ring.clear();
        for ts in 2..5 {
            assert_eq!(gate.offer(&mut ring, false, &[&[2u8; 4][..]], ts), Publish::Suppressed);
        }
        assert!(ring.is_empty());

        assert_eq!(gate.offer(&mut ring, true, &[&[3u8; 4][..]], 5), Publish::Stored);
        assert!(!gate.is_blocked());
        assert_eq!(gate.offer(&mut ring, false, &[&[4u8; 4][..]], 6), Publish::Stored);
        assert_eq!(ring.records(), 2);
    }

    #[test]
    fn lost_delta_is_not_remembered() {
        let status = Status::new();
        let gate = KeyframeGate::new(&status);
        let mut ring = FramedRing::new("test", 16);

        assert_eq!(gate.offer(&mut ring, false, &[&[0u8; 20][..]], 0), Publish::Dropped);
        assert!(!gate.is_blocked());
        assert_eq!(gate.offer(&mut ring, false, &[&[0u8; 4][..]], 1), Publish::Stored);
    }
}
