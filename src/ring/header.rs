use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Timestamp (4) + type/length (4).
pub const HEADER_LEN: usize = 8;

/// Largest payload the 24 length bits can describe.
pub const MAX_PAYLOAD_LEN: usize = (1 << 24) - 1;

/// Stream content tag stored in the low byte of the type/length word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTag {
    Audio,
    VideoKey,
    VideoDelta,
    Buffer,
    Other(u8),
}

impl RecordTag {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'A' => RecordTag::Audio,
            b'V' => RecordTag::VideoKey,
            b'v' => RecordTag::VideoDelta,
            b'B' => RecordTag::Buffer,
            other => RecordTag::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            RecordTag::Audio => b'A',
            RecordTag::VideoKey => b'V',
            RecordTag::VideoDelta => b'v',
            RecordTag::Buffer => b'B',
            RecordTag::Other(byte) => byte,
        }
    }

    /// Only video delta frames depend on an earlier record.
    pub fn is_key(self) -> bool {
        !matches!(self, RecordTag::VideoDelta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub timestamp: u32,
    pub tag: RecordTag,
    pub payload_len: usize,
}

impl RecordHeader {
    pub fn new(tag: RecordTag, payload_len: usize, timestamp: u32) -> Self {
        Self {
            timestamp,
            tag,
            payload_len,
        }
    }

    /// Header plus payload, i.e. what the record occupies in a ring.
    pub fn record_len(&self) -> usize {
        HEADER_LEN + self.payload_len
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        debug_assert!(self.payload_len <= MAX_PAYLOAD_LEN);
        let mut out = [0u8; HEADER_LEN];
        let type_and_length = self.tag.as_byte() as u32 | ((self.payload_len as u32) << 8);
        LittleEndian::write_u32(&mut out[..4], self.timestamp);
        LittleEndian::write_u32(&mut out[4..], type_and_length);
        out
    }

    pub fn decode(raw: &[u8; HEADER_LEN]) -> Self {
        let timestamp = LittleEndian::read_u32(&raw[..4]);
        let type_and_length = LittleEndian::read_u32(&raw[4..]);
        Self {
            timestamp,
            tag: RecordTag::from_byte((type_and_length & 0xff) as u8),
            payload_len: (type_and_length >> 8) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_matches_wire_format() {
        let header = RecordHeader::new(RecordTag::VideoKey, 0x012345, 0xdeadbeef);
        let raw = header.encode();
        assert_eq!(&raw[..4], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(raw[4], b'V');
        assert_eq!(&raw[5..], &[0x45, 0x23, 0x01]);
        assert_eq!(RecordHeader::decode(&raw), header);
    }

    #[test]
    fn unknown_tags_survive() {
        let header = RecordHeader::new(RecordTag::from_byte(b'x'), 3, 1);
        let decoded = RecordHeader::decode(&header.encode());
        assert_eq!(decoded.tag, RecordTag::Other(b'x'));
        assert!(decoded.tag.is_key());
    }

    #[test]
    fn only_delta_is_not_key() {
        assert!(RecordTag::Audio.is_key());
        assert!(RecordTag::VideoKey.is_key());
        assert!(!RecordTag::VideoDelta.is_key());
    }
}
