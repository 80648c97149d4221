use std::sync::Arc;
use std::time::Duration;

use crate::codecs::{Codec, CodecStats, FrameInfo, ResetFlags};
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::status::{LifecycleState, Status, TS_EXIT};
use crate::core::timestamp::tick_count;
use crate::ring::{OutputLock, RecordChannel, RecordTag};

/// Buffers already-encoded records unchanged (hardware encoder output, AAC
/// from elsewhere, ...). Name and ring size are chosen by the caller.
pub struct PassthroughCodec {
    name: String,
    tag: RecordTag,
    status: Arc<Status>,
    output: RecordChannel,
}

impl PassthroughCodec {
    pub fn new(name: &str, capacity: usize, tag: RecordTag) -> Self {
        let status = Arc::new(Status::new());
        Self {
            name: name.to_string(),
            tag,
            output: RecordChannel::new(name, capacity, status.clone()),
            status,
        }
    }

    /// Stores `payload` as one record with an explicit tag, e.g. to keep the
    /// key/delta classification of a pre-encoded video stream.
    pub fn write_tagged(&self, tag: RecordTag, payload: &[u8]) {
        if self.status.is_exiting() {
            self.warn("write on destroyed codec ignored");
            return;
        }
        if !self.output.push(tag, payload, tick_count()).is_stored() {
            self.warn(&format!("{} drop data {} bytes", self.name, payload.len()));
        }
    }
}

impl Codec for PassthroughCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, input: &[u8]) {
        self.write_tagged(self.tag, input);
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Option<FrameInfo> {
        if self.status.is_exiting() {
            return None;
        }
        self.output.read(buf, timeout)
    }

    fn start(&self, running: bool) {
        if self.status.is_exiting() {
            return;
        }
        self.output.set_started(running);
    }

    fn reset(&self, flags: ResetFlags) {
        if !self.status.is_exiting()
            && flags.intersects(ResetFlags::CLEAR_INBUF | ResetFlags::CLEAR_OUTBUF)
        {
            self.output.clear();
        }
    }

    fn lock_output(&self) -> Option<OutputLock<'_>> {
        if self.status.is_exiting() {
            return None;
        }
        Some(self.output.lock_output())
    }

    fn state(&self) -> LifecycleState {
        self.status.state()
    }

    fn stats(&self) -> CodecStats {
        CodecStats {
            name: self.name.clone(),
            state: self.status.state(),
            output: self.output.stats(),
            input_dropped: 0,
            encoded: 0,
            gate_dropped: 0,
        }
    }

    fn teardown(&self) {
        if !self.status.is_exiting() {
            self.output.raise(TS_EXIT);
        }
    }
}

impl Drop for PassthroughCodec {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ComponentLogger for PassthroughCodec {
    fn log_context(&self) -> LogContext {
        LogContext::new("Codec", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_records_keep_key_classification() {
        let codec = PassthroughCodec::new("bufenc", 256, RecordTag::Buffer);
        codec.write(&[1, 2, 3]);
        codec.write_tagged(RecordTag::VideoDelta, &[4]);

        let mut buf = [0u8; 8];
        let first = codec.read(&mut buf, Duration::ZERO).unwrap();
        assert_eq!(first.tag, RecordTag::Buffer);
        assert!(first.key);
        let second = codec.read(&mut buf, Duration::ZERO).unwrap();
        assert!(!second.key);
        assert_eq!(buf[0], 4);
    }
}
