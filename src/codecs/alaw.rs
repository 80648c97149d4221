use std::sync::Arc;
use std::time::Duration;

use byteorder::{ByteOrder, NativeEndian};

use crate::codecs::{Codec, CodecStats, FrameInfo, ResetFlags};
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::status::{LifecycleState, Status, TS_EXIT};
use crate::core::timestamp::tick_count;
use crate::ring::{OutputLock, RecordChannel, RecordTag};

pub const ALAW_OUT_BUF_SIZE: usize = 1024;

pub fn default_capacity() -> usize {
    ALAW_OUT_BUF_SIZE
}

/// G.711 A-law compression of one 16-bit sample.
pub fn pcm_to_alaw(pcm: i16) -> u8 {
    let sign: i32 = if pcm < 0 { 0x80 } else { 0 };
    // -32768 has no positive counterpart, clamp it to the largest magnitude
    let magnitude = (pcm as i32).abs().min(0x7fff);

    let mut exponent: i32 = 7;
    let mut mask = 0x4000;
    while magnitude & mask == 0 && exponent > 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let shift = if exponent == 0 { 4 } else { exponent + 3 };
    let mantissa = (magnitude >> shift) & 0x0f;

    ((sign | (exponent << 4) | mantissa) as u8) ^ 0xd5
}

/// G.711 A-law expansion back to 16-bit linear PCM.
pub fn alaw_to_pcm(code: u8) -> i16 {
    let a = code ^ 0x55;
    let mantissa = ((a & 0x0f) as i32) << 4;
    let segment = ((a & 0x70) >> 4) as i32;
    let magnitude = match segment {
        0 => mantissa + 8,
        1 => mantissa + 0x108,
        _ => (mantissa + 0x108) << (segment - 1),
    };
    if a & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}

/// A-law audio encoder. Conversion is synchronous inside [`Codec::write`];
/// there is no worker thread, only the output ring.
pub struct AlawEncoder {
    name: String,
    status: Arc<Status>,
    output: RecordChannel,
}

impl AlawEncoder {
    pub fn new() -> Self {
        Self::with_capacity(ALAW_OUT_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let status = Arc::new(Status::new());
        let encoder = Self {
            name: "alawenc".to_string(),
            output: RecordChannel::new("alawenc.out", capacity, status.clone()),
            status,
        };
        encoder.debug(&format!("created, output ring {} bytes", capacity));
        encoder
    }

    /// Same as [`Codec::write`] for callers that already hold samples.
    pub fn write_samples(&self, pcm: &[i16]) {
        self.write(bytemuck::cast_slice(pcm));
    }

    fn destroyed(&self, op: &str) -> bool {
        if self.status.is_exiting() {
            self.warn(&format!("{} on destroyed encoder ignored", op));
            return true;
        }
        false
    }
}

impl Default for AlawEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for AlawEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, input: &[u8]) {
        if self.destroyed("write") {
            return;
        }
        let samples = input.len() / 2;
        let outcome = self
            .output
            .push_with(RecordTag::Audio, samples, tick_count(), |w| {
                for chunk in input.chunks_exact(2) {
                    w.put_u8(pcm_to_alaw(NativeEndian::read_i16(chunk)));
                }
            });
        if !outcome.is_stored() {
            self.warn(&format!("aenc drop data {} bytes", input.len()));
        }
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Option<FrameInfo> {
        if self.destroyed("read") {
            return None;
        }
        self.output.read(buf, timeout)
    }

    fn start(&self, running: bool) {
        if self.destroyed("start") {
            return;
        }
        self.output.set_started(running);
        self.info(if running { "started" } else { "stopped" });
    }

    fn reset(&self, flags: ResetFlags) {
        if self.destroyed("reset") {
            return;
        }
        // input and output share the single ring
        if flags.intersects(ResetFlags::CLEAR_INBUF | ResetFlags::CLEAR_OUTBUF) {
            self.output.clear();
            self.debug("output ring cleared");
        }
    }

    fn lock_output(&self) -> Option<OutputLock<'_>> {
        if self.destroyed("lock_output") {
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
        if self.status.is_exiting() {
            return;
        }
        self.output.raise(TS_EXIT);
        self.trace_ring(&self.output.stats());
        self.info("destroyed");
    }
}

impl Drop for AlawEncoder {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl ComponentLogger for AlawEncoder {
    fn log_context(&self) -> LogContext {
        LogContext::new("Codec", &self.name).with_stream("audio")
    }
}
