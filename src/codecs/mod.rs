use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use anyhow::Result;
#[cfg(not(feature = "ffmpeg"))]
use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::core::status::LifecycleState;
use crate::ring::{OutputLock, RecordTag, RingStats};

pub mod alaw;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod gate;
pub mod h264;
pub mod passthrough;
pub mod video;

pub use crate::ring::FrameInfo;

/// Largest parameter-set blob kept for out-of-band signaling.
pub const MAX_HEADER_BLOB: usize = 255;

/// Composable reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ResetFlags(u8);

impl ResetFlags {
    pub const CLEAR_INBUF: ResetFlags = ResetFlags(1 << 0);
    pub const CLEAR_OUTBUF: ResetFlags = ResetFlags(1 << 1);
    pub const REQUEST_IDR: ResetFlags = ResetFlags(1 << 2);

    pub const fn empty() -> Self {
        ResetFlags(0)
    }

    pub const fn all() -> Self {
        ResetFlags(0b111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are ignored.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        ResetFlags(bits & 0b111)
    }

    pub const fn contains(self, other: ResetFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: ResetFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ResetFlags {
    type Output = ResetFlags;

    fn bitor(self, rhs: ResetFlags) -> ResetFlags {
        ResetFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResetFlags {
    fn bitor_assign(&mut self, rhs: ResetFlags) {
        self.0 |= rhs.0;
    }
}

/// Out-of-band stream configuration blobs, each at most
/// [`MAX_HEADER_BLOB`] bytes. Empty when the codec has none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamHeaders {
    pub aac: Vec<u8>,
    pub vps: Vec<u8>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

impl StreamHeaders {
    pub fn is_empty(&self) -> bool {
        self.aac.is_empty() && self.vps.is_empty() && self.sps.is_empty() && self.pps.is_empty()
    }
}

/// Clips a parameter-set blob to [`MAX_HEADER_BLOB`] bytes.
pub fn capped_blob(data: &[u8]) -> Vec<u8> {
    data[..data.len().min(MAX_HEADER_BLOB)].to_vec()
}

#[derive(Debug, Clone, Serialize)]
pub struct CodecStats {
    pub name: String,
    pub state: LifecycleState,
    pub output: RingStats,
    /// Raw frames refused because the input queue was full.
    pub input_dropped: u64,
    /// Frames the encoder produced output for.
    pub encoded: u64,
    /// Delta frames suppressed after a lost keyframe.
    pub gate_dropped: u64,
}

/// Uniform capability set of every encoder variant.
///
/// All methods take `&self`: one thread writes, another reads, and both share
/// the instance through an `Arc`. Producer-side calls never block on buffer
/// state and never fail; saturation is logged and counted.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// Accepts one unit of raw input (PCM bytes or one planar image).
    fn write(&self, input: &[u8]);

    /// Reads the next record into `buf`, waiting up to `timeout` while the
    /// output is empty and the codec is running. `None` means no data.
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Option<FrameInfo>;

    /// Starting keeps buffered data; stopping releases a blocked reader.
    fn start(&self, running: bool);

    fn reset(&self, flags: ResetFlags);

    /// Best-effort bitrate change in bit/s. No-op where unsupported.
    fn reconfigure(&self, _bitrate: u32) {}

    /// Zero-copy access to the output ring. `None` once destroyed.
    fn lock_output(&self) -> Option<OutputLock<'_>>;

    fn stream_headers(&self) -> StreamHeaders {
        StreamHeaders::default()
    }

    fn state(&self) -> LifecycleState;

    fn stats(&self) -> CodecStats;

    /// Stops workers and releases resources. Idempotent; also run on drop.
    fn teardown(&self);
}

/// An absent instance accepts every call and does nothing.
impl<C: Codec> Codec for Option<C> {
    fn name(&self) -> &str {
        self.as_ref().map_or("", |c| c.name())
    }

    fn write(&self, input: &[u8]) {
        if let Some(c) = self {
            c.write(input);
        }
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Option<FrameInfo> {
        self.as_ref().and_then(|c| c.read(buf, timeout))
    }

    fn start(&self, running: bool) {
        if let Some(c) = self {
            c.start(running);
        }
    }

    fn reset(&self, flags: ResetFlags) {
        if let Some(c) = self {
            c.reset(flags);
        }
    }

    fn reconfigure(&self, bitrate: u32) {
        if let Some(c) = self {
            c.reconfigure(bitrate);
        }
    }

    fn lock_output(&self) -> Option<OutputLock<'_>> {
        self.as_ref().and_then(|c| c.lock_output())
    }

    fn stream_headers(&self) -> StreamHeaders {
        self.as_ref().map(|c| c.stream_headers()).unwrap_or_default()
    }

    fn state(&self) -> LifecycleState {
        self.as_ref().map_or(LifecycleState::Destroyed, |c| c.state())
    }

    fn stats(&self) -> CodecStats {
        match self {
            Some(c) => c.stats(),
            None => CodecStats {
                name: String::new(),
                state: LifecycleState::Destroyed,
                output: RingStats::default(),
                input_dropped: 0,
                encoded: 0,
                gate_dropped: 0,
            },
        }
    }

    fn teardown(&self) {
        if let Some(c) = self {
            c.teardown();
        }
    }
}

/// Codec construction parameters as they appear in configuration files.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CodecConfig {
    Alaw {
        #[serde(default = "alaw::default_capacity")]
        capacity: usize,
    },
    Passthrough {
        name: String,
        capacity: usize,
        #[serde(default = "default_passthrough_tag")]
        tag: RecordTag,
    },
    H264(video::VideoParams),
}

impl CodecConfig {
    pub fn build(&self) -> Result<Box<dyn Codec>> {
        match self {
            CodecConfig::Alaw { capacity } => Ok(Box::new(alaw::AlawEncoder::with_capacity(*capacity))),
            CodecConfig::Passthrough { name, capacity, tag } => {
                Ok(Box::new(passthrough::PassthroughCodec::new(name, *capacity, *tag)))
            }
            #[cfg(feature = "ffmpeg")]
            CodecConfig::H264(params) => {
                let backend = ffmpeg::X264Backend::open(params)?;
                Ok(Box::new(h264::H264Encoder::new(params.clone(), backend)?))
            }
            #[cfg(not(feature = "ffmpeg"))]
            CodecConfig::H264(_) => bail!("h264 encoder requires the 'ffmpeg' feature"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CodecConfig::Alaw { .. } => "alaw",
            CodecConfig::Passthrough { .. } => "passthrough",
            CodecConfig::H264(_) => "h264",
        }
    }
}

fn default_passthrough_tag() -> RecordTag {
    RecordTag::Buffer
}
