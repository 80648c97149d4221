// src/lib.rs
pub mod codecs;
pub mod config;
pub mod core;
pub mod ring;
pub mod testing;

// Re-export die wichtigsten Typen
pub use crate::codecs::alaw::AlawEncoder;
pub use crate::codecs::h264::H264Encoder;
pub use crate::codecs::passthrough::PassthroughCodec;
pub use crate::codecs::{Codec, CodecConfig, CodecStats, FrameInfo, ResetFlags, StreamHeaders};
pub use crate::core::{ComponentLogger, LifecycleState, LogContext};
pub use crate::core::timestamp::tick_count;
pub use crate::ring::{FramedRing, OutputLock, RecordTag, RingStats};
