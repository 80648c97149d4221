use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::codecs::StreamHeaders;

/// Video encoder construction parameters. `bitrate` is in bit/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bitrate: u32,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_tune")]
    pub tune: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_out_capacity")]
    pub capacity: usize,
}

pub const H264_OUT_BUF_SIZE: usize = 2 * 1024 * 1024;

fn default_preset() -> String {
    "ultrafast".to_string()
}

fn default_tune() -> String {
    "zerolatency".to_string()
}

fn default_profile() -> String {
    "baseline".to_string()
}

fn default_out_capacity() -> usize {
    H264_OUT_BUF_SIZE
}

impl VideoParams {
    pub fn new(width: u32, height: u32, frame_rate: u32, bitrate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
            bitrate,
            preset: default_preset(),
            tune: default_tune(),
            profile: default_profile(),
            capacity: default_out_capacity(),
        }
    }

    /// Bytes of one I420 picture.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3 / 2
    }

    pub fn keyint_min(&self) -> u32 {
        self.frame_rate * 2
    }

    pub fn keyint_max(&self) -> u32 {
        self.frame_rate * 5
    }

    /// VBV max rate and buffer size, both in bit/s.
    pub fn vbv_bitrate(&self) -> u32 {
        self.bitrate.saturating_mul(2)
    }
}

/// I420 view over one raw input slot.
#[derive(Debug, Clone, Copy)]
pub struct PlanarImage<'a> {
    pub width: usize,
    pub height: usize,
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
}

impl<'a> PlanarImage<'a> {
    /// Splits a contiguous I420 buffer into its three planes.
    pub fn i420(data: &'a [u8], width: usize, height: usize) -> Option<Self> {
        let luma = width * height;
        if data.len() < luma * 3 / 2 {
            return None;
        }
        Some(Self {
            width,
            height,
            y: &data[..luma],
            u: &data[luma..luma * 5 / 4],
            v: &data[luma * 5 / 4..luma * 3 / 2],
        })
    }

    pub fn stride(&self, plane: usize) -> usize {
        if plane == 0 { self.width } else { self.width / 2 }
    }

    pub fn plane(&self, plane: usize) -> &'a [u8] {
        match plane {
            0 => self.y,
            1 => self.u,
            _ => self.v,
        }
    }
}

/// One coded access unit (or NAL unit) as produced by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedUnit {
    pub payload: Vec<u8>,
    pub key: bool,
}

impl CodedUnit {
    pub fn new(payload: Vec<u8>, key: bool) -> Self {
        Self { payload, key }
    }
}

/// External video encoder driven by the encode worker.
///
/// `encode` may return nothing while the encoder buffers. A frame counts as a
/// keyframe when its first unit is tagged key.
pub trait VideoBackend: Send + 'static {
    fn encode(&mut self, picture: &PlanarImage<'_>, force_keyframe: bool) -> Result<Vec<CodedUnit>>;

    /// Parameter sets for out-of-band signaling, read once at construction.
    fn stream_headers(&mut self) -> Result<StreamHeaders>;

    fn reconfigure(&mut self, bitrate: u32) -> Result<()>;
}

// ---------- Annex-B helpers ----------

pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;

pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| b & 0x1f)
}

/// Splits an Annex-B byte stream into NAL units without start codes.
pub fn split_annexb(data: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut nals = Vec::with_capacity(starts.len());
    for (n, &(_, begin)) in starts.iter().enumerate() {
        let mut end = starts.get(n + 1).map_or(data.len(), |&(next, _)| next);
        // 4-byte start code: the zero belongs to the next prefix
        while end > begin && data[end - 1] == 0 && n + 1 < starts.len() {
            end -= 1;
        }
        if end > begin {
            nals.push(&data[begin..end]);
        }
    }
    nals
}

/// Picks SPS and PPS out of an Annex-B parameter-set blob.
pub fn headers_from_annexb(data: &[u8]) -> StreamHeaders {
    let mut headers = StreamHeaders::default();
    for nal in split_annexb(data) {
        match nal_type(nal) {
            Some(NAL_SPS) if headers.sps.is_empty() => headers.sps = super::capped_blob(nal),
            Some(NAL_PPS) if headers.pps.is_empty() => headers.pps = super::capped_blob(nal),
            _ => {}
        }
    }
    headers
}
