use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};

use crate::codecs::StreamHeaders;
use crate::codecs::video::{CodedUnit, PlanarImage, VideoBackend};
use crate::core::lock::lock_mutex;

/// What a [`MockVideoBackend`] saw, shared with the test after the backend
/// has moved into the encoder.
#[derive(Debug, Default)]
pub struct MockVideoLog {
    pub encoded: AtomicU64,
    pub forced_keys: Mutex<Vec<u64>>,
    pub bitrates: Mutex<Vec<u32>>,
    /// First luma byte of every encoded picture.
    pub first_bytes: Mutex<Vec<u8>>,
}

impl MockVideoLog {
    pub fn encoded(&self) -> u64 {
        self.encoded.load(Ordering::SeqCst)
    }

    pub fn forced_keys(&self) -> Vec<u64> {
        lock_mutex(&self.forced_keys, "mock forced_keys").clone()
    }

    pub fn bitrates(&self) -> Vec<u32> {
        lock_mutex(&self.bitrates, "mock bitrates").clone()
    }

    pub fn first_bytes(&self) -> Vec<u8> {
        lock_mutex(&self.first_bytes, "mock first_bytes").clone()
    }
}

/// Scripted video encoder. Emits one unit per picture whose size and key flag
/// follow the configured pattern (repeating); a forced keyframe always comes
/// out as key.
pub struct MockVideoBackend {
    key_pattern: Vec<bool>,
    unit_sizes: Vec<usize>,
    headers: StreamHeaders,
    fail_on: Option<u64>,
    index: u64,
    log: Arc<MockVideoLog>,
}

impl MockVideoBackend {
    /// Keyframe every `gop` pictures, fixed unit size.
    pub fn new(gop: usize, unit_size: usize) -> Self {
        let gop = gop.max(1);
        Self::scripted((0..gop).map(|i| i == 0).collect(), vec![unit_size])
    }

    pub fn scripted(key_pattern: Vec<bool>, unit_sizes: Vec<usize>) -> Self {
        Self {
            key_pattern,
            unit_sizes,
            headers: StreamHeaders {
                sps: vec![0x67, 0x42, 0xc0, 0x1e],
                pps: vec![0x68, 0xce, 0x3c, 0x80],
                ..StreamHeaders::default()
            },
            fail_on: None,
            index: 0,
            log: Arc::new(MockVideoLog::default()),
        }
    }

    /// Makes the `n`-th encode call (0-based) fail.
    pub fn failing_on(mut self, n: u64) -> Self {
        self.fail_on = Some(n);
        self
    }

    pub fn log(&self) -> Arc<MockVideoLog> {
        self.log.clone()
    }
}

impl VideoBackend for MockVideoBackend {
    fn encode(&mut self, picture: &PlanarImage<'_>, force_keyframe: bool) -> Result<Vec<CodedUnit>> {
        let n = self.index;
        self.index += 1;
        if self.fail_on == Some(n) {
            bail!("scripted failure at picture {}", n);
        }

        let slot = n as usize;
        let key = force_keyframe || self.key_pattern.get(slot % self.key_pattern.len().max(1)).copied().unwrap_or(false);
        let size = self.unit_sizes.get(slot % self.unit_sizes.len().max(1)).copied().unwrap_or(0);

        if force_keyframe {
            lock_mutex(&self.log.forced_keys, "mock forced_keys").push(n);
        }
        let first = picture.y.first().copied().unwrap_or(0);
        lock_mutex(&self.log.first_bytes, "mock first_bytes").push(first);
        self.log.encoded.fetch_add(1, Ordering::SeqCst);

        let mut payload = vec![first; size];
        if let Some(b) = payload.first_mut() {
            *b = if key { 0x65 } else { 0x41 };
        }
        Ok(vec![CodedUnit::new(payload, key)])
    }

    fn stream_headers(&mut self) -> Result<StreamHeaders> {
        Ok(self.headers.clone())
    }

    fn reconfigure(&mut self, bitrate: u32) -> Result<()> {
        lock_mutex(&self.log.bitrates, "mock bitrates").push(bitrate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_repeats_and_forced_key_wins() {
        let mut backend = MockVideoBackend::new(3, 10);
        let log = backend.log();
        let data = vec![9u8; 6];
        let pic = PlanarImage::i420(&data, 2, 2).unwrap();

        let keys: Vec<bool> = (0..6)
            .map(|i| backend.encode(&pic, i == 4).unwrap()[0].key)
            .collect();
        assert_eq!(keys, vec![true, false, false, true, true, false]);
        assert_eq!(log.forced_keys(), vec![4]);
        assert_eq!(log.encoded(), 6);
    }
}
