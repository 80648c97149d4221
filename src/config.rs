use serde::{Deserialize, Serialize};
use std::fs;

use anyhow::{bail, Context};

use crate::codecs::alaw::ALAW_OUT_BUF_SIZE;
use crate::codecs::video::{H264_OUT_BUF_SIZE, VideoParams};

// ---------- Audio ----------
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AudioConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture block length; one block becomes one A-law record.
    pub frame_ms: u32,
    /// Test tone when no WAV input is given.
    pub tone_hz: f32,
    pub capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 8000,
            channels: 1,
            frame_ms: 20,
            tone_hz: 440.0,
            capacity: ALAW_OUT_BUF_SIZE,
        }
    }
}

impl AudioConfig {
    /// Samples (all channels) per capture block.
    pub fn block_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize / 1000) * self.channels as usize
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate == 0 {
            bail!("audio.sample_rate must be > 0");
        }
        if self.channels == 0 {
            bail!("audio.channels must be > 0");
        }
        if self.frame_ms == 0 {
            bail!("audio.frame_ms must be > 0");
        }
        if self.capacity == 0 {
            bail!("audio.capacity must be > 0");
        }
        Ok(())
    }
}

// ---------- Video ----------
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// bit/s
    pub bitrate: u32,
    pub preset: String,
    pub tune: String,
    pub profile: String,
    pub capacity: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        let params = VideoParams::new(640, 360, 25, 800_000);
        Self {
            enabled: false,
            width: params.width,
            height: params.height,
            frame_rate: params.frame_rate,
            bitrate: params.bitrate,
            preset: params.preset,
            tune: params.tune,
            profile: params.profile,
            capacity: H264_OUT_BUF_SIZE,
        }
    }
}

impl VideoConfig {
    pub fn params(&self) -> VideoParams {
        VideoParams {
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            bitrate: self.bitrate,
            preset: self.preset.clone(),
            tune: self.tune.clone(),
            profile: self.profile.clone(),
            capacity: self.capacity,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("video size must be > 0");
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            bail!("video size {}x{} must be even", self.width, self.height);
        }
        if self.frame_rate == 0 {
            bail!("video.frame_rate must be > 0");
        }
        if self.bitrate == 0 {
            bail!("video.bitrate must be > 0");
        }
        if self.capacity == 0 {
            bail!("video.capacity must be > 0");
        }
        Ok(())
    }
}

// ---------- Consumer ----------
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConsumerConfig {
    pub read_timeout_ms: u64,
    pub max_frame_bytes: usize,
    /// 0 disables the periodic stats dump.
    pub stats_interval_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            max_frame_bytes: 64 * 1024,
            stats_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.audio.enabled {
            self.audio.validate()?;
        }
        if self.video.enabled {
            self.video.validate()?;
        }
        if self.consumer.max_frame_bytes == 0 {
            bail!("consumer.max_frame_bytes must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.audio.block_samples(), 160);
        assert_eq!(cfg.video.params().keyint_max(), 125);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = Config::parse(
            r#"
            [audio]
            enabled = true
            sample_rate = 16000
            channels = 2
            frame_ms = 10
            tone_hz = 1000.0
            capacity = 4096

            [consumer]
            read_timeout_ms = 20
            max_frame_bytes = 1024
            stats_interval_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.audio.block_samples(), 320);
        assert_eq!(cfg.consumer.read_timeout_ms, 20);
        assert!(!cfg.video.enabled);
    }

    #[test]
    fn odd_video_size_is_rejected_when_enabled() {
        let mut cfg = Config::default();
        cfg.video.width = 641;
        assert!(cfg.validate().is_ok());
        cfg.video.enabled = true;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("even"));
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!("airlift-encoder-{}.toml", std::process::id()));
        let path = path.to_str().unwrap();
        let mut cfg = Config::default();
        cfg.consumer.read_timeout_ms = 42;
        cfg.save(path).unwrap();
        let loaded = Config::load(path).unwrap();
        std::fs::remove_file(path).ok();
        assert_eq!(loaded, cfg);
    }
}
