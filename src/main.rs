// src/main.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use log::{debug, error, info, warn};

use airlift_encoder::codecs::video::VideoParams;
use airlift_encoder::core::timestamp::{tick_count, ticks_between};
use airlift_encoder::config::{AudioConfig, Config, ConsumerConfig};
use airlift_encoder::{Codec, CodecConfig};

struct Args {
    config: Option<String>,
    wav: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args { config: None, wav: None };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--wav" => args.wav = Some(it.next().context("--wav needs a file")?),
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => args.config = Some(other.to_string()),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let args = parse_args()?;
    let cfg = match &args.config {
        Some(path) => {
            let cfg = Config::load(path)?;
            info!("[encoder] loaded {}", path);
            cfg
        }
        None => {
            info!("[encoder] no config given, using defaults");
            Config::default()
        }
    };

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("\n[encoder] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    // ------------------------------------------------------------
    // Codecs
    // ------------------------------------------------------------
    let mut codecs: Vec<Arc<dyn Codec>> = Vec::new();
    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    if cfg.audio.enabled {
        let codec: Arc<dyn Codec> = Arc::from(CodecConfig::Alaw { capacity: cfg.audio.capacity }.build()?);
        codec.start(true);
        threads.push(start_audio_in(&cfg.audio, args.wav.clone(), codec.clone(), running.clone())?);
        threads.push(start_consumer(&cfg.consumer, codec.clone(), running.clone()));
        codecs.push(codec);
    }

    if cfg.video.enabled {
        match CodecConfig::H264(cfg.video.params()).build() {
            Ok(codec) => {
                let codec: Arc<dyn Codec> = Arc::from(codec);
                let headers = codec.stream_headers();
                info!("[encoder] h264 sps={}B pps={}B", headers.sps.len(), headers.pps.len());
                codec.start(true);
                threads.push(start_video_in(cfg.video.params(), codec.clone(), running.clone()));
                threads.push(start_consumer(&cfg.consumer, codec.clone(), running.clone()));
                codecs.push(codec);
            }
            Err(e) => warn!("[encoder] video disabled: {:#}", e),
        }
    }

    if codecs.is_empty() {
        bail!("nothing to do, audio and video are disabled");
    }

    // ------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------
    info!("[encoder] running - Ctrl+C to stop");

    let stats_every = Duration::from_millis(cfg.consumer.stats_interval_ms);
    let mut last_stats = Instant::now();

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));

        if !stats_every.is_zero() && last_stats.elapsed() >= stats_every {
            for codec in &codecs {
                match serde_json::to_string(&codec.stats()) {
                    Ok(json) => info!("[stats] {}", json),
                    Err(e) => error!("[stats] serialize failed: {}", e),
                }
            }
            last_stats = Instant::now();
        }
    }

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[encoder] shutting down…");
    for codec in &codecs {
        // releases blocked readers
        codec.start(false);
    }
    for handle in threads {
        if handle.join().is_err() {
            error!("[encoder] worker thread panicked");
        }
    }
    for codec in &codecs {
        codec.teardown();
    }
    info!("[encoder] shutdown complete");

    Ok(())
}

//
// ============================================================
// START_* HELPERS
// ============================================================
//

fn start_audio_in(
    cfg: &AudioConfig,
    wav: Option<String>,
    codec: Arc<dyn Codec>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let block = cfg.block_samples();
    let period = Duration::from_millis(cfg.frame_ms as u64);

    let source: Box<dyn Iterator<Item = i16> + Send> = match wav {
        Some(path) => {
            let reader = hound::WavReader::open(&path).with_context(|| format!("failed to open {}", path))?;
            let spec = reader.spec();
            if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
                bail!("{}: only 16-bit integer PCM is supported", path);
            }
            if spec.sample_rate != cfg.sample_rate || spec.channels != cfg.channels {
                warn!(
                    "[audio] {} is {} Hz / {} ch, config says {} Hz / {} ch",
                    path, spec.sample_rate, spec.channels, cfg.sample_rate, cfg.channels
                );
            }
            info!("[audio] playing {}", path);
            let samples: Vec<i16> = reader
                .into_samples::<i16>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path))?;
            Box::new(samples.into_iter())
        }
        None => Box::new(sine(cfg.tone_hz, cfg.sample_rate, cfg.channels)),
    };

    let handle = std::thread::Builder::new()
        .name("audio-in".to_string())
        .spawn(move || {
            let mut source = source.peekable();
            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) && source.peek().is_some() {
                let samples: Vec<i16> = source.by_ref().take(block).collect();
                codec.write(bytemuck::cast_slice(&samples));

                next += period;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
            }
            info!("[audio] input finished");
        })?;
    Ok(handle)
}

fn sine(freq: f32, rate: u32, channels: u16) -> impl Iterator<Item = i16> + Send {
    let step = 2.0 * std::f32::consts::PI * freq / rate as f32;
    std::iter::repeat(())
        .scan(0.0f32, move |phase, _| {
            let v = (phase.sin() * 0.2 * i16::MAX as f32) as i16;
            *phase = (*phase + step) % std::f32::consts::TAU;
            Some(v)
        })
        .flat_map(move |v| std::iter::repeat_n(v, channels as usize))
}

fn start_video_in(params: VideoParams, codec: Arc<dyn Codec>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let (w, h) = (params.width as usize, params.height as usize);
        let mut frame = vec![128u8; params.frame_bytes()];
        let period = Duration::from_secs(1) / params.frame_rate.max(1);
        let mut next = Instant::now();
        let mut n: usize = 0;

        while running.load(Ordering::Relaxed) {
            // moving luma gradient, neutral chroma
            for (i, px) in frame[..w * h].iter_mut().enumerate() {
                *px = ((i % w + n) & 0xff) as u8;
            }
            codec.write(&frame);
            n += 1;

            next += period;
            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }
        info!("[video] input finished after {} frames", n);
    })
}

fn start_consumer(cfg: &ConsumerConfig, codec: Arc<dyn Codec>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    let timeout = Duration::from_millis(cfg.read_timeout_ms);
    let mut buf = vec![0u8; cfg.max_frame_bytes];

    std::thread::spawn(move || {
        let mut frames: u64 = 0;
        let mut bytes: u64 = 0;
        while running.load(Ordering::Relaxed) {
            let Some(info) = codec.read(&mut buf, timeout) else {
                continue;
            };
            if info.is_truncated() {
                warn!("[{}] frame truncated {} of {} bytes", codec.name(), info.copied, info.frame_size);
            }
            frames += 1;
            bytes += info.copied as u64;
            debug!(
                "[{}] pts={} key={} size={} age={}ms",
                codec.name(),
                info.pts,
                info.key,
                info.frame_size,
                ticks_between(info.pts, tick_count())
            );
        }
        info!(
            "[{}] consumer done, {} frames / {} bytes",
            codec.name(),
            frames,
            bytes
        );
    })
}
