use std::time::Duration;

use airlift_encoder::codecs::alaw::{alaw_to_pcm, pcm_to_alaw};
use airlift_encoder::{AlawEncoder, Codec, LifecycleState, RecordTag, ResetFlags};

#[test]
fn test_quantization_error_is_bounded() {
    for x in i16::MIN..=i16::MAX {
        let y = alaw_to_pcm(pcm_to_alaw(x)) as i32;
        let x = x as i32;
        let bound = 8.max(x.abs() / 32);
        assert!((y - x).abs() <= bound, "x={} decoded={} bound={}", x, y, bound);
    }
}

#[test]
fn test_sign_symmetry() {
    for x in 1..=i16::MAX {
        assert_eq!(pcm_to_alaw(x) ^ pcm_to_alaw(-x), 0x80, "x={}", x);
    }
}

#[test]
fn test_monotonic_in_magnitude() {
    let mut prev = alaw_to_pcm(pcm_to_alaw(0));
    for x in (0..=i16::MAX).step_by(7) {
        let y = alaw_to_pcm(pcm_to_alaw(x));
        assert!(y >= prev);
        prev = y;
    }
}

#[test]
fn test_encoder_halves_input_size() {
    let enc = AlawEncoder::new();
    enc.start(true);
    let pcm: Vec<i16> = (0..160).map(|i| (i * 100) as i16).collect();
    enc.write_samples(&pcm);

    let mut out = [0u8; 512];
    let info = enc.read(&mut out, Duration::from_millis(10)).unwrap();
    assert_eq!(info.frame_size, 160);
    assert_eq!(info.copied, 160);
    assert_eq!(info.tag, RecordTag::Audio);
    for (i, &code) in out[..160].iter().enumerate() {
        assert_eq!(code, pcm_to_alaw(pcm[i]));
    }
}

#[test]
fn test_truncated_read_reports_full_size() {
    let enc = AlawEncoder::new();
    enc.write_samples(&[1; 100]);
    enc.write_samples(&[2; 10]);

    let mut small = [0u8; 30];
    let first = enc.read(&mut small, Duration::ZERO).unwrap();
    assert!(first.is_truncated());
    assert_eq!(first.copied, 30);
    assert_eq!(first.frame_size, 100);

    let second = enc.read(&mut small, Duration::ZERO).unwrap();
    assert_eq!(second.frame_size, 10);
    assert_eq!(small[0], pcm_to_alaw(2));
}

#[test]
fn test_full_output_drops_newest() {
    // 1 KiB ring, records of 8 + 100 bytes: nine fit
    let enc = AlawEncoder::new();
    for _ in 0..12 {
        enc.write_samples(&[0; 100]);
    }
    let stats = enc.stats();
    assert_eq!(stats.output.records, 9);
    assert_eq!(stats.output.dropped, 3);
}

#[test]
fn test_lifecycle_states() {
    let enc = AlawEncoder::new();
    assert_eq!(enc.state(), LifecycleState::Created);
    enc.start(true);
    assert_eq!(enc.state(), LifecycleState::Running);
    enc.start(false);
    assert_eq!(enc.state(), LifecycleState::Stopped);

    // stop keeps buffered data, start again keeps it too
    enc.write_samples(&[5; 4]);
    enc.start(true);
    assert!(enc.read(&mut [0u8; 8], Duration::ZERO).is_some());

    enc.teardown();
    assert_eq!(enc.state(), LifecycleState::Destroyed);
    enc.write_samples(&[5; 4]);
    enc.start(true);
    enc.reset(ResetFlags::all());
    enc.reconfigure(64_000);
    assert_eq!(enc.state(), LifecycleState::Destroyed);
    assert!(enc.read(&mut [0u8; 8], Duration::from_millis(50)).is_none());
}

#[test]
fn test_reconfigure_is_noop_for_audio() {
    let enc = AlawEncoder::new();
    enc.write_samples(&[1; 4]);
    enc.reconfigure(16_000);
    assert!(enc.read(&mut [0u8; 8], Duration::ZERO).is_some());
    assert!(enc.stream_headers().is_empty());
}
