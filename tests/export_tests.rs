use std::sync::Arc;
use std::time::Duration;

use airlift_encoder::codecs::alaw::pcm_to_alaw;
use airlift_encoder::{AlawEncoder, Codec, PassthroughCodec, RecordTag};

#[test]
fn test_walk_records_in_place_and_commit() {
    let enc = AlawEncoder::new();
    enc.write_samples(&[0; 4]);
    enc.write_samples(&[1000; 2]);
    enc.write_samples(&[-1000; 3]);

    let mut lock = enc.lock_output().unwrap();
    let mut lens = Vec::new();
    let mut first_codes = Vec::new();
    while let Some(view) = lock.next_record() {
        assert_eq!(view.header.tag, RecordTag::Audio);
        lens.push(view.header.payload_len);
        first_codes.push(view.to_vec()[0]);
    }
    assert_eq!(lens, vec![4, 2, 3]);
    assert_eq!(first_codes, vec![pcm_to_alaw(0), pcm_to_alaw(1000), pcm_to_alaw(-1000)]);
    lock.commit_local().unwrap();

    assert!(enc.read(&mut [0u8; 8], Duration::ZERO).is_none());
    assert_eq!(enc.stats().output.used, 0);
}

#[test]
fn test_dropping_lock_leaves_ring_untouched() {
    let enc = AlawEncoder::new();
    enc.write_samples(&[7; 6]);
    {
        let mut lock = enc.lock_output().unwrap();
        assert!(lock.next_record().is_some());
    }
    let info = enc.read(&mut [0u8; 8], Duration::ZERO).unwrap();
    assert_eq!(info.frame_size, 6);
}

#[test]
fn test_partial_commit_consumes_first_record_only() {
    let codec = PassthroughCodec::new("bufenc", 128, RecordTag::Buffer);
    codec.write(&[1, 1, 1]);
    codec.write(&[2, 2]);

    let lock = codec.lock_output().unwrap();
    let (head, tail, size) = (lock.head(), lock.tail(), lock.size());
    assert_eq!(size, 8 + 3 + 8 + 2);
    // consumer advanced past exactly one record
    lock.commit(head + 11, tail, size - 11).unwrap();

    let mut buf = [0u8; 4];
    let info = codec.read(&mut buf, Duration::ZERO).unwrap();
    assert_eq!(&buf[..info.copied], &[2, 2]);
}

#[test]
fn test_inconsistent_commit_is_rejected() {
    let codec = PassthroughCodec::new("bufenc", 64, RecordTag::Buffer);
    codec.write(&[9; 4]);

    let lock = codec.lock_output().unwrap();
    let (head, tail, size) = (lock.head(), lock.tail(), lock.size());
    assert!(lock.commit(head, tail, size + 1).is_err());

    let lock = codec.lock_output().unwrap();
    assert!(lock.commit(64, tail, size).is_err());

    let lock = codec.lock_output().unwrap();
    assert!(lock.commit(head, tail, 100).is_err());

    // ring unchanged after all rejected commits
    let info = codec.read(&mut [0u8; 8], Duration::ZERO).unwrap();
    assert_eq!(info.frame_size, 4);
}

#[test]
fn test_commit_of_untouched_indices_is_a_noop() {
    let enc = AlawEncoder::new();
    enc.write_samples(&[3; 5]);
    let lock = enc.lock_output().unwrap();
    let (head, tail, size) = (lock.head(), lock.tail(), lock.size());
    lock.commit(head, tail, size).unwrap();
    assert!(enc.read(&mut [0u8; 8], Duration::ZERO).is_some());
}

#[test]
fn test_wrapped_payload_is_split_in_two_slices() {
    let codec = PassthroughCodec::new("bufenc", 32, RecordTag::Buffer);
    // move head/tail close to the end of storage
    codec.write(&[0; 12]);
    assert!(codec.read(&mut [0u8; 16], Duration::ZERO).is_some());
    codec.write(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

    let mut lock = codec.lock_output().unwrap();
    let view = lock.next_record().unwrap();
    assert!(!view.payload.1.is_empty());
    assert_eq!(view.payload.0.len() + view.payload.1.len(), 10);
    assert_eq!(view.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn test_producer_blocks_while_output_is_locked() {
    let codec = Arc::new(PassthroughCodec::new("bufenc", 256, RecordTag::Buffer));
    let lock = codec.lock_output().unwrap();

    let writer = {
        let codec = codec.clone();
        std::thread::spawn(move || codec.write(&[1, 2, 3]))
    };
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(lock.size(), 0);
    drop(lock);

    writer.join().unwrap();
    assert!(codec.read(&mut [0u8; 8], Duration::ZERO).is_some());
}
