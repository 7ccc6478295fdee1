//! Threaded Stress Test - Producer dan Consumer di thread terpisah
//!
//! Arena sengaja kecil supaya write cursor wrap ribuan kali, dan panjang
//! frame bervariasi supaya posisi LOOP terus berpindah.
//!
//! Usage:
//!   cargo test --release --test threaded_stress_test -- --nocapture

use std::hint;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use ringframe::{Backing, FrameQueue, QueueConfig};

/// Frame deterministik: 8 byte sequence + pola yang diturunkan dari sequence
fn make_frame(seq: u64, max_len: usize, buf: &mut [u8]) -> usize {
    let len = 8 + (seq.wrapping_mul(2654435761) as usize % (max_len - 8 + 1));
    buf[..8].copy_from_slice(&seq.to_le_bytes());
    for (i, b) in buf[8..len].iter_mut().enumerate() {
        *b = (seq as u8).wrapping_add(i as u8).wrapping_mul(31);
    }
    len
}

fn verify_frame(expected_seq: u64, max_len: usize, payload: &[u8], expected: &mut [u8]) {
    let len = make_frame(expected_seq, max_len, expected);
    assert_eq!(payload.len(), len, "frame {expected_seq} has wrong length");
    assert_eq!(payload, &expected[..len], "frame {expected_seq} corrupted");
}

/// Statistics collector
struct StressStats {
    write_retries: AtomicU64,
    empty_polls: AtomicU64,
}

impl StressStats {
    fn new() -> Self {
        Self {
            write_retries: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
        }
    }

    fn print_report(&self, frames: u64, duration: Duration) {
        println!("\n📊 STRESS TEST RESULTS");
        println!("======================");
        println!("  Frames:        {}", frames);
        println!("  Duration:      {:.2}ms", duration.as_secs_f64() * 1000.0);
        println!(
            "  Write retries: {}",
            self.write_retries.load(Ordering::Relaxed)
        );
        println!(
            "  Empty polls:   {}",
            self.empty_polls.load(Ordering::Relaxed)
        );
    }
}

fn run_stress(queue: &mut FrameQueue, frames: u64, max_len: usize) {
    let stats = StressStats::new();
    let done = AtomicBool::new(false);
    let (mut producer, mut consumer) = queue.split();
    let start = Instant::now();

    thread::scope(|s| {
        s.spawn(|| {
            let mut buf = vec![0u8; max_len];
            for seq in 0..frames {
                let len = make_frame(seq, max_len, &mut buf);
                while !producer.write_frame(&buf[..len]) {
                    stats.write_retries.fetch_add(1, Ordering::Relaxed);
                    hint::spin_loop();
                }
            }
            done.store(true, Ordering::Release);
        });

        s.spawn(|| {
            let mut expected = vec![0u8; max_len];
            let mut seq = 0u64;
            while seq < frames {
                let len = consumer.has_data();
                if len == 0 {
                    stats.empty_polls.fetch_add(1, Ordering::Relaxed);
                    thread::yield_now();
                    continue;
                }
                let payload = consumer.acquire_read_region();
                assert_eq!(payload.len(), len);
                verify_frame(seq, max_len, payload, &mut expected);
                consumer.commit_read();
                seq += 1;
            }
        });
    });

    assert!(done.load(Ordering::Acquire));
    assert_eq!(consumer.has_data(), 0);
    assert_eq!(consumer.total_queued_bytes(), 0);

    stats.print_report(frames, start.elapsed());
}

#[test]
fn test_stress_small_arena_many_wraps() {
    let mut queue = FrameQueue::new(256).unwrap();
    run_stress(&mut queue, 50_000, 60);
}

#[test]
fn test_stress_mmap_backing() {
    let config = QueueConfig {
        capacity_bytes: 16 * 1024,
        backing: Backing::Mmap,
        ..QueueConfig::default()
    };
    let mut queue = FrameQueue::from_config(&config).unwrap();
    run_stress(&mut queue, 20_000, 1500);
}

#[test]
fn test_stress_max_size_frames() {
    // Frame terbesar = setengah arena (len + 8 <= capacity / 2), batas
    // di mana frame selalu bisa masuk begitu consumer sudah mengejar
    let mut queue = FrameQueue::new(160).unwrap();
    run_stress(&mut queue, 10_000, 72);
}

#[test]
fn test_in_place_write_across_threads() {
    const FRAMES: u64 = 20_000;

    let mut queue = FrameQueue::new(512).unwrap();
    let (mut producer, mut consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(|| {
            for seq in 0..FRAMES {
                let len = 8 + (seq % 24) as usize;
                loop {
                    if let Some(region) = producer.acquire_write_region(len) {
                        region[..8].copy_from_slice(&seq.to_ne_bytes());
                        region[8..].fill(seq as u8);
                        break;
                    }
                    hint::spin_loop();
                }
                producer.publish_write(len);
            }
        });

        s.spawn(|| {
            let mut out = [0u8; 64];
            let mut seq = 0u64;
            while seq < FRAMES {
                let Some(len) = consumer.read_frame(&mut out) else {
                    hint::spin_loop();
                    continue;
                };
                assert_eq!(len, 8 + (seq % 24) as usize);
                assert_eq!(out[..8], seq.to_ne_bytes());
                assert!(out[8..len].iter().all(|&b| b == seq as u8));
                seq += 1;
            }
        });
    });

    drop((producer, consumer));
    assert!(queue.is_empty());
    assert_eq!(queue.total_queued_bytes(), 0);
}
