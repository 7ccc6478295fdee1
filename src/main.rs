//! ringframe - Frame Queue Benchmark Runner
//!
//! Usage:
//!   cargo run --release -- [config.toml]
//!
//! Tanpa argumen, memakai `QueueConfig::default()`.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use ringframe::{FrameQueue, QueueConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            QueueConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => QueueConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    println!("🚀 ringframe - Lock-Free SPSC Frame Queue");
    println!("==========================================\n");

    let mut queue = FrameQueue::from_config(&config).context("creating frame queue")?;
    anyhow::ensure!(
        queue.capacity() >= 256,
        "benchmarks need at least 256 bytes of capacity, got {}",
        queue.capacity()
    );
    info!(
        capacity = queue.capacity(),
        backing = ?config.backing,
        locked = queue.pages_locked(),
        "queue ready"
    );

    benchmark_single_thread(&mut queue);
    queue.clear();
    benchmark_two_threads(&mut queue)?;

    println!("\n✅ All benchmarks complete!");
    Ok(())
}

fn benchmark_single_thread(queue: &mut FrameQueue) {
    println!("📊 Single-Thread Write/Read Latency");
    println!("-----------------------------------");

    const ITERATIONS: usize = 1_000_000;
    const FRAME_SIZE: usize = 64;

    let (mut producer, mut consumer) = queue.split();
    let frame = [0x5Au8; FRAME_SIZE];
    let mut out = [0u8; FRAME_SIZE];

    // Warm up
    for _ in 0..1000 {
        producer.write_frame(&frame);
        consumer.read_frame(&mut out);
    }

    let mut write_ns = 0u128;
    let mut read_ns = 0u128;
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        let ok = producer.write_frame(hint::black_box(&frame));
        write_ns += start.elapsed().as_nanos();
        debug_assert!(ok);

        let start = Instant::now();
        hint::black_box(consumer.read_frame(&mut out));
        read_ns += start.elapsed().as_nanos();
    }

    let write_avg = write_ns as f64 / ITERATIONS as f64;
    let read_avg = read_ns as f64 / ITERATIONS as f64;

    println!("  Frame size: {} bytes", FRAME_SIZE);
    println!("  Operations: {}", ITERATIONS);
    println!("  Write latency: {:.2} ns/op", write_avg);
    println!("  Read latency:  {:.2} ns/op\n", read_avg);
}

fn benchmark_two_threads(queue: &mut FrameQueue) -> anyhow::Result<()> {
    println!("📊 Producer/Consumer Throughput (2 threads)");
    println!("-------------------------------------------");

    const FRAMES: u64 = 2_000_000;

    let max_len = queue.capacity() / 4;
    let (mut producer, mut consumer) = queue.split();
    let abort = AtomicBool::new(false);
    let abort = &abort;
    let start = Instant::now();

    let (received, bytes) = thread::scope(|s| {
        s.spawn(move || {
            let mut frame = vec![0u8; max_len];
            for seq in 0..FRAMES {
                // Panjang bervariasi, 8 byte pertama = sequence number
                let len = 8 + (seq as usize * 31) % (frame.len() - 7);
                frame[..8].copy_from_slice(&seq.to_le_bytes());
                while !producer.write_frame(&frame[..len]) {
                    if abort.load(Ordering::Relaxed) {
                        return;
                    }
                    hint::spin_loop();
                }
            }
        });

        let reader = s.spawn(move || {
            let mut expected = 0u64;
            let mut bytes = 0usize;
            while expected < FRAMES {
                if consumer.has_data() == 0 {
                    hint::spin_loop();
                    continue;
                }
                let payload = consumer.acquire_read_region();
                let mut seq = [0u8; 8];
                seq.copy_from_slice(&payload[..8]);
                if u64::from_le_bytes(seq) != expected {
                    abort.store(true, Ordering::Relaxed);
                    return Err(expected);
                }
                bytes += payload.len();
                consumer.commit_read();
                expected += 1;
            }
            Ok((expected, bytes))
        });

        reader.join()
    })
    .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?
    .map_err(|seq| anyhow::anyhow!("frame {seq} arrived out of order"))?;

    let elapsed = start.elapsed();

    println!("  Frames:     {}", received);
    println!("  Payload:    {:.2} MB", bytes as f64 / 1_000_000.0);
    println!(
        "  Throughput: {:.2} M frames/sec ({:.2} MB/sec)",
        received as f64 / elapsed.as_secs_f64() / 1_000_000.0,
        bytes as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}
