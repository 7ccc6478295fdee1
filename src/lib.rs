//! ringframe - Lock-Free SPSC Frame Queue
//!
//! Arsitektur:
//! - Core: Arena berukuran tetap + kursor write/read atomik
//! - Protocol: Frame `[i32 len][payload]` dengan sentinel STOP/LOOP
//! - Config: TOML, backing heap atau anonymous mmap
//!
//! ```
//! use ringframe::FrameQueue;
//!
//! let mut queue = FrameQueue::new(1024).unwrap();
//! let (mut producer, mut consumer) = queue.split();
//!
//! assert!(producer.write_frame(b"note-on"));
//! assert_eq!(consumer.has_data(), 7);
//! assert_eq!(consumer.acquire_read_region(), b"note-on");
//! consumer.commit_read();
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;

pub use crate::config::{Backing, QueueConfig};
pub use crate::core::{Consumer, FrameQueue, Producer};
pub use crate::error::{ConfigError, QueueError};
