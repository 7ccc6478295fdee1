//! Core module: Lock-Free Frame Queue di atas arena berukuran tetap
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic load/store pada dua kursor, tanpa Mutex/CAS
//! - No-Allocation: Arena di-alokasi sekali saat init
//! - Non-Blocking: "no space" dan "no data" adalah return value biasa

mod arena;
mod frame_queue;

pub use frame_queue::{Consumer, FrameQueue, Producer, MAX_CAPACITY, MIN_CAPACITY};
