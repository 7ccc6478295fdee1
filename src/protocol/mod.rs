//! Protocol Layer: Frame Layout di dalam Arena
//!
//! Prinsip desain:
//! - Bit-exact: `[i32 length (native-endian)][payload]...[STOP | LOOP]`
//! - Tagged view: header dibaca sebagai `Marker`, bukan raw integer
//! - No allocation: Decoder berjalan langsung di atas byte slice

mod decoder;
mod marker;

pub use decoder::Decoder;
pub use marker::{Marker, FRAME_OVERHEAD, HEADER_SIZE, LOOP, STOP, TRAILER_SIZE};
