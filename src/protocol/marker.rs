//! Frame Header Format
//!
//! Layout satu frame di arena:
//! ┌──────────────────────────┬──────────────────────────────┐
//! │ length: i32 (native, 4B) │ payload (length bytes)       │
//! └──────────────────────────┴──────────────────────────────┘
//!
//! Slot header yang sama juga dipakai untuk dua sentinel:
//! - `STOP` (0): belum ada data setelah titik ini
//! - `LOOP` (-1): sisa tail arena diabaikan, lanjut baca dari offset 0

use std::mem;

/// Ukuran length prefix di depan setiap frame
pub const HEADER_SIZE: usize = mem::size_of::<i32>();

/// Slot untuk STOP/LOOP yang selalu harus muat setelah payload terakhir
pub const TRAILER_SIZE: usize = mem::size_of::<i32>();

/// Overhead per reservasi: header frame + slot sentinel berikutnya
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Raw value sentinel STOP
pub const STOP: i32 = 0;

/// Raw value sentinel LOOP
pub const LOOP: i32 = -1;

/// Isi satu slot header, dalam bentuk tagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Tidak ada data lagi (untuk saat ini)
    Stop,
    /// Lompat ke awal arena
    Loop,
    /// Frame berisi `n` byte payload (selalu > 0)
    Frame(usize),
}

impl Marker {
    /// Interpretasi raw integer dari arena.
    ///
    /// Returns `None` untuk nilai negatif selain `LOOP`, yang tidak pernah
    /// ditulis oleh producer.
    #[inline(always)]
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            STOP => Some(Self::Stop),
            LOOP => Some(Self::Loop),
            n if n > 0 => Some(Self::Frame(n as usize)),
            _ => None,
        }
    }

    /// Raw integer yang ditulis ke arena
    ///
    /// # Panics
    /// Panic jika panjang frame 0 atau tidak muat di `i32`.
    #[inline(always)]
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Stop => STOP,
            Self::Loop => LOOP,
            Self::Frame(len) => {
                assert!(
                    len > 0 && len <= i32::MAX as usize,
                    "frame length {len} cannot be encoded"
                );
                len as i32
            }
        }
    }

    #[inline(always)]
    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Option<Self> {
        Self::from_raw(i32::from_ne_bytes(bytes))
    }

    #[inline(always)]
    pub fn encode(self) -> [u8; HEADER_SIZE] {
        self.to_raw().to_ne_bytes()
    }

    /// Panjang payload jika ini frame, 0 untuk sentinel
    #[inline(always)]
    pub fn payload_len(self) -> usize {
        match self {
            Self::Frame(len) => len,
            Self::Stop | Self::Loop => 0,
        }
    }
}
