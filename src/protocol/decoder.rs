//! Zero-Copy Frame Decoder
//!
//! Berjalan di atas image arena (`&[u8]`) mulai dari offset tertentu,
//! mengikuti `LOOP` kembali ke offset 0, dan berhenti di `STOP`.
//! Dipakai untuk introspeksi queue dan untuk membaca arena yang disalin
//! keluar (dump ke file, shared mapping, dsb).

use super::marker::{Marker, HEADER_SIZE};

/// Iterator payload frame di dalam satu image arena
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
    looped: bool,
    done: bool,
}

impl<'a> Decoder<'a> {
    /// Membuat decoder yang mulai membaca dari `start`
    #[inline(always)]
    pub fn new(buffer: &'a [u8], start: usize) -> Self {
        Self {
            buffer,
            read_pos: start,
            looped: false,
            done: false,
        }
    }

    /// Posisi header berikutnya yang akan dibaca
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    /// Decode frame berikutnya (zero-copy)
    ///
    /// Returns `None` di `STOP`, atau jika image rusak (header terpotong,
    /// nilai header tidak dikenal, payload melewati akhir buffer, atau
    /// `LOOP` kedua dalam satu putaran).
    #[inline(always)]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a [u8]> {
        while !self.done {
            let header_end = self.read_pos + HEADER_SIZE;
            if header_end > self.buffer.len() {
                break;
            }

            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&self.buffer[self.read_pos..header_end]);

            match Marker::decode(raw) {
                Some(Marker::Frame(len)) => {
                    let payload_end = header_end + len;
                    if payload_end > self.buffer.len() {
                        break;
                    }
                    self.read_pos = payload_end;
                    return Some(&self.buffer[header_end..payload_end]);
                }
                Some(Marker::Loop) if !self.looped => {
                    self.looped = true;
                    self.read_pos = 0;
                }
                _ => break,
            }
        }

        self.done = true;
        None
    }

    /// Total payload bytes sampai `STOP`
    pub fn total_payload(mut self) -> usize {
        let mut total = 0;
        while let Some(payload) = self.next() {
            total += payload.len();
        }
        total
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        Decoder::next(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(buf: &mut [u8], pos: usize, marker: Marker) {
        buf[pos..pos + HEADER_SIZE].copy_from_slice(&marker.encode());
    }

    #[test]
    fn test_decode_linear_frames() {
        let mut buf = vec![0u8; 32];
        put(&mut buf, 0, Marker::Frame(3));
        buf[4..7].copy_from_slice(b"abc");
        put(&mut buf, 7, Marker::Frame(2));
        buf[11..13].copy_from_slice(b"de");
        put(&mut buf, 13, Marker::Stop);

        let frames: Vec<_> = Decoder::new(&buf, 0).collect();
        assert_eq!(frames, vec![&b"abc"[..], &b"de"[..]]);
        assert_eq!(Decoder::new(&buf, 0).total_payload(), 5);
    }

    #[test]
    fn test_decode_follows_loop() {
        let mut buf = vec![0u8; 32];
        // Frame lama di tail, lalu LOOP, lalu frame baru di awal arena
        put(&mut buf, 16, Marker::Frame(4));
        buf[20..24].copy_from_slice(b"tail");
        put(&mut buf, 24, Marker::Loop);
        put(&mut buf, 0, Marker::Frame(4));
        buf[4..8].copy_from_slice(b"head");
        put(&mut buf, 8, Marker::Stop);

        let frames: Vec<_> = Decoder::new(&buf, 16).collect();
        assert_eq!(frames, vec![&b"tail"[..], &b"head"[..]]);

        let mut decoder = Decoder::new(&buf, 16);
        assert_eq!(decoder.position(), 16);
        assert_eq!(decoder.next(), Some(&b"tail"[..]));
        assert_eq!(decoder.position(), 24);
        assert_eq!(decoder.next(), Some(&b"head"[..]));
        assert_eq!(decoder.position(), 8);
        assert_eq!(decoder.next(), None);
        assert_eq!(decoder.position(), 8);
    }

    #[test]
    fn test_decode_stops_on_corruption() {
        let mut buf = vec![0u8; 16];
        // Payload melewati akhir buffer
        put(&mut buf, 0, Marker::Frame(100));
        assert_eq!(Decoder::new(&buf, 0).next(), None);

        // LOOP yang menunjuk ke dirinya sendiri tidak boleh infinite loop
        put(&mut buf, 0, Marker::Loop);
        assert_eq!(Decoder::new(&buf, 0).next(), None);

        // Nilai negatif yang tidak dikenal
        buf[0..4].copy_from_slice(&(-7i32).to_ne_bytes());
        assert_eq!(Decoder::new(&buf, 0).next(), None);
    }
}
