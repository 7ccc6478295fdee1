//! Lock-Free Single-Producer Single-Consumer (SPSC) Frame Queue
//!
//! Frame dengan panjang variabel (`[i32 len][payload]`) ditulis berurutan
//! ke arena berukuran tetap. Saat tail arena tidak cukup, producer menulis
//! `LOOP` di posisi lama dan lanjut dari offset 0.
//! Tidak ada Mutex, tidak ada CAS, tidak ada alokasi setelah inisialisasi.
//!
//! Sinkronisasi hanya lewat dua kursor atomik:
//! - Producer: tulis payload + sentinel + header, lalu `write` di-store Release
//! - Consumer: `write` di-load Acquire sebelum membaca header apa pun,
//!   `read` di-store Release setelah selesai dengan satu frame

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

use super::arena::Arena;
use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::protocol::{Decoder, Marker, FRAME_OVERHEAD, HEADER_SIZE};

/// Kapasitas minimum: satu header + satu slot sentinel
pub const MIN_CAPACITY: usize = FRAME_OVERHEAD;

/// Kapasitas maksimum: panjang frame harus muat di `i32`
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// State milik producer. Consumer hanya membaca `write`.
struct ProducerState {
    /// Offset slot header berikutnya (published)
    write: AtomicUsize,
    /// Byte dari `write` sampai akhir arena. Hanya disentuh producer.
    remaining: AtomicUsize,
}

/// State milik consumer. Producer hanya membaca `read`.
struct ConsumerState {
    read: AtomicUsize,
}

/// Lock-Free SPSC Frame Queue
///
/// Pemilik arena dan kedua kursor. Operasi baca/tulis dilakukan lewat
/// [`Producer`] dan [`Consumer`] dari [`FrameQueue::split`]; selama handle
/// masih hidup, queue terpinjam `&mut` sehingga `clear` tidak bisa dipanggil.
pub struct FrameQueue {
    producer: CacheLinePadded<ProducerState>,
    consumer: CacheLinePadded<ConsumerState>,
    arena: Arena,
    capacity: usize,
}

impl FrameQueue {
    /// Membuat queue dengan arena heap sebesar `capacity` bytes.
    ///
    /// Alokasi hanya terjadi sekali di sini.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_config(&QueueConfig::with_capacity(capacity))
    }

    /// Membuat queue sesuai config (backing, page locking)
    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        let capacity = config.capacity_bytes;
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(QueueError::InvalidCapacity {
                requested: capacity,
                minimum: MIN_CAPACITY,
                maximum: MAX_CAPACITY,
            });
        }

        let mut arena = Arena::new(capacity, config.backing)?;
        if config.lock_pages {
            arena.lock_pages()?;
        }

        // SAFETY: belum ada handle, akses eksklusif
        unsafe { arena.write_marker(0, Marker::Stop) };

        debug!(
            capacity,
            backing = ?config.backing,
            locked = arena.is_locked(),
            "frame queue initialized"
        );

        Ok(Self {
            producer: CacheLinePadded::new(ProducerState {
                write: AtomicUsize::new(0),
                remaining: AtomicUsize::new(capacity),
            }),
            consumer: CacheLinePadded::new(ConsumerState {
                read: AtomicUsize::new(0),
            }),
            arena,
            capacity,
        })
    }

    /// Kapasitas arena dalam bytes
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apakah halaman arena terkunci di RAM (`lock_pages`)
    pub fn pages_locked(&self) -> bool {
        self.arena.is_locked()
    }

    /// Pecah queue menjadi satu producer dan satu consumer.
    ///
    /// Kedua handle `Send`, jadi bisa dipindah ke thread lain
    /// (mis. `std::thread::scope`). Posisi kursor tetap tersimpan di queue,
    /// jadi split berikutnya melanjutkan dari state yang sama.
    pub fn split(&mut self) -> (Producer<'_>, Consumer<'_>) {
        let queue: &Self = self;
        (
            Producer {
                queue,
                reserved: None,
            },
            Consumer { queue },
        )
    }

    /// Reset ke state awal: kursor ke 0, arena di-zero.
    ///
    /// `&mut self` menjamin tidak ada producer/consumer yang sedang aktif.
    pub fn clear(&mut self) {
        self.arena.zero();
        *self.producer.value.write.get_mut() = 0;
        *self.producer.value.remaining.get_mut() = self.capacity;
        *self.consumer.value.read.get_mut() = 0;
        debug!(capacity = self.capacity, "frame queue cleared");
    }

    /// Payload frame yang belum dibaca, urut dari yang paling lama
    pub fn frames(&self) -> Decoder<'_> {
        let read = self.consumer.value.read.load(Ordering::Acquire);
        // SAFETY: dengan &self tidak ada handle yang hidup (split butuh &mut),
        // jadi tidak ada penulis aktif
        let bytes = unsafe { self.arena.slice(0, self.capacity) };
        Decoder::new(bytes, read)
    }

    /// Total payload bytes yang belum dibaca
    pub fn total_queued_bytes(&self) -> usize {
        self.frames().total_payload()
    }

    /// Cek apakah queue kosong
    ///
    /// Kursor saja tidak cukup: wrap yang belum di-publish sudah memindah
    /// `write` ke 0 sementara `read` masih menunjuk `LOOP`.
    pub fn is_empty(&self) -> bool {
        self.frames().next().is_none()
    }
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("capacity", &self.capacity)
            .field("write", &self.producer.value.write.load(Ordering::Relaxed))
            .field("read", &self.consumer.value.read.load(Ordering::Relaxed))
            .field(
                "remaining",
                &self.producer.value.remaining.load(Ordering::Relaxed),
            )
            .finish()
    }
}

/// Sisi penulis. Hanya ada satu per queue.
pub struct Producer<'q> {
    queue: &'q FrameQueue,
    /// Panjang payload dari `acquire_write_region` terakhir yang sukses
    reserved: Option<usize>,
}

impl Producer<'_> {
    /// Reservasi region untuk payload `len` bytes (Producer side).
    ///
    /// Butuh `len + 8` bytes: header frame ini + slot sentinel berikutnya.
    /// Returns `None` jika tidak ada ruang; boleh dipanggil ulang sebagai
    /// poll karena consumer bisa membebaskan ruang kapan saja.
    /// Zero-allocation, lock-free.
    #[inline(always)]
    pub fn acquire_write_region(&mut self, len: usize) -> Option<&mut [u8]> {
        self.reserved = None;
        if len == 0 {
            return None;
        }

        let queue = self.queue;
        let state = &queue.producer.value;
        let mut write = state.write.load(Ordering::Relaxed);
        let remaining = state.remaining.load(Ordering::Relaxed);
        // Batas eksklusi: semua yang di [read, write) belum dibaca
        let read = queue.consumer.value.read.load(Ordering::Acquire);
        let required = len.checked_add(FRAME_OVERHEAD)?;

        if required <= remaining {
            // Tail path: jika write sudah di belakang read (sudah wrap),
            // reservasi termasuk slot sentinel tidak boleh menyentuh read
            if write < read && write + required > read {
                return None;
            }
        } else {
            // Wrap path
            if required > queue.capacity || write < read || required > read {
                return None;
            }

            // SAFETY: [0, required) ada di bawah read dan slot di `write`
            // belum published, jadi consumer tidak membaca keduanya
            unsafe {
                queue.arena.write_marker(0, Marker::Stop);
                queue.arena.write_marker(write, Marker::Loop);
            }
            state.remaining.store(queue.capacity, Ordering::Relaxed);
            // Release: consumer yang melihat write=0 juga melihat STOP dan LOOP
            state.write.store(0, Ordering::Release);

            trace!(from = write, read, "write cursor wrapped");
            write = 0;
        }

        self.reserved = Some(len);

        // SAFETY: region ini milik producer sampai publish_write
        Some(unsafe { queue.arena.slice_mut(write + HEADER_SIZE, len) })
    }

    /// Commit frame `len` bytes di posisi write saat ini.
    ///
    /// Urutan: STOP setelah payload, header di posisi lama, lalu kursor
    /// write di-store Release. Consumer yang melihat header dijamin melihat
    /// payload lengkap.
    ///
    /// # Panics
    /// Panic jika belum ada reservasi, `len == 0`, atau `len` melebihi
    /// reservasi dari `acquire_write_region`.
    #[inline(always)]
    pub fn publish_write(&mut self, len: usize) {
        let Some(reserved) = self.reserved.take() else {
            panic!("publish_write({len}) without a reserved write region");
        };
        assert!(
            len > 0 && len <= reserved,
            "publish_write({len}) exceeds reserved region of {reserved} bytes"
        );

        let queue = self.queue;
        let state = &queue.producer.value;
        let write = state.write.load(Ordering::Relaxed);
        let end = write + HEADER_SIZE + len;

        // SAFETY: [write, end + 4) sudah direservasi dan belum published
        unsafe {
            queue.arena.write_marker(end, Marker::Stop);
            queue.arena.write_marker(write, Marker::Frame(len));
        }

        let remaining = state.remaining.load(Ordering::Relaxed);
        state
            .remaining
            .store(remaining - HEADER_SIZE - len, Ordering::Relaxed);

        // Release fence: payload + STOP + header visible sebelum kursor maju
        state.write.store(end, Ordering::Release);
    }

    /// Acquire + copy + publish. Returns `false` jika tidak ada ruang.
    #[inline(always)]
    pub fn write_frame(&mut self, data: &[u8]) -> bool {
        match self.acquire_write_region(data.len()) {
            Some(region) => region.copy_from_slice(data),
            None => return false,
        }
        self.publish_write(data.len());
        true
    }

    /// Payload terbesar yang pernah bisa muat di arena kosong
    #[inline(always)]
    pub fn max_frame_len(&self) -> usize {
        self.queue.capacity - FRAME_OVERHEAD
    }

    /// Byte dari kursor write sampai akhir arena
    #[inline(always)]
    pub fn remaining_bytes(&self) -> usize {
        self.queue.producer.value.remaining.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}

/// Sisi pembaca. Hanya ada satu per queue.
pub struct Consumer<'q> {
    queue: &'q FrameQueue,
}

impl Consumer<'_> {
    /// Header di kursor read, setelah mengikuti LOOP
    #[inline(always)]
    fn peek(&mut self) -> (usize, Marker) {
        let queue = self.queue;
        let cursor = &queue.consumer.value.read;
        let mut read = cursor.load(Ordering::Relaxed);
        let mut followed_loop = false;

        loop {
            let write = queue.producer.value.write.load(Ordering::Acquire);
            if read == write {
                return (read, Marker::Stop);
            }

            // SAFETY: read != write, jadi slot ini sudah published (Acquire di atas)
            match unsafe { queue.arena.read_marker(read) } {
                Marker::Loop => {
                    assert!(!followed_loop, "LOOP marker at arena start");
                    followed_loop = true;
                    read = 0;
                    cursor.store(read, Ordering::Release);
                }
                marker => return (read, marker),
            }
        }
    }

    /// Panjang frame berikutnya, atau 0 jika belum ada data.
    ///
    /// `LOOP` diikuti secara transparan. Tidak pernah blocking.
    #[inline(always)]
    pub fn has_data(&mut self) -> usize {
        self.peek().1.payload_len()
    }

    /// Payload frame berikutnya (zero-copy).
    ///
    /// Slice kosong jika belum ada data.
    #[inline(always)]
    pub fn acquire_read_region(&mut self) -> &[u8] {
        match self.peek() {
            // SAFETY: frame sudah published; producer tidak akan menimpa
            // sebelum commit_read memajukan kursor read
            (read, Marker::Frame(len)) => unsafe {
                self.queue.arena.slice(read + HEADER_SIZE, len)
            },
            _ => &[],
        }
    }

    /// Lewati frame saat ini dan bebaskan ruangnya untuk producer.
    ///
    /// # Panics
    /// Panic jika tidak ada frame (kursor di STOP).
    #[inline(always)]
    pub fn commit_read(&mut self) {
        match self.peek() {
            (read, Marker::Frame(len)) => {
                // Release: pembacaan payload selesai sebelum ruang dipakai ulang
                self.queue
                    .consumer
                    .value
                    .read
                    .store(read + HEADER_SIZE + len, Ordering::Release);
            }
            _ => panic!("commit_read called with no frame queued"),
        }
    }

    /// Copy frame berikutnya ke `out` lalu commit.
    ///
    /// Returns panjang frame, atau `None` jika belum ada data.
    ///
    /// # Panics
    /// Panic jika `out` lebih pendek dari frame.
    pub fn read_frame(&mut self, out: &mut [u8]) -> Option<usize> {
        let payload = self.acquire_read_region();
        if payload.is_empty() {
            return None;
        }

        let len = payload.len();
        assert!(
            out.len() >= len,
            "read buffer of {} bytes is too small for a {len}-byte frame",
            out.len()
        );
        out[..len].copy_from_slice(payload);
        self.commit_read();
        Some(len)
    }

    /// Total payload bytes yang belum dibaca (best-effort snapshot).
    ///
    /// Berjalan dari kursor read sampai kursor write yang terlihat saat ini.
    pub fn total_queued_bytes(&self) -> usize {
        let queue = self.queue;
        let mut pos = queue.consumer.value.read.load(Ordering::Relaxed);
        let write = queue.producer.value.write.load(Ordering::Acquire);
        let mut total = 0;

        while pos != write {
            // SAFETY: semua slot di [read, write) sudah published
            match unsafe { queue.arena.read_marker(pos) } {
                Marker::Frame(len) => {
                    total += len;
                    pos += HEADER_SIZE + len;
                }
                Marker::Loop if pos != 0 => pos = 0,
                Marker::Loop | Marker::Stop => break,
            }
        }

        total
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}
