//! Arena: blok byte berukuran tetap yang dimiliki queue
//!
//! Dialokasikan sekali saat init (heap atau anonymous mmap), dilepas
//! sekali saat drop. Semua akses memakai offset integer yang dicek
//! terhadap panjang arena, bukan pointer kursor.

use std::io;
use std::ptr::NonNull;

use memmap2::MmapMut;
use tracing::debug;

use crate::config::Backing;
use crate::protocol::{Marker, HEADER_SIZE};

enum Storage {
    /// Dari `Box<[u8]>::into_raw`, dibebaskan di `Drop`
    Heap,
    /// Mapping tetap di alamat yang sama walau struct ini dipindah
    Mapped(#[allow(dead_code)] MmapMut),
}

pub(crate) struct Arena {
    base: NonNull<u8>,
    len: usize,
    storage: Storage,
    locked: bool,
}

// SAFETY: Arena hanya berisi byte. Aturan siapa boleh menyentuh range mana
// ditegakkan oleh protokol kursor di `FrameQueue`.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Alokasi arena zero-initialized
    pub(crate) fn new(len: usize, backing: Backing) -> io::Result<Self> {
        let (base, storage) = match backing {
            Backing::Heap => {
                let raw = Box::into_raw(vec![0u8; len].into_boxed_slice());
                // SAFETY: Box::into_raw tidak pernah menghasilkan null
                let base = unsafe { NonNull::new_unchecked(raw as *mut u8) };
                (base, Storage::Heap)
            }
            Backing::Mmap => {
                // Anonymous mapping selalu zero-filled oleh kernel
                let mut mmap = MmapMut::map_anon(len)?;
                let base = NonNull::new(mmap.as_mut_ptr())
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "null mapping"))?;
                (base, Storage::Mapped(mmap))
            }
        };

        debug!(len, ?backing, "arena allocated");

        Ok(Self {
            base,
            len,
            storage,
            locked: false,
        })
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    fn check(&self, offset: usize, len: usize) {
        assert!(
            offset <= self.len && len <= self.len - offset,
            "arena access {offset}..{} out of bounds (len {})",
            offset.wrapping_add(len),
            self.len
        );
    }

    /// Baca slot header di `offset`
    ///
    /// # Panics
    /// Panic jika slot berisi nilai yang tidak pernah ditulis producer.
    ///
    /// # Safety
    /// Caller harus sudah synchronized (acquire) dengan penulis slot ini,
    /// dan tidak ada thread lain yang sedang menulis slot ini.
    #[inline(always)]
    pub(crate) unsafe fn read_marker(&self, offset: usize) -> Marker {
        self.check(offset, HEADER_SIZE);
        let raw = self
            .base
            .as_ptr()
            .add(offset)
            .cast::<[u8; HEADER_SIZE]>()
            .read_unaligned();
        match Marker::decode(raw) {
            Some(marker) => marker,
            None => panic!(
                "corrupt frame header {} at offset {offset}",
                i32::from_ne_bytes(raw)
            ),
        }
    }

    /// Tulis slot header di `offset`
    ///
    /// # Safety
    /// Range `offset..offset + 4` harus dimiliki eksklusif oleh caller.
    #[inline(always)]
    pub(crate) unsafe fn write_marker(&self, offset: usize, marker: Marker) {
        self.check(offset, HEADER_SIZE);
        self.base
            .as_ptr()
            .add(offset)
            .cast::<[u8; HEADER_SIZE]>()
            .write_unaligned(marker.encode());
    }

    /// # Safety
    /// Tidak boleh ada penulis aktif pada range ini selama slice hidup.
    #[inline(always)]
    pub(crate) unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        self.check(offset, len);
        std::slice::from_raw_parts(self.base.as_ptr().add(offset), len)
    }

    /// # Safety
    /// Range ini harus dimiliki eksklusif oleh caller selama slice hidup.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        self.check(offset, len);
        std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len)
    }

    /// Isi ulang seluruh arena dengan 0 (= STOP di offset 0)
    pub(crate) fn zero(&mut self) {
        // SAFETY: &mut self berarti tidak ada akses lain
        unsafe { std::ptr::write_bytes(self.base.as_ptr(), 0, self.len) };
    }

    /// Kunci halaman arena di RAM supaya thread real-time tidak page fault
    #[cfg(unix)]
    pub(crate) fn lock_pages(&mut self) -> io::Result<()> {
        if self.locked {
            return Ok(());
        }
        // SAFETY: base..base+len adalah memori milik arena ini
        let rc = unsafe { libc::mlock(self.base.as_ptr() as *const libc::c_void, self.len) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        self.locked = true;
        debug!(len = self.len, "arena pages locked");
        Ok(())
    }

    #[cfg(not(unix))]
    pub(crate) fn lock_pages(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "page locking is only supported on unix",
        ))
    }

    #[inline(always)]
    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if self.locked {
                // SAFETY: range yang sama dengan mlock di atas
                unsafe { libc::munlock(self.base.as_ptr() as *const libc::c_void, self.len) };
            }
        }

        if let Storage::Heap = self.storage {
            // SAFETY: base/len berasal dari Box::into_raw di `new`
            unsafe {
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    self.base.as_ptr(),
                    self.len,
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_arena_zeroed() {
        let arena = Arena::new(64, Backing::Heap).unwrap();
        assert_eq!(arena.len(), 64);
        assert!(unsafe { arena.slice(0, 64) }.iter().all(|&b| b == 0));
        assert_eq!(unsafe { arena.read_marker(0) }, Marker::Stop);
    }

    #[test]
    fn test_mmap_arena_zeroed() {
        let arena = Arena::new(4096, Backing::Mmap).unwrap();
        assert_eq!(arena.len(), 4096);
        assert!(unsafe { arena.slice(0, 4096) }.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unaligned_marker_access() {
        let mut arena = Arena::new(16, Backing::Heap).unwrap();
        unsafe {
            arena.write_marker(3, Marker::Frame(9));
            arena.write_marker(7, Marker::Loop);
            assert_eq!(arena.read_marker(3), Marker::Frame(9));
            assert_eq!(arena.read_marker(7), Marker::Loop);
        }

        arena.zero();
        assert_eq!(unsafe { arena.read_marker(3) }, Marker::Stop);
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_pages_mmap() {
        let mut arena = Arena::new(4096, Backing::Mmap).unwrap();
        assert!(!arena.is_locked());
        // Bisa gagal jika RLIMIT_MEMLOCK host sangat kecil
        if arena.lock_pages().is_ok() {
            assert!(arena.is_locked());
            // Lock kedua no-op
            arena.lock_pages().unwrap();
            assert!(arena.is_locked());
        }
    }

    #[cfg(not(unix))]
    #[test]
    fn test_lock_pages_unsupported() {
        let mut arena = Arena::new(4096, Backing::Heap).unwrap();
        let err = arena.lock_pages().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(!arena.is_locked());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_panics() {
        let arena = Arena::new(8, Backing::Heap).unwrap();
        unsafe { arena.write_marker(6, Marker::Stop) };
    }

    #[test]
    #[should_panic(expected = "corrupt frame header")]
    fn test_corrupt_header_panics() {
        let arena = Arena::new(8, Backing::Heap).unwrap();
        unsafe {
            arena.slice_mut(0, 4).copy_from_slice(&(-5i32).to_ne_bytes());
            arena.read_marker(0);
        }
    }
}
