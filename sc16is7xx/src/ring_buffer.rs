//! Byte ring buffer shared between the worker (producer) and the
//! application (consumer).
//!
//! Offsets only grow; the storage index is `offset % capacity`. One slot is
//! always left empty so that `read == write` unambiguously means empty. When
//! the consumer drains the buffer both offsets drop back to zero.
//!
//! # Concurrency Contract
//!
//! - Only ONE context may call the write family ([`write()`](RingBuffer::write),
//!   [`write_with()`](RingBuffer::write_with)).
//! - Only ONE context may call the read family ([`read()`](RingBuffer::read),
//!   [`read_byte()`](RingBuffer::read_byte)).
//! - The two may run concurrently. Offset updates and copies happen inside a
//!   `critical_section`; the zero-copy fill callback runs outside it, on a
//!   region the consumer cannot see until the fill is committed.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::{Cell, UnsafeCell};

use critical_section::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Offsets {
    read: usize,
    write: usize,
    /// A `write_with` region is on loan to the producer.
    filling: bool,
}

impl Offsets {
    fn used(&self) -> usize {
        self.write - self.read
    }
}

/// Fixed-capacity byte FIFO with `capacity - 1` usable bytes.
pub struct RingBuffer {
    storage: Box<[UnsafeCell<u8>]>,
    offsets: Mutex<Cell<Offsets>>,
}

// SAFETY: the producer only touches storage in [write, read + capacity - 1)
// and the consumer only in [read, write). Both ranges are computed and
// moved under the critical section, so they never overlap.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create an empty buffer with no storage. Call [`init()`](Self::init)
    /// before use.
    pub fn new() -> Self {
        RingBuffer {
            storage: Box::new([]),
            offsets: Mutex::new(Cell::new(Offsets::default())),
        }
    }

    /// Allocate a buffer of `capacity` bytes, or `None` if the allocator
    /// refuses.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        let mut buffer = RingBuffer::new();
        buffer.init(capacity).then_some(buffer)
    }

    /// (Re)allocate the backing store and reset both offsets.
    ///
    /// Any previous storage is released first. Returns `false` if the new
    /// allocation fails, leaving the buffer with zero capacity.
    pub fn init(&mut self, capacity: usize) -> bool {
        self.storage = Box::new([]);
        self.offsets.get_mut().set(Offsets::default());

        let mut storage = Vec::new();
        if storage.try_reserve_exact(capacity).is_err() {
            return false;
        }
        storage.resize_with(capacity, || UnsafeCell::new(0));
        self.storage = storage.into_boxed_slice();
        true
    }

    /// Size of the backing store. Usable capacity is one less.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes waiting to be read.
    pub fn available_to_read(&self) -> usize {
        critical_section::with(|cs| self.offsets.borrow(cs).get().used())
    }

    /// Free space for the producer.
    ///
    /// Advisory only: the consumer can free more space at any time.
    pub fn available_to_write(&self) -> usize {
        let used = critical_section::with(|cs| self.offsets.borrow(cs).get().used());
        self.free(used)
    }

    /// Pop the oldest byte, or `None` if the buffer is empty.
    pub fn read_byte(&self) -> Option<u8> {
        let mut byte = [0u8];
        match self.read(&mut byte) {
            0 => None,
            _ => Some(byte[0]),
        }
    }

    /// Copy up to `dst.len()` of the oldest bytes into `dst`.
    ///
    /// Returns the number of bytes copied; 0 means nothing was available.
    /// Never blocks.
    pub fn read(&self, dst: &mut [u8]) -> usize {
        let capacity = self.capacity();
        critical_section::with(|cs| {
            let cell = self.offsets.borrow(cs);
            let mut offsets = cell.get();
            let count = offsets.used().min(dst.len());
            if count == 0 {
                return 0;
            }

            let start = offsets.read % capacity;
            let first = count.min(capacity - start);
            // SAFETY: [read, read + count) lies inside [read, write), which
            // the producer never touches.
            unsafe {
                core::ptr::copy_nonoverlapping(self.base().add(start), dst.as_mut_ptr(), first);
                core::ptr::copy_nonoverlapping(
                    self.base(),
                    dst.as_mut_ptr().add(first),
                    count - first,
                );
            }

            offsets.read += count;
            if offsets.read == offsets.write && !offsets.filling {
                offsets.read = 0;
                offsets.write = 0;
            } else if offsets.read >= capacity {
                // Keeps both offsets bounded without moving any storage index.
                offsets.read -= capacity;
                offsets.write -= capacity;
            }
            cell.set(offsets);
            count
        })
    }

    /// Append as much of `src` as fits.
    ///
    /// Returns the number of bytes stored. Bytes beyond the free space are
    /// dropped; the producer must never block.
    pub fn write(&self, src: &[u8]) -> usize {
        let capacity = self.capacity();
        critical_section::with(|cs| {
            let cell = self.offsets.borrow(cs);
            let mut offsets = cell.get();
            let count = self.free(offsets.used()).min(src.len());
            if count == 0 {
                return 0;
            }

            let start = offsets.write % capacity;
            let first = count.min(capacity - start);
            // SAFETY: [write, write + count) is free space, unseen by the
            // consumer until `write` advances below.
            unsafe {
                core::ptr::copy_nonoverlapping(src.as_ptr(), self.base().add(start), first);
                core::ptr::copy_nonoverlapping(
                    src.as_ptr().add(first),
                    self.base(),
                    count - first,
                );
            }

            offsets.write += count;
            cell.set(offsets);
            count
        })
    }

    /// Zero-copy fill.
    ///
    /// Repeatedly lends `fill` the largest contiguous free region (bounded
    /// by the end of the backing store and by the free space). `fill`
    /// returns how many bytes it stored at the front of the region. Iteration
    /// stops when the buffer is full or `fill` stores fewer bytes than it was
    /// offered, which signals that its source is dry for now.
    ///
    /// Returns the total number of bytes committed.
    pub fn write_with<F>(&self, mut fill: F) -> usize
    where
        F: FnMut(&mut [u8]) -> usize,
    {
        let capacity = self.capacity();
        let mut total = 0;

        loop {
            let grant = critical_section::with(|cs| {
                let cell = self.offsets.borrow(cs);
                let mut offsets = cell.get();
                let free = self.free(offsets.used());
                if free == 0 {
                    return None;
                }
                let start = offsets.write % capacity;
                offsets.filling = true;
                cell.set(offsets);
                Some((start, free.min(capacity - start)))
            });
            let Some((start, len)) = grant else {
                break;
            };

            // SAFETY: the region is free space and `filling` stops the
            // consumer from rebasing the offsets while it is on loan.
            let region = unsafe { core::slice::from_raw_parts_mut(self.base().add(start), len) };
            let filled = fill(region).min(len);

            critical_section::with(|cs| {
                let cell = self.offsets.borrow(cs);
                let mut offsets = cell.get();
                offsets.write += filled;
                offsets.filling = false;
                cell.set(offsets);
            });

            total += filled;
            if filled < len {
                break;
            }
        }
        total
    }

    fn free(&self, used: usize) -> usize {
        self.capacity().saturating_sub(1).saturating_sub(used)
    }

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    #[cfg(test)]
    fn offsets(&self) -> (usize, usize) {
        let offsets = critical_section::with(|cs| self.offsets.borrow(cs).get());
        (offsets.read, offsets.write)
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        RingBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_then_read_in_order() {
        let rb = RingBuffer::with_capacity(8).unwrap();
        assert_eq!(rb.available_to_write(), 7);
        assert_eq!(rb.write(&[1, 2, 3]), 3);
        assert_eq!(rb.available_to_read(), 3);

        let mut out = [0u8; 8];
        assert_eq!(rb.read(&mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(rb.read(&mut out), 0);
        assert_eq!(rb.read_byte(), None);
    }

    #[test]
    fn overflow_keeps_existing_data() {
        let rb = RingBuffer::with_capacity(8).unwrap();
        assert_eq!(rb.write(&[10, 11, 12]), 3);
        let room = rb.available_to_write();
        assert_eq!(room, 4);

        // Only `room` bytes fit; the rest are dropped
        assert_eq!(rb.write(&[20, 21, 22, 23, 24, 25]), room);
        assert_eq!(rb.available_to_write(), 0);
        assert_eq!(rb.write(&[99]), 0);

        let mut out = [0u8; 16];
        assert_eq!(rb.read(&mut out), 7);
        assert_eq!(&out[..7], &[10, 11, 12, 20, 21, 22, 23]);
    }

    #[test]
    fn interleaved_round_trip_across_wrap() {
        let rb = RingBuffer::with_capacity(5).unwrap();
        let mut expected = Vec::new();
        let mut seen = Vec::new();
        let mut next = 0u8;

        for round in 0..50 {
            let n = (round % 4) + 1;
            let chunk: Vec<u8> = (0..n).map(|_| {
                next = next.wrapping_add(1);
                next
            }).collect();
            let stored = rb.write(&chunk);
            expected.extend_from_slice(&chunk[..stored]);

            // Leave a byte behind now and then so the offsets never reset
            let mut out = [0u8; 3];
            let got = rb.read(&mut out);
            seen.extend_from_slice(&out[..got]);
        }
        let mut out = [0u8; 8];
        let got = rb.read(&mut out);
        seen.extend_from_slice(&out[..got]);

        assert_eq!(seen, expected);
    }

    #[test]
    fn drain_resets_offsets() {
        let rb = RingBuffer::with_capacity(16).unwrap();
        let mut out = [0u8; 16];
        for cycle in 0..100_000u32 {
            let bytes = cycle.to_le_bytes();
            assert_eq!(rb.write(&bytes), 4);
            assert_eq!(rb.read(&mut out), 4);
            assert_eq!(&out[..4], &bytes);
            assert_eq!(rb.offsets(), (0, 0));
        }
    }

    #[test]
    fn offsets_stay_bounded_without_drain() {
        let rb = RingBuffer::with_capacity(8).unwrap();
        rb.write(&[0]);
        for i in 0..10_000u32 {
            rb.write(&[i as u8]);
            assert!(rb.read_byte().is_some());
            let (read, write) = rb.offsets();
            assert!(read < 8 && write < 16);
        }
        assert_eq!(rb.available_to_read(), 1);
    }

    #[test]
    fn write_with_matches_copying_write() {
        let source: Vec<u8> = (0..40u8).collect();

        let copied = RingBuffer::with_capacity(32).unwrap();
        let in_place = RingBuffer::with_capacity(32).unwrap();
        // Start both mid-buffer so the fill has to wrap
        for rb in [&copied, &in_place] {
            rb.write(&[0xAA; 20]);
            let mut sink = [0u8; 20];
            rb.read(&mut sink[..19]);
        }

        let stored = copied.write(&source);

        let mut cursor = 0;
        let mut offers = 0;
        let filled = in_place.write_with(|region| {
            offers += 1;
            let n = region.len().min(source.len() - cursor);
            region[..n].copy_from_slice(&source[cursor..cursor + n]);
            cursor += n;
            n
        });

        assert_eq!(filled, stored);
        assert_eq!(offers, 2);

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        let na = copied.read(&mut a);
        let nb = in_place.read(&mut b);
        assert_eq!(&a[..na], &b[..nb]);
    }

    #[test]
    fn write_with_stops_on_short_fill() {
        let rb = RingBuffer::with_capacity(16).unwrap();
        let mut calls = 0;
        let filled = rb.write_with(|region| {
            calls += 1;
            region[0] = 7;
            1
        });
        assert_eq!(filled, 1);
        assert_eq!(calls, 1);
        assert_eq!(rb.read_byte(), Some(7));

        assert_eq!(rb.write_with(|_| 0), 0);
        assert_eq!(rb.available_to_read(), 0);
    }

    #[test]
    fn init_resizes_and_resets() {
        let mut rb = RingBuffer::new();
        assert_eq!(rb.available_to_write(), 0);
        assert_eq!(rb.write(&[1]), 0);

        assert!(rb.init(4));
        assert_eq!(rb.write(&[1, 2, 3, 4]), 3);
        assert!(rb.init(10));
        assert_eq!(rb.capacity(), 10);
        assert_eq!(rb.available_to_read(), 0);
        assert_eq!(rb.available_to_write(), 9);
    }

    #[test]
    fn huge_allocation_fails_cleanly() {
        let mut rb = RingBuffer::new();
        assert!(!rb.init(usize::MAX));
        assert_eq!(rb.capacity(), 0);
        assert!(RingBuffer::with_capacity(usize::MAX).is_none());
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        const TOTAL: usize = 200_000;
        let rb = Arc::new(RingBuffer::with_capacity(61).unwrap());

        let producer = {
            let rb = Arc::clone(&rb);
            thread::spawn(move || {
                let mut next = 0usize;
                while next < TOTAL {
                    rb.write_with(|region| {
                        let n = region.len().min(TOTAL - next).min(13);
                        for slot in &mut region[..n] {
                            *slot = next as u8;
                            next += 1;
                        }
                        n
                    });
                    thread::yield_now();
                }
            })
        };

        let mut received = 0usize;
        let mut buf = vec![0u8; 17];
        while received < TOTAL {
            let n = rb.read(&mut buf);
            for &byte in &buf[..n] {
                assert_eq!(byte, received as u8);
                received += 1;
            }
            if n == 0 {
                thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(rb.available_to_read(), 0);
    }
}
