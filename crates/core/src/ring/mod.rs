//! Single-producer/single-consumer store of the most recent mono samples.
//!
//! Unlike a queue, reading never consumes anything: the consumer copies a
//! window that trails the producer's cursor. The write side and the read side
//! are separate handles so only one thread can ever advance the cursor.
//!
//! Samples live in `AtomicU32` slots holding `f32` bit patterns. A reader
//! racing a writer that laps it may observe newer samples than it expected,
//! but never a torn or undefined one.

use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};

struct Shared {
    samples: Box<[AtomicU32]>,
    /// Total samples ever written. The write cursor is this value modulo the
    /// capacity.
    written: AtomicU64,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.samples.len()
    }
}

/// Allocates the ring storage and hands out its two capabilities.
pub struct SampleRing;

impl SampleRing {
    /// Creates a ring holding `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> (RingWriter, RingReader) {
        assert!(capacity > 0, "ring capacity must be > 0");

        let samples = (0..capacity).map(|_| AtomicU32::new(0.0f32.to_bits())).collect();
        let shared = Arc::new(Shared {
            samples,
            written: AtomicU64::new(0),
        });

        (
            RingWriter {
                shared: shared.clone(),
                written: 0,
            },
            RingReader { shared },
        )
    }
}

/// Producer capability. Not `Clone`: there is exactly one per ring.
pub struct RingWriter {
    shared: Arc<Shared>,
    /// Local mirror of the published counter; only this handle advances it.
    written: u64,
}

impl RingWriter {
    /// Appends samples at the write cursor, wrapping around the end of the
    /// store. The new cursor is published only after every sample has been
    /// stored. Never blocks or allocates.
    #[inline]
    pub fn write<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = f32>,
    {
        let capacity = self.shared.capacity();
        let mut cursor = (self.written % capacity as u64) as usize;
        let mut count = 0u64;

        for sample in samples {
            self.shared.samples[cursor].store(sample.to_bits(), Ordering::Relaxed);
            cursor += 1;
            if cursor == capacity {
                cursor = 0;
            }
            count += 1;
        }

        if count > 0 {
            self.written = self.written.wrapping_add(count);
            self.shared.written.store(self.written, Ordering::Release);
        }
    }

    pub fn total_written(&self) -> u64 {
        self.written
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Consumer capability. Reads snapshots, never mutates the store.
pub struct RingReader {
    shared: Arc<Shared>,
}

impl RingReader {
    /// Total samples published by the writer so far.
    #[inline]
    pub fn total_written(&self) -> u64 {
        self.shared.written.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Copies the most recent `out.len()` samples in chronological order.
    ///
    /// Returns `false` and leaves `out` untouched when fewer samples have ever
    /// been written, or when `out` is longer than the ring.
    pub fn copy_latest(&self, out: &mut [f32]) -> bool {
        let len = out.len();
        let capacity = self.shared.capacity();
        let written = self.total_written();

        if len > capacity || written < len as u64 {
            return false;
        }

        let end = (written % capacity as u64) as usize;
        let start = (end + capacity - len) % capacity;

        let (head, tail) = if start + len <= capacity {
            (&self.shared.samples[start..start + len], &self.shared.samples[..0])
        } else {
            (
                &self.shared.samples[start..],
                &self.shared.samples[..start + len - capacity],
            )
        };

        for (slot, sample) in out.iter_mut().zip(head.iter().chain(tail)) {
            *slot = f32::from_bits(sample.load(Ordering::Relaxed));
        }
        true
    }
}

impl std::fmt::Debug for RingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingWriter")
            .field("capacity", &self.capacity())
            .field("written", &self.written)
            .finish()
    }
}

impl std::fmt::Debug for RingReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingReader")
            .field("capacity", &self.capacity())
            .field("written", &self.total_written())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(range: std::ops::Range<u32>) -> impl Iterator<Item = f32> {
        range.map(|i| i as f32)
    }

    #[test]
    fn refuses_to_read_before_enough_samples() {
        let (mut writer, reader) = SampleRing::with_capacity(16);
        let mut out = [-1.0f32; 8];

        writer.write(ramp(0..7));
        assert!(!reader.copy_latest(&mut out));
        assert_eq!(out, [-1.0; 8]);

        writer.write(ramp(7..8));
        assert!(reader.copy_latest(&mut out));
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn copies_across_the_wrap_in_order() {
        let (mut writer, reader) = SampleRing::with_capacity(8);
        writer.write(ramp(0..13));

        let mut out = [0.0f32; 6];
        assert!(reader.copy_latest(&mut out));
        assert_eq!(out, [7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(reader.total_written(), 13);
        assert_eq!(writer.total_written(), 13);
    }

    #[test]
    fn oversized_writes_keep_the_newest_samples() {
        let (mut writer, reader) = SampleRing::with_capacity(4);
        writer.write(ramp(0..10));

        let mut out = [0.0f32; 4];
        assert!(reader.copy_latest(&mut out));
        assert_eq!(out, [6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn rejects_windows_longer_than_the_ring() {
        let (mut writer, reader) = SampleRing::with_capacity(4);
        writer.write(ramp(0..32));

        let mut out = [0.0f32; 5];
        assert!(!reader.copy_latest(&mut out));
    }

    #[test]
    fn empty_writes_do_not_publish() {
        let (mut writer, reader) = SampleRing::with_capacity(4);
        writer.write(std::iter::empty());
        assert_eq!(reader.total_written(), 0);
    }
}
