//! Rolling window of decoded mono samples.
//!
//! Sits between upstream stream reads (which decode a variable number of
//! samples) and frame pulls (which always take a fixed `frame_length`).
//! Backed by `ringbuf::HeapRb<i16>`, so consuming a frame never shifts the
//! remaining samples.

pub mod frame;

use ringbuf::{
    traits::{Consumer, Observer, Producer},
    HeapRb,
};

/// Ring-backed sample window owned by exactly one Frame Resampler.
///
/// `len()` is always the number of valid unconsumed samples.
pub struct RollingSampleBuffer {
    ring: HeapRb<i16>,
}

impl RollingSampleBuffer {
    /// # Panics
    /// Never panics. A zero capacity is bumped to one slot.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    /// Grow the window so it can hold at least `needed` samples, keeping the
    /// unconsumed samples in order.
    pub fn reserve_total(&mut self, needed: usize) {
        if needed <= self.capacity() {
            return;
        }
        let mut grown = HeapRb::new(needed);
        let mut scratch = vec![0i16; self.len()];
        let n = self.ring.pop_slice(&mut scratch);
        grown.push_slice(&scratch[..n]);
        tracing::debug!(from = self.capacity(), to = needed, "rolling buffer grown");
        self.ring = grown;
    }

    /// Append one decoded sample. Returns `false` if the window is full.
    pub fn push_sample(&mut self, sample: i16) -> bool {
        self.ring.try_push(sample).is_ok()
    }

    /// Append decoded samples, returning how many fit.
    pub fn push(&mut self, samples: &[i16]) -> usize {
        self.ring.push_slice(samples)
    }

    /// Move up to `out.len()` of the oldest samples into `out`.
    pub fn pop_into(&mut self, out: &mut [i16]) -> usize {
        self.ring.pop_slice(out)
    }

    /// Discard all unconsumed samples.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_preserves_order_across_wraparound() {
        let mut buf = RollingSampleBuffer::with_capacity(4);
        assert_eq!(buf.push(&[1, 2, 3]), 3);
        let mut out = [0i16; 2];
        assert_eq!(buf.pop_into(&mut out), 2);
        assert_eq!(out, [1, 2]);

        // Wraps past the end of the backing storage.
        assert_eq!(buf.push(&[4, 5, 6]), 3);
        let mut out = [0i16; 4];
        assert_eq!(buf.pop_into(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
        assert!(buf.is_empty());
    }

    #[test]
    fn full_window_rejects_samples() {
        let mut buf = RollingSampleBuffer::with_capacity(2);
        assert!(buf.push_sample(1));
        assert!(buf.push_sample(2));
        assert!(!buf.push_sample(3));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn reserve_total_keeps_unconsumed_samples() {
        let mut buf = RollingSampleBuffer::with_capacity(3);
        buf.push(&[7, 8, 9]);
        let mut one = [0i16; 1];
        buf.pop_into(&mut one);
        buf.push(&[10]);

        buf.reserve_total(16);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.len(), 3);
        let mut out = [0i16; 3];
        buf.pop_into(&mut out);
        assert_eq!(out, [8, 9, 10]);
    }
}
