//! Allocation workloads run once per sampling iteration.

use std::hint::black_box;
use std::mem::size_of;

/// Something that generates memory pressure between samples.
pub trait Workload {
    fn apply(&mut self, iteration: usize);
}

/// Builds a buffer of `elements` integers every iteration.
///
/// With `retain` unset the buffer is dropped before `apply` returns. With it
/// set, every buffer is kept until the workload itself is dropped.
#[derive(Debug)]
pub struct BufferPressure {
    elements: usize,
    retain: bool,
    retained: Vec<Vec<u64>>,
}

impl BufferPressure {
    pub const DEFAULT_ELEMENTS: usize = 10_000;

    pub fn new(elements: usize, retain: bool) -> Self {
        Self {
            elements,
            retain,
            retained: Vec::new(),
        }
    }

    pub fn retained_buffers(&self) -> usize {
        self.retained.len()
    }

    pub fn retained_bytes(&self) -> usize {
        self.retained.iter().map(|b| b.len() * size_of::<u64>()).sum()
    }
}

impl Default for BufferPressure {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ELEMENTS, false)
    }
}

impl Workload for BufferPressure {
    fn apply(&mut self, _iteration: usize) {
        let buf: Vec<u64> = (0..self.elements as u64).collect();
        if self.retain {
            self.retained.push(buf);
        } else {
            black_box(&buf);
        }
    }
}

/// Workload that allocates nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl Workload for Idle {
    fn apply(&mut self, _iteration: usize) {}
}

impl<W: Workload + ?Sized> Workload for &mut W {
    fn apply(&mut self, iteration: usize) {
        (**self).apply(iteration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allocates_the_standard_buffer() {
        let w = BufferPressure::default();
        assert_eq!(w.elements, BufferPressure::DEFAULT_ELEMENTS);
        assert!(!w.retain);
    }

    #[test]
    fn discarding_keeps_nothing() {
        let mut w = BufferPressure::new(BufferPressure::DEFAULT_ELEMENTS, false);
        for i in 0..5 {
            w.apply(i);
        }
        assert_eq!(w.retained_buffers(), 0);
        assert_eq!(w.retained_bytes(), 0);
    }

    #[test]
    fn retaining_grows_by_one_buffer_per_iteration() {
        let mut w = BufferPressure::new(1_000, true);
        for i in 0..3 {
            w.apply(i);
        }
        assert_eq!(w.retained_buffers(), 3);
        assert_eq!(w.retained_bytes(), 3 * 1_000 * 8);
    }
}
