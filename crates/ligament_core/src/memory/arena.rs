//! # Scratch Arena
//!
//! Byte budget for per-step temporary data, returned all at once at the
//! start of the next step.

use std::mem::size_of;

/// Per-step byte accounting.
///
/// Every batch of temporary values built during a step is charged here.
/// Charges beyond the budget are still recorded so the peak shows how
/// far over it a step went; the caller decides what to do about it.
///
/// # Example
///
/// ```rust
/// use ligament_core::ScratchArena;
///
/// let mut arena = ScratchArena::new(64).expect("non-zero budget");
/// assert!(arena.charge::<u64>(8));
/// assert!(!arena.charge::<u64>(1));
/// arena.reset();
/// assert_eq!(arena.used(), 0);
/// assert_eq!(arena.peak(), 72);
/// ```
#[derive(Debug)]
pub struct ScratchArena {
    used: usize,
    peak: usize,
    capacity: usize,
}

impl ScratchArena {
    /// Creates an arena with a budget of `capacity` bytes.
    ///
    /// # Returns
    ///
    /// `None` for a zero budget.
    #[must_use]
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then_some(Self {
            used: 0,
            peak: 0,
            capacity,
        })
    }

    /// Budget in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes charged since the last reset.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Largest `used()` seen so far.
    #[inline]
    #[must_use]
    pub const fn peak(&self) -> usize {
        self.peak
    }

    /// Charges `count` values of `T`.
    ///
    /// # Returns
    ///
    /// `false` when the step is now over budget.
    pub fn charge<T>(&mut self, count: usize) -> bool {
        let bytes = size_of::<T>().saturating_mul(count);
        self.used = self.used.saturating_add(bytes);
        self.peak = self.peak.max(self.used);
        self.used <= self.capacity
    }

    /// Returns the whole budget.
    #[inline]
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_rejected() {
        assert!(ScratchArena::new(0).is_none());
    }

    #[test]
    fn test_charges_accumulate_until_reset() {
        let mut arena = ScratchArena::new(100).unwrap();
        assert!(arena.charge::<f32>(10));
        assert!(arena.charge::<f32>(15));
        assert_eq!(arena.used(), 100);
        assert!(!arena.charge::<u8>(1));

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.peak(), 101);
        assert_eq!(arena.capacity(), 100);
    }
}
