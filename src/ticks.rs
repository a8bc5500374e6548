//! Wraparound-safe arithmetic on free-running tick counters.
//!
//! Hardware microsecond counters wrap at a fixed modulus `M = 2^bits`.
//! Comparing two readings with a plain subtraction breaks at the wrap
//! boundary, so every comparison goes through [`TickSpace::diff`], which
//! reduces the difference modulo `M` and reinterprets it as signed.
//!
//! Differences are only meaningful while the two readings are less than
//! `M / 2` apart.

/// The counter domain of one monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSpace {
    bits: u32,
}

impl TickSpace {
    /// Full 32-bit counter (e.g. `esp_timer_get_time() as u32`).
    pub const U32: Self = Self::new(32);

    /// Counter that wraps at `2^bits`.
    ///
    /// # Panics
    ///
    /// If `bits` is outside `2..=32`.
    pub const fn new(bits: u32) -> Self {
        assert!(bits >= 2 && bits <= 32, "tick space must be 2..=32 bits");
        Self { bits }
    }

    /// Width of the counter in bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// Largest counter value (`M - 1`).
    #[inline]
    pub const fn max(self) -> u32 {
        if self.bits == 32 {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    /// Largest positive interval `diff` can report (`M / 2 - 1`).
    #[inline]
    pub const fn half_range(self) -> u32 {
        self.max() >> 1
    }

    /// Reduce an arbitrary value into the counter domain.
    #[inline]
    pub const fn wrap(self, value: u32) -> u32 {
        value & self.max()
    }

    /// `(tick + delta) mod M`.
    #[inline]
    pub const fn add(self, tick: u32, delta: i32) -> u32 {
        self.wrap(tick.wrapping_add(delta as u32))
    }

    /// `((end - start) mod M)` reinterpreted as a signed value in
    /// `[-M/2, M/2)`.
    ///
    /// Negative means `end` is still before `start`.
    #[inline]
    pub const fn diff(self, end: u32, start: u32) -> i32 {
        let raw = self.wrap(end.wrapping_sub(start));
        let shift = 32 - self.bits;
        ((raw << shift) as i32) >> shift
    }

    /// True once `now` has reached or passed `deadline`.
    #[inline]
    pub const fn is_reached(self, now: u32, deadline: u32) -> bool {
        self.diff(now, deadline) >= 0
    }
}

impl Default for TickSpace {
    fn default() -> Self {
        Self::U32
    }
}
