//! Alignment Utilities
//!
//! Helper functions for memory alignment and granular rounding.

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to a power-of-two boundary
    ///
    /// # Examples
    /// ```
    /// use fgc_base::util::Alignment;
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// ```
    pub fn align_up(value: usize, alignment: usize) -> usize {
        (value + alignment - 1) & !(alignment - 1)
    }

    /// Align value up, or `None` when the result does not fit in `usize`
    ///
    /// # Examples
    /// ```
    /// use fgc_base::util::Alignment;
    /// assert_eq!(Alignment::checked_align_up(100, 8), Some(104));
    /// assert_eq!(Alignment::checked_align_up(usize::MAX, 8), None);
    /// ```
    pub fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
        value
            .checked_add(alignment - 1)
            .map(|v| v & !(alignment - 1))
    }

    /// Align value down to a power-of-two boundary
    pub fn align_down(value: usize, alignment: usize) -> usize {
        value & !(alignment - 1)
    }

    /// Check if value is aligned
    pub fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }

    /// Round up to the next multiple of `granularity`
    ///
    /// Works for any non-zero granularity and saturates instead of
    /// overflowing. A zero granularity leaves the value unchanged.
    ///
    /// ```
    /// use fgc_base::util::Alignment;
    /// assert_eq!(Alignment::round_to_ceiling(2048, 3 * 1024), 4096);
    /// assert_eq!(Alignment::round_to_ceiling(2048, 0), 0);
    /// ```
    pub fn round_to_ceiling(granularity: usize, value: usize) -> usize {
        if granularity == 0 {
            return value;
        }
        match value % granularity {
            0 => value,
            rem => {
                let rounded = value.saturating_add(granularity - rem);
                if rounded % granularity == 0 {
                    rounded
                } else {
                    Self::round_to_floor(granularity, usize::MAX)
                }
            }
        }
    }

    /// Round down to the previous multiple of `granularity`
    pub fn round_to_floor(granularity: usize, value: usize) -> usize {
        if granularity == 0 {
            return value;
        }
        value - value % granularity
    }
}
