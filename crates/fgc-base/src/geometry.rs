//! Heap Geometry Calculator
//!
//! Numeric heap-shape decisions made before and right after the heap exists:
//! - Power-of-two rounding with a platform floor
//! - Region size and arraylet leaf size
//! - Compressed-reference shift selection and run-time object alignment
//!
//! ## Compression Shift
//!
//! A compressed reference is a 32-bit value shifted left by `shift`, so a
//! heap is addressable when `heap_top <= 2^32 << shift`. The calculator picks
//! the tightest such shift, then applies platform policy:
//!
//! ```text
//! start: 4 (or 0 if shifting disallowed, or the forced value)
//!   │
//!   ├─ heap_top > 2^32 << start ──▶ ImpossibleGeometry
//!   │
//!   ├─ unforced: shrink while heap_top still fits
//!   │
//!   ├─ RoundUpToDefault platforms: 1..=2 ──▶ 3
//!   │
//!   └─ force-low-ceiling: anything < 3 ──▶ 3
//! ```

use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use crate::logging::{log_event, LifecycleEvent};
use crate::policy::{ReferenceMode, ShiftFloorPolicy, UNBOUNDED_ARRAYLET_LEAF_SIZE};
use crate::util::constants::{MAXIMUM_REGION_SIZE, OBJECT_ALIGNMENT};
use serde::{Deserialize, Serialize};

/// Largest shift the unforced search starts from
pub const LOW_MEMORY_HEAP_CEILING_SHIFT: usize = 4;

/// Shift platforms round small non-zero shifts up to
pub const DEFAULT_LOW_MEMORY_HEAP_CEILING_SHIFT: usize = 3;

const COMPRESSED_ADDRESS_BITS: u32 = 32;

/// Smallest power-of-two shift that can represent `value`
///
/// The result is never below `floor_shift`. Returns `None` (no valid shift)
/// for zero, or when the rounded value does not fit in the address space.
///
/// ```
/// use fgc_base::geometry::calculate_power_of_two_shift;
/// assert_eq!(calculate_power_of_two_shift(3000, 12), Some(12));
/// assert_eq!(calculate_power_of_two_shift(5000, 12), Some(13));
/// assert_eq!(calculate_power_of_two_shift(0, 12), None);
/// ```
pub fn calculate_power_of_two_shift(value: usize, floor_shift: usize) -> Option<usize> {
    if value == 0 || floor_shift >= usize::BITS as usize {
        return None;
    }
    let shift = value.checked_next_power_of_two()?.trailing_zeros() as usize;
    Some(shift.max(floor_shift))
}

/// Highest address reachable with compressed references at `shift`
pub fn compressed_heap_ceiling(shift: usize) -> u128 {
    (1u128 << COMPRESSED_ADDRESS_BITS) << shift
}

fn fits(heap_top: u64, shift: usize) -> bool {
    u128::from(heap_top) <= compressed_heap_ceiling(shift)
}

/// Compression options that shape shift selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Permit a non-zero shift
    pub allow_shifting: bool,
    /// Exact shift to use; disables all adjustment
    pub forced_shift: Option<usize>,
    /// Raise the shift to the default ceiling shift whenever adjustable
    pub force_low_memory_heap_ceiling_shift: bool,
    pub floor_policy: ShiftFloorPolicy,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            allow_shifting: true,
            forced_shift: None,
            force_low_memory_heap_ceiling_shift: false,
            floor_policy: ShiftFloorPolicy::platform_default(),
        }
    }
}

/// Pick the compression shift for a heap ending at `heap_top`
pub fn select_compression_shift(heap_top: u64, settings: &CompressionSettings) -> Result<usize> {
    let mut shift = if settings.allow_shifting {
        LOW_MEMORY_HEAP_CEILING_SHIFT
    } else {
        0
    };
    let mut can_change_shift = true;

    if let Some(forced) = settings.forced_shift {
        shift = forced;
        can_change_shift = false;
    }

    if !fits(heap_top, shift) {
        return Err(FgcError::ImpossibleGeometry { heap_top, shift });
    }

    if can_change_shift {
        while shift > 0 && fits(heap_top, shift - 1) {
            shift -= 1;
        }

        if settings.floor_policy == ShiftFloorPolicy::RoundUpToDefault
            && shift != 0
            && shift < DEFAULT_LOW_MEMORY_HEAP_CEILING_SHIFT
        {
            shift = DEFAULT_LOW_MEMORY_HEAP_CEILING_SHIFT;
        }

        if settings.force_low_memory_heap_ceiling_shift
            && shift < DEFAULT_LOW_MEMORY_HEAP_CEILING_SHIFT
        {
            shift = DEFAULT_LOW_MEMORY_HEAP_CEILING_SHIFT;
        }
    }

    Ok(shift)
}

/// Finalize `ext.region_size` to a viable power of two
///
/// A region size of 0 selects `default_region_size`.
pub fn initialize_region_size(ext: &mut GcExtensions, default_region_size: usize) -> Result<()> {
    let requested = if ext.region_size == 0 {
        default_region_size
    } else {
        ext.region_size
    };

    let shift = calculate_power_of_two_shift(requested, ext.minimum_region_shift).ok_or_else(|| {
        FgcError::InvalidRegionSize {
            requested,
            reason: "cannot be rounded to a power of two".to_string(),
        }
    })?;

    let region_size = 1usize << shift;
    ext.region_size = region_size;
    verify_region_size(ext, region_size)?;

    log_event(LifecycleEvent::RegionSizeFixed {
        requested,
        region_size,
    });
    Ok(())
}

/// Structural check that a region size suits the heap layout
pub fn verify_region_size(ext: &GcExtensions, region_size: usize) -> Result<()> {
    if region_size > MAXIMUM_REGION_SIZE {
        return Err(FgcError::InvalidRegionSize {
            requested: region_size,
            reason: format!("exceeds the largest supported region ({})", MAXIMUM_REGION_SIZE),
        });
    }
    if region_size > ext.memory_max {
        return Err(FgcError::InvalidRegionSize {
            requested: region_size,
            reason: format!("a single region exceeds the maximum heap ({})", ext.memory_max),
        });
    }
    Ok(())
}

/// Finalize the arraylet leaf size
///
/// [`UNBOUNDED_ARRAYLET_LEAF_SIZE`] leaves leaves unbounded with a log size
/// of 0; 0 means "region size"; anything else is rounded like a region.
pub fn initialize_arraylet_leaf_size(ext: &mut GcExtensions, default_leaf_size: usize) -> Result<()> {
    if default_leaf_size == UNBOUNDED_ARRAYLET_LEAF_SIZE {
        ext.arraylet_leaf_size = UNBOUNDED_ARRAYLET_LEAF_SIZE;
        ext.arraylet_leaf_log_size = 0;
    } else {
        let requested = if default_leaf_size != 0 {
            default_leaf_size
        } else {
            ext.region_size
        };
        let shift = calculate_power_of_two_shift(requested, ext.minimum_region_shift).ok_or_else(
            || FgcError::InvalidArrayletLeafSize {
                requested,
                reason: "cannot be rounded to a power of two".to_string(),
            },
        )?;
        ext.arraylet_leaf_size = 1usize << shift;
        ext.arraylet_leaf_log_size = shift;
    }

    log_event(LifecycleEvent::ArrayletLeafSizeFixed {
        leaf_size: ext.arraylet_leaf_size,
        log_size: ext.arraylet_leaf_log_size,
    });
    Ok(())
}

/// Publish the compression shift and object alignment for a heap top
pub fn initialize_run_time_object_alignment_and_cr_shift(
    ext: &mut GcExtensions,
    heap_top: usize,
) -> Result<()> {
    if ext.reference_mode == ReferenceMode::Compressed {
        let heap_top = heap_top as u64;
        let shift = select_compression_shift(heap_top, &ext.compression)?;
        ext.compressed_pointers_shift = shift;
        log_event(LifecycleEvent::CompressionShiftSelected { heap_top, shift });
    }

    let alignment = match ext.reference_mode {
        ReferenceMode::Compressed => OBJECT_ALIGNMENT.max(1usize << ext.compressed_pointers_shift),
        ReferenceMode::Full => OBJECT_ALIGNMENT,
    };
    ext.object_alignment_in_bytes = alignment;
    ext.object_alignment_shift = alignment.trailing_zeros() as usize;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB4: u64 = 1 << 32;

    fn settings(floor_policy: ShiftFloorPolicy) -> CompressionSettings {
        CompressionSettings {
            floor_policy,
            ..Default::default()
        }
    }

    #[test]
    fn test_power_of_two_shift() {
        assert_eq!(calculate_power_of_two_shift(1, 0), Some(0));
        assert_eq!(calculate_power_of_two_shift(4096, 12), Some(12));
        assert_eq!(calculate_power_of_two_shift(4097, 12), Some(13));
        assert_eq!(calculate_power_of_two_shift(1, 16), Some(16));
        assert_eq!(calculate_power_of_two_shift(usize::MAX, 12), None);
        assert_eq!(calculate_power_of_two_shift(64, usize::BITS as usize), None);
    }

    #[test]
    fn test_low_heap_needs_no_shift() {
        let shift = select_compression_shift(GIB4, &settings(ShiftFloorPolicy::RoundUpToDefault));
        assert_eq!(shift.unwrap(), 0);
    }

    #[test]
    fn test_tightest_fit() {
        let s = settings(ShiftFloorPolicy::TightestFit);
        assert_eq!(select_compression_shift(GIB4 + 1, &s).unwrap(), 1);
        assert_eq!(select_compression_shift(3 * GIB4, &s).unwrap(), 2);
        assert_eq!(select_compression_shift(16 * GIB4, &s).unwrap(), 4);
    }

    #[test]
    fn test_round_up_to_default() {
        let s = settings(ShiftFloorPolicy::RoundUpToDefault);
        assert_eq!(select_compression_shift(GIB4 + 1, &s).unwrap(), 3);
        assert_eq!(select_compression_shift(9 * GIB4, &s).unwrap(), 4);
    }

    #[test]
    fn test_force_low_ceiling_raises_zero() {
        let s = CompressionSettings {
            force_low_memory_heap_ceiling_shift: true,
            ..settings(ShiftFloorPolicy::TightestFit)
        };
        assert_eq!(select_compression_shift(0x1000_0000, &s).unwrap(), 3);
    }

    #[test]
    fn test_forced_shift_is_not_adjusted() {
        let s = CompressionSettings {
            forced_shift: Some(1),
            force_low_memory_heap_ceiling_shift: true,
            ..settings(ShiftFloorPolicy::RoundUpToDefault)
        };
        assert_eq!(select_compression_shift(0x1000, &s).unwrap(), 1);
    }

    #[test]
    fn test_forced_shift_too_small_is_impossible() {
        let s = CompressionSettings {
            forced_shift: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            select_compression_shift(GIB4 + 1, &s),
            Err(FgcError::ImpossibleGeometry { shift: 0, .. })
        ));
    }

    #[test]
    fn test_heap_above_max_ceiling_is_impossible() {
        let err = select_compression_shift(16 * GIB4 + 1, &CompressionSettings::default());
        assert!(matches!(err, Err(FgcError::ImpossibleGeometry { shift: 4, .. })));
    }

    #[test]
    fn test_shifting_disallowed() {
        let s = CompressionSettings {
            allow_shifting: false,
            ..Default::default()
        };
        assert_eq!(select_compression_shift(GIB4, &s).unwrap(), 0);
        assert!(select_compression_shift(GIB4 + 1, &s).is_err());
    }
}
