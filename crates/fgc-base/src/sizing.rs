//! Space Sizing Negotiator
//!
//! Clamps and rounds the requested new/old generation bounds against the
//! alignment unit and the heap's real capacity. New-space values round to
//! twice the alignment because the new space is split into two equal halves;
//! old-space values round to the alignment.
//!
//! Guarantees for every output:
//! - `minimum_new + minimum_old <= minimum_space <= maximum_space`
//! - `maximum_new + maximum_old <= maximum_space <= heap capacity`

use crate::util::Alignment;
use serde::{Deserialize, Serialize};

/// Requested generation bounds, as configured by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceSizeRequest {
    pub minimum_space_size: usize,
    pub minimum_new_space_size: usize,
    pub initial_new_space_size: usize,
    pub maximum_new_space_size: usize,
    pub minimum_old_space_size: usize,
    pub initial_old_space_size: usize,
    pub maximum_old_space_size: usize,
    pub memory_max: usize,
}

/// Negotiated sizes consumed by heap and memory-space construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationParameters {
    pub minimum_space_size: usize,
    pub minimum_new_space_size: usize,
    pub initial_new_space_size: usize,
    pub maximum_new_space_size: usize,
    pub minimum_old_space_size: usize,
    pub initial_old_space_size: usize,
    pub maximum_old_space_size: usize,
    pub maximum_space_size: usize,
}

impl InitializationParameters {
    /// Initial heap size implied by the generation initials
    pub fn initial_space_size(&self) -> usize {
        self.initial_new_space_size
            .saturating_add(self.initial_old_space_size)
    }
}

/// Negotiate generation sizes
///
/// # Arguments
/// * `request` - Requested bounds
/// * `alignment` - Sizing unit (heap alignment or region size)
/// * `heap_capacity` - The heap's actual maximum memory size
pub fn negotiate(
    request: &SpaceSizeRequest,
    alignment: usize,
    heap_capacity: usize,
) -> InitializationParameters {
    let new_granule = alignment.saturating_mul(2);
    let round_new = |v| Alignment::round_to_ceiling(new_granule, v);
    let round_old = |v| Alignment::round_to_ceiling(alignment, v);

    let mut maximum_heap_size = Alignment::round_to_floor(alignment, heap_capacity);

    let minimum_new = round_new(request.minimum_new_space_size);
    let minimum_old = round_old(request.minimum_old_space_size);
    let maximum_new = round_new(request.maximum_new_space_size);
    let maximum_old = round_old(request.maximum_old_space_size);

    let minimum_space = round_old(request.minimum_space_size).max(minimum_new.saturating_add(minimum_old));
    let memory_max = round_old(request.memory_max).max(maximum_new.saturating_add(maximum_old));

    maximum_heap_size = maximum_heap_size.min(memory_max);

    let initial_new = round_new(request.initial_new_space_size);
    let initial_old = round_old(request.initial_old_space_size);

    // The heap may be smaller than requested; nothing may exceed it.
    let minimum_new_space_size = maximum_heap_size.min(minimum_new);
    let initial_new_space_size = maximum_heap_size.min(initial_new);
    let maximum_new_space_size = maximum_heap_size.min(maximum_new);

    InitializationParameters {
        minimum_space_size: maximum_heap_size.min(minimum_space),
        minimum_new_space_size,
        initial_new_space_size,
        maximum_new_space_size,
        minimum_old_space_size: (maximum_heap_size - minimum_new_space_size).min(minimum_old),
        initial_old_space_size: (maximum_heap_size - initial_new_space_size).min(initial_old),
        maximum_old_space_size: (maximum_heap_size - maximum_new_space_size).min(maximum_old),
        maximum_space_size: maximum_heap_size,
    }
}
