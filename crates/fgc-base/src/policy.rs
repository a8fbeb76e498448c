//! Policy Module - Fixed Variant Selection
//!
//! Every build toggle of the memory-management subsystem is a closed enum
//! chosen once at startup. Dispatch over them is an exhaustive `match`, so
//! each variant's path is always type-checked.

use crate::error::{FgcError, Result};
use crate::util::constants::KB;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Arraylet leaf size meaning "no leaf clamp"
pub const UNBOUNDED_ARRAYLET_LEAF_SIZE: usize = usize::MAX;

/// Default region size for the standard (TLH) collectors
pub const STANDARD_REGION_SIZE: usize = 64 * KB;

/// Default region size for the segregated collector
pub const SEGREGATED_REGION_SIZE: usize = 64 * KB;

/// Collector family the subsystem is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GcPolicy {
    /// New/old spaces with a scavenger for the new space
    Generational,
    /// Single flat space, no scavenger
    Flat,
    /// Segregated free-list heap; the collector drives its own dispatcher
    Segregated,
}

impl GcPolicy {
    /// Allocation front-end every environment gets under this policy
    pub fn allocation_type(self) -> AllocationType {
        match self {
            GcPolicy::Generational | GcPolicy::Flat => AllocationType::ThreadLocalHeap,
            GcPolicy::Segregated => AllocationType::Segregated,
        }
    }

    pub fn write_barrier_type(self) -> WriteBarrierType {
        match self {
            GcPolicy::Generational => WriteBarrierType::CardMarkAndOldCheck,
            GcPolicy::Flat => WriteBarrierType::CardMark,
            GcPolicy::Segregated => WriteBarrierType::RealtimeSnapshot,
        }
    }

    /// Unit the space negotiator rounds generation sizes to
    pub fn alignment_type(self) -> AlignmentType {
        match self {
            GcPolicy::Generational | GcPolicy::Flat => AlignmentType::Heap,
            GcPolicy::Segregated => AlignmentType::Region,
        }
    }

    pub fn default_region_size(self) -> usize {
        match self {
            GcPolicy::Generational | GcPolicy::Flat => STANDARD_REGION_SIZE,
            GcPolicy::Segregated => SEGREGATED_REGION_SIZE,
        }
    }

    /// Default arraylet leaf size; 0 means "use the region size"
    pub fn default_arraylet_leaf_size(self) -> usize {
        match self {
            GcPolicy::Generational | GcPolicy::Flat => UNBOUNDED_ARRAYLET_LEAF_SIZE,
            GcPolicy::Segregated => 0,
        }
    }

    pub fn scavenger_enabled(self) -> bool {
        matches!(self, GcPolicy::Generational)
    }

    /// Whether the global collector creates and destroys the parallel
    /// dispatcher itself
    pub fn collector_owns_dispatcher(self) -> bool {
        matches!(self, GcPolicy::Segregated)
    }

    pub fn name(self) -> &'static str {
        match self {
            GcPolicy::Generational => "generational",
            GcPolicy::Flat => "flat",
            GcPolicy::Segregated => "segregated",
        }
    }
}

impl FromStr for GcPolicy {
    type Err = FgcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generational" | "gencon" => Ok(GcPolicy::Generational),
            "flat" | "optthruput" => Ok(GcPolicy::Flat),
            "segregated" | "metronome" => Ok(GcPolicy::Segregated),
            other => Err(FgcError::Misconfiguration(format!(
                "unknown GC policy '{}'",
                other
            ))),
        }
    }
}

/// Per-thread allocation front-end variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationType {
    /// Thread-local heap (bump allocation out of a private cache)
    ThreadLocalHeap,
    /// Segregated free lists keyed by size class
    Segregated,
}

impl TryFrom<u8> for AllocationType {
    type Error = FgcError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(AllocationType::ThreadLocalHeap),
            2 => Ok(AllocationType::Segregated),
            other => Err(FgcError::Misconfiguration(format!(
                "allocation type {} is not a known variant",
                other
            ))),
        }
    }
}

/// Write barrier the embedding runtime must emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteBarrierType {
    None,
    Always,
    OldCheck,
    CardMark,
    CardMarkAndOldCheck,
    RealtimeSnapshot,
}

/// Which extension value serves as the sizing alignment unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignmentType {
    Heap,
    Region,
}

impl TryFrom<u8> for AlignmentType {
    type Error = FgcError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(AlignmentType::Heap),
            2 => Ok(AlignmentType::Region),
            other => Err(FgcError::Misconfiguration(format!(
                "alignment type {} is not a known variant",
                other
            ))),
        }
    }
}

/// How object references are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceMode {
    /// Full machine-word references
    Full,
    /// 32-bit references, shifted by the compression shift
    Compressed,
}

/// Scavenger copy ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanOrdering {
    /// Not chosen; the tuner picks
    None,
    BreadthFirst,
    DynamicBreadthFirst,
    Hierarchical,
}

/// CPU class used when counting processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuTarget {
    Physical,
    Online,
    /// CPUs the process may actually run on
    Target,
}

/// Platform rule applied after the tightest compression shift is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftFloorPolicy {
    /// Keep the tightest shift
    TightestFit,
    /// Raise any non-zero shift below the default up to the default
    RoundUpToDefault,
}

impl ShiftFloorPolicy {
    /// s390 benefits from small shifts; everything else rounds up to keep the
    /// number of distinct shift values small.
    pub fn platform_default() -> Self {
        if cfg!(target_arch = "s390x") {
            ShiftFloorPolicy::TightestFit
        } else {
            ShiftFloorPolicy::RoundUpToDefault
        }
    }
}
