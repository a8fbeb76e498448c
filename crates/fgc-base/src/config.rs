//! Configuration Module - Memory-Management Startup Options
//!
//! Holds every user-settable option consumed while bringing the heap up.
//! Options are copied into [`GcExtensions`](crate::extensions::GcExtensions)
//! at startup; the configuration itself is never mutated by the subsystem.

use crate::policy::{GcPolicy, ReferenceMode, ScanOrdering};
use crate::util::constants::{DEFAULT_HEAP_ALIGNMENT, GB, KB, MB};
use serde::{Deserialize, Serialize};

/// Largest compression shift a user may force
pub const MAXIMUM_FORCED_SHIFT: usize = 4;

/// Startup configuration for the memory-management subsystem
///
/// Most parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use fgc_base::{GcConfig, GcPolicy};
///
/// let config = GcConfig {
///     policy: GcPolicy::Flat,
///     gc_threads: Some(8),
///     memory_max: 256 * 1024 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcConfig {
    /// Collector family
    ///
    /// Fixes the allocation front-end, write barrier, sizing alignment and
    /// default region geometry.
    ///
    /// Default: Generational
    pub policy: GcPolicy,

    /// Reference storage mode
    ///
    /// Compressed references require the heap top to be addressable as
    /// `2^32 << shift`.
    ///
    /// Default: Full
    pub reference_mode: ReferenceMode,

    /// Region size in bytes
    ///
    /// 0 selects the policy default. Always finalized to a power of two.
    ///
    /// Default: 0
    pub region_size: usize,

    /// Heap alignment in bytes (must be a power of two)
    ///
    /// Default: 512
    pub heap_alignment: usize,

    /// Preferred heap base address
    ///
    /// Default: 256MB
    pub heap_base: usize,

    /// Maximum heap size in bytes
    ///
    /// Default: derived from physical memory
    pub memory_max: usize,

    /// Overall minimum heap size in bytes
    ///
    /// Default: 8MB
    pub minimum_space_size: usize,

    /// Minimum new-space size in bytes
    pub minimum_new_space_size: usize,
    /// Initial new-space size in bytes
    pub initial_new_space_size: usize,
    /// Maximum new-space size in bytes
    pub maximum_new_space_size: usize,

    /// Minimum old-space size in bytes
    pub minimum_old_space_size: usize,
    /// Initial old-space size in bytes
    pub initial_old_space_size: usize,
    /// Maximum old-space size in bytes
    pub maximum_old_space_size: usize,

    /// Number of GC worker threads
    ///
    /// If None, derived from the CPU count and the delegate maximum.
    ///
    /// Default: Auto-detect
    pub gc_threads: Option<usize>,

    /// Forced work-packet list split
    pub packet_list_split: Option<usize>,

    /// Forced scan-cache list split
    pub cache_list_split: Option<usize>,

    /// Forced free-list split
    pub split_free_list_amount: Option<usize>,

    /// Scavenger scan ordering
    ///
    /// Default: None (tuner picks hierarchical)
    pub scan_ordering: ScanOrdering,

    /// Allow a non-zero compression shift
    ///
    /// Default: true
    pub allow_shifting_compression: bool,

    /// Force an exact compression shift
    pub forced_shift: Option<usize>,

    /// Raise the shift to the default ceiling shift whenever possible
    ///
    /// Default: false
    pub force_low_memory_heap_ceiling_shift: bool,

    /// Test-only: reject heaps whose base is below this address
    pub verify_heap_above: usize,

    /// Test-only: reject heaps whose top is above this address
    pub verify_heap_below: Option<usize>,

    /// Minimum thread-local heap size
    ///
    /// Default: 2KB
    pub tlh_minimum_size: usize,

    /// Initial thread-local heap size
    ///
    /// Default: 32KB
    pub tlh_initial_size: usize,

    /// Maximum thread-local heap size
    ///
    /// Default: 128KB
    pub tlh_maximum_size: usize,

    /// Cell sizes for the segregated allocation front-end (ascending)
    pub size_classes: Vec<usize>,

    /// Enable NUMA awareness
    ///
    /// Default: true
    pub numa_enabled: bool,

    /// Excessive-GC detection; None means "not specified" (enabled)
    pub excessive_gc_enabled: Option<bool>,

    /// Enable verbose lifecycle logging
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        let memory_max = calculate_max_heap(get_total_memory());

        GcConfig {
            policy: GcPolicy::Generational,
            reference_mode: ReferenceMode::Full,

            // Geometry
            region_size: 0,
            heap_alignment: DEFAULT_HEAP_ALIGNMENT,
            heap_base: 256 * MB,

            // Heap size
            memory_max,
            minimum_space_size: 8 * MB,
            minimum_new_space_size: 2 * MB,
            initial_new_space_size: 2 * MB,
            maximum_new_space_size: memory_max / 4,
            minimum_old_space_size: 6 * MB,
            initial_old_space_size: 6 * MB,
            maximum_old_space_size: memory_max - memory_max / 4,

            // Threading
            gc_threads: None,
            packet_list_split: None,
            cache_list_split: None,
            split_free_list_amount: None,
            scan_ordering: ScanOrdering::None,

            // Compressed references
            allow_shifting_compression: true,
            forced_shift: None,
            force_low_memory_heap_ceiling_shift: false,

            // Verification window
            verify_heap_above: 0,
            verify_heap_below: None,

            // Allocation front-ends
            tlh_minimum_size: 2 * KB,
            tlh_initial_size: 32 * KB,
            tlh_maximum_size: 128 * KB,
            size_classes: vec![16, 32, 48, 64, 96, 128, 192, 256, 512, 1024, 2048],

            numa_enabled: true,
            excessive_gc_enabled: None,
            verbose: false,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges. Geometry that can only be
    /// judged against a real heap (region viability, addressability) is
    /// checked later during initialization.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fgc_base::GcConfig;
    ///
    /// let config = GcConfig {
    ///     gc_threads: Some(0),  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_max == 0 {
            return Err(ConfigError::InvalidHeapSize(
                "memory_max must be > 0".to_string(),
            ));
        }

        if self.minimum_space_size > self.memory_max {
            return Err(ConfigError::InvalidHeapSize(
                "minimum_space_size cannot exceed memory_max".to_string(),
            ));
        }

        if !self.heap_alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(format!(
                "heap_alignment ({}) must be a power of two",
                self.heap_alignment
            )));
        }

        if self.gc_threads == Some(0) {
            return Err(ConfigError::InvalidGcThreads(
                "gc_threads must be > 0".to_string(),
            ));
        }

        for (name, split) in [
            ("packet_list_split", self.packet_list_split),
            ("cache_list_split", self.cache_list_split),
            ("split_free_list_amount", self.split_free_list_amount),
        ] {
            if split == Some(0) {
                return Err(ConfigError::InvalidSplit(format!("{} must be > 0", name)));
            }
        }

        if let Some(shift) = self.forced_shift {
            if shift > MAXIMUM_FORCED_SHIFT {
                return Err(ConfigError::InvalidShift(format!(
                    "forced_shift ({}) must be <= {}",
                    shift, MAXIMUM_FORCED_SHIFT
                )));
            }
        }

        if self.tlh_minimum_size == 0
            || self.tlh_minimum_size > self.tlh_initial_size
            || self.tlh_initial_size > self.tlh_maximum_size
        {
            return Err(ConfigError::InvalidTlhSize(
                "tlh sizes must satisfy 0 < minimum <= initial <= maximum".to_string(),
            ));
        }

        if self.policy == GcPolicy::Segregated {
            if self.size_classes.is_empty() {
                return Err(ConfigError::InvalidSizeClasses(
                    "segregated policy needs at least one size class".to_string(),
                ));
            }
            if self.size_classes.windows(2).any(|w| w[0] >= w[1]) || self.size_classes[0] == 0 {
                return Err(ConfigError::InvalidSizeClasses(
                    "size classes must be non-zero and strictly ascending".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - FGC_POLICY
    /// - FGC_REGION_SIZE
    /// - FGC_MEMORY_MAX
    /// - FGC_GC_THREADS
    /// - FGC_COMPRESSED_REFS
    /// - FGC_FORCED_SHIFT
    /// - FGC_VERBOSE
    ///
    /// # Examples
    ///
    /// ```bash
    /// export FGC_POLICY=segregated
    /// export FGC_MEMORY_MAX=1073741824  # 1GB
    /// export FGC_COMPRESSED_REFS=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FGC_POLICY") {
            if let Ok(policy) = val.parse::<GcPolicy>() {
                config.policy = policy;
            }
        }

        if let Ok(val) = std::env::var("FGC_REGION_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                config.region_size = size;
            }
        }

        if let Ok(val) = std::env::var("FGC_MEMORY_MAX") {
            if let Ok(size) = val.parse::<usize>() {
                config.memory_max = size;
                config.maximum_new_space_size = size / 4;
                config.maximum_old_space_size = size - size / 4;
            }
        }

        if let Ok(val) = std::env::var("FGC_GC_THREADS") {
            if let Ok(threads) = val.parse::<usize>() {
                config.gc_threads = Some(threads);
            }
        }

        if let Ok(val) = std::env::var("FGC_COMPRESSED_REFS") {
            if is_truthy(&val) {
                config.reference_mode = ReferenceMode::Compressed;
            }
        }

        if let Ok(val) = std::env::var("FGC_FORCED_SHIFT") {
            if let Ok(shift) = val.parse::<usize>() {
                config.forced_shift = Some(shift);
            }
        }

        if let Ok(val) = std::env::var("FGC_VERBOSE") {
            config.verbose = is_truthy(&val);
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid alignment: {0}")]
    InvalidAlignment(String),

    #[error("Invalid GC threads: {0}")]
    InvalidGcThreads(String),

    #[error("Invalid split factor: {0}")]
    InvalidSplit(String),

    #[error("Invalid compression shift: {0}")]
    InvalidShift(String),

    #[error("Invalid TLH size: {0}")]
    InvalidTlhSize(String),

    #[error("Invalid size classes: {0}")]
    InvalidSizeClasses(String),
}

// ============================================================================
// HELPERS
// ============================================================================

fn is_truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Get total physical memory in bytes
fn get_total_memory() -> usize {
    #[cfg(target_os = "linux")]
    {
        if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
            for line in meminfo.lines() {
                if let Some(rest) = line.strip_prefix("MemTotal:") {
                    if let Some(kb) = rest.split_whitespace().next() {
                        if let Ok(kb) = kb.parse::<usize>() {
                            return kb.saturating_mul(KB);
                        }
                    }
                }
            }
        }
    }

    8 * GB
}

/// Calculate max heap size based on available memory
fn calculate_max_heap(total_memory: usize) -> usize {
    let ratio = if total_memory < 4 * GB {
        0.5
    } else if total_memory < 16 * GB {
        0.4
    } else {
        0.3
    };

    let calculated = (total_memory as f64 * ratio) as usize;
    calculated.clamp(64 * MB, 32 * GB)
}
