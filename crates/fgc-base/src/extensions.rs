//! GC Extensions - Process-Wide Runtime Context
//!
//! One [`GcExtensions`] exists per embedded runtime instance. It is owned by
//! the embedder and passed by reference to every component; the lifecycle
//! orchestrator is the only code that creates or destroys the resources it
//! holds. Downstream collector code reads the tuned fields directly.

use crate::collector::{Collector, GlobalAllocationManager, ReferenceChainWalkerMarkMap};
use crate::config::GcConfig;
use crate::dispatcher::ParallelDispatcher;
use crate::error::Result;
use crate::geometry::CompressionSettings;
use crate::heap::{Heap, HeapRegionManager, MemoryManager, NumaManager};
use crate::lock_pool::LockPool;
use crate::policy::{GcPolicy, ReferenceMode, ScanOrdering, ShiftFloorPolicy};
use crate::port::PortLibrary;
use crate::sizing::SpaceSizeRequest;
use crate::util::constants::OBJECT_ALIGNMENT;
use std::sync::Arc;

/// A boolean option that remembers whether the user set it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecifiedFlag {
    pub value: bool,
    pub was_specified: bool,
}

impl SpecifiedFlag {
    fn from_option(option: Option<bool>) -> Self {
        Self {
            value: option.unwrap_or(false),
            was_specified: option.is_some(),
        }
    }
}

/// Shared configuration-and-state record
pub struct GcExtensions {
    port: Arc<dyn PortLibrary>,

    pub policy: GcPolicy,
    pub reference_mode: ReferenceMode,
    pub verbose: bool,

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------
    /// Region size; 0 until finalized
    pub region_size: usize,
    /// log2 of the smallest region the platform supports (page size)
    pub minimum_region_shift: usize,
    pub heap_alignment: usize,
    pub heap_base: usize,
    pub memory_max: usize,
    pub arraylet_leaf_size: usize,
    pub arraylet_leaf_log_size: usize,
    pub compression: CompressionSettings,
    pub compressed_pointers_shift: usize,
    pub object_alignment_in_bytes: usize,
    pub object_alignment_shift: usize,
    pub fvtest_verify_heap_above: usize,
    pub fvtest_verify_heap_below: Option<usize>,
    pub space_request: SpaceSizeRequest,

    // ------------------------------------------------------------------
    // Tuning
    // ------------------------------------------------------------------
    pub gc_thread_count: usize,
    pub gc_thread_count_specified: bool,
    pub packet_list_split: usize,
    pub packet_list_split_forced: bool,
    pub cache_list_split: usize,
    pub cache_list_split_forced: bool,
    pub split_free_list_split_amount: usize,
    pub split_free_list_amount_forced: bool,
    pub scavenger_enabled: bool,
    pub scavenger_scan_ordering: ScanOrdering,
    pub adaptive_gc_count_between_hot_field_sort: bool,
    pub excessive_gc_enabled: SpecifiedFlag,

    // ------------------------------------------------------------------
    // Allocation front-ends
    // ------------------------------------------------------------------
    pub tlh_minimum_size: usize,
    pub tlh_initial_size: usize,
    pub tlh_maximum_size: usize,
    pub size_classes: Vec<usize>,

    // ------------------------------------------------------------------
    // Resources (created and destroyed by the orchestrator)
    // ------------------------------------------------------------------
    pub heap: Option<Heap>,
    pub memory_manager: Option<MemoryManager>,
    pub heap_region_manager: Option<HeapRegionManager>,
    pub numa_manager: NumaManager,
    pub dispatcher: Option<ParallelDispatcher>,
    pub global_collector: Option<Box<dyn Collector>>,
    pub global_allocation_manager: Option<GlobalAllocationManager>,
    pub reference_chain_walker_mark_map: Option<ReferenceChainWalkerMarkMap>,
    pub lightweight_non_reentrant_lock_pool: Option<LockPool>,
}

impl GcExtensions {
    /// Seed the runtime context from a validated configuration
    pub fn new(config: &GcConfig, port: Arc<dyn PortLibrary>) -> Result<Self> {
        config.validate()?;

        let page_shift = page_size::get().max(1).trailing_zeros() as usize;

        Ok(Self {
            port,
            policy: config.policy,
            reference_mode: config.reference_mode,
            verbose: config.verbose,

            region_size: config.region_size,
            minimum_region_shift: page_shift,
            heap_alignment: config.heap_alignment,
            heap_base: config.heap_base,
            memory_max: config.memory_max,
            arraylet_leaf_size: 0,
            arraylet_leaf_log_size: 0,
            compression: CompressionSettings {
                allow_shifting: config.allow_shifting_compression,
                forced_shift: config.forced_shift,
                force_low_memory_heap_ceiling_shift: config.force_low_memory_heap_ceiling_shift,
                floor_policy: ShiftFloorPolicy::platform_default(),
            },
            compressed_pointers_shift: 0,
            object_alignment_in_bytes: OBJECT_ALIGNMENT,
            object_alignment_shift: OBJECT_ALIGNMENT.trailing_zeros() as usize,
            fvtest_verify_heap_above: config.verify_heap_above,
            fvtest_verify_heap_below: config.verify_heap_below,
            space_request: SpaceSizeRequest {
                minimum_space_size: config.minimum_space_size,
                minimum_new_space_size: config.minimum_new_space_size,
                initial_new_space_size: config.initial_new_space_size,
                maximum_new_space_size: config.maximum_new_space_size,
                minimum_old_space_size: config.minimum_old_space_size,
                initial_old_space_size: config.initial_old_space_size,
                maximum_old_space_size: config.maximum_old_space_size,
                memory_max: config.memory_max,
            },

            gc_thread_count: config.gc_threads.unwrap_or(0),
            gc_thread_count_specified: config.gc_threads.is_some(),
            packet_list_split: config.packet_list_split.unwrap_or(0),
            packet_list_split_forced: config.packet_list_split.is_some(),
            cache_list_split: config.cache_list_split.unwrap_or(0),
            cache_list_split_forced: config.cache_list_split.is_some(),
            split_free_list_split_amount: config.split_free_list_amount.unwrap_or(0),
            split_free_list_amount_forced: config.split_free_list_amount.is_some(),
            scavenger_enabled: config.policy.scavenger_enabled(),
            scavenger_scan_ordering: config.scan_ordering,
            adaptive_gc_count_between_hot_field_sort: false,
            excessive_gc_enabled: SpecifiedFlag::from_option(config.excessive_gc_enabled),

            tlh_minimum_size: config.tlh_minimum_size,
            tlh_initial_size: config.tlh_initial_size,
            tlh_maximum_size: config.tlh_maximum_size,
            size_classes: config.size_classes.clone(),

            heap: None,
            memory_manager: None,
            heap_region_manager: None,
            numa_manager: NumaManager::new(config.numa_enabled),
            dispatcher: None,
            global_collector: None,
            global_allocation_manager: None,
            reference_chain_walker_mark_map: None,
            lightweight_non_reentrant_lock_pool: None,
        })
    }

    pub fn port(&self) -> &dyn PortLibrary {
        self.port.as_ref()
    }

    /// Populate the NUMA cache from the port
    pub fn recache_numa_support(&mut self) -> Result<()> {
        self.numa_manager.recache_numa_support(self.port.as_ref())
    }

    pub fn compress_object_references(&self) -> bool {
        self.reference_mode == ReferenceMode::Compressed
    }

    pub fn collector_owns_dispatcher(&self) -> bool {
        self.policy.collector_owns_dispatcher()
    }

    pub fn global_collector(&self) -> Option<&dyn Collector> {
        self.global_collector.as_deref()
    }

    pub fn set_global_collector(&mut self, collector: Option<Box<dyn Collector>>) {
        self.global_collector = collector;
    }

    /// True once every owned resource has been torn down
    pub fn is_torn_down(&self) -> bool {
        self.heap.is_none()
            && self.memory_manager.is_none()
            && self.heap_region_manager.is_none()
            && self.dispatcher.is_none()
            && self.global_collector.is_none()
            && self.global_allocation_manager.is_none()
            && self.reference_chain_walker_mark_map.is_none()
            && self.lightweight_non_reentrant_lock_pool.is_none()
            && !self.numa_manager.is_active()
    }
}

impl std::fmt::Debug for GcExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcExtensions")
            .field("policy", &self.policy)
            .field("reference_mode", &self.reference_mode)
            .field("region_size", &self.region_size)
            .field("compressed_pointers_shift", &self.compressed_pointers_shift)
            .field("gc_thread_count", &self.gc_thread_count)
            .field("packet_list_split", &self.packet_list_split)
            .field("cache_list_split", &self.cache_list_split)
            .field("split_free_list_split_amount", &self.split_free_list_split_amount)
            .field("heap", &self.heap)
            .finish_non_exhaustive()
    }
}
