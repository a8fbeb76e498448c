//! Lifecycle Orchestrator
//!
//! [`Configuration`] brings the memory-management subsystem up and takes it
//! down again. It is the only code that creates or destroys the resources
//! held in [`GcExtensions`].
//!
//! ## Initialization
//!
//! ```text
//! initialize
//!   ├─ region size ─ arraylet leaf size
//!   ├─ delegate.initialize(write barrier, allocation type)
//!   ├─ excessive-GC default ─ NUMA cache
//!   ├─ GC thread count ─ GC parameters
//!   └─ lock pool
//!
//! create_heap(bytes)
//!   ├─ memory manager, region manager (lazily)
//!   ├─ heap ─ bind region table ─ object alignment + compression shift
//!   ├─ publish ext.heap ─ delegate.heap_initialized
//!   └─ verification window check
//! ```
//!
//! A failed step stops initialization; whatever was built stays in the
//! extensions until the caller runs [`Configuration::tear_down`].
//!
//! ## Teardown
//!
//! Fixed order, each step a no-op when its resource is absent:
//! default memory space, reference-chain-walker mark map, collectors,
//! dispatcher (unless the collector owns it), global allocation manager,
//! heap, memory manager, region manager, lock pool, NUMA, delegate.

use crate::allocation::ObjectAllocationInterface;
use crate::collector::{GlobalAllocationManager, GlobalCollector, ReferenceChainWalkerMarkMap};
use crate::delegate::ConfigurationDelegate;
use crate::dispatcher::ParallelDispatcher;
use crate::environment::{Environment, VmThread};
use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use crate::geometry;
use crate::heap::{Heap, HeapRegionManager, MemoryManager, MemorySpace};
use crate::lock_pool::{LockPool, DEFAULT_LOCK_POOL_CAPACITY};
use crate::logging::{log_event, LifecycleEvent};
use crate::policy::{AlignmentType, AllocationType, GcPolicy, WriteBarrierType};
use crate::sizing::{self, InitializationParameters};
use crate::tuning;

/// Name of the memory space every heap starts with
pub const DEFAULT_MEMORY_SPACE_NAME: &str = "default";

fn missing(resource: &str) -> FgcError {
    FgcError::InvalidState {
        expected: format!("{} present", resource),
        actual: "absent".to_string(),
    }
}

fn destroyed(resource: &str) {
    log::debug!("teardown: {} destroyed", resource);
    log_event(LifecycleEvent::ResourceDestroyed {
        resource: resource.to_string(),
    });
}

fn step<T>(name: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        log::error!("initialization step '{}' failed: {}", name, e);
        log_event(LifecycleEvent::InitializationFailed {
            step: name.to_string(),
            reason: e.to_string(),
        });
    }
    result
}

/// Lifecycle orchestrator for one collector policy
#[derive(Debug)]
pub struct Configuration<D: ConfigurationDelegate> {
    delegate: D,
    policy: GcPolicy,
    write_barrier_type: WriteBarrierType,
    allocation_type: AllocationType,
    alignment_type: AlignmentType,
    default_region_size: usize,
    default_arraylet_leaf_size: usize,
    /// Set by `initialize`, cleared by `tear_down`; gates the delegate tear-down hook
    live: bool,
}

impl<D: ConfigurationDelegate> Configuration<D> {
    /// Orchestrator with the policy's variant choices
    pub fn new(policy: GcPolicy, delegate: D) -> Self {
        Self {
            delegate,
            policy,
            write_barrier_type: policy.write_barrier_type(),
            allocation_type: policy.allocation_type(),
            alignment_type: policy.alignment_type(),
            default_region_size: policy.default_region_size(),
            default_arraylet_leaf_size: policy.default_arraylet_leaf_size(),
            live: false,
        }
    }

    /// Orchestrator with raw allocation and alignment type codes
    ///
    /// Codes outside the fixed variant sets are a misconfiguration.
    pub fn from_raw_types(
        policy: GcPolicy,
        allocation_type: u8,
        alignment_type: u8,
        delegate: D,
    ) -> Result<Self> {
        let mut configuration = Self::new(policy, delegate);
        configuration.allocation_type = AllocationType::try_from(allocation_type)?;
        configuration.alignment_type = AlignmentType::try_from(alignment_type)?;
        Ok(configuration)
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Fix geometry, run the delegate, tune parameters and allocate the lock pool
    pub fn initialize(&mut self, ext: &mut GcExtensions) -> Result<()> {
        self.live = true;
        step(
            "region size",
            geometry::initialize_region_size(ext, self.default_region_size),
        )?;
        step(
            "arraylet leaf size",
            geometry::initialize_arraylet_leaf_size(ext, self.default_arraylet_leaf_size),
        )?;
        step(
            "delegate",
            self.delegate
                .initialize(ext, self.write_barrier_type, self.allocation_type),
        )?;

        if !ext.excessive_gc_enabled.was_specified {
            ext.excessive_gc_enabled.value = true;
        }

        step("NUMA", ext.recache_numa_support())?;

        self.initialize_gc_thread_count(ext);
        step("GC parameters", tuning::initialize_gc_parameters(ext))?;

        let pool = step(
            "lock pool",
            LockPool::new_instance(DEFAULT_LOCK_POOL_CAPACITY),
        )?;
        ext.lightweight_non_reentrant_lock_pool = Some(pool);

        log::info!(
            "{} configuration initialized: region {} bytes, {} GC threads",
            self.policy.name(),
            ext.region_size,
            ext.gc_thread_count
        );
        Ok(())
    }

    /// Derive the thread count, then let the delegate adjust it
    pub fn initialize_gc_thread_count(&mut self, ext: &mut GcExtensions) {
        let maximum = self.delegate.max_gc_thread_count(ext);
        tuning::initialize_gc_thread_count(ext, maximum);
        self.delegate.checkpoint_gc_thread_count_verify_and_adjust(ext);
    }

    /// CPU-based default, capped by the delegate
    pub fn default_gc_thread_count(&self, ext: &GcExtensions) -> usize {
        tuning::default_gc_thread_count(ext, self.delegate.max_gc_thread_count(ext))
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Destroy everything in the fixed order; safe on partial state
    pub fn tear_down(&mut self, ext: &mut GcExtensions) {
        if let Some(heap) = ext.heap.as_mut() {
            if let Some(space) = heap.take_default_memory_space() {
                space.kill();
                destroyed("default memory space");
            }
        }

        if let Some(map) = ext.reference_chain_walker_mark_map.take() {
            map.kill();
            destroyed("reference chain walker mark map");
        }

        self.destroy_collectors(ext);

        // A collector-owned dispatcher is gone by now; one still here was
        // never handed to a collector.
        if let Some(dispatcher) = ext.dispatcher.take() {
            dispatcher.kill();
            destroyed("dispatcher");
        }

        if let Some(manager) = ext.global_allocation_manager.take() {
            manager.kill();
            destroyed("global allocation manager");
        }

        if let Some(heap) = ext.heap.take() {
            heap.kill(ext.memory_manager.as_mut());
            destroyed("heap");
        }

        if let Some(memory_manager) = ext.memory_manager.take() {
            memory_manager.kill();
            destroyed("memory manager");
        }

        if let Some(region_manager) = ext.heap_region_manager.take() {
            region_manager.kill();
            destroyed("heap region manager");
        }

        if let Some(pool) = ext.lightweight_non_reentrant_lock_pool.take() {
            pool.kill();
            destroyed("lock pool");
        }

        // Other teardown paths consult node counts, so NUMA goes last.
        if ext.numa_manager.is_active() {
            ext.numa_manager.shutdown_numa_support();
            destroyed("NUMA support");
        }

        if std::mem::take(&mut self.live) {
            self.delegate.tear_down(ext);
        }
    }

    /// Tear down, then release the orchestrator itself
    pub fn kill(mut self, ext: &mut GcExtensions) {
        self.tear_down(ext);
    }

    /// Destroy the global collector and any dispatcher it owns
    pub fn destroy_collectors(&mut self, ext: &mut GcExtensions) {
        if let Some(collector) = ext.global_collector.take() {
            let name = collector.name().to_string();
            collector.kill(ext);
            destroyed(&name);
        }
    }

    // ------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------

    /// Build a fully initialized environment for `thread`
    ///
    /// On failure the half-built environment is destroyed; it is never
    /// handed back.
    pub fn create_environment(&mut self, ext: &GcExtensions, thread: VmThread) -> Result<Environment> {
        let mut env = Environment::new(thread);
        match self.initialize_environment(ext, &mut env) {
            Ok(()) => {
                let allocation = env
                    .allocation_interface()
                    .map_or_else(String::new, |i| i.to_string());
                log_event(LifecycleEvent::EnvironmentCreated {
                    thread: env.thread_id(),
                    allocation,
                });
                Ok(env)
            }
            Err(e) => {
                log::warn!(
                    "environment for thread {} failed to initialize: {}",
                    env.thread_id(),
                    e
                );
                env.kill();
                Err(e)
            }
        }
    }

    /// Equip `env` with its allocation interface and run the delegate hook
    pub fn initialize_environment(&mut self, ext: &GcExtensions, env: &mut Environment) -> Result<()> {
        let interface =
            ObjectAllocationInterface::new_instance_of(self.allocation_type, ext, env.thread_id())?;
        env.set_allocation_interface(interface);
        self.delegate.environment_initialized(env)
    }

    // ------------------------------------------------------------------
    // Heap
    // ------------------------------------------------------------------

    /// Create, bind and publish the heap
    pub fn create_heap<'e>(&mut self, ext: &'e mut GcExtensions, requested: usize) -> Result<&'e Heap> {
        if ext.heap.is_some() {
            return Err(FgcError::InvalidState {
                expected: "no heap".to_string(),
                actual: "heap already created".to_string(),
            });
        }

        if ext.memory_manager.is_none() {
            ext.memory_manager = Some(MemoryManager::new_instance()?);
        }
        if ext.heap_region_manager.is_none() {
            ext.heap_region_manager = Some(HeapRegionManager::new_instance(ext.region_size)?);
        }

        let mut heap = {
            let memory_manager = ext
                .memory_manager
                .as_mut()
                .ok_or_else(|| missing("memory manager"))?;
            Heap::new_instance(memory_manager, ext.heap_base, ext.region_size, requested)?
        };

        let bound = match ext.heap_region_manager.as_mut() {
            Some(region_manager) => heap.initialize_heap_region_manager(region_manager),
            None => Err(missing("heap region manager")),
        };
        if let Err(e) = bound {
            Self::discard_heap(ext, heap);
            return Err(e);
        }

        if let Err(e) = geometry::initialize_run_time_object_alignment_and_cr_shift(ext, heap.heap_top()) {
            Self::discard_heap(ext, heap);
            return Err(e);
        }

        let (base, top) = (heap.heap_base(), heap.heap_top());
        ext.heap = Some(heap);

        if let Err(e) = self.delegate.heap_initialized(ext) {
            if let Some(heap) = ext.heap.take() {
                Self::discard_heap(ext, heap);
            }
            return Err(e);
        }

        let below_window = base < ext.fvtest_verify_heap_above;
        let above_window = ext.fvtest_verify_heap_below.map_or(false, |limit| top > limit);
        if below_window || above_window {
            if let Some(heap) = ext.heap.take() {
                Self::discard_heap(ext, heap);
            }
            return Err(FgcError::HeapOutsideWindow { base, top });
        }

        let region_count = ext
            .heap_region_manager
            .as_ref()
            .map_or(0, |hrm| hrm.region_count());
        log::info!(
            "heap created at [{:#x}, {:#x}), {} regions",
            base,
            top,
            region_count
        );
        log_event(LifecycleEvent::HeapCreated {
            base,
            top,
            region_count,
        });

        ext.heap.as_ref().ok_or_else(|| missing("heap"))
    }

    /// Kill a heap that never made it, unbinding the region table
    fn discard_heap(ext: &mut GcExtensions, heap: Heap) {
        let bound = heap.is_region_manager_bound();
        heap.kill(ext.memory_manager.as_mut());
        if bound {
            if let Some(region_manager) = ext.heap_region_manager.take() {
                region_manager.kill();
            }
        }
    }

    // ------------------------------------------------------------------
    // Sizing and memory spaces
    // ------------------------------------------------------------------

    /// Alignment unit for a given alignment type
    pub fn get_alignment(&self, ext: &GcExtensions, alignment_type: AlignmentType) -> usize {
        match alignment_type {
            AlignmentType::Heap => ext.heap_alignment,
            AlignmentType::Region => ext.region_size,
        }
    }

    /// Alignment unit for this configuration
    pub fn alignment(&self, ext: &GcExtensions) -> usize {
        self.get_alignment(ext, self.alignment_type)
    }

    /// Negotiate generation sizes against the created heap
    pub fn prepare_parameters(&self, ext: &GcExtensions) -> Result<InitializationParameters> {
        let heap = ext.heap.as_ref().ok_or_else(|| missing("heap"))?;
        Ok(sizing::negotiate(
            &ext.space_request,
            self.alignment(ext),
            heap.maximum_memory_size(),
        ))
    }

    /// Build the default memory space and attach it to the heap
    pub fn create_default_memory_space(&mut self, ext: &mut GcExtensions) -> Result<()> {
        let params = self.prepare_parameters(ext)?;
        let space = MemorySpace::new_instance(
            DEFAULT_MEMORY_SPACE_NAME,
            &params,
            self.policy.scavenger_enabled(),
        )?;

        if ext.global_allocation_manager.is_none() {
            ext.global_allocation_manager = Some(GlobalAllocationManager::new_instance(ext)?);
        }

        let heap = ext.heap.as_mut().ok_or_else(|| missing("heap"))?;
        if let Some(previous) = heap.take_default_memory_space() {
            previous.kill();
        }
        heap.set_default_memory_space(Some(space));

        self.delegate.default_memory_space_allocated(ext)
    }

    /// Create the reference-chain-walker mark map over the heap
    pub fn create_reference_chain_walker_mark_map(&self, ext: &mut GcExtensions) -> Result<()> {
        if ext.reference_chain_walker_mark_map.is_none() {
            ext.reference_chain_walker_mark_map = Some(ReferenceChainWalkerMarkMap::new_instance(ext)?);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Collector and dispatcher
    // ------------------------------------------------------------------

    /// Create the global collector if absent
    pub fn create_global_collector(&self, ext: &mut GcExtensions) -> Result<()> {
        if ext.global_collector.is_none() {
            let collector = GlobalCollector::new_instance(ext)?;
            ext.set_global_collector(Some(Box::new(collector)));
        }
        Ok(())
    }

    /// Create and start the dispatcher with the tuned thread count
    pub fn create_parallel_dispatcher(&self, ext: &mut GcExtensions, stack_size: usize) -> Result<()> {
        if ext.dispatcher.is_some() {
            return Ok(());
        }
        let mut dispatcher = ParallelDispatcher::new_instance(ext.gc_thread_count, stack_size)?;
        if let Err(e) = dispatcher.startup() {
            dispatcher.kill();
            return Err(e);
        }
        ext.dispatcher = Some(dispatcher);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checkpoint/restore
    // ------------------------------------------------------------------

    /// Re-tune after a restore and refresh every live environment
    ///
    /// The heap, region manager and memory manager are left alone.
    pub fn reinitialize_for_restore<'a, I>(&mut self, ext: &mut GcExtensions, environments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a mut Environment>,
    {
        self.initialize_gc_thread_count(ext);
        let dispatcher_maximum = ext.dispatcher.as_ref().map(|d| d.thread_count_maximum());
        tuning::reconcile_restored_thread_count(ext, dispatcher_maximum);
        tuning::initialize_gc_parameters(ext)?;

        self.delegate.reinitialize_for_restore(ext)?;

        let mut refreshed = 0;
        for env in environments {
            env.reinitialize_for_restore(ext)?;
            refreshed += 1;
        }

        log::info!(
            "restore complete: {} GC threads, {} environments",
            ext.gc_thread_count,
            refreshed
        );
        log_event(LifecycleEvent::RestoreCompleted {
            gc_thread_count: ext.gc_thread_count,
            environments: refreshed,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn policy(&self) -> GcPolicy {
        self.policy
    }

    pub fn write_barrier_type(&self) -> WriteBarrierType {
        self.write_barrier_type
    }

    pub fn allocation_type(&self) -> AllocationType {
        self.allocation_type
    }

    pub fn alignment_type(&self) -> AlignmentType {
        self.alignment_type
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }
}
