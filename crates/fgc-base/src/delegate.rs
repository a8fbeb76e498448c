//! Configuration Delegate - Runtime-Specific Hooks
//!
//! The embedding runtime customizes the lifecycle through a delegate injected
//! into [`Configuration`](crate::configuration::Configuration). Every hook has
//! a neutral default, so a runtime only overrides what it needs.

use crate::environment::Environment;
use crate::error::Result;
use crate::extensions::GcExtensions;
use crate::policy::{AllocationType, WriteBarrierType};

/// Upper bound on GC worker threads when the runtime declares none
pub const DEFAULT_MAX_GC_THREAD_COUNT: usize = 64;

/// Hooks the lifecycle orchestrator calls into
pub trait ConfigurationDelegate {
    /// Runtime-specific initialization, after geometry is fixed
    fn initialize(
        &mut self,
        _ext: &mut GcExtensions,
        _write_barrier: WriteBarrierType,
        _allocation: AllocationType,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs last during teardown, after NUMA support is shut down
    fn tear_down(&mut self, _ext: &mut GcExtensions) {}

    /// A new environment has its allocation interface
    fn environment_initialized(&mut self, _env: &mut Environment) -> Result<()> {
        Ok(())
    }

    /// The heap is published in `ext.heap`
    fn heap_initialized(&mut self, _ext: &mut GcExtensions) -> Result<()> {
        Ok(())
    }

    /// The default memory space is attached to the heap
    fn default_memory_space_allocated(&mut self, _ext: &mut GcExtensions) -> Result<()> {
        Ok(())
    }

    /// Runtime-side restore work, after re-tuning
    fn reinitialize_for_restore(&mut self, _ext: &mut GcExtensions) -> Result<()> {
        Ok(())
    }

    /// Most GC worker threads this runtime supports
    fn max_gc_thread_count(&self, _ext: &GcExtensions) -> usize {
        DEFAULT_MAX_GC_THREAD_COUNT
    }

    /// Adjust the derived thread count for checkpointing
    fn checkpoint_gc_thread_count_verify_and_adjust(&mut self, _ext: &mut GcExtensions) {}
}

/// Delegate with every hook left at its default
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl ConfigurationDelegate for DefaultDelegate {}

impl<D: ConfigurationDelegate + ?Sized> ConfigurationDelegate for Box<D> {
    fn initialize(
        &mut self,
        ext: &mut GcExtensions,
        write_barrier: WriteBarrierType,
        allocation: AllocationType,
    ) -> Result<()> {
        (**self).initialize(ext, write_barrier, allocation)
    }

    fn tear_down(&mut self, ext: &mut GcExtensions) {
        (**self).tear_down(ext)
    }

    fn environment_initialized(&mut self, env: &mut Environment) -> Result<()> {
        (**self).environment_initialized(env)
    }

    fn heap_initialized(&mut self, ext: &mut GcExtensions) -> Result<()> {
        (**self).heap_initialized(ext)
    }

    fn default_memory_space_allocated(&mut self, ext: &mut GcExtensions) -> Result<()> {
        (**self).default_memory_space_allocated(ext)
    }

    fn reinitialize_for_restore(&mut self, ext: &mut GcExtensions) -> Result<()> {
        (**self).reinitialize_for_restore(ext)
    }

    fn max_gc_thread_count(&self, ext: &GcExtensions) -> usize {
        (**self).max_gc_thread_count(ext)
    }

    fn checkpoint_gc_thread_count_verify_and_adjust(&mut self, ext: &mut GcExtensions) {
        (**self).checkpoint_gc_thread_count_verify_and_adjust(ext)
    }
}
