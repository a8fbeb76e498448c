//! Test Utilities for the FGC Base Test Suite
//!
//! Shared fixtures: a delegate that records every hook call and can be told
//! to fail, a fixed-shape port, and configuration helpers.

#![allow(dead_code)]

use fgc_base::policy::{AllocationType, WriteBarrierType};
use fgc_base::{
    Configuration, ConfigurationDelegate, Environment, FgcError, FixedPort, GcConfig,
    GcExtensions, GcPolicy, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default heap size for tests (64MB)
pub const TEST_HEAP_SIZE: usize = 64 * 1024 * 1024;

/// Preferred heap base for tests (256MB)
pub const TEST_HEAP_BASE: usize = 256 * 1024 * 1024;

/// ============================================================================
/// RECORDING DELEGATE
/// ============================================================================

/// Which hook should refuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nothing,
    Initialize,
    EnvironmentInitialized,
    HeapInitialized,
    DefaultMemorySpaceAllocated,
    Restore,
}

/// Delegate that logs hook calls into a shared journal
#[derive(Debug, Clone)]
pub struct RecordingDelegate {
    pub journal: Arc<Mutex<Vec<String>>>,
    pub fail_at: FailAt,
    pub max_threads: usize,
    /// Thread count forced by the checkpoint hook
    pub checkpoint_threads: Option<usize>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            fail_at: FailAt::Nothing,
            max_threads: 64,
            checkpoint_threads: None,
        }
    }

    pub fn failing_at(fail_at: FailAt) -> Self {
        Self {
            fail_at,
            ..Self::new()
        }
    }

    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            max_threads,
            ..Self::new()
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().push(entry.into());
    }

    fn refuse(&self, at: FailAt, hook: &'static str) -> Result<()> {
        if self.fail_at == at {
            return Err(FgcError::Delegate {
                hook,
                reason: "refused by test".to_string(),
            });
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl ConfigurationDelegate for RecordingDelegate {
    fn initialize(
        &mut self,
        ext: &mut GcExtensions,
        write_barrier: WriteBarrierType,
        allocation: AllocationType,
    ) -> Result<()> {
        self.record(format!(
            "initialize {:?} {:?} region={}",
            write_barrier, allocation, ext.region_size
        ));
        self.refuse(FailAt::Initialize, "initialize")
    }

    fn tear_down(&mut self, ext: &mut GcExtensions) {
        self.record(format!("tear_down torn_down={}", ext.is_torn_down()));
    }

    fn environment_initialized(&mut self, env: &mut Environment) -> Result<()> {
        self.record(format!(
            "environment_initialized {} has_interface={}",
            env.thread_id(),
            env.allocation_interface().is_some()
        ));
        self.refuse(FailAt::EnvironmentInitialized, "environment_initialized")
    }

    fn heap_initialized(&mut self, ext: &mut GcExtensions) -> Result<()> {
        self.record(format!("heap_initialized published={}", ext.heap.is_some()));
        self.refuse(FailAt::HeapInitialized, "heap_initialized")
    }

    fn default_memory_space_allocated(&mut self, ext: &mut GcExtensions) -> Result<()> {
        let attached = ext
            .heap
            .as_ref()
            .map_or(false, |h| h.default_memory_space().is_some());
        self.record(format!("default_memory_space_allocated attached={}", attached));
        self.refuse(
            FailAt::DefaultMemorySpaceAllocated,
            "default_memory_space_allocated",
        )
    }

    fn reinitialize_for_restore(&mut self, ext: &mut GcExtensions) -> Result<()> {
        self.record(format!("reinitialize_for_restore threads={}", ext.gc_thread_count));
        self.refuse(FailAt::Restore, "reinitialize_for_restore")
    }

    fn max_gc_thread_count(&self, _ext: &GcExtensions) -> usize {
        self.max_threads
    }

    fn checkpoint_gc_thread_count_verify_and_adjust(&mut self, ext: &mut GcExtensions) {
        if let Some(threads) = self.checkpoint_threads {
            ext.gc_thread_count = threads;
        }
    }
}

/// ============================================================================
/// CONFIG HELPERS
/// ============================================================================

/// Small, fully specified configuration for a policy
pub fn test_config(policy: GcPolicy) -> GcConfig {
    GcConfig {
        policy,
        memory_max: TEST_HEAP_SIZE,
        heap_base: TEST_HEAP_BASE,
        maximum_new_space_size: TEST_HEAP_SIZE / 4,
        maximum_old_space_size: TEST_HEAP_SIZE - TEST_HEAP_SIZE / 4,
        ..Default::default()
    }
}

/// Extensions over a port with a fixed CPU and NUMA shape
pub fn extensions_with(config: &GcConfig, cpus: usize, numa_nodes: usize) -> GcExtensions {
    GcExtensions::new(config, Arc::new(FixedPort::new(cpus, numa_nodes)))
        .expect("test configuration should be valid")
}

/// Extensions plus a shared handle to the port behind them
pub fn extensions_with_port(config: &GcConfig, cpus: usize) -> (GcExtensions, Arc<FixedPort>) {
    let port = Arc::new(FixedPort::new(cpus, 1));
    let ext = GcExtensions::new(config, port.clone()).expect("test configuration should be valid");
    (ext, port)
}

/// Configuration and extensions, initialized
pub fn initialized(
    policy: GcPolicy,
    delegate: RecordingDelegate,
    cpus: usize,
) -> (Configuration<RecordingDelegate>, GcExtensions) {
    let config = test_config(policy);
    let mut ext = extensions_with(&config, cpus, 1);
    let mut configuration = Configuration::new(policy, delegate);
    configuration
        .initialize(&mut ext)
        .expect("initialization should succeed");
    (configuration, ext)
}
