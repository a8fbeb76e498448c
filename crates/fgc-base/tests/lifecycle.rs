//! Lifecycle Integration Tests
//!
//! Initialization, heap creation and teardown driven through the public
//! orchestrator API with a recording delegate.

mod common;

use common::*;
use fgc_base::policy::{ShiftFloorPolicy, WriteBarrierType};
use fgc_base::util::constants::{GB, MB};
use fgc_base::{Configuration, FgcError, GcConfig, GcPolicy, ReferenceMode, VmThread};

#[test]
fn test_initialize_then_tear_down() {
    let delegate = RecordingDelegate::new();
    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, delegate.clone(), 4);

    assert_eq!(ext.gc_thread_count, 4);
    assert!(ext.region_size.is_power_of_two());
    assert!(ext.lightweight_non_reentrant_lock_pool.is_some());
    assert_eq!(delegate.count("initialize"), 1);
    assert!(delegate.entries()[0].contains(&format!("{:?}", WriteBarrierType::CardMarkAndOldCheck)));

    configuration.tear_down(&mut ext);
    assert!(ext.is_torn_down());
    assert_eq!(delegate.entries().last().unwrap(), "tear_down torn_down=true");
}

#[test]
fn test_tear_down_twice_is_harmless() {
    let delegate = RecordingDelegate::new();
    let (mut configuration, mut ext) = initialized(GcPolicy::Flat, delegate.clone(), 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    configuration.create_default_memory_space(&mut ext).unwrap();

    configuration.tear_down(&mut ext);
    configuration.tear_down(&mut ext);

    assert!(ext.is_torn_down());
    assert_eq!(delegate.count("tear_down"), 1);
}

#[test]
fn test_tear_down_without_initialize_skips_delegate() {
    let delegate = RecordingDelegate::new();
    let config = test_config(GcPolicy::Generational);
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, delegate.clone());

    configuration.tear_down(&mut ext);

    assert!(ext.is_torn_down());
    assert_eq!(delegate.count("tear_down"), 0);
}

#[test]
fn test_failed_delegate_initialize_tears_down_partial_state() {
    let delegate = RecordingDelegate::failing_at(FailAt::Initialize);
    let config = test_config(GcPolicy::Generational);
    let mut ext = extensions_with(&config, 4, 2);
    let mut configuration = Configuration::new(GcPolicy::Generational, delegate.clone());

    let err = configuration.initialize(&mut ext).unwrap_err();
    assert!(matches!(err, FgcError::Delegate { hook: "initialize", .. }));

    // Region geometry ran, tuning did not.
    assert!(ext.region_size.is_power_of_two());
    assert_eq!(ext.gc_thread_count, 0);
    assert!(ext.lightweight_non_reentrant_lock_pool.is_none());

    configuration.kill(&mut ext);
    assert!(ext.is_torn_down());
    assert_eq!(delegate.count("tear_down"), 1);
}

#[test]
fn test_full_startup_sequence() {
    let delegate = RecordingDelegate::new();
    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, delegate.clone(), 2);

    let heap = configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    assert_eq!(heap.heap_base(), TEST_HEAP_BASE);
    assert_eq!(heap.maximum_memory_size(), TEST_HEAP_SIZE);

    configuration.create_default_memory_space(&mut ext).unwrap();
    configuration.create_parallel_dispatcher(&mut ext, 0).unwrap();
    configuration.create_global_collector(&mut ext).unwrap();
    configuration.create_reference_chain_walker_mark_map(&mut ext).unwrap();

    let space = ext.heap.as_ref().unwrap().default_memory_space().unwrap();
    assert!(space.new_space().is_some());
    assert!(space.maximum_size() <= TEST_HEAP_SIZE);
    assert_eq!(delegate.count("heap_initialized published=true"), 1);
    assert_eq!(delegate.count("default_memory_space_allocated attached=true"), 1);

    configuration.kill(&mut ext);
    assert!(ext.is_torn_down());
}

#[test]
fn test_flat_policy_has_no_new_space() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Flat, RecordingDelegate::new(), 1);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    configuration.create_default_memory_space(&mut ext).unwrap();

    let space = ext.heap.as_ref().unwrap().default_memory_space().unwrap();
    assert!(space.new_space().is_none());
    configuration.kill(&mut ext);
}

#[test]
fn test_heap_below_verification_window() {
    let config = GcConfig {
        verify_heap_above: TEST_HEAP_BASE + 1,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();

    let err = configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap_err();
    assert!(matches!(err, FgcError::HeapOutsideWindow { base, .. } if base == TEST_HEAP_BASE));
    assert!(ext.heap.is_none());
    assert_eq!(ext.memory_manager.as_ref().unwrap().reservation_count(), 0);
    configuration.kill(&mut ext);
}

#[test]
fn test_heap_above_verification_window() {
    let config = GcConfig {
        verify_heap_below: Some(TEST_HEAP_BASE + MB),
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();

    assert!(matches!(
        configuration.create_heap(&mut ext, TEST_HEAP_SIZE),
        Err(FgcError::HeapOutsideWindow { .. })
    ));
    assert!(ext.heap.is_none());

    // The region table was unbound, so a smaller heap can still be made.
    ext.fvtest_verify_heap_below = None;
    assert!(configuration.create_heap(&mut ext, 16 * MB).is_ok());
    configuration.kill(&mut ext);
}

#[test]
fn test_heap_initialized_refusal_releases_heap() {
    let delegate = RecordingDelegate::failing_at(FailAt::HeapInitialized);
    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, delegate.clone(), 2);

    assert!(matches!(
        configuration.create_heap(&mut ext, TEST_HEAP_SIZE),
        Err(FgcError::Delegate { hook: "heap_initialized", .. })
    ));
    assert!(ext.heap.is_none());
    assert_eq!(ext.memory_manager.as_ref().unwrap().reservation_count(), 0);
    assert_eq!(delegate.count("heap_initialized published=true"), 1);
    configuration.kill(&mut ext);
}

#[test]
fn test_default_memory_space_refusal_is_reported() {
    let delegate = RecordingDelegate::failing_at(FailAt::DefaultMemorySpaceAllocated);
    let (mut configuration, mut ext) = initialized(GcPolicy::Flat, delegate, 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();

    assert!(configuration.create_default_memory_space(&mut ext).is_err());
    configuration.kill(&mut ext);
    assert!(ext.is_torn_down());
}

#[test]
fn test_create_environment() {
    let delegate = RecordingDelegate::new();
    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, delegate.clone(), 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();

    let mut env = configuration
        .create_environment(&ext, VmThread::new(7, "mutator"))
        .unwrap();
    assert_eq!(env.thread_id(), 7);
    assert_eq!(delegate.count("environment_initialized 7 has_interface=true"), 1);

    let tlh = env.allocation_interface_mut().unwrap().as_tlh().unwrap();
    assert_eq!(tlh.owner(), 7);
    assert_eq!(tlh.refresh_size(), 32 * 1024);

    env.kill();
    configuration.kill(&mut ext);
}

#[test]
fn test_segregated_environment_uses_size_classes() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Segregated, RecordingDelegate::new(), 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();

    let mut env = configuration
        .create_environment(&ext, VmThread::new(1, "main"))
        .unwrap();
    let interface = env.allocation_interface_mut().unwrap();
    assert_eq!(interface.to_string(), "segregated");
    let segregated = interface.as_segregated().unwrap();
    assert_eq!(segregated.size_class_count(), ext.size_classes.len());
    assert_eq!(segregated.size_class_index(17), Some(1));

    env.kill();
    configuration.kill(&mut ext);
}

#[test]
fn test_environment_hook_failure_returns_error() {
    let delegate = RecordingDelegate::failing_at(FailAt::EnvironmentInitialized);
    let (mut configuration, mut ext) = initialized(GcPolicy::Flat, delegate.clone(), 1);

    let err = configuration
        .create_environment(&ext, VmThread::new(3, "worker"))
        .unwrap_err();
    assert!(matches!(err, FgcError::Delegate { hook: "environment_initialized", .. }));
    assert_eq!(delegate.count("environment_initialized 3"), 1);
    configuration.kill(&mut ext);
}

#[test]
fn test_compressed_low_heap_has_no_shift() {
    let config = GcConfig {
        reference_mode: ReferenceMode::Compressed,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();

    assert_eq!(ext.compressed_pointers_shift, 0);
    assert_eq!(ext.object_alignment_in_bytes, 8);
    assert_eq!(ext.object_alignment_shift, 3);
    configuration.kill(&mut ext);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_compressed_heap_above_4gb_shifts() {
    let config = GcConfig {
        reference_mode: ReferenceMode::Compressed,
        heap_base: 8 * GB,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    ext.compression.floor_policy = ShiftFloorPolicy::TightestFit;
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();

    assert_eq!(ext.compressed_pointers_shift, 2);
    assert_eq!(ext.object_alignment_in_bytes, 8);
    configuration.kill(&mut ext);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_compressed_heap_round_up_and_forced_shift() {
    let config = GcConfig {
        reference_mode: ReferenceMode::Compressed,
        heap_base: 8 * GB,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    ext.compression.floor_policy = ShiftFloorPolicy::RoundUpToDefault;
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    assert_eq!(ext.compressed_pointers_shift, 3);
    configuration.kill(&mut ext);

    let config = GcConfig {
        reference_mode: ReferenceMode::Compressed,
        forced_shift: Some(4),
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    assert_eq!(ext.compressed_pointers_shift, 4);
    assert_eq!(ext.object_alignment_in_bytes, 16);
    assert_eq!(ext.object_alignment_shift, 4);
    configuration.kill(&mut ext);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_unaddressable_compressed_heap_is_impossible_geometry() {
    let config = GcConfig {
        reference_mode: ReferenceMode::Compressed,
        heap_base: 64 * GB,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 2, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();

    let err = configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap_err();
    assert!(matches!(err, FgcError::ImpossibleGeometry { shift: 4, .. }));
    assert!(err.is_recoverable());
    assert!(ext.heap.is_none());
    assert_eq!(ext.memory_manager.as_ref().unwrap().reservation_count(), 0);
    configuration.kill(&mut ext);
    assert!(ext.is_torn_down());
}

#[test]
fn test_region_size_selection() {
    let (configuration, ext) = initialized(GcPolicy::Generational, RecordingDelegate::new(), 1);
    assert_eq!(ext.region_size, GcPolicy::Generational.default_region_size());
    drop(configuration);

    let config = GcConfig {
        region_size: 100_000,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 1, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    assert_eq!(ext.region_size, 131_072);
    configuration.kill(&mut ext);
}

#[test]
fn test_oversized_region_is_rejected() {
    let config = GcConfig {
        region_size: GB,
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 1, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());

    assert!(matches!(
        configuration.initialize(&mut ext),
        Err(FgcError::InvalidRegionSize { .. })
    ));
    configuration.kill(&mut ext);
}

#[test]
fn test_arraylet_leaf_follows_policy() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Segregated, RecordingDelegate::new(), 1);
    assert_eq!(ext.arraylet_leaf_size, ext.region_size);
    assert_eq!(1usize << ext.arraylet_leaf_log_size, ext.region_size);
    configuration.tear_down(&mut ext);

    let (mut configuration, mut ext) = initialized(GcPolicy::Flat, RecordingDelegate::new(), 1);
    assert_eq!(ext.arraylet_leaf_size, fgc_base::policy::UNBOUNDED_ARRAYLET_LEAF_SIZE);
    assert_eq!(ext.arraylet_leaf_log_size, 0);
    configuration.tear_down(&mut ext);
}

#[test]
fn test_explicit_excessive_gc_setting_kept() {
    let config = GcConfig {
        excessive_gc_enabled: Some(false),
        ..test_config(GcPolicy::Generational)
    };
    let mut ext = extensions_with(&config, 1, 1);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    assert!(!ext.excessive_gc_enabled.value);
    configuration.kill(&mut ext);

    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, RecordingDelegate::new(), 1);
    assert!(ext.excessive_gc_enabled.value);
    configuration.kill(&mut ext);
}

#[test]
fn test_segregated_collector_owns_dispatcher() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Segregated, RecordingDelegate::new(), 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    configuration.create_parallel_dispatcher(&mut ext, 0).unwrap();
    configuration.create_global_collector(&mut ext).unwrap();
    assert!(ext.dispatcher.is_some());

    configuration.destroy_collectors(&mut ext);
    assert!(ext.global_collector().is_none());
    assert!(ext.dispatcher.is_none());
    configuration.kill(&mut ext);
    assert!(ext.is_torn_down());
}

#[test]
fn test_segregated_dispatcher_without_collector_is_released() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Segregated, RecordingDelegate::new(), 2);
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    configuration.create_parallel_dispatcher(&mut ext, 0).unwrap();
    assert!(ext.collector_owns_dispatcher());
    assert!(ext.global_collector().is_none());

    configuration.kill(&mut ext);
    assert!(ext.dispatcher.is_none());
    assert!(ext.is_torn_down());
}

#[test]
fn test_generational_collector_leaves_dispatcher() {
    let (mut configuration, mut ext) = initialized(GcPolicy::Generational, RecordingDelegate::new(), 2);
    configuration.create_parallel_dispatcher(&mut ext, 0).unwrap();
    configuration.create_global_collector(&mut ext).unwrap();

    configuration.destroy_collectors(&mut ext);
    assert!(ext.dispatcher.is_some());
    configuration.kill(&mut ext);
    assert!(ext.dispatcher.is_none());
}

#[test]
fn test_numa_nodes_shape_allocation_contexts() {
    let config = test_config(GcPolicy::Generational);
    let mut ext = extensions_with(&config, 4, 3);
    let mut configuration = Configuration::new(GcPolicy::Generational, RecordingDelegate::new());
    configuration.initialize(&mut ext).unwrap();
    configuration.create_heap(&mut ext, TEST_HEAP_SIZE).unwrap();
    configuration.create_default_memory_space(&mut ext).unwrap();

    assert_eq!(ext.numa_manager.maximum_node_number(), 3);
    assert_eq!(ext.global_allocation_manager.as_ref().unwrap().context_count(), 3);
    configuration.kill(&mut ext);
    assert!(!ext.numa_manager.is_active());
}
