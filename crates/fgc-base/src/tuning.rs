//! GC Parameter Tuner
//!
//! Derives the worker-thread count and the split factors of the shared
//! work-packet, scan-cache and free lists. Each list is protected by N
//! independent locks; N grows with the thread count but is divided by 8 so
//! the number of sub-structures stays small.
//!
//! Tuning is re-run after a checkpoint/restore. Lists already sized cannot
//! shrink without a rebuild, so every split factor is combined with its
//! previous value by `max`.

use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use crate::logging::{log_event, LifecycleEvent};
use crate::policy::{CpuTarget, ScanOrdering};
use serde::Serialize;

/// Worker threads sharing one list lock
const THREADS_PER_SPLIT: usize = 8;

/// Split factor for `thread_count` workers
///
/// ```
/// use fgc_base::tuning::split_amount;
/// assert_eq!(split_amount(1), 1);
/// assert_eq!(split_amount(8), 1);
/// assert_eq!(split_amount(9), 2);
/// ```
pub fn split_amount(thread_count: usize) -> usize {
    thread_count.saturating_sub(1) / THREADS_PER_SPLIT + 1
}

/// CPU count for the runtime's target class, capped by `max_thread_count`
pub fn default_gc_thread_count(ext: &GcExtensions, max_thread_count: usize) -> usize {
    let cpus = ext.port().cpu_count(CpuTarget::Target);
    cpus.min(max_thread_count).max(1)
}

/// Derive `ext.gc_thread_count`
///
/// A user-specified count skips the CPU-based default but is still held to
/// `max_thread_count`.
pub fn initialize_gc_thread_count(ext: &mut GcExtensions, max_thread_count: usize) {
    if !ext.gc_thread_count_specified {
        ext.gc_thread_count = default_gc_thread_count(ext, max_thread_count);
    } else if ext.gc_thread_count > max_thread_count.max(1) {
        log::warn!(
            "GC thread count {} exceeds the supported maximum {}, clamping",
            ext.gc_thread_count,
            max_thread_count
        );
        ext.gc_thread_count = max_thread_count.max(1);
    }
}

/// Derive split factors and scan ordering from the current thread count
pub fn initialize_gc_parameters(ext: &mut GcExtensions) -> Result<()> {
    crate::ensure!(
        ext.gc_thread_count > 0,
        FgcError::Internal("GC parameters tuned before a thread count was derived".to_string())
    );

    let split = split_amount(ext.gc_thread_count);

    if !ext.packet_list_split_forced {
        ext.packet_list_split = ext.packet_list_split.max(split);
    }

    if ext.scavenger_enabled {
        if !ext.cache_list_split_forced {
            ext.cache_list_split = ext.cache_list_split.max(split);
        }
        match ext.scavenger_scan_ordering {
            ScanOrdering::None => ext.scavenger_scan_ordering = ScanOrdering::Hierarchical,
            ScanOrdering::DynamicBreadthFirst => {
                ext.adaptive_gc_count_between_hot_field_sort = true
            }
            ScanOrdering::BreadthFirst | ScanOrdering::Hierarchical => {}
        }
    }

    if !ext.split_free_list_amount_forced {
        let free_list_split = if ext.scavenger_enabled {
            split
        } else {
            split_amount(ext.port().cpu_count(CpuTarget::Target))
        };
        ext.split_free_list_split_amount = ext.split_free_list_split_amount.max(free_list_split);
    }

    let tuned = TunedParameters::from_extensions(ext);
    log::debug!("GC parameters tuned: {:?}", tuned);
    log_event(LifecycleEvent::ParametersTuned {
        gc_thread_count: tuned.gc_thread_count,
        packet_list_split: tuned.packet_list_split,
        cache_list_split: tuned.cache_list_split,
        split_free_list_split_amount: tuned.split_free_list_split_amount,
    });
    Ok(())
}

/// Keep the thread count at or above what the dispatcher already runs
///
/// Dispatcher threads are not shut down across a restore.
pub fn reconcile_restored_thread_count(ext: &mut GcExtensions, dispatcher_maximum: Option<usize>) {
    if let Some(maximum) = dispatcher_maximum {
        if maximum > ext.gc_thread_count {
            log::info!(
                "restore: keeping {} GC threads (derived {})",
                maximum,
                ext.gc_thread_count
            );
            ext.gc_thread_count = maximum;
        }
    }
}

/// Snapshot of the tuned fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TunedParameters {
    pub gc_thread_count: usize,
    pub packet_list_split: usize,
    pub cache_list_split: usize,
    pub split_free_list_split_amount: usize,
    pub scavenger_scan_ordering: ScanOrdering,
    pub adaptive_gc_count_between_hot_field_sort: bool,
}

impl TunedParameters {
    pub fn from_extensions(ext: &GcExtensions) -> Self {
        Self {
            gc_thread_count: ext.gc_thread_count,
            packet_list_split: ext.packet_list_split,
            cache_list_split: ext.cache_list_split,
            split_free_list_split_amount: ext.split_free_list_split_amount,
            scavenger_scan_ordering: ext.scavenger_scan_ordering,
            adaptive_gc_count_between_hot_field_sort: ext.adaptive_gc_count_between_hot_field_sort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::policy::GcPolicy;
    use crate::port::FixedPort;
    use std::sync::Arc;

    fn extensions(config: GcConfig, cpus: usize) -> GcExtensions {
        GcExtensions::new(&config, Arc::new(FixedPort::new(cpus, 1))).unwrap()
    }

    #[test]
    fn test_split_amount_monotonic() {
        let mut previous = 0;
        for t in 1..=256 {
            let split = split_amount(t);
            assert_eq!(split, (t - 1) / 8 + 1);
            assert!(split >= previous);
            previous = split;
        }
    }

    #[test]
    fn test_default_thread_count_capped() {
        let mut ext = extensions(GcConfig::default(), 32);
        initialize_gc_thread_count(&mut ext, 16);
        assert_eq!(ext.gc_thread_count, 16);

        let mut ext = extensions(GcConfig::default(), 4);
        initialize_gc_thread_count(&mut ext, 16);
        assert_eq!(ext.gc_thread_count, 4);
    }

    #[test]
    fn test_zero_cpus_still_one_thread() {
        let mut ext = extensions(GcConfig::default(), 0);
        initialize_gc_thread_count(&mut ext, 64);
        assert_eq!(ext.gc_thread_count, 1);
    }

    #[test]
    fn test_specified_count_skips_default() {
        let config = GcConfig {
            gc_threads: Some(17),
            ..Default::default()
        };
        let mut ext = extensions(config, 2);
        initialize_gc_thread_count(&mut ext, 64);
        assert_eq!(ext.gc_thread_count, 17);

        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.packet_list_split, 3);
        assert_eq!(ext.cache_list_split, 3);
        assert_eq!(ext.split_free_list_split_amount, 3);
    }

    #[test]
    fn test_forced_splits_untouched() {
        let config = GcConfig {
            gc_threads: Some(64),
            packet_list_split: Some(1),
            split_free_list_amount: Some(2),
            ..Default::default()
        };
        let mut ext = extensions(config, 64);
        initialize_gc_thread_count(&mut ext, 64);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.packet_list_split, 1);
        assert_eq!(ext.cache_list_split, 8);
        assert_eq!(ext.split_free_list_split_amount, 2);
    }

    #[test]
    fn test_free_list_uses_cpus_without_scavenger() {
        let config = GcConfig {
            policy: GcPolicy::Flat,
            gc_threads: Some(2),
            ..Default::default()
        };
        let mut ext = extensions(config, 24);
        initialize_gc_thread_count(&mut ext, 64);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.packet_list_split, 1);
        assert_eq!(ext.cache_list_split, 0);
        assert_eq!(ext.split_free_list_split_amount, 3);
    }

    #[test]
    fn test_scan_ordering_defaults() {
        let mut ext = extensions(GcConfig::default(), 4);
        initialize_gc_thread_count(&mut ext, 64);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.scavenger_scan_ordering, ScanOrdering::Hierarchical);
        assert!(!ext.adaptive_gc_count_between_hot_field_sort);

        let config = GcConfig {
            scan_ordering: ScanOrdering::DynamicBreadthFirst,
            ..Default::default()
        };
        let mut ext = extensions(config, 4);
        initialize_gc_thread_count(&mut ext, 64);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.scavenger_scan_ordering, ScanOrdering::DynamicBreadthFirst);
        assert!(ext.adaptive_gc_count_between_hot_field_sort);
    }

    #[test]
    fn test_zero_thread_count_is_internal_error() {
        let mut ext = extensions(GcConfig::default(), 4);
        assert!(matches!(
            initialize_gc_parameters(&mut ext),
            Err(FgcError::Internal(_))
        ));
    }

    #[test]
    fn test_retune_never_decreases_splits() {
        let port = Arc::new(FixedPort::new(32, 1));
        let mut ext = GcExtensions::new(&GcConfig::default(), port.clone()).unwrap();
        initialize_gc_thread_count(&mut ext, 64);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.packet_list_split, 4);

        port.set_cpu_count(2);
        initialize_gc_thread_count(&mut ext, 64);
        assert_eq!(ext.gc_thread_count, 2);
        initialize_gc_parameters(&mut ext).unwrap();
        assert_eq!(ext.packet_list_split, 4);
        assert_eq!(ext.split_free_list_split_amount, 4);
    }

    #[test]
    fn test_reconcile_restored_thread_count() {
        let mut ext = extensions(GcConfig::default(), 4);
        ext.gc_thread_count = 4;
        reconcile_restored_thread_count(&mut ext, Some(8));
        assert_eq!(ext.gc_thread_count, 8);
        reconcile_restored_thread_count(&mut ext, Some(2));
        assert_eq!(ext.gc_thread_count, 8);
        reconcile_restored_thread_count(&mut ext, None);
        assert_eq!(ext.gc_thread_count, 8);
    }
}
