//! Port Module - Operating System Queries
//!
//! The subsystem never owns OS resources directly; it only reads a few
//! signals through [`PortLibrary`]: CPU counts by target class and the NUMA
//! node count.

use crate::policy::CpuTarget;
use std::sync::atomic::{AtomicUsize, Ordering};

/// OS services consumed during startup and restore
pub trait PortLibrary: Send + Sync {
    /// Number of CPUs of the given class
    fn cpu_count(&self, target: CpuTarget) -> usize;

    /// Number of NUMA nodes; 0 or 1 means a uniform memory system
    fn numa_node_count(&self) -> usize {
        1
    }
}

/// Port backed by the host operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPort;

impl PortLibrary for SystemPort {
    fn cpu_count(&self, target: CpuTarget) -> usize {
        match target {
            CpuTarget::Physical => num_cpus::get_physical(),
            CpuTarget::Online | CpuTarget::Target => num_cpus::get(),
        }
    }

    fn numa_node_count(&self) -> usize {
        detect_numa_nodes()
    }
}

/// Port with caller-controlled answers
///
/// Used by embedders that virtualize the CPU count and to model a process
/// restored on a machine with a different shape.
#[derive(Debug)]
pub struct FixedPort {
    cpus: AtomicUsize,
    numa_nodes: AtomicUsize,
}

impl FixedPort {
    pub fn new(cpus: usize, numa_nodes: usize) -> Self {
        Self {
            cpus: AtomicUsize::new(cpus),
            numa_nodes: AtomicUsize::new(numa_nodes),
        }
    }

    pub fn set_cpu_count(&self, cpus: usize) {
        self.cpus.store(cpus, Ordering::Relaxed);
    }

    pub fn set_numa_node_count(&self, nodes: usize) {
        self.numa_nodes.store(nodes, Ordering::Relaxed);
    }
}

impl PortLibrary for FixedPort {
    fn cpu_count(&self, _target: CpuTarget) -> usize {
        self.cpus.load(Ordering::Relaxed)
    }

    fn numa_node_count(&self) -> usize {
        self.numa_nodes.load(Ordering::Relaxed)
    }
}

/// Detect number of NUMA nodes on the system
fn detect_numa_nodes() -> usize {
    #[cfg(target_os = "linux")]
    {
        if let Ok(online) = std::fs::read_to_string("/sys/devices/system/node/online") {
            if let Some(count) = parse_node_list(online.trim()) {
                return count;
            }
        }
    }

    // UMA
    1
}

/// Count nodes in a kernel list such as `0-3,8`
fn parse_node_list(list: &str) -> Option<usize> {
    let mut count = 0usize;
    for part in list.split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.parse().ok()?;
                let hi: usize = hi.parse().ok()?;
                count += hi.checked_sub(lo)? + 1;
            }
            None => {
                part.parse::<usize>().ok()?;
                count += 1;
            }
        }
    }
    (count > 0).then_some(count)
}
