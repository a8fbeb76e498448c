//! NUMA (Non-Uniform Memory Access) Management
//!
//! Process-wide cache of the NUMA topology. Populated once during
//! configuration and read-only afterwards until the explicit shutdown at the
//! very end of teardown; several components size their per-node structures
//! from [`NumaManager::maximum_node_number`].
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  CPU Node 0 │     │  CPU Node 1 │
//! │  ┌───────┐  │     │  ┌───────┐  │
//! │  │ Local │  │     │  │ Local │  │
//! │  │ Memory│  │     │  │ Memory│  │
//! │  └───────┘  │     │  └───────┘  │
//! └─────────────┘     └─────────────┘
//!       └────────┬──────────┘
//!         Interconnect
//! ```

use crate::error::{FgcError, Result};
use crate::port::PortLibrary;

/// Largest node count the cache accepts
pub const MAXIMUM_NUMA_NODES: usize = 1024;

/// A node that leads allocation affinity for its CPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityLeader {
    pub node_id: usize,
}

/// NumaManager - cached NUMA topology
#[derive(Debug, Default)]
pub struct NumaManager {
    /// NUMA awareness requested by the user
    physical_numa_enabled: bool,

    /// Highest node number seen (0 on UMA or when inactive)
    maximum_node_number: usize,

    /// Nodes that lead allocation affinity
    affinity_leaders: Vec<AffinityLeader>,

    /// Cache populated and not yet shut down
    cached: bool,
}

impl NumaManager {
    pub fn new(physical_numa_enabled: bool) -> Self {
        Self {
            physical_numa_enabled,
            ..Default::default()
        }
    }

    pub fn set_physical_numa_enabled(&mut self, enabled: bool) {
        self.physical_numa_enabled = enabled;
    }

    /// (Re)populate the topology cache
    ///
    /// With NUMA disabled, or on a UMA machine, the cache holds no leaders
    /// and a node count of 0.
    pub fn recache_numa_support(&mut self, port: &dyn PortLibrary) -> Result<()> {
        self.affinity_leaders.clear();
        self.maximum_node_number = 0;

        if self.physical_numa_enabled {
            let nodes = port.numa_node_count();
            if nodes > MAXIMUM_NUMA_NODES {
                return Err(FgcError::allocation(
                    "NUMA node cache",
                    format!("{} nodes exceeds the supported {}", nodes, MAXIMUM_NUMA_NODES),
                ));
            }
            if nodes > 1 {
                self.affinity_leaders.try_reserve_exact(nodes)?;
                self.affinity_leaders
                    .extend((0..nodes).map(|node_id| AffinityLeader { node_id }));
                self.maximum_node_number = nodes;
            }
        }

        self.cached = true;
        log::debug!(
            "NUMA support cached: {} nodes (enabled: {})",
            self.maximum_node_number,
            self.physical_numa_enabled
        );
        Ok(())
    }

    /// Drop the cached topology. Safe to call repeatedly.
    pub fn shutdown_numa_support(&mut self) {
        if self.cached {
            log::debug!("NUMA support shut down");
        }
        self.affinity_leaders = Vec::new();
        self.maximum_node_number = 0;
        self.cached = false;
    }

    /// Node count other components size per-node structures by
    pub fn maximum_node_number(&self) -> usize {
        self.maximum_node_number
    }

    pub fn affinity_leaders(&self) -> &[AffinityLeader] {
        &self.affinity_leaders
    }

    pub fn is_active(&self) -> bool {
        self.cached
    }

    pub fn physical_numa_enabled(&self) -> bool {
        self.physical_numa_enabled
    }
}
