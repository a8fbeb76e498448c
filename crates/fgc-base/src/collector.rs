//! Collector-Side Resources
//!
//! Resources created on top of a heap and torn down before it:
//! - The global collector (behind the [`Collector`] trait)
//! - The global allocation manager (one allocation context per NUMA node)
//! - The reference-chain-walker mark map

use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use std::collections::HashSet;

/// A global collector as seen by the lifecycle orchestrator
pub trait Collector: Send {
    fn name(&self) -> &str;

    /// Destroy the collector and anything it owns
    fn kill(self: Box<Self>, ext: &mut GcExtensions);
}

/// Collector shell that records its policy
///
/// When the policy gives the collector ownership of the dispatcher, the
/// dispatcher is destroyed together with the collector.
#[derive(Debug)]
pub struct GlobalCollector {
    name: String,
    owns_dispatcher: bool,
}

impl GlobalCollector {
    pub fn new_instance(ext: &GcExtensions) -> Result<Self> {
        Ok(Self {
            name: format!("{} global collector", ext.policy.name()),
            owns_dispatcher: ext.collector_owns_dispatcher(),
        })
    }

    pub fn owns_dispatcher(&self) -> bool {
        self.owns_dispatcher
    }
}

impl Collector for GlobalCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kill(self: Box<Self>, ext: &mut GcExtensions) {
        if self.owns_dispatcher {
            if let Some(dispatcher) = ext.dispatcher.take() {
                dispatcher.kill();
            }
        }
        log::trace!("{} destroyed", self.name);
    }
}

/// Allocation context bound to one NUMA node (0 when NUMA is off)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationContext {
    pub node: usize,
}

/// Hands out allocation contexts to threads, round-robin over nodes
#[derive(Debug)]
pub struct GlobalAllocationManager {
    contexts: Vec<AllocationContext>,
    next: usize,
}

impl GlobalAllocationManager {
    pub fn new_instance(ext: &GcExtensions) -> Result<Self> {
        let nodes = ext.numa_manager.maximum_node_number().max(1);
        let mut contexts = Vec::new();
        contexts.try_reserve_exact(nodes)?;
        contexts.extend((0..nodes).map(|node| AllocationContext { node }));
        Ok(Self { contexts, next: 0 })
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Context for the next attaching thread
    pub fn acquire_context(&mut self) -> AllocationContext {
        let context = self.contexts[self.next % self.contexts.len()];
        self.next = self.next.wrapping_add(1);
        context
    }

    pub fn kill(self) {
        log::trace!(
            "global allocation manager with {} contexts destroyed",
            self.contexts.len()
        );
    }
}

/// Mark map used when walking reference chains over the heap
#[derive(Debug)]
pub struct ReferenceChainWalkerMarkMap {
    heap_base: usize,
    heap_top: usize,
    granule: usize,
    marked: HashSet<usize>,
}

impl ReferenceChainWalkerMarkMap {
    /// Cover the current heap; fails when no heap exists
    pub fn new_instance(ext: &GcExtensions) -> Result<Self> {
        let heap = ext.heap.as_ref().ok_or_else(|| FgcError::InvalidState {
            expected: "heap created".to_string(),
            actual: "no heap".to_string(),
        })?;
        Ok(Self {
            heap_base: heap.heap_base(),
            heap_top: heap.heap_top(),
            granule: ext.object_alignment_in_bytes,
            marked: HashSet::new(),
        })
    }

    fn covers(&self, address: usize) -> bool {
        address >= self.heap_base && address < self.heap_top && address % self.granule == 0
    }

    /// Mark `address`; true if it was not marked before
    pub fn mark(&mut self, address: usize) -> Result<bool> {
        if !self.covers(address) {
            return Err(FgcError::InvalidState {
                expected: format!(
                    "granule-aligned address in [{:#x}, {:#x})",
                    self.heap_base, self.heap_top
                ),
                actual: format!("{:#x}", address),
            });
        }
        Ok(self.marked.insert(address))
    }

    pub fn is_marked(&self, address: usize) -> bool {
        self.marked.contains(&address)
    }

    pub fn clear(&mut self) {
        self.marked.clear();
    }

    pub fn kill(self) {
        log::trace!("reference chain walker mark map destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::dispatcher::ParallelDispatcher;
    use crate::heap::{Heap, MemoryManager};
    use crate::policy::GcPolicy;
    use crate::port::FixedPort;
    use crate::util::constants::{KB, MB};
    use std::sync::Arc;

    fn extensions(policy: GcPolicy, numa_nodes: usize) -> GcExtensions {
        let config = GcConfig {
            policy,
            ..Default::default()
        };
        GcExtensions::new(&config, Arc::new(FixedPort::new(4, numa_nodes))).unwrap()
    }

    #[test]
    fn test_collector_owning_dispatcher_kills_it() {
        let mut ext = extensions(GcPolicy::Segregated, 1);
        ext.dispatcher = Some(ParallelDispatcher::new_instance(2, 0).unwrap());
        let collector = Box::new(GlobalCollector::new_instance(&ext).unwrap());
        assert!(collector.owns_dispatcher());
        collector.kill(&mut ext);
        assert!(ext.dispatcher.is_none());
    }

    #[test]
    fn test_collector_leaves_shared_dispatcher() {
        let mut ext = extensions(GcPolicy::Generational, 1);
        ext.dispatcher = Some(ParallelDispatcher::new_instance(2, 0).unwrap());
        let collector = Box::new(GlobalCollector::new_instance(&ext).unwrap());
        collector.kill(&mut ext);
        assert!(ext.dispatcher.is_some());
    }

    #[test]
    fn test_allocation_contexts_follow_numa() {
        let mut ext = extensions(GcPolicy::Generational, 4);
        let port = FixedPort::new(4, 4);
        ext.numa_manager.recache_numa_support(&port).unwrap();
        let mut manager = GlobalAllocationManager::new_instance(&ext).unwrap();
        assert_eq!(manager.context_count(), 4);
        let nodes: Vec<_> = (0..5).map(|_| manager.acquire_context().node).collect();
        assert_eq!(nodes, vec![0, 1, 2, 3, 0]);

        let ext = extensions(GcPolicy::Generational, 1);
        assert_eq!(GlobalAllocationManager::new_instance(&ext).unwrap().context_count(), 1);
    }

    #[test]
    fn test_mark_map_requires_heap() {
        let mut ext = extensions(GcPolicy::Generational, 1);
        assert!(ReferenceChainWalkerMarkMap::new_instance(&ext).is_err());

        let mut mm = MemoryManager::new_instance().unwrap();
        ext.heap = Some(Heap::new_instance(&mut mm, 0x1000_0000, 64 * KB, MB).unwrap());
        let mut map = ReferenceChainWalkerMarkMap::new_instance(&ext).unwrap();
        assert!(map.mark(0x1000_0008).unwrap());
        assert!(!map.mark(0x1000_0008).unwrap());
        assert!(map.is_marked(0x1000_0008));
        assert!(map.mark(0x1000_0009).is_err());
        assert!(map.mark(0x2000_0000).is_err());
        map.clear();
        assert!(!map.is_marked(0x1000_0008));
    }
}
