//! Segregated Free-List Allocation Interface
//!
//! Small objects are served from per-size-class caches of free cells. A
//! request is rounded up to the smallest class that fits it; requests larger
//! than the biggest class are not served here.

use crate::environment::ThreadId;
use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;

/// Free cells cached for one size class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClassCache {
    pub cell_size: usize,
    cells: Vec<usize>,
}

impl SizeClassCache {
    pub fn cached_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Per-thread size-class caches
#[derive(Debug)]
pub struct SegregatedAllocationInterface {
    owner: ThreadId,
    caches: Vec<SizeClassCache>,
    allocated_cells: usize,
}

impl SegregatedAllocationInterface {
    pub fn new(owner: ThreadId, size_classes: &[usize]) -> Result<Self> {
        Ok(Self {
            owner,
            caches: Self::build_caches(size_classes)?,
            allocated_cells: 0,
        })
    }

    pub fn from_extensions(ext: &GcExtensions, owner: ThreadId) -> Result<Self> {
        Self::new(owner, &ext.size_classes)
    }

    fn build_caches(size_classes: &[usize]) -> Result<Vec<SizeClassCache>> {
        if size_classes.is_empty() {
            return Err(FgcError::allocation(
                "segregated allocation interface",
                "no size classes configured",
            ));
        }
        let mut caches = Vec::new();
        caches.try_reserve_exact(size_classes.len())?;
        caches.extend(size_classes.iter().map(|&cell_size| SizeClassCache {
            cell_size,
            cells: Vec::new(),
        }));
        Ok(caches)
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn size_class_count(&self) -> usize {
        self.caches.len()
    }

    pub fn allocated_cells(&self) -> usize {
        self.allocated_cells
    }

    /// Smallest class whose cells hold `size` bytes
    pub fn size_class_index(&self, size: usize) -> Option<usize> {
        let index = self.caches.partition_point(|c| c.cell_size < size);
        (index < self.caches.len()).then_some(index)
    }

    pub fn cache(&self, class_index: usize) -> Option<&SizeClassCache> {
        self.caches.get(class_index)
    }

    /// Carve `count` cells starting at `base` into a class cache
    pub fn install_cells(&mut self, class_index: usize, base: usize, count: usize) -> Result<()> {
        let cache = self
            .caches
            .get_mut(class_index)
            .ok_or_else(|| FgcError::InvalidState {
                expected: "a configured size class".to_string(),
                actual: format!("class index {}", class_index),
            })?;
        let cell_size = cache.cell_size;
        count
            .checked_mul(cell_size)
            .and_then(|bytes| base.checked_add(bytes))
            .ok_or_else(|| FgcError::allocation("segregated cells", "range overflows"))?;

        cache.cells.try_reserve(count)?;
        // Pop order hands out the lowest address first.
        cache
            .cells
            .extend((0..count).rev().map(|i| base + i * cell_size));
        Ok(())
    }

    /// Take one cell for `size` bytes
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        let index = self.size_class_index(size.max(1))?;
        let cell = self.caches[index].cells.pop()?;
        self.allocated_cells += 1;
        Some(cell)
    }

    /// Drop every cached cell, returning how many were dropped
    pub fn flush_cache(&mut self) -> usize {
        self.caches
            .iter_mut()
            .map(|c| {
                let n = c.cells.len();
                c.cells.clear();
                n
            })
            .sum()
    }

    /// Flush and rebuild the caches from the current size classes
    pub fn reinitialize_for_restore(&mut self, ext: &GcExtensions) -> Result<()> {
        let dropped = self.flush_cache();
        if dropped > 0 {
            log::debug!(
                "thread {}: dropped {} cached cells for restore",
                self.owner,
                dropped
            );
        }
        let unchanged = self
            .caches
            .iter()
            .map(|c| c.cell_size)
            .eq(ext.size_classes.iter().copied());
        if !unchanged {
            self.caches = Self::build_caches(&ext.size_classes)?;
        }
        Ok(())
    }
}
