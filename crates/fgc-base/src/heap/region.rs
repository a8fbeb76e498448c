//! Heap Region Manager
//!
//! Partitions the heap into fixed-size, power-of-two regions. The region
//! size never changes once the manager exists.
//!
//! ```text
//! low                                                    high
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//! │ region 0 │ region 1 │ region 2 │   ...    │ region n │
//! └──────────┴──────────┴──────────┴──────────┴──────────┘
//!  <- region_size ->
//! ```

use crate::error::{FgcError, Result};
use crate::util::Alignment;

/// Region kind as seen by the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionType {
    /// Not yet committed to any space
    Free,
    /// Owned by a memory subspace
    Reserved,
}

/// One entry in the region table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub index: usize,
    pub low: usize,
    pub high: usize,
    pub region_type: RegionType,
}

/// HeapRegionManager - fixed-size region table
#[derive(Debug)]
pub struct HeapRegionManager {
    region_size: usize,
    region_shift: usize,
    low_address: usize,
    high_address: usize,
    table: Vec<RegionDescriptor>,
}

impl HeapRegionManager {
    /// Create a region manager for a finalized region size
    pub fn new_instance(region_size: usize) -> Result<Self> {
        if !region_size.is_power_of_two() {
            return Err(FgcError::InvalidRegionSize {
                requested: region_size,
                reason: "region manager needs a power-of-two region size".to_string(),
            });
        }

        Ok(Self {
            region_size,
            region_shift: region_size.trailing_zeros() as usize,
            low_address: 0,
            high_address: 0,
            table: Vec::new(),
        })
    }

    /// Bind the table to the heap's contiguous address range
    pub fn set_contiguous_heap_range(&mut self, low: usize, high: usize) -> Result<()> {
        if !self.table.is_empty() {
            return Err(FgcError::InvalidState {
                expected: "unbound region manager".to_string(),
                actual: format!("bound to [{:#x}, {:#x})", self.low_address, self.high_address),
            });
        }

        if low >= high
            || !Alignment::is_aligned(low, self.region_size)
            || !Alignment::is_aligned(high, self.region_size)
        {
            return Err(FgcError::InvalidState {
                expected: format!("range aligned to {} bytes", self.region_size),
                actual: format!("[{:#x}, {:#x})", low, high),
            });
        }

        let count = (high - low) >> self.region_shift;
        self.table.try_reserve_exact(count)?;
        self.table.extend((0..count).map(|index| {
            let region_low = low + (index << self.region_shift);
            RegionDescriptor {
                index,
                low: region_low,
                high: region_low + self.region_size,
                region_type: RegionType::Free,
            }
        }));
        self.low_address = low;
        self.high_address = high;
        Ok(())
    }

    /// Look up the region containing an address
    pub fn table_descriptor_for_address(&self, address: usize) -> Option<&RegionDescriptor> {
        if address < self.low_address || address >= self.high_address {
            return None;
        }
        self.table
            .get((address - self.low_address) >> self.region_shift)
    }

    /// Mark the first `count` free regions as reserved
    pub fn reserve_regions(&mut self, count: usize) -> usize {
        let mut reserved = 0;
        for descriptor in self
            .table
            .iter_mut()
            .filter(|d| d.region_type == RegionType::Free)
            .take(count)
        {
            descriptor.region_type = RegionType::Reserved;
            reserved += 1;
        }
        reserved
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn region_shift(&self) -> usize {
        self.region_shift
    }

    pub fn region_count(&self) -> usize {
        self.table.len()
    }

    pub fn free_region_count(&self) -> usize {
        self.table
            .iter()
            .filter(|d| d.region_type == RegionType::Free)
            .count()
    }

    pub fn kill(self) {
        log::trace!("region manager destroyed ({} regions)", self.table.len());
    }
}
