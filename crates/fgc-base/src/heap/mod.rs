//! Heap Management Module
//!
//! The heap is a contiguous, region-aligned address range backing object
//! allocation. It owns at most one default [`MemorySpace`], which must be
//! destroyed before the heap itself; the heap in turn is destroyed before the
//! region manager and memory manager that back it.
//!
//! Heap Structure:
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Heap                            │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │            Default Memory Space               │  │
//! │  │  ┌──────────┬──────────┐ ┌─────────────────┐  │  │
//! │  │  │ allocate │ survivor │ │    old space    │  │  │
//! │  │  └──────────┴──────────┘ └─────────────────┘  │  │
//! │  └───────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod memory_manager;
pub mod numa;
pub mod region;

pub use memory_manager::{MemoryManager, VirtualMemoryReservation};
pub use numa::NumaManager;
pub use region::{HeapRegionManager, RegionDescriptor, RegionType};

use crate::error::{FgcError, Result};
use crate::sizing::InitializationParameters;
use crate::util::Alignment;

/// Heap - region-aligned managed address range
#[derive(Debug)]
pub struct Heap {
    /// Reserved address range
    reservation: VirtualMemoryReservation,

    /// Region size the heap was laid out with
    region_size: usize,

    /// Default memory space, if one has been created
    default_memory_space: Option<MemorySpace>,

    /// Heap bound to a region manager
    region_manager_bound: bool,
}

impl Heap {
    /// Reserve a heap of at least `requested` bytes
    ///
    /// # Arguments
    /// * `memory_manager` - Reservation bookkeeping
    /// * `heap_base` - Preferred base; rounded up to `region_size`
    /// * `region_size` - Finalized power-of-two region size
    /// * `requested` - Requested size; rounded up to `region_size`
    pub fn new_instance(
        memory_manager: &mut MemoryManager,
        heap_base: usize,
        region_size: usize,
        requested: usize,
    ) -> Result<Self> {
        if requested == 0 {
            return Err(FgcError::allocation("heap", "zero bytes requested"));
        }
        if !region_size.is_power_of_two() {
            return Err(FgcError::InvalidState {
                expected: "power-of-two region size".to_string(),
                actual: region_size.to_string(),
            });
        }

        let base = heap_base
            .checked_add(region_size - 1)
            .map(|b| Alignment::align_down(b, region_size))
            .ok_or_else(|| FgcError::allocation("heap", "heap base overflows"))?;
        let size = Alignment::round_to_ceiling(region_size, requested);

        let reservation = memory_manager.reserve(base, size)?;

        Ok(Self {
            reservation,
            region_size,
            default_memory_space: None,
            region_manager_bound: false,
        })
    }

    /// Bind the region table to this heap's range
    pub fn initialize_heap_region_manager(
        &mut self,
        region_manager: &mut HeapRegionManager,
    ) -> Result<()> {
        if region_manager.region_size() != self.region_size {
            return Err(FgcError::InvalidState {
                expected: format!("region size {}", self.region_size),
                actual: format!("region size {}", region_manager.region_size()),
            });
        }
        region_manager.set_contiguous_heap_range(self.heap_base(), self.heap_top())?;
        self.region_manager_bound = true;
        Ok(())
    }

    pub fn heap_base(&self) -> usize {
        self.reservation.base
    }

    pub fn heap_top(&self) -> usize {
        self.reservation.top()
    }

    /// Capacity the heap can ever grow to
    pub fn maximum_memory_size(&self) -> usize {
        self.reservation.size
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn is_region_manager_bound(&self) -> bool {
        self.region_manager_bound
    }

    pub fn default_memory_space(&self) -> Option<&MemorySpace> {
        self.default_memory_space.as_ref()
    }

    pub fn set_default_memory_space(&mut self, space: Option<MemorySpace>) {
        self.default_memory_space = space;
    }

    pub fn take_default_memory_space(&mut self) -> Option<MemorySpace> {
        self.default_memory_space.take()
    }

    /// Release the heap's range
    ///
    /// A default memory space still attached is destroyed first.
    pub fn kill(mut self, memory_manager: Option<&mut MemoryManager>) {
        if let Some(space) = self.default_memory_space.take() {
            space.kill();
        }
        if let Some(mm) = memory_manager {
            mm.release(&self.reservation);
        }
        log::trace!(
            "heap [{:#x}, {:#x}) destroyed",
            self.heap_base(),
            self.heap_top()
        );
    }
}

/// Size bounds of one subspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subspace {
    pub minimum: usize,
    pub initial: usize,
    pub maximum: usize,
}

/// New space split into two equal semi-space halves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewSpace {
    pub allocate: Subspace,
    pub survivor: Subspace,
}

impl NewSpace {
    fn halves(minimum: usize, initial: usize, maximum: usize) -> Self {
        let half = Subspace {
            minimum: minimum / 2,
            initial: initial / 2,
            maximum: maximum / 2,
        };
        Self {
            allocate: half,
            survivor: half,
        }
    }
}

/// MemorySpace - named subdivision of the heap
#[derive(Debug, Clone)]
pub struct MemorySpace {
    name: String,
    new_space: Option<NewSpace>,
    old_space: Subspace,
    maximum_size: usize,
}

impl MemorySpace {
    /// Build a memory space from negotiated parameters
    ///
    /// Generational spaces get a new space (as two halves) plus an old space;
    /// flat spaces put the whole heap into the old space.
    pub fn new_instance(
        name: &str,
        params: &InitializationParameters,
        generational: bool,
    ) -> Result<Self> {
        let (new_space, old_space) = if generational {
            (
                Some(NewSpace::halves(
                    params.minimum_new_space_size,
                    params.initial_new_space_size,
                    params.maximum_new_space_size,
                )),
                Subspace {
                    minimum: params.minimum_old_space_size,
                    initial: params.initial_old_space_size,
                    maximum: params.maximum_old_space_size,
                },
            )
        } else {
            (
                None,
                Subspace {
                    minimum: params.minimum_space_size,
                    initial: params.minimum_space_size,
                    maximum: params.maximum_space_size,
                },
            )
        };

        let space = Self {
            name: name.to_string(),
            new_space,
            old_space,
            maximum_size: params.maximum_space_size,
        };

        if space.minimum_size() > space.maximum_size {
            return Err(FgcError::Configuration(format!(
                "memory space '{}' minimum {} exceeds maximum {}",
                name,
                space.minimum_size(),
                space.maximum_size
            )));
        }

        Ok(space)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_space(&self) -> Option<&NewSpace> {
        self.new_space.as_ref()
    }

    pub fn old_space(&self) -> &Subspace {
        &self.old_space
    }

    pub fn minimum_size(&self) -> usize {
        let new = self
            .new_space
            .map_or(0, |n| n.allocate.minimum + n.survivor.minimum);
        new + self.old_space.minimum
    }

    pub fn initial_size(&self) -> usize {
        let new = self
            .new_space
            .map_or(0, |n| n.allocate.initial + n.survivor.initial);
        new + self.old_space.initial
    }

    pub fn maximum_size(&self) -> usize {
        self.maximum_size
    }

    pub fn kill(self) {
        log::trace!("memory space '{}' destroyed", self.name);
    }
}
