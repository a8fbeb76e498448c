//! Memory Manager
//!
//! Tracks the address ranges handed to heaps. The OS reservation itself
//! happens outside this subsystem; the manager only guarantees that ranges
//! do not overlap and that every range is released exactly once.

use crate::error::{FgcError, Result};
use indexmap::IndexMap;

/// An address range reserved for a heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualMemoryReservation {
    pub base: usize,
    pub size: usize,
}

impl VirtualMemoryReservation {
    pub fn top(&self) -> usize {
        self.base + self.size
    }

    fn overlaps(&self, other: &VirtualMemoryReservation) -> bool {
        self.base < other.top() && other.base < self.top()
    }
}

/// MemoryManager - reservation bookkeeping
#[derive(Debug, Default)]
pub struct MemoryManager {
    reservations: IndexMap<usize, VirtualMemoryReservation>,
}

impl MemoryManager {
    pub fn new_instance() -> Result<Self> {
        Ok(Self::default())
    }

    /// Reserve `[base, base + size)`
    pub fn reserve(&mut self, base: usize, size: usize) -> Result<VirtualMemoryReservation> {
        if size == 0 {
            return Err(FgcError::allocation("virtual memory", "zero-sized reservation"));
        }
        if base.checked_add(size).is_none() {
            return Err(FgcError::allocation(
                "virtual memory",
                format!("{:#x} + {} overflows the address space", base, size),
            ));
        }

        let reservation = VirtualMemoryReservation { base, size };
        if let Some(existing) = self
            .reservations
            .values()
            .find(|r| r.overlaps(&reservation))
        {
            return Err(FgcError::allocation(
                "virtual memory",
                format!(
                    "[{:#x}, {:#x}) overlaps [{:#x}, {:#x})",
                    base,
                    reservation.top(),
                    existing.base,
                    existing.top()
                ),
            ));
        }

        self.reservations.insert(base, reservation);
        Ok(reservation)
    }

    /// Release a reservation; unknown ranges are ignored
    pub fn release(&mut self, reservation: &VirtualMemoryReservation) {
        self.reservations.shift_remove(&reservation.base);
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn reserved_bytes(&self) -> usize {
        self.reservations.values().map(|r| r.size).sum()
    }

    pub fn kill(self) {
        if !self.reservations.is_empty() {
            log::warn!(
                "memory manager destroyed with {} live reservations",
                self.reservations.len()
            );
        }
    }
}
