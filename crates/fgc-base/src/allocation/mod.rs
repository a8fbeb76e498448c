//! Allocation Module - Per-Thread Allocation Front-Ends
//!
//! Every environment carries exactly one allocation interface. The variant is
//! fixed by the configured policy:
//!
//! - **Thread-local heap**: bump allocation out of a private cache
//! - **Segregated**: per-size-class free-cell caches
//!
//! Construction failure of the interface is an initialization failure of the
//! owning environment.

pub mod segregated;
pub mod tlh;

pub use segregated::{SegregatedAllocationInterface, SizeClassCache};
pub use tlh::TlhAllocationInterface;

use crate::environment::ThreadId;
use crate::error::Result;
use crate::extensions::GcExtensions;
use crate::policy::AllocationType;

/// Allocation interface owned by one environment
#[derive(Debug)]
pub enum ObjectAllocationInterface {
    ThreadLocalHeap(TlhAllocationInterface),
    Segregated(SegregatedAllocationInterface),
}

impl ObjectAllocationInterface {
    /// Build the interface the configured policy calls for
    pub fn new_instance(ext: &GcExtensions, owner: ThreadId) -> Result<Self> {
        Self::new_instance_of(ext.policy.allocation_type(), ext, owner)
    }

    /// Build an interface of an explicit variant
    pub fn new_instance_of(
        allocation_type: AllocationType,
        ext: &GcExtensions,
        owner: ThreadId,
    ) -> Result<Self> {
        match allocation_type {
            AllocationType::ThreadLocalHeap => {
                TlhAllocationInterface::from_extensions(ext, owner).map(Self::ThreadLocalHeap)
            }
            AllocationType::Segregated => {
                SegregatedAllocationInterface::from_extensions(ext, owner).map(Self::Segregated)
            }
        }
    }

    pub fn allocation_type(&self) -> AllocationType {
        match self {
            Self::ThreadLocalHeap(_) => AllocationType::ThreadLocalHeap,
            Self::Segregated(_) => AllocationType::Segregated,
        }
    }

    pub fn owner(&self) -> ThreadId {
        match self {
            Self::ThreadLocalHeap(tlh) => tlh.owner(),
            Self::Segregated(seg) => seg.owner(),
        }
    }

    /// Serve `size` bytes from the thread-local cache
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        match self {
            Self::ThreadLocalHeap(tlh) => tlh.allocate(size),
            Self::Segregated(seg) => seg.allocate(size),
        }
    }

    /// Give back whatever the thread has cached
    pub fn flush_cache(&mut self) {
        let returned = match self {
            Self::ThreadLocalHeap(tlh) => tlh.flush_cache(),
            Self::Segregated(seg) => seg.flush_cache(),
        };
        log::trace!("thread {}: flushed {} cached units", self.owner(), returned);
    }

    pub fn reinitialize_for_restore(&mut self, ext: &GcExtensions) -> Result<()> {
        match self {
            Self::ThreadLocalHeap(tlh) => tlh.reinitialize_for_restore(ext),
            Self::Segregated(seg) => seg.reinitialize_for_restore(ext),
        }
    }

    pub fn kill(mut self) {
        self.flush_cache();
    }

    pub fn as_tlh(&mut self) -> Option<&mut TlhAllocationInterface> {
        match self {
            Self::ThreadLocalHeap(tlh) => Some(tlh),
            Self::Segregated(_) => None,
        }
    }

    pub fn as_segregated(&mut self) -> Option<&mut SegregatedAllocationInterface> {
        match self {
            Self::Segregated(seg) => Some(seg),
            Self::ThreadLocalHeap(_) => None,
        }
    }
}

impl std::fmt::Display for ObjectAllocationInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThreadLocalHeap(_) => write!(f, "thread-local heap"),
            Self::Segregated(_) => write!(f, "segregated"),
        }
    }
}
