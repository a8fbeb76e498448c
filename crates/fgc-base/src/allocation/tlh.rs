//! Thread-Local Heap Allocation Interface
//!
//! Each thread bump-allocates out of a private cache carved from the heap.
//! When the cache is exhausted the owner installs a fresh one; the refresh
//! size doubles on every refill up to the configured maximum.

use crate::environment::ThreadId;
use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use crate::util::Alignment;

/// Current private cache `[base, top)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TlhCache {
    base: usize,
    alloc: usize,
    top: usize,
}

impl TlhCache {
    fn remaining(&self) -> usize {
        self.top - self.alloc
    }
}

/// Bump allocation out of a thread-local cache
#[derive(Debug)]
pub struct TlhAllocationInterface {
    owner: ThreadId,
    alignment: usize,
    cache: Option<TlhCache>,
    minimum_size: usize,
    refresh_size: usize,
    maximum_size: usize,
    total_allocated: usize,
    refresh_count: usize,
}

impl TlhAllocationInterface {
    /// Create the interface for `owner`
    ///
    /// # Validation
    /// - `alignment` must be a power of two
    /// - `minimum <= initial <= maximum`, all non-zero
    pub fn new(
        owner: ThreadId,
        alignment: usize,
        minimum: usize,
        initial: usize,
        maximum: usize,
    ) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(FgcError::allocation(
                "thread-local heap interface",
                format!("alignment ({}) must be a power of two", alignment),
            ));
        }
        if minimum == 0 || minimum > initial || initial > maximum {
            return Err(FgcError::allocation(
                "thread-local heap interface",
                format!(
                    "cache sizes out of order: min {} initial {} max {}",
                    minimum, initial, maximum
                ),
            ));
        }

        Ok(Self {
            owner,
            alignment,
            cache: None,
            minimum_size: minimum,
            refresh_size: initial,
            maximum_size: maximum,
            total_allocated: 0,
            refresh_count: 0,
        })
    }

    /// Create from the current extensions
    pub fn from_extensions(ext: &GcExtensions, owner: ThreadId) -> Result<Self> {
        Self::new(
            owner,
            ext.object_alignment_in_bytes,
            ext.tlh_minimum_size,
            ext.tlh_initial_size,
            ext.tlh_maximum_size,
        )
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Size the next cache should be
    pub fn refresh_size(&self) -> usize {
        self.refresh_size
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    /// Bytes left in the current cache
    pub fn remaining(&self) -> usize {
        self.cache.map_or(0, |c| c.remaining())
    }

    /// Install `[base, base + size)` as the new cache
    ///
    /// The previous cache, if any, is retired. Returns the bytes it still had.
    pub fn install_cache(&mut self, base: usize, size: usize) -> Result<usize> {
        if !Alignment::is_aligned(base, self.alignment) {
            return Err(FgcError::InvalidState {
                expected: format!("cache base aligned to {}", self.alignment),
                actual: format!("{:#x}", base),
            });
        }
        if size < self.minimum_size {
            return Err(FgcError::InvalidState {
                expected: format!("cache of at least {} bytes", self.minimum_size),
                actual: size.to_string(),
            });
        }
        let top = base
            .checked_add(size)
            .ok_or_else(|| FgcError::allocation("thread-local heap", "cache overflows"))?;

        let retired = self.flush_cache();
        self.cache = Some(TlhCache {
            base,
            alloc: base,
            top,
        });
        self.refresh_count += 1;
        self.refresh_size = self.refresh_size.saturating_mul(2).min(self.maximum_size);
        Ok(retired)
    }

    /// Bump-allocate `size` bytes; `None` when the cache cannot satisfy it
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        let aligned = Alignment::checked_align_up(size.max(1), self.alignment)?;
        let cache = self.cache.as_mut()?;
        if aligned > cache.remaining() {
            return None;
        }
        let address = cache.alloc;
        cache.alloc += aligned;
        self.total_allocated += aligned;
        Some(address)
    }

    /// Retire the current cache, returning its unused bytes
    pub fn flush_cache(&mut self) -> usize {
        self.cache.take().map_or(0, |c| c.remaining())
    }

    /// Re-read sizing and alignment after a restore
    ///
    /// The cache is retired; the refresh size restarts from the initial size.
    pub fn reinitialize_for_restore(&mut self, ext: &GcExtensions) -> Result<()> {
        let fresh = Self::from_extensions(ext, self.owner)?;
        let retired = self.flush_cache();
        if retired > 0 {
            log::debug!(
                "thread {}: retired {} cached bytes for restore",
                self.owner,
                retired
            );
        }
        self.alignment = fresh.alignment;
        self.minimum_size = fresh.minimum_size;
        self.refresh_size = fresh.refresh_size;
        self.maximum_size = fresh.maximum_size;
        Ok(())
    }

    /// Base of the current cache, if one is installed
    pub fn cache_base(&self) -> Option<usize> {
        self.cache.map(|c| c.base)
    }
}
