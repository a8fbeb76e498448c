//! Lightweight Non-Reentrant Lock Pool
//!
//! Backing storage for the small monitors the runtime hands out to GC
//! structures. Locks are handed out by index and recycled through a free list.

use crate::error::{FgcError, Result};
use parking_lot::{Mutex, MutexGuard};

/// Locks allocated up front
pub const DEFAULT_LOCK_POOL_CAPACITY: usize = 64;

/// Index of a lock inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockHandle(usize);

/// Pool of non-reentrant locks
#[derive(Debug)]
pub struct LockPool {
    locks: Vec<Mutex<()>>,
    free: Vec<usize>,
}

impl LockPool {
    pub fn new_instance(capacity: usize) -> Result<Self> {
        let mut locks = Vec::new();
        locks.try_reserve_exact(capacity)?;
        let mut free = Vec::new();
        free.try_reserve_exact(capacity)?;
        Ok(Self { locks, free })
    }

    /// Hand out a lock, growing the pool when every lock is in use
    pub fn allocate(&mut self) -> Result<LockHandle> {
        if let Some(index) = self.free.pop() {
            return Ok(LockHandle(index));
        }
        self.locks.try_reserve(1)?;
        self.locks.push(Mutex::new(()));
        Ok(LockHandle(self.locks.len() - 1))
    }

    /// Return a lock to the pool
    pub fn release(&mut self, handle: LockHandle) -> Result<()> {
        if handle.0 >= self.locks.len() || self.free.contains(&handle.0) {
            return Err(FgcError::InvalidState {
                expected: "a lock handed out by this pool".to_string(),
                actual: format!("lock {}", handle.0),
            });
        }
        self.free.try_reserve(1)?;
        self.free.push(handle.0);
        Ok(())
    }

    pub fn lock(&self, handle: LockHandle) -> Option<MutexGuard<'_, ()>> {
        self.locks.get(handle.0).map(|m| m.lock())
    }

    pub fn try_lock(&self, handle: LockHandle) -> Option<MutexGuard<'_, ()>> {
        self.locks.get(handle.0).and_then(|m| m.try_lock())
    }

    /// Locks currently handed out
    pub fn in_use(&self) -> usize {
        self.locks.len() - self.free.len()
    }

    pub fn kill(self) {
        if self.in_use() > 0 {
            log::warn!("lock pool destroyed with {} locks in use", self.in_use());
        }
    }
}
