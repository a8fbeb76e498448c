//! Per-Thread Environments
//!
//! An [`Environment`] is the per-thread GC context. It is created by the
//! orchestrator when a runtime thread attaches and is then owned and mutated
//! only by that thread. [`VmThreadList`] is the registry of live
//! environments walked during checkpoint/restore.

use crate::allocation::ObjectAllocationInterface;
use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use indexmap::IndexMap;

/// Thread ID type
pub type ThreadId = u64;

/// A runtime thread as seen by the GC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmThread {
    pub id: ThreadId,
    pub name: String,
}

impl VmThread {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Per-thread GC context
#[derive(Debug)]
pub struct Environment {
    thread: VmThread,
    allocation_interface: Option<ObjectAllocationInterface>,
    restore_count: usize,
}

impl Environment {
    /// Bare environment; the orchestrator equips it before handing it out
    pub(crate) fn new(thread: VmThread) -> Self {
        Self {
            thread,
            allocation_interface: None,
            restore_count: 0,
        }
    }

    pub fn thread(&self) -> &VmThread {
        &self.thread
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread.id
    }

    pub fn allocation_interface(&self) -> Option<&ObjectAllocationInterface> {
        self.allocation_interface.as_ref()
    }

    pub fn allocation_interface_mut(&mut self) -> Option<&mut ObjectAllocationInterface> {
        self.allocation_interface.as_mut()
    }

    pub(crate) fn set_allocation_interface(&mut self, interface: ObjectAllocationInterface) {
        if let Some(previous) = self.allocation_interface.replace(interface) {
            previous.kill();
        }
    }

    /// Number of restores this environment went through
    pub fn restore_count(&self) -> usize {
        self.restore_count
    }

    /// Refresh restore-sensitive thread-local state
    pub fn reinitialize_for_restore(&mut self, ext: &GcExtensions) -> Result<()> {
        let interface = self
            .allocation_interface
            .as_mut()
            .ok_or_else(|| FgcError::RestoreFailed {
                thread: self.thread.id,
                reason: "environment has no allocation interface".to_string(),
            })?;
        interface
            .reinitialize_for_restore(ext)
            .map_err(|e| FgcError::RestoreFailed {
                thread: self.thread.id,
                reason: e.to_string(),
            })?;
        self.restore_count += 1;
        Ok(())
    }

    /// Destroy the environment and its allocation interface
    pub fn kill(mut self) {
        if let Some(interface) = self.allocation_interface.take() {
            interface.kill();
        }
        log::trace!("environment for thread {} destroyed", self.thread.id);
    }
}

/// Registry of live environments, in attach order
#[derive(Debug, Default)]
pub struct VmThreadList {
    environments: IndexMap<ThreadId, Environment>,
}

impl VmThreadList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an environment; a thread may attach only once
    pub fn attach(&mut self, env: Environment) -> Result<()> {
        let id = env.thread_id();
        if self.environments.contains_key(&id) {
            return Err(FgcError::InvalidState {
                expected: format!("thread {} detached", id),
                actual: "already attached".to_string(),
            });
        }
        self.environments.insert(id, env);
        Ok(())
    }

    /// Unregister a thread, handing its environment back
    pub fn detach(&mut self, id: ThreadId) -> Option<Environment> {
        self.environments.shift_remove(&id)
    }

    pub fn get(&self, id: ThreadId) -> Option<&Environment> {
        self.environments.get(&id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Environment> {
        self.environments.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Environment> {
        self.environments.values_mut()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Detach and destroy every environment
    pub fn kill_all(&mut self) {
        for (_, env) in self.environments.drain(..) {
            env.kill();
        }
    }
}
