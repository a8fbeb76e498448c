//! Bootstrap - Embedding Entry Point
//!
//! Runs the whole startup sequence for an embedding runtime:
//! 1. Seed extensions from the configuration
//! 2. Initialize the configuration
//! 3. Create the heap and its default memory space
//! 4. Start the GC worker threads and the global collector
//!
//! Any failure tears down whatever was built. Shutdown (explicit or on drop)
//! destroys the attached environments, then the configuration.

use crate::config::GcConfig;
use crate::configuration::Configuration;
use crate::delegate::ConfigurationDelegate;
use crate::environment::{ThreadId, VmThread, VmThreadList};
use crate::error::{FgcError, Result};
use crate::extensions::GcExtensions;
use crate::logging::{configure_logger, LogLevel, LoggerConfig};
use crate::port::PortLibrary;
use std::sync::Arc;

/// Stack size for GC worker threads
pub const DEFAULT_WORKER_STACK_SIZE: usize = 1024 * 1024;

fn shut_down() -> FgcError {
    FgcError::InvalidState {
        expected: "running subsystem".to_string(),
        actual: "shut down".to_string(),
    }
}

/// A running memory-management subsystem
pub struct GcBootstrap<D: ConfigurationDelegate> {
    configuration: Option<Configuration<D>>,
    ext: GcExtensions,
    threads: VmThreadList,
}

impl<D: ConfigurationDelegate> GcBootstrap<D> {
    /// Bring the subsystem up
    pub fn startup(config: &GcConfig, delegate: D, port: Arc<dyn PortLibrary>) -> Result<Self> {
        if config.verbose {
            configure_logger(LoggerConfig {
                level: LogLevel::Debug,
                console: true,
                ..Default::default()
            });
        }

        let mut ext = GcExtensions::new(config, port)?;
        let mut configuration = Configuration::new(config.policy, delegate);

        if let Err(e) = Self::bring_up(&mut configuration, &mut ext) {
            log::error!("GC startup failed: {}", e);
            configuration.kill(&mut ext);
            return Err(e);
        }

        Ok(Self {
            configuration: Some(configuration),
            ext,
            threads: VmThreadList::new(),
        })
    }

    fn bring_up(configuration: &mut Configuration<D>, ext: &mut GcExtensions) -> Result<()> {
        configuration.initialize(ext)?;
        let requested = ext.memory_max;
        configuration.create_heap(ext, requested)?;
        configuration.create_default_memory_space(ext)?;
        configuration.create_parallel_dispatcher(ext, DEFAULT_WORKER_STACK_SIZE)?;
        configuration.create_global_collector(ext)
    }

    /// Create and register an environment for a runtime thread
    pub fn attach_thread(&mut self, thread: VmThread) -> Result<ThreadId> {
        let id = thread.id;
        if self.threads.get(id).is_some() {
            return Err(FgcError::InvalidState {
                expected: format!("thread {} detached", id),
                actual: "already attached".to_string(),
            });
        }
        let configuration = self.configuration.as_mut().ok_or_else(shut_down)?;
        let env = configuration.create_environment(&self.ext, thread)?;
        self.threads.attach(env)?;
        Ok(id)
    }

    /// Destroy a thread's environment; unknown threads are ignored
    pub fn detach_thread(&mut self, id: ThreadId) {
        if let Some(env) = self.threads.detach(id) {
            env.kill();
        }
    }

    /// Re-tune after a checkpoint/restore
    pub fn restore(&mut self) -> Result<()> {
        let configuration = self.configuration.as_mut().ok_or_else(shut_down)?;
        configuration.reinitialize_for_restore(&mut self.ext, self.threads.iter_mut())
    }

    pub fn extensions(&self) -> &GcExtensions {
        &self.ext
    }

    pub fn extensions_mut(&mut self) -> &mut GcExtensions {
        &mut self.ext
    }

    pub fn configuration(&self) -> Option<&Configuration<D>> {
        self.configuration.as_ref()
    }

    pub fn threads(&self) -> &VmThreadList {
        &self.threads
    }

    pub fn is_running(&self) -> bool {
        self.configuration.is_some()
    }

    fn shutdown_inner(&mut self) {
        self.threads.kill_all();
        if let Some(configuration) = self.configuration.take() {
            configuration.kill(&mut self.ext);
            log::info!("GC subsystem shut down");
        }
    }

    /// Tear everything down
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }
}

impl<D: ConfigurationDelegate> Drop for GcBootstrap<D> {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

impl<D: ConfigurationDelegate> std::fmt::Debug for GcBootstrap<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcBootstrap")
            .field("running", &self.is_running())
            .field("threads", &self.threads.len())
            .field("ext", &self.ext)
            .finish()
    }
}
