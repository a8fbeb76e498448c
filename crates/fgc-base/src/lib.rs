//! # FGC Base - Memory-Management Bootstrap
//!
//! FGC Base brings a garbage-collected heap up, re-tunes it after a
//! checkpoint/restore, and takes it down again. It decides the heap's shape
//! before any object exists and hands collector code a fully tuned runtime
//! context.
//!
//! ## Overview
//!
//! - **Lifecycle Orchestration**: Ordered initialization and idempotent, ordered teardown
//! - **Heap Geometry**: Power-of-two region and arraylet leaf sizes, compressed-reference shift
//! - **Space Sizing**: New/old generation bounds negotiated against the real heap capacity
//! - **Allocation Interfaces**: Thread-local heap or segregated free lists, one per thread
//! - **Parameter Tuning**: GC thread count and lock split factors from the CPU count
//! - **Checkpoint/Restore**: Re-tuning that never shrinks structures already sized
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fgc_base::{DefaultDelegate, GcBootstrap, GcConfig, SystemPort, VmThread};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), fgc_base::FgcError> {
//!     let config = GcConfig {
//!         memory_max: 256 * 1024 * 1024,
//!         ..Default::default()
//!     };
//!     let mut gc = GcBootstrap::startup(&config, DefaultDelegate, Arc::new(SystemPort))?;
//!
//!     gc.attach_thread(VmThread::new(1, "main"))?;
//!     println!("GC threads: {}", gc.extensions().gc_thread_count);
//!
//!     gc.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Configuration                          │
//! │                                                           │
//! │  initialize ──▶ create_heap ──▶ create_environment (×N)   │
//! │       │              │                   │                │
//! │       ▼              ▼                   ▼                │
//! │  ┌─────────────────────────────────────────────────┐     │
//! │  │                 GcExtensions                     │     │
//! │  │  geometry · tuned parameters · owned resources   │     │
//! │  └─────────────────────────────────────────────────┘     │
//! │       ▲                                  ▲                │
//! │       │                                  │                │
//! │  reinitialize_for_restore           tear_down             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Customizing
//!
//! Runtime-specific behavior goes through a [`ConfigurationDelegate`]. Every
//! hook has a default, so a runtime overrides only what it needs:
//!
//! ```rust
//! use fgc_base::{ConfigurationDelegate, GcExtensions};
//!
//! struct SmallRuntime;
//!
//! impl ConfigurationDelegate for SmallRuntime {
//!     fn max_gc_thread_count(&self, _ext: &GcExtensions) -> usize {
//!         4
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`configuration`]: Lifecycle orchestrator and restore path
//! - [`geometry`]: Region size, arraylet leaf size, compression shift
//! - [`sizing`]: Space sizing negotiation
//! - [`tuning`]: GC thread count and split factors
//! - [`allocation`]: Per-thread allocation interfaces
//! - [`heap`]: Heap, memory spaces, region and memory managers, NUMA
//! - [`config`]: User-facing options and validation
//! - [`error`]: Error types for all FGC base operations
//! - [`logging`]: Lifecycle event log

// Lifecycle
pub mod bootstrap;
pub mod configuration;
pub mod delegate;
pub mod extensions;

// Decisions
pub mod geometry;
pub mod policy;
pub mod sizing;
pub mod tuning;

// Resources
pub mod allocation;
pub mod collector;
pub mod dispatcher;
pub mod environment;
pub mod heap;
pub mod lock_pool;

// Configuration, errors, and diagnostics
pub mod config;
pub mod error;
pub mod logging;
pub mod port;

// Utilities
pub mod util;

pub use bootstrap::GcBootstrap;
pub use config::GcConfig;
pub use configuration::Configuration;
pub use delegate::{ConfigurationDelegate, DefaultDelegate};
pub use environment::{Environment, ThreadId, VmThread, VmThreadList};
pub use error::{FgcError, Result};
pub use extensions::GcExtensions;
pub use policy::{AlignmentType, AllocationType, GcPolicy, ReferenceMode, WriteBarrierType};
pub use port::{FixedPort, PortLibrary, SystemPort};
pub use sizing::InitializationParameters;

/// FGC base version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Start the subsystem from `FGC_` environment variables
///
/// Uses [`GcConfig::from_env`], the host [`SystemPort`] and the
/// [`DefaultDelegate`].
///
/// # Examples
///
/// ```rust,no_run
/// let gc = fgc_base::init()?;
/// gc.shutdown();
/// # Ok::<(), fgc_base::FgcError>(())
/// ```
pub fn init() -> Result<GcBootstrap<DefaultDelegate>> {
    init_with_config(GcConfig::from_env())
}

/// Start the subsystem with a custom configuration
pub fn init_with_config(config: GcConfig) -> Result<GcBootstrap<DefaultDelegate>> {
    GcBootstrap::startup(&config, DefaultDelegate, std::sync::Arc::new(SystemPort))
}
