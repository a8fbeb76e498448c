//! Lifecycle Logging
//!
//! Records what the subsystem decided while bringing the heap up, re-tuning
//! it, and tearing it down. Useful for:
//! - Startup diagnostics
//! - Verifying teardown order
//! - Restore auditing
//!
//! Log Levels:
//! - ERROR: Initialization failures
//! - INFO: Heap creation, tuning, restore
//! - DEBUG: Geometry decisions, environments
//! - TRACE: Individual resource teardown

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Log level for lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Lifecycle event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Region size finalized
    RegionSizeFixed { requested: usize, region_size: usize },

    /// Arraylet leaf size finalized (`log_size` 0 means unbounded)
    ArrayletLeafSizeFixed { leaf_size: usize, log_size: usize },

    /// Compression shift chosen for the heap top
    CompressionShiftSelected { heap_top: u64, shift: usize },

    /// Heap published into the extensions
    HeapCreated {
        base: usize,
        top: usize,
        region_count: usize,
    },

    /// Concurrency parameters derived
    ParametersTuned {
        gc_thread_count: usize,
        packet_list_split: usize,
        cache_list_split: usize,
        split_free_list_split_amount: usize,
    },

    /// Environment equipped for a thread
    EnvironmentCreated { thread: u64, allocation: String },

    /// Resource destroyed during teardown
    ResourceDestroyed { resource: String },

    /// Restore re-tuning finished
    RestoreCompleted {
        gc_thread_count: usize,
        environments: usize,
    },

    /// An initialization step failed
    InitializationFailed { step: String, reason: String },
}

/// Events kept in memory before the oldest are dropped
pub const DEFAULT_MAX_RECORDED_EVENTS: usize = 4096;

/// Lifecycle logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Recorded-event capacity; zero disables recording
    pub max_events: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
            max_events: DEFAULT_MAX_RECORDED_EVENTS,
        }
    }
}

/// Lifecycle logger - in-memory record plus optional console output
pub struct LifecycleLogger {
    config: LoggerConfig,
    events: Mutex<VecDeque<(Instant, LifecycleEvent)>>,
    enabled: AtomicBool,
}

impl LifecycleLogger {
    /// Create new lifecycle logger
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a lifecycle event
    pub fn log(&self, event: LifecycleEvent) {
        if !self.is_enabled() {
            return;
        }

        if Self::event_level(&event) > self.config.level {
            return;
        }

        if self.config.console {
            self.output_console(&event);
        }

        if self.config.max_events == 0 {
            return;
        }
        if let Ok(mut events) = self.events.lock() {
            while events.len() >= self.config.max_events {
                events.pop_front();
            }
            events.push_back((Instant::now(), event));
        }
    }

    /// Get log level for event
    fn event_level(event: &LifecycleEvent) -> LogLevel {
        match event {
            LifecycleEvent::InitializationFailed { .. } => LogLevel::Error,
            LifecycleEvent::HeapCreated { .. }
            | LifecycleEvent::ParametersTuned { .. }
            | LifecycleEvent::RestoreCompleted { .. } => LogLevel::Info,
            LifecycleEvent::RegionSizeFixed { .. }
            | LifecycleEvent::ArrayletLeafSizeFixed { .. }
            | LifecycleEvent::CompressionShiftSelected { .. }
            | LifecycleEvent::EnvironmentCreated { .. } => LogLevel::Debug,
            LifecycleEvent::ResourceDestroyed { .. } => LogLevel::Trace,
        }
    }

    /// Output to console
    fn output_console(&self, event: &LifecycleEvent) {
        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if self.config.json {
            if let Ok(json_str) = serde_json::to_string(event) {
                println!("{}", json_str);
            }
        } else {
            println!("{}", Self::human(event));
        }
    }

    /// Human-readable rendering
    fn human(event: &LifecycleEvent) -> String {
        match event {
            LifecycleEvent::RegionSizeFixed {
                requested,
                region_size,
            } => format!("[GC] Region size {} (requested {})", region_size, requested),
            LifecycleEvent::ArrayletLeafSizeFixed {
                leaf_size,
                log_size,
            } => {
                if *log_size == 0 {
                    "[GC] Arraylet leaf size unbounded".to_string()
                } else {
                    format!("[GC] Arraylet leaf size {} (log {})", leaf_size, log_size)
                }
            }
            LifecycleEvent::CompressionShiftSelected { heap_top, shift } => {
                format!("[GC] Compression shift {} for heap top {:#x}", shift, heap_top)
            }
            LifecycleEvent::HeapCreated {
                base,
                top,
                region_count,
            } => format!(
                "[GC] Heap [{:#x}, {:#x}) with {} regions",
                base, top, region_count
            ),
            LifecycleEvent::ParametersTuned {
                gc_thread_count,
                packet_list_split,
                cache_list_split,
                split_free_list_split_amount,
            } => format!(
                "[GC] Tuned: {} threads, packet split {}, cache split {}, free-list split {}",
                gc_thread_count, packet_list_split, cache_list_split, split_free_list_split_amount
            ),
            LifecycleEvent::EnvironmentCreated { thread, allocation } => {
                format!("[GC] Environment for thread {} ({})", thread, allocation)
            }
            LifecycleEvent::ResourceDestroyed { resource } => {
                format!("[GC] Destroyed {}", resource)
            }
            LifecycleEvent::RestoreCompleted {
                gc_thread_count,
                environments,
            } => format!(
                "[GC] Restore complete: {} threads, {} environments",
                gc_thread_count, environments
            ),
            LifecycleEvent::InitializationFailed { step, reason } => {
                format!("[GC] Initialization failed at {}: {}", step, reason)
            }
        }
    }

    /// Get all events
    pub fn get_events(&self) -> Vec<(Instant, LifecycleEvent)> {
        if let Ok(events) = self.events.lock() {
            events.iter().cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// Clear all events
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        if let Ok(events) = self.events.lock() {
            events.len()
        } else {
            0
        }
    }
}

impl Default for LifecycleLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<LifecycleLogger> = Mutex::new(LifecycleLogger::default());
}

/// Log a lifecycle event to the global logger
pub fn log_event(event: LifecycleEvent) {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.log(event);
    }
}

/// Configure global logger
pub fn configure_logger(config: LoggerConfig) {
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        *logger = LifecycleLogger::new(config);
    }
}

/// Get global logger event count
pub fn get_event_count() -> usize {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.event_count()
    } else {
        0
    }
}

/// Snapshot of the global logger's events
pub fn recorded_events() -> Vec<LifecycleEvent> {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.get_events().into_iter().map(|(_, e)| e).collect()
    } else {
        Vec::new()
    }
}
