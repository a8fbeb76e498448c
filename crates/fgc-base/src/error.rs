//! Error Module - FGC Base Error Types
//!
//! Defines all error types produced while bringing the memory-management
//! subsystem up, re-tuning it after a restore, or tearing it down.
//!
//! # Error Categories
//!
//! ## Configuration-Impossible
//! - `ImpossibleGeometry` - Heap cannot be addressed under any compression shift
//! - `InvalidRegionSize` - Region size cannot be rounded or is not viable
//! - `InvalidArrayletLeafSize` - Leaf size cannot be rounded
//! - `HeapOutsideWindow` - Heap landed outside the verification window
//!
//! ## Allocation Failure
//! - `AllocationFailed` - A sub-resource could not be constructed
//!
//! ## Misconfiguration
//! - `Misconfiguration` - Variant value outside the fixed set
//! - `Configuration` - Invalid user configuration
//!
//! ## Collaborator Failures
//! - `Delegate` - A runtime delegate hook refused
//! - `RestoreFailed` - A per-thread environment could not be reinitialized

use thiserror::Error;

/// Main error type for all FGC base operations
///
/// # Examples
///
/// ```rust
/// use fgc_base::error::FgcError;
///
/// fn report(err: FgcError) {
///     match err {
///         FgcError::ImpossibleGeometry { heap_top, shift } => {
///             eprintln!("heap top {:#x} not addressable (shift {})", heap_top, shift);
///         }
///         other => eprintln!("startup failed: {}", other),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum FgcError {
    /// Heap top cannot be addressed with compressed references
    ///
    /// **When returned:** Heap top exceeds `2^32 << shift` for the largest
    /// shift the configuration permits
    ///
    /// **Recovery strategy:** Report a clean configuration error; lower the
    /// heap size, move the heap base, or use full references
    #[error("Impossible heap geometry: heap top {heap_top:#x} is not addressable with compression shift {shift}")]
    ImpossibleGeometry { heap_top: u64, shift: usize },

    /// Region size rejected
    ///
    /// **When returned:** Requested region size is zero, not representable
    /// as a power of two, or not viable for the heap layout
    #[error("Invalid region size {requested}: {reason}")]
    InvalidRegionSize { requested: usize, reason: String },

    /// Arraylet leaf size rejected
    #[error("Invalid arraylet leaf size {requested}: {reason}")]
    InvalidArrayletLeafSize { requested: usize, reason: String },

    /// Heap landed outside the permitted verification window
    ///
    /// **When returned:** Only when `verify_heap_above` / `verify_heap_below`
    /// are configured and the heap does not fit between them
    #[error("Heap [{base:#x}, {top:#x}) is outside the permitted address window")]
    HeapOutsideWindow { base: usize, top: usize },

    /// Sub-resource construction failed
    ///
    /// **When returned:** Memory manager, region manager, heap, lock pool,
    /// allocation interface or dispatcher construction failed
    ///
    /// **Recovery strategy:** Caller tears down and aborts startup
    #[error("Allocation of {resource} failed: {reason}")]
    AllocationFailed { resource: &'static str, reason: String },

    /// Value outside a fixed variant set
    ///
    /// **When returned:** Raw allocation-type, alignment-type or policy value
    /// does not name a known variant
    ///
    /// **Action required:** Build or embedding contract violation
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Configuration error
    ///
    /// **When returned:** Invalid user configuration detected
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime delegate hook failed
    #[error("Delegate hook {hook} failed: {reason}")]
    Delegate { hook: &'static str, reason: String },

    /// Per-thread restore failed
    #[error("Restore failed for thread {thread}: {reason}")]
    RestoreFailed { thread: u64, reason: String },

    /// Invalid state
    ///
    /// **When returned:** Operation requires a resource that is absent
    ///
    /// **Example scenario:** Negotiating space sizes before a heap exists
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Internal error - indicates a bug in FGC
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FgcError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors are configuration problems an embedder can report
    /// and fix by changing options.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FgcError::ImpossibleGeometry { .. }
                | FgcError::InvalidRegionSize { .. }
                | FgcError::InvalidArrayletLeafSize { .. }
                | FgcError::HeapOutsideWindow { .. }
                | FgcError::Configuration(_)
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            FgcError::InvalidState { .. } | FgcError::Internal(_) | FgcError::Misconfiguration(_)
        )
    }

    pub(crate) fn allocation(resource: &'static str, reason: impl ToString) -> Self {
        FgcError::AllocationFailed {
            resource,
            reason: reason.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for FgcError {
    fn from(err: crate::config::ConfigError) -> Self {
        FgcError::Configuration(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for FgcError {
    fn from(err: std::collections::TryReserveError) -> Self {
        FgcError::allocation("backing storage", err)
    }
}

/// Result type alias for FGC base operations
pub type Result<T> = std::result::Result<T, FgcError>;

/// Ensure condition is true, otherwise return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_errors_are_recoverable() {
        let err = FgcError::ImpossibleGeometry {
            heap_top: 1 << 40,
            shift: 4,
        };
        assert!(err.is_recoverable());
        assert!(!err.is_bug());
        assert!(err.to_string().contains("0x10000000000"));
    }

    #[test]
    fn test_misconfiguration_is_bug() {
        let err = FgcError::Misconfiguration("allocation type 7".to_string());
        assert!(err.is_bug());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: FgcError = crate::config::ConfigError::InvalidGcThreads("0".to_string()).into();
        assert!(matches!(err, FgcError::Configuration(_)));
    }
}
