//! Util Module - Shared Utilities
//!
//! Utilities and helper functions used throughout FGC base.

pub mod alignment;

pub use alignment::Alignment;

/// Constants for FGC base
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: usize = 1024 * 1024 * 1024;

    /// Default heap alignment: 512 bytes
    pub const DEFAULT_HEAP_ALIGNMENT: usize = 512;

    /// Minimum object alignment: 8 bytes
    pub const OBJECT_ALIGNMENT: usize = 8;

    /// Largest region size the region table supports: 512MB
    pub const MAXIMUM_REGION_SIZE: usize = 512 * MB;
}
