//! Error types for the DSRTOS hardware core
//!
//! Uses Rust's Result pattern instead of C-style status codes. The numeric
//! discriminants are stable so boot diagnostics can report them verbatim.

/// Error returned by every registration and configuration API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    /// Subsystem used before `init()` succeeded
    NotInitialized = 0x1001,
    /// `init()` called twice
    AlreadyInitialized = 0x1002,
    /// Handler or callback missing
    NullHandler = 0x1003,
    /// Identifier, priority or period out of range, or no free slot
    InvalidParam = 0x1004,
    /// Slot already has a registration
    AlreadyRegistered = 0x1005,
    /// Nothing registered for the identifier or slot
    NotRegistered = 0x1006,
    /// Operation is not valid for a system interrupt
    NotSupported = 0x1007,
    /// Deadline elapsed (reported by callers layered above)
    Timeout = 0x1008,
}

/// Result type alias for DSRTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric code reported to boot diagnostics
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Errors that leave the system unusable if returned from an `init()`
    #[inline]
    pub fn is_fatal_at_boot(self) -> bool {
        !matches!(self, OsError::AlreadyInitialized)
    }
}
