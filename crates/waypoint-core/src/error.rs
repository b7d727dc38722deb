//! # Error Types
//!
//! Errors surfaced by the symbol and memory layers.
//!
//! Nothing in this crate aborts the process: a failure is either one of these
//! variants or a single `tracing` diagnostic. Conditions the caller is
//! expected to shrug off (missing symbol file, stale digest) are reported
//! through [`crate::symbols::LoadOutcome`] instead of an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Address;

/// Main error type for waypoint operations
#[derive(Error, Debug)]
pub enum WaypointError
{
    /// A symbol file exists but its header could not be parsed
    ///
    /// The whole file is rejected; no symbols from it reach the table.
    #[error("Malformed symbol file {}: {reason}", path.display())]
    MalformedSymbolFile
    {
        /// File that failed to parse
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Target memory could not be read
    ///
    /// Returned for unmapped or protected ranges. Callers that can live with
    /// fewer bytes should use [`crate::memory::adaptive_read`].
    #[error("Failed to read {length} bytes at {address}")]
    MemoryRead
    {
        address: Address,
        length: usize,
    },

    /// Target memory could not be written
    #[error("Failed to write {length} bytes at {address}")]
    MemoryWrite
    {
        address: Address,
        length: usize,
    },

    /// The user declined to remove breakpoints overlapping a patch
    ///
    /// Zero bytes were written and every breakpoint is still installed.
    #[error("Patch at {address} cancelled: it overlaps {conflicts} enabled software breakpoint(s)")]
    PatchDeclined
    {
        address: Address,
        conflicts: usize,
    },

    /// No breakpoint is registered at the address
    #[error("No breakpoint at {0}")]
    BreakpointNotFound(Address),

    /// The symbol generator could not produce a map file
    #[error("Symbol generation failed: {0}")]
    Generator(String),

    /// Invalid argument passed to a waypoint function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (symbol files, module images, `/proc`)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, WaypointError>`
///
/// ```rust
/// use waypoint_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, WaypointError>;
