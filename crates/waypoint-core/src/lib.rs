//! # waypoint-core
//!
//! Debugger-side services for inspecting and patching a target process:
//!
//! - symbol files: reading, generating, relocating and resolving them
//! - memory access with boundary-tolerant reads and string detection
//! - breakpoint-aware byte patching
//!
//! Everything talks to the target through [`memory::TargetMemory`] and
//! [`breakpoints::BreakpointDirectory`], so the same logic runs against a
//! live process or a file image.

pub mod breakpoints;
pub mod checksum;
pub mod error;
pub mod memory;
pub mod session;
pub mod symbols;
pub mod types;

pub use error::{Result, WaypointError};
pub use session::{Session, SessionConfig};
pub use symbols::{LoadOutcome, Symbol, SymbolTable};
pub use types::Address;
