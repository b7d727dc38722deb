//! # Symbols
//!
//! Address ↔ name resolution backed by per-module `.map` files.
//!
//! Symbol files live in one configured directory, one per module, named after
//! the module's basename (`libc.so.6` → `libc.so.6.map`). They are produced
//! ahead of time (or on demand by a [`SymbolGenerator`]) against link-time
//! addresses and relocated to the module's load base when read.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use waypoint_core::symbols::{LoadOutcome, SymbolTable};
//! use waypoint_core::types::Address;
//!
//! let mut table = SymbolTable::new();
//! table.set_search_path("/var/cache/waypoint/symbols");
//!
//! if let LoadOutcome::Loaded { symbols } = table.load(Path::new("/usr/lib/libc.so.6"), Address::new(0x7f00_0000_0000))? {
//!     println!("{symbols} symbols");
//! }
//! if let Some(name) = table.describe_address(Address::new(0x7f00_0002_9d90)) {
//!     println!("{name}");
//! }
//! # Ok::<(), waypoint_core::error::WaypointError>(())
//! ```

mod demangle;
pub mod file;
pub mod generator;
mod index;
mod table;

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

pub use file::{relocate, SymbolFile, SymbolRecord};
pub use generator::{ObjectSymbolGenerator, SymbolGenerator};
pub use index::SymbolIndex;
pub use table::{LoadOutcome, SymbolTable};

use crate::types::Address;

/// A named, sized range of the target's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol
{
    /// Relocated start address.
    pub address: Address,
    /// Extent of the symbol; it covers `[address, address + size)`.
    pub size: u64,
    /// One-letter kind tag in `nm` style (`T` text, `D` data, ...).
    pub kind: char,
    /// Module-qualified name, `"<module>::<raw name>"`.
    pub name: String,
    /// Name as it appears in the symbol file, without the module prefix.
    pub raw_name: String,
    /// Symbol file the record was read from; `None` for user insertions.
    pub file: Option<PathBuf>,
}

impl Symbol
{
    /// Build a symbol qualified with `module`.
    pub fn new(module: &str, raw_name: impl Into<String>, address: Address, size: u64, kind: char) -> Self
    {
        let raw_name = raw_name.into();
        Self {
            address,
            size,
            kind,
            name: format!("{module}::{raw_name}"),
            raw_name,
            file: None,
        }
    }

    /// Whether `address` falls in `[self.address, self.address + size)`.
    ///
    /// A zero-sized symbol contains nothing, not even its own start.
    pub fn contains(&self, address: Address) -> bool
    {
        match address.offset_from(self.address) {
            Some(offset) => offset < self.size,
            None => false,
        }
    }

    /// Raw name run through the Rust demangler, or unchanged if it is not a
    /// Rust symbol.
    pub fn demangled_name(&self) -> Cow<'_, str>
    {
        demangle::demangle(&self.raw_name).map_or(Cow::Borrowed(self.raw_name.as_str()), Cow::Owned)
    }
}

impl fmt::Display for Symbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} {:>8x} {} {}", self.address, self.size, self.kind, self.name)
    }
}
