//! Rust symbol demangling for display.
//!
//! Symbol files keep names exactly as the linker emitted them; lookups use
//! those raw names, and only presentation goes through here.

use rustc_demangle::try_demangle;

/// Demangled form of `raw` without the trailing hash, or `None` when `raw`
/// is not a Rust mangled name (C symbols, already-demangled C++ names).
pub(crate) fn demangle(raw: &str) -> Option<String>
{
    try_demangle(raw).ok().map(|demangled| format!("{demangled:#}"))
}
