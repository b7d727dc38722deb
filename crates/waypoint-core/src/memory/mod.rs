//! # Target Memory
//!
//! The memory access interface the rest of the crate reads and patches
//! through, plus the helpers built on it.
//!
//! Backends only need to fail cleanly on unmapped ranges; everything
//! boundary-tolerant ([`adaptive_read`], the string scanners) is layered on
//! top of that one guarantee.

mod image;
#[cfg(target_os = "linux")]
mod procfs;
pub mod strings;

pub use image::MemoryImage;
#[cfg(target_os = "linux")]
pub use procfs::ProcMemory;
pub use strings::{scan_ascii, scan_utf16, ScannedString};
use tracing::trace;

use crate::error::Result;
use crate::types::Address;

/// Read/write access to the target's address space.
pub trait TargetMemory
{
    /// Read exactly `length` bytes at `address`.
    ///
    /// ## Errors
    ///
    /// `MemoryRead` if any byte of the range is unreadable. Partial reads are
    /// never returned.
    fn read(&self, address: Address, length: usize) -> Result<Vec<u8>>;

    /// Write all of `bytes` at `address`.
    ///
    /// ## Errors
    ///
    /// `MemoryWrite` if the range is not writable.
    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()>;
}

/// Read up to `max_size` bytes at `address`, settling for fewer when the
/// full span crosses into unmapped memory.
///
/// Tries `max_size` bytes, then one fewer, and so on; at most `max_size`
/// reads are issued. Returns the bytes obtained and their count, which is 0
/// when not even one byte is readable.
pub fn adaptive_read<M>(memory: &M, address: Address, max_size: usize) -> (Vec<u8>, usize)
where
    M: TargetMemory + ?Sized,
{
    let mut size = max_size;
    while size > 0 {
        if let Ok(bytes) = memory.read(address, size) {
            if size < max_size {
                trace!(%address, requested = max_size, obtained = size, "short read near mapping boundary");
            }
            return (bytes, size);
        }
        size -= 1;
    }
    trace!(%address, requested = max_size, "nothing readable");
    (Vec::new(), 0)
}
