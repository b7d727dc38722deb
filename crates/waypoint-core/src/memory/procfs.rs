//! Live process memory through `/proc/<pid>/mem`.
//!
//! The kernel only allows this for processes the caller may ptrace, which in
//! practice means the process-control backend has already attached.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;

use tracing::debug;

use super::TargetMemory;
use crate::error::{Result, WaypointError};
use crate::types::Address;

/// Memory of a running Linux process.
#[derive(Debug)]
pub struct ProcMemory
{
    pid: u32,
    file: File,
    writable: bool,
}

impl ProcMemory
{
    /// Open `/proc/<pid>/mem`, read-write if permitted, else read-only.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be opened at all.
    pub fn open(pid: u32) -> Result<Self>
    {
        let path = format!("/proc/{pid}/mem");
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => Ok(Self { pid, file, writable: true }),
            Err(err) => {
                debug!(pid, error = %err, "opening process memory read-only");
                let file = File::open(&path)?;
                Ok(Self {
                    pid,
                    file,
                    writable: false,
                })
            }
        }
    }

    pub fn pid(&self) -> u32
    {
        self.pid
    }
}

impl TargetMemory for ProcMemory
{
    fn read(&self, address: Address, length: usize) -> Result<Vec<u8>>
    {
        let mut buffer = vec![0u8; length];
        self.file
            .read_exact_at(&mut buffer, address.value())
            .map_err(|_| WaypointError::MemoryRead { address, length })?;
        Ok(buffer)
    }

    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()>
    {
        let failure = WaypointError::MemoryWrite {
            address,
            length: bytes.len(),
        };
        if !self.writable {
            return Err(failure);
        }
        self.file.write_all_at(bytes, address.value()).map_err(|_| failure)
    }
}
