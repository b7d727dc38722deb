//! # Breakpoint-Safe Patching
//!
//! A software breakpoint replaces the target's original byte with a trap
//! opcode. Writing over that byte behind the debugger's back either erases
//! the trap or leaves the debugger restoring a stale "original" byte later.
//! Every raw write therefore goes through [`PatchGuard`]:
//!
//! 1. every address in the range is checked for an enabled software
//!    breakpoint;
//! 2. if any are found, the user is asked once for the whole write;
//! 3. "no" cancels the write outright, "yes" removes each conflicting
//!    breakpoint and then writes;
//! 4. after the write, views are told to refresh.

use std::fmt;

use tracing::{debug, info};

use super::BreakpointDirectory;
use crate::error::{Result, WaypointError};
use crate::memory::TargetMemory;
use crate::types::Address;

/// Question shown when a write overlaps breakpoints.
pub const OVERWRITE_PROMPT: &str = "The bytes you are modifying overlap one or more software breakpoints. \
     Continuing removes those breakpoints. Modify the bytes anyway?";

/// Asks the user a yes/no question and blocks until answered.
pub trait Confirmation
{
    fn ask_yes_no(&mut self, message: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: FnMut(&str) -> bool,
{
    fn ask_yes_no(&mut self, message: &str) -> bool
    {
        self(message)
    }
}

/// Told after target memory was modified so views can redraw.
pub trait RefreshNotifier
{
    fn notify_memory_changed(&self);
}

/// Notifier for callers without views to refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

impl RefreshNotifier for NoRefresh
{
    fn notify_memory_changed(&self) {}
}

/// Result of checking a range before writing to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverwriteDecision
{
    /// No enabled software breakpoint in range.
    Clear,
    /// The user agreed; these breakpoints were removed.
    Removed(Vec<Address>),
    /// The user refused; this many breakpoints are still in place.
    Declined(usize),
}

impl OverwriteDecision
{
    pub fn may_write(&self) -> bool
    {
        !matches!(self, OverwriteDecision::Declined(_))
    }
}

/// Summary of a completed patch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchReport
{
    /// Bytes written, fill included.
    pub written: usize,
    /// Breakpoints removed to make room for the write.
    pub removed_breakpoints: Vec<Address>,
}

/// Mediates raw writes to target memory against the breakpoint list.
pub struct PatchGuard<'a>
{
    memory: &'a mut dyn TargetMemory,
    breakpoints: &'a mut dyn BreakpointDirectory,
    confirmation: &'a mut dyn Confirmation,
    notifier: &'a dyn RefreshNotifier,
}

impl fmt::Debug for PatchGuard<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("PatchGuard").finish_non_exhaustive()
    }
}

impl<'a> PatchGuard<'a>
{
    pub fn new(
        memory: &'a mut dyn TargetMemory,
        breakpoints: &'a mut dyn BreakpointDirectory,
        confirmation: &'a mut dyn Confirmation,
        notifier: &'a dyn RefreshNotifier,
    ) -> Self
    {
        Self {
            memory,
            breakpoints,
            confirmation,
            notifier,
        }
    }

    /// Enabled software breakpoints inside `[address, address + size)`.
    pub fn conflicts(&self, address: Address, size: usize) -> Vec<Address>
    {
        (0..size as u64)
            .map_while(|offset| address.checked_add(offset))
            .filter(|&candidate| {
                self.breakpoints
                    .find(candidate)
                    .is_some_and(|breakpoint| breakpoint.occupies_memory())
            })
            .collect()
    }

    /// Make `[address, address + size)` safe to overwrite.
    ///
    /// Asks at most once. On agreement every conflicting breakpoint is
    /// removed in address order; on refusal nothing changes.
    ///
    /// ## Errors
    ///
    /// Propagates the first failure to remove a breakpoint. Breakpoints
    /// removed before the failure stay removed and the rest stay installed;
    /// nothing may be written in that case.
    pub fn overwrite_check(&mut self, address: Address, size: usize) -> Result<OverwriteDecision>
    {
        let conflicts = self.conflicts(address, size);
        if conflicts.is_empty() {
            return Ok(OverwriteDecision::Clear);
        }

        debug!(%address, size, conflicts = conflicts.len(), "write overlaps software breakpoints");
        if !self.confirmation.ask_yes_no(OVERWRITE_PROMPT) {
            info!(%address, "write cancelled; breakpoints kept");
            return Ok(OverwriteDecision::Declined(conflicts.len()));
        }

        for &breakpoint in &conflicts {
            self.breakpoints.remove(breakpoint)?;
        }
        Ok(OverwriteDecision::Removed(conflicts))
    }

    /// Write `size` bytes at `address`: `bytes` first, then `fill` for the
    /// remainder. Extra input beyond `size` is ignored.
    ///
    /// A zero `size` does nothing and succeeds.
    ///
    /// ## Errors
    ///
    /// - `PatchDeclined` if the user refused to remove overlapping
    ///   breakpoints; memory is untouched
    /// - `MemoryWrite` if the target rejected the write
    /// - any error from removing a breakpoint; memory is untouched (see
    ///   [`PatchGuard::overwrite_check`])
    pub fn patch(&mut self, address: Address, bytes: &[u8], size: usize, fill: u8) -> Result<PatchReport>
    {
        if size == 0 {
            return Ok(PatchReport::default());
        }

        let removed_breakpoints = match self.overwrite_check(address, size)? {
            OverwriteDecision::Clear => Vec::new(),
            OverwriteDecision::Removed(removed) => removed,
            OverwriteDecision::Declined(conflicts) => {
                return Err(WaypointError::PatchDeclined { address, conflicts });
            }
        };

        let mut payload: Vec<u8> = bytes.iter().copied().take(size).collect();
        payload.resize(size, fill);

        self.memory.write(address, &payload)?;
        self.notifier.notify_memory_changed();
        debug!(%address, size, removed = removed_breakpoints.len(), "patched target memory");

        Ok(PatchReport {
            written: size,
            removed_breakpoints,
        })
    }
}
