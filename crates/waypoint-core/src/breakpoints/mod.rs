//! # Breakpoints
//!
//! This crate never owns the debugger's breakpoint list. The patch guard
//! only needs to ask "is there an enabled software breakpoint here?" and to
//! request removal, which is what [`BreakpointDirectory`] models.
//!
//! [`BreakpointStore`] is a plain in-memory directory for front ends that
//! track breakpoints themselves (and for tests). It does bookkeeping only;
//! planting and restoring trap bytes is the process-control backend's job.

pub mod guard;

use std::collections::HashMap;

pub use guard::{Confirmation, NoRefresh, OverwriteDecision, PatchGuard, PatchReport, RefreshNotifier};

use crate::error::{Result, WaypointError};
use crate::types::Address;

/// Unique identifier for a breakpoint in a [`BreakpointStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakpointId(u64);

impl BreakpointId
{
    #[must_use]
    pub const fn from_raw(value: u64) -> Self
    {
        Self(value)
    }

    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

/// How a breakpoint is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind
{
    /// Trap instruction written over the original bytes (INT3/BRK).
    Software,
    /// CPU debug register; target memory is untouched.
    Hardware,
}

/// What the guard sees of a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo
{
    pub id: BreakpointId,
    pub address: Address,
    pub kind: BreakpointKind,
    pub enabled: bool,
}

impl BreakpointInfo
{
    /// Whether this breakpoint has a trap byte in memory that a raw write
    /// would clobber.
    pub fn occupies_memory(&self) -> bool
    {
        self.enabled && self.kind == BreakpointKind::Software
    }
}

/// Lookup and removal of the debugger's breakpoints by address.
pub trait BreakpointDirectory
{
    /// The breakpoint at `address`, if any. Software breakpoints take
    /// precedence when both kinds share an address.
    fn find(&self, address: Address) -> Option<BreakpointInfo>;

    /// Remove the breakpoint at `address`.
    ///
    /// ## Errors
    ///
    /// `BreakpointNotFound` if nothing is registered there.
    fn remove(&mut self, address: Address) -> Result<()>;
}

/// In-memory breakpoint bookkeeping keyed by id and by `(address, kind)`.
#[derive(Debug, Default)]
pub struct BreakpointStore
{
    next_id: u64,
    by_id: HashMap<BreakpointId, BreakpointInfo>,
    by_kind: HashMap<(Address, BreakpointKind), BreakpointId>,
}

impl BreakpointStore
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn allocate_id(&mut self) -> BreakpointId
    {
        self.next_id = self.next_id.wrapping_add(1);
        BreakpointId::from_raw(self.next_id)
    }

    /// Register an enabled breakpoint. Re-inserting an existing
    /// `(address, kind)` returns the existing id and re-enables it.
    pub fn insert(&mut self, address: Address, kind: BreakpointKind) -> BreakpointId
    {
        if let Some(id) = self.id_for_kind(address, kind) {
            if let Some(info) = self.by_id.get_mut(&id) {
                info.enabled = true;
            }
            return id;
        }
        let id = self.allocate_id();
        self.by_kind.insert((address, kind), id);
        self.by_id.insert(
            id,
            BreakpointInfo {
                id,
                address,
                kind,
                enabled: true,
            },
        );
        id
    }

    /// Enable or disable a breakpoint without removing it.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `id` is unknown.
    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> Result<()>
    {
        let info = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| WaypointError::InvalidArgument(format!("no breakpoint with id {}", id.raw())))?;
        info.enabled = enabled;
        Ok(())
    }

    pub fn id_for_kind(&self, address: Address, kind: BreakpointKind) -> Option<BreakpointId>
    {
        self.by_kind.get(&(address, kind)).copied()
    }

    pub fn info(&self, id: BreakpointId) -> Option<&BreakpointInfo>
    {
        self.by_id.get(&id)
    }

    /// Remove a breakpoint by id, returning it if it was present.
    pub fn remove_id(&mut self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        let info = self.by_id.remove(&id)?;
        self.by_kind.remove(&(info.address, info.kind));
        Some(info)
    }

    /// All breakpoints, ordered by address.
    pub fn list(&self) -> Vec<BreakpointInfo>
    {
        let mut all: Vec<_> = self.by_id.values().cloned().collect();
        all.sort_by_key(|info| (info.address, info.id.raw()));
        all
    }

    pub fn len(&self) -> usize
    {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.by_id.is_empty()
    }
}

impl BreakpointDirectory for BreakpointStore
{
    fn find(&self, address: Address) -> Option<BreakpointInfo>
    {
        self.id_for_kind(address, BreakpointKind::Software)
            .or_else(|| self.id_for_kind(address, BreakpointKind::Hardware))
            .and_then(|id| self.by_id.get(&id))
            .cloned()
    }

    fn remove(&mut self, address: Address) -> Result<()>
    {
        let id = self
            .id_for_kind(address, BreakpointKind::Software)
            .or_else(|| self.id_for_kind(address, BreakpointKind::Hardware))
            .ok_or(WaypointError::BreakpointNotFound(address))?;
        self.remove_id(id);
        Ok(())
    }
}
