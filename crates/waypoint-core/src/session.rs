//! # Session
//!
//! Ties one target's memory, breakpoints and symbol table together behind
//! the operations a front end calls.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::breakpoints::{BreakpointDirectory, BreakpointStore, Confirmation, NoRefresh, PatchGuard, PatchReport, RefreshNotifier};
use crate::error::Result;
use crate::memory::{self, MemoryImage, ScannedString, TargetMemory};
use crate::symbols::{LoadOutcome, ObjectSymbolGenerator, SymbolTable};
use crate::types::Address;

/// Environment variable consulted for the symbol directory when none is
/// given explicitly.
pub const SYMBOL_PATH_ENV: &str = "WAYPOINT_SYMBOL_PATH";

/// Settings a session is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig
{
    /// Directory holding `<module>.map` files.
    pub symbol_path: Option<PathBuf>,
    /// Produce missing symbol files with [`ObjectSymbolGenerator`].
    pub generate_missing: bool,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            symbol_path: None,
            generate_missing: true,
        }
    }
}

impl SessionConfig
{
    /// Defaults, with the symbol directory taken from `WAYPOINT_SYMBOL_PATH`
    /// when set and non-empty.
    pub fn from_env() -> Self
    {
        let symbol_path = std::env::var_os(SYMBOL_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            symbol_path,
            ..Self::default()
        }
    }
}

/// One debugging target: its memory, its breakpoints and the symbols of its
/// modules.
pub struct Session
{
    symbols: SymbolTable,
    memory: Box<dyn TargetMemory>,
    breakpoints: Box<dyn BreakpointDirectory>,
    confirmation: Box<dyn Confirmation>,
    notifier: Box<dyn RefreshNotifier>,
}

impl fmt::Debug for Session
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Session")
            .field("symbols", &self.symbols)
            .finish_non_exhaustive()
    }
}

impl Session
{
    /// Session over `memory` configured from `config`.
    ///
    /// Breakpoints start empty, every overwrite prompt is answered "no" and
    /// memory changes are not broadcast until the `with_*` methods say
    /// otherwise.
    pub fn new(memory: Box<dyn TargetMemory>, config: &SessionConfig) -> Self
    {
        let mut symbols = SymbolTable::new();
        if let Some(path) = &config.symbol_path {
            symbols.set_search_path(path.clone());
        }
        if config.generate_missing {
            symbols.set_generator(Box::new(ObjectSymbolGenerator::new()));
        }

        Self {
            symbols,
            memory,
            breakpoints: Box::new(BreakpointStore::new()),
            confirmation: Box::new(|_: &str| false),
            notifier: Box::new(NoRefresh),
        }
    }

    /// Session over a file mapped at `base`, for offline inspection.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read.
    pub fn from_image(path: &Path, base: Address, config: &SessionConfig) -> Result<Self>
    {
        let image = MemoryImage::from_file(path, base)?;
        Ok(Self::new(Box::new(image), config))
    }

    #[must_use]
    pub fn with_breakpoints(mut self, breakpoints: Box<dyn BreakpointDirectory>) -> Self
    {
        self.breakpoints = breakpoints;
        self
    }

    #[must_use]
    pub fn with_confirmation(mut self, confirmation: Box<dyn Confirmation>) -> Self
    {
        self.confirmation = confirmation;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn RefreshNotifier>) -> Self
    {
        self.notifier = notifier;
        self
    }

    pub fn symbols(&self) -> &SymbolTable
    {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable
    {
        &mut self.symbols
    }

    pub fn memory(&self) -> &dyn TargetMemory
    {
        self.memory.as_ref()
    }

    pub fn breakpoints_mut(&mut self) -> &mut dyn BreakpointDirectory
    {
        self.breakpoints.as_mut()
    }

    /// Load symbols for `module` mapped at `load_base`.
    ///
    /// When generation was only just requested the load is retried once, so
    /// a synchronous generator yields symbols on the first call.
    ///
    /// ## Errors
    ///
    /// See [`SymbolTable::load`].
    pub fn load_module(&mut self, module: &Path, load_base: Address) -> Result<LoadOutcome>
    {
        let outcome = self.symbols.load(module, load_base)?;
        if outcome == LoadOutcome::Deferred {
            debug!(module = %module.display(), "retrying load after generation");
            return self.symbols.load(module, load_base);
        }
        Ok(outcome)
    }

    /// Write `size` bytes at `address` without clobbering breakpoints
    /// silently; see [`PatchGuard::patch`].
    ///
    /// ## Errors
    ///
    /// `PatchDeclined` or `MemoryWrite`.
    pub fn patch(&mut self, address: Address, bytes: &[u8], size: usize, fill: u8) -> Result<PatchReport>
    {
        let mut guard = PatchGuard::new(
            self.memory.as_mut(),
            self.breakpoints.as_mut(),
            self.confirmation.as_mut(),
            self.notifier.as_ref(),
        );
        guard.patch(address, bytes, size, fill)
    }

    pub fn adaptive_read(&self, address: Address, max_size: usize) -> (Vec<u8>, usize)
    {
        memory::adaptive_read(self.memory.as_ref(), address, max_size)
    }

    pub fn scan_ascii(&self, address: Address, min_length: usize, max_length: usize) -> Option<ScannedString>
    {
        memory::scan_ascii(self.memory.as_ref(), address, min_length, max_length)
    }

    pub fn scan_utf16(&self, address: Address, min_length: usize, max_length: usize) -> Option<ScannedString>
    {
        memory::scan_utf16(self.memory.as_ref(), address, min_length, max_length)
    }

    /// Label or `module::symbol+offset` for `address`.
    pub fn describe_address(&self, address: Address) -> Option<String>
    {
        if let Some(label) = self.symbols.labels().get(&address) {
            return Some(label.clone());
        }
        self.symbols.describe_address(address)
    }
}
