//! # Symbol Table
//!
//! Session-wide symbol store: the search directory, the per-module load
//! record, the optional generator and the indexed symbols themselves.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::file::SymbolFile;
use super::generator::SymbolGenerator;
use super::index::SymbolIndex;
use super::Symbol;
use crate::checksum::{DigestSource, Md5Digest};
use crate::error::{Result, WaypointError};
use crate::types::Address;

/// What a call to [`SymbolTable::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome
{
    /// The symbol file was parsed and its records inserted.
    Loaded
    {
        symbols: usize
    },
    /// The file was missing and the generator was asked to write it. The
    /// module is not marked as loaded; the next `load` picks the file up.
    Deferred,
    /// The file is missing and cannot be produced. The module is skipped
    /// until the search path changes.
    GivenUp,
    /// A previous call already loaded (or gave up on) this module.
    AlreadyLoaded,
    /// No search path is configured.
    NoSearchPath,
}

/// Indexed symbols plus the bookkeeping needed to load them lazily.
///
/// Not thread-safe; the debugger drives it from its single control thread.
pub struct SymbolTable
{
    index: SymbolIndex,
    search_path: Option<PathBuf>,
    /// Module basenames already loaded or given up on. Two modules with the
    /// same basename in different directories collide here.
    attempted: HashSet<String>,
    generator: Option<Box<dyn SymbolGenerator>>,
    digests: Box<dyn DigestSource>,
    missing_path_reported: bool,
    labels: HashMap<Address, String>,
    labels_by_name: HashMap<String, Address>,
}

impl fmt::Debug for SymbolTable
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("SymbolTable")
            .field("symbols", &self.index.len())
            .field("search_path", &self.search_path)
            .field("attempted", &self.attempted)
            .field("generator", &self.generator.is_some())
            .field("labels", &self.labels.len())
            .finish_non_exhaustive()
    }
}

impl Default for SymbolTable
{
    fn default() -> Self
    {
        Self::with_digest_source(Box::new(Md5Digest))
    }
}

impl SymbolTable
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Table that checks module digests with `digests` instead of MD5.
    pub fn with_digest_source(digests: Box<dyn DigestSource>) -> Self
    {
        Self {
            index: SymbolIndex::new(),
            search_path: None,
            attempted: HashSet::new(),
            generator: None,
            digests,
            missing_path_reported: false,
            labels: HashMap::new(),
            labels_by_name: HashMap::new(),
        }
    }

    /// Point the table at a new symbol directory.
    ///
    /// Drops every loaded symbol and the load record, so files from two
    /// directories are never mixed.
    pub fn set_search_path(&mut self, directory: impl Into<PathBuf>)
    {
        let directory = directory.into();
        info!(path = %directory.display(), "symbol search path changed");
        self.search_path = Some(directory);
        self.clear();
    }

    pub fn search_path(&self) -> Option<&Path>
    {
        self.search_path.as_deref()
    }

    pub fn set_generator(&mut self, generator: Box<dyn SymbolGenerator>)
    {
        self.generator = Some(generator);
    }

    pub fn clear_generator(&mut self)
    {
        self.generator = None;
    }

    /// Path of the symbol file for `module` under the current search path.
    pub fn symbol_file_path(&self, module: &Path) -> Option<PathBuf>
    {
        let directory = self.search_path.as_ref()?;
        let name = module.file_name()?;
        let mut file_name = name.to_os_string();
        file_name.push(".map");
        Some(directory.join(file_name))
    }

    /// Load symbols for the module at `module`, mapped at `load_base`.
    ///
    /// At most one successful parse per module basename per search path.
    /// A missing file is handed to the generator when one is set and the
    /// call returns [`LoadOutcome::Deferred`] so a later call can retry.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument` if `module` has no file name
    /// - `MalformedSymbolFile` if the header is unusable; nothing from the
    ///   file is inserted and the module stays eligible for another attempt
    /// - `Io` for read failures other than a missing file
    pub fn load(&mut self, module: &Path, load_base: Address) -> Result<LoadOutcome>
    {
        if self.search_path.is_none() {
            if !self.missing_path_reported {
                warn!("no symbol path configured; symbols are disabled until one is set");
                self.missing_path_reported = true;
            }
            return Ok(LoadOutcome::NoSearchPath);
        }

        let name = module
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| WaypointError::InvalidArgument(format!("{} has no file name", module.display())))?;

        if self.attempted.contains(&name) {
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let Some(map_path) = self.symbol_file_path(module) else {
            return Ok(LoadOutcome::NoSearchPath);
        };

        match SymbolFile::read(&map_path) {
            Ok(file) => {
                debug!(file = %map_path.display(), base = %load_base, "loading symbols");
                self.check_digest(&file, module);

                let symbols = file.symbols(&map_path, load_base);
                let count = symbols.len();
                for symbol in symbols {
                    self.index.insert(symbol);
                }
                self.attempted.insert(name);
                Ok(LoadOutcome::Loaded { symbols: count })
            }
            Err(WaypointError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                Ok(self.handle_missing(module, &map_path, name))
            }
            Err(err) => Err(err),
        }
    }

    fn handle_missing(&mut self, module: &Path, map_path: &Path, name: String) -> LoadOutcome
    {
        let Some(generator) = &self.generator else {
            warn!(
                module = %module.display(),
                expected = %map_path.display(),
                "no symbol file for module; skipping it for this session"
            );
            self.attempted.insert(name);
            return LoadOutcome::GivenUp;
        };

        info!(module = %module.display(), output = %map_path.display(), "generating symbol file");
        match generator.generate(module, map_path) {
            Ok(()) => LoadOutcome::Deferred,
            Err(err) => {
                warn!(module = %module.display(), error = %err, "symbol generation failed; skipping module for this session");
                self.attempted.insert(name);
                LoadOutcome::GivenUp
            }
        }
    }

    fn check_digest(&self, file: &SymbolFile, module: &Path)
    {
        match self.digests.digest_of_file(module) {
            Ok(actual) if actual == file.digest => {}
            Ok(actual) => warn!(
                module = %module.display(),
                recorded = %file.digest,
                actual = %actual,
                "symbol file does not match the module on disk; consider regenerating it"
            ),
            Err(err) => warn!(
                module = %module.display(),
                error = %err,
                "cannot read module to verify its symbol file"
            ),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Symbol>
    {
        self.index.find_by_name(name)
    }

    pub fn find_by_address(&self, address: Address) -> Option<&Symbol>
    {
        self.index.find_by_address(address)
    }

    /// The symbol whose `[address, address + size)` range contains `address`.
    pub fn find_nearest(&self, address: Address) -> Option<&Symbol>
    {
        self.index.find_nearest(address)
    }

    /// Every symbol in load order.
    pub fn all(&self) -> &[Symbol]
    {
        self.index.all()
    }

    pub fn len(&self) -> usize
    {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.index.is_empty()
    }

    /// Insert a symbol directly, shadowing any symbol with the same address
    /// or name.
    pub fn add(&mut self, symbol: Symbol)
    {
        self.index.insert(symbol);
    }

    /// Drop all symbols and forget which modules were loaded. Labels are
    /// user data and are kept.
    pub fn clear(&mut self)
    {
        self.index.clear();
        self.attempted.clear();
    }

    /// Containing symbol and the offset of `address` into it.
    pub fn function_symbol(&self, address: Address) -> Option<(&Symbol, u64)>
    {
        let symbol = self.find_nearest(address)?;
        let offset = address.offset_from(symbol.address)?;
        Some((symbol, offset))
    }

    /// `"<module>::<name>+<hex offset>"` for the symbol containing `address`.
    pub fn describe_address(&self, address: Address) -> Option<String>
    {
        self.function_symbol(address)
            .map(|(symbol, offset)| format!("{}+{offset:x}", symbol.name))
    }

    /// Attach a user label to `address`; an empty label removes it.
    pub fn set_label(&mut self, address: Address, label: &str)
    {
        if let Some(previous) = self.labels.remove(&address) {
            self.labels_by_name.remove(&previous);
        }
        if label.is_empty() {
            return;
        }
        if let Some(previous_address) = self.labels_by_name.insert(label.to_string(), address) {
            self.labels.remove(&previous_address);
        }
        self.labels.insert(address, label.to_string());
    }

    pub fn labels(&self) -> &HashMap<Address, String>
    {
        &self.labels
    }

    pub fn find_label(&self, label: &str) -> Option<Address>
    {
        self.labels_by_name.get(label).copied()
    }

    /// Best name for exactly `address`: its label, else the symbol starting
    /// there.
    pub fn find_address_name(&self, address: Address) -> Option<&str>
    {
        self.labels
            .get(&address)
            .map(String::as_str)
            .or_else(|| self.find_by_address(address).map(|symbol| symbol.name.as_str()))
    }
}
