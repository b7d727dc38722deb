//! # Symbol File Generation
//!
//! When a module has no `.map` file, the symbol table can ask a
//! [`SymbolGenerator`] to produce one. [`ObjectSymbolGenerator`] reads the
//! module's own symbol table with the `object` crate, which covers ELF,
//! Mach-O and PE images.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use chrono::Utc;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind};
use tracing::debug;

use super::file::{SymbolFile, SymbolRecord};
use crate::checksum::{DigestSource, Md5Digest};
use crate::error::{Result, WaypointError};
use crate::types::Address;

/// Produces a symbol file for a module on request.
pub trait SymbolGenerator
{
    /// Write a symbol file for `module` to `output`.
    ///
    /// ## Errors
    ///
    /// Any error means no usable file was written.
    fn generate(&self, module: &Path, output: &Path) -> Result<()>;
}

/// Generator backed by the module's static (or, failing that, dynamic)
/// symbol table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSymbolGenerator;

impl ObjectSymbolGenerator
{
    pub fn new() -> Self
    {
        Self
    }

    /// Build the in-memory symbol file for `module` without writing it.
    ///
    /// Only defined code and data symbols with a nonzero address are kept.
    /// Names containing whitespace cannot be represented in the format and
    /// are skipped.
    ///
    /// ## Errors
    ///
    /// `Io` if the module cannot be read, `Generator` if it is not an object
    /// format the `object` crate understands.
    pub fn build(&self, module: &Path) -> Result<SymbolFile>
    {
        let data = fs::read(module)?;
        let digest = Md5Digest.digest_of_bytes(&data);
        let image = object::File::parse(&*data)
            .map_err(|err| WaypointError::Generator(format!("failed to parse {}: {err}", module.display())))?;

        let mut records = collect_records(&image, image.symbols());
        if records.is_empty() {
            records = collect_records(&image, image.dynamic_symbols());
        }
        records.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));

        debug!(module = %module.display(), records = records.len(), "built symbol file");

        Ok(SymbolFile {
            generated: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            digest,
            module: module.to_path_buf(),
            records,
        })
    }
}

impl SymbolGenerator for ObjectSymbolGenerator
{
    fn generate(&self, module: &Path, output: &Path) -> Result<()>
    {
        let file = self.build(module)?;
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        file.write_to(BufWriter::new(File::create(output)?))?;
        debug!(output = %output.display(), "wrote symbol file");
        Ok(())
    }
}

fn collect_records<'data, 'file>(
    image: &'file object::File<'data>,
    symbols: impl Iterator<Item = object::Symbol<'data, 'file>>,
) -> Vec<SymbolRecord>
{
    symbols
        .filter(|symbol| symbol.is_definition() && symbol.address() != 0)
        .filter_map(|symbol| {
            let name = symbol.name().ok()?;
            if name.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            Some(SymbolRecord {
                start: Address::new(symbol.address()),
                size: symbol.size(),
                kind: kind_tag(image, &symbol)?,
                name: name.to_string(),
            })
        })
        .collect()
}

/// `nm`-style letter: lowercase for local symbols, uppercase for global.
fn kind_tag(image: &object::File<'_>, symbol: &object::Symbol<'_, '_>) -> Option<char>
{
    let section_kind = symbol
        .section_index()
        .and_then(|index| image.section_by_index(index).ok())
        .map(|section| section.kind());

    let tag = match symbol.kind() {
        SymbolKind::Text => 't',
        SymbolKind::Data | SymbolKind::Tls => match section_kind {
            Some(SectionKind::UninitializedData | SectionKind::UninitializedTls | SectionKind::Common) => 'b',
            Some(SectionKind::ReadOnlyData | SectionKind::ReadOnlyString) => 'r',
            _ => 'd',
        },
        _ => return None,
    };

    Some(if symbol.is_global() { tag.to_ascii_uppercase() } else { tag })
}
