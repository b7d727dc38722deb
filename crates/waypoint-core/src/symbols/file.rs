//! # Symbol File Format
//!
//! One text file per module:
//!
//! ```text
//! 2026-10-18 09:12:44 UTC
//! 9e107d9d372bb6826bd81d3542a419d6 /usr/lib/libdemo.so
//! 1130 2a T demo_init
//! 1160 104 T demo_run
//! 4010 8 D demo_state
//! ```
//!
//! Line one is the generation date and is never interpreted. Line two holds
//! the module's MD5 and its original path. Every following record is four
//! whitespace-separated fields: start (hex), extent (hex), kind tag, name.
//!
//! The second field is historically called the "end" column, but loaders
//! have always treated it as the symbol's size and existing files are
//! written that way, so it is read and written as a size.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::Symbol;
use crate::checksum::Digest;
use crate::error::{Result, WaypointError};
use crate::types::Address;

/// Moves a link-time address to where the module was actually loaded.
///
/// Addresses below `load_base` are treated as offsets and shifted up by it;
/// addresses at or above it are assumed to be absolute already.
pub fn relocate(raw: Address, load_base: Address) -> Address
{
    if raw < load_base {
        raw + load_base.value()
    } else {
        raw
    }
}

/// One record line of a symbol file, before relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord
{
    pub start: Address,
    pub size: u64,
    pub kind: char,
    pub name: String,
}

/// A parsed symbol file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFile
{
    /// Free-form generation date from line one.
    pub generated: String,
    /// MD5 of the module the file was generated from.
    pub digest: Digest,
    /// Module path as recorded by the generator.
    pub module: PathBuf,
    pub records: Vec<SymbolRecord>,
}

impl SymbolFile
{
    /// Read and parse a symbol file.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read, `MalformedSymbolFile` if its header
    /// is unusable.
    pub fn read(path: &Path) -> Result<Self>
    {
        let bytes = fs::read(path)?;
        Self::parse_bytes(&bytes, path)
    }

    /// Parse raw file contents.
    ///
    /// Only the text before the first invalid UTF-8 sequence is used, cut
    /// back to the last whitespace so the damaged token is dropped. An
    /// invalid byte in the header therefore rejects the file; one in the
    /// records ends the record list there.
    ///
    /// ## Errors
    ///
    /// `MalformedSymbolFile` as for [`SymbolFile::parse`].
    pub fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Self>
    {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::parse(text, path),
            Err(err) => {
                let valid = &bytes[..err.valid_up_to()];
                let end = valid.iter().rposition(u8::is_ascii_whitespace).map_or(0, |index| index + 1);
                warn!(
                    file = %path.display(),
                    offset = err.valid_up_to(),
                    "symbol file is not valid UTF-8; ignoring everything from the bad byte on"
                );
                Self::parse(std::str::from_utf8(&valid[..end]).unwrap_or_default(), path)
            }
        }
    }

    /// Parse symbol file text. `path` is only used in error messages.
    ///
    /// A bad header rejects the whole file. A bad record ends the record
    /// list; everything before it is kept.
    ///
    /// ## Errors
    ///
    /// `MalformedSymbolFile` when the date line is missing or line two does
    /// not start with a 32 digit hex digest followed by a module path.
    pub fn parse(text: &str, path: &Path) -> Result<Self>
    {
        let malformed = |reason: &str| WaypointError::MalformedSymbolFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut lines = text.lines();
        let generated = lines.next().ok_or_else(|| malformed("missing generation date"))?;
        let header = lines.next().ok_or_else(|| malformed("missing module header"))?;

        let mut header_tokens = header.split_whitespace();
        let digest = header_tokens
            .next()
            .ok_or_else(|| malformed("missing module digest"))
            .and_then(|token| Digest::from_hex(token).map_err(|err| malformed(&err.to_string())))?;
        let module = header_tokens.next().ok_or_else(|| malformed("missing module path"))?;

        let mut records = Vec::new();
        let mut fields = lines.flat_map(str::split_whitespace);
        loop {
            let Some(start) = fields.next() else {
                break;
            };
            match parse_record(start, &mut fields) {
                Some(record) => records.push(record),
                None => {
                    warn!(
                        file = %path.display(),
                        parsed = records.len(),
                        "symbol file has a malformed record near {start:?}; ignoring the rest"
                    );
                    break;
                }
            }
        }

        Ok(Self {
            generated: generated.trim().to_string(),
            digest,
            module: PathBuf::from(module),
            records,
        })
    }

    /// Basename of the recorded module path; the prefix for qualified names.
    pub fn module_name(&self) -> String
    {
        self.module
            .file_name()
            .map_or_else(|| self.module.to_string_lossy().into_owned(), |name| name.to_string_lossy().into_owned())
    }

    /// Turn the records into symbols relocated against `load_base`.
    pub fn symbols(&self, source: &Path, load_base: Address) -> Vec<Symbol>
    {
        let module = self.module_name();
        self.records
            .iter()
            .map(|record| Symbol {
                file: Some(source.to_path_buf()),
                ..Symbol::new(
                    &module,
                    record.name.clone(),
                    relocate(record.start, load_base),
                    record.size,
                    record.kind,
                )
            })
            .collect()
    }

    /// Write the file in the layout [`SymbolFile::parse`] reads.
    ///
    /// ## Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()>
    {
        writeln!(out, "{}", self.generated)?;
        writeln!(out, "{} {}", self.digest, self.module.display())?;
        for record in &self.records {
            writeln!(out, "{:x} {:x} {} {}", record.start, record.size, record.kind, record.name)?;
        }
        out.flush()
    }
}

fn parse_record<'a>(start: &str, rest: &mut impl Iterator<Item = &'a str>) -> Option<SymbolRecord>
{
    let start = Address::from_hex(start).ok()?;
    let size = Address::from_hex(rest.next()?).ok()?.value();
    let mut kind_chars = rest.next()?.chars();
    let kind = kind_chars.next()?;
    if kind_chars.next().is_some() {
        return None;
    }
    let name = rest.next()?.to_string();
    Some(SymbolRecord { start, size, kind, name })
}

#[cfg(test)]
mod tests
{
    use super::*;

    const DIGEST: &str = "9e107d9d372bb6826bd81d3542a419d6";

    fn parse(text: &str) -> Result<SymbolFile>
    {
        SymbolFile::parse(text, Path::new("libdemo.so.map"))
    }

    #[test]
    fn test_parses_header_and_records()
    {
        let text = format!("Sat Oct 18 2026\n{DIGEST} /usr/lib/libdemo.so\n1130 2a T demo_init\n0x1160 0x104 t demo_run\n");
        let file = parse(&text).unwrap();

        assert_eq!(file.generated, "Sat Oct 18 2026");
        assert_eq!(file.digest.to_hex(), DIGEST);
        assert_eq!(file.module_name(), "libdemo.so");
        assert_eq!(
            file.records,
            vec![
                SymbolRecord {
                    start: Address::new(0x1130),
                    size: 0x2a,
                    kind: 'T',
                    name: "demo_init".to_string(),
                },
                SymbolRecord {
                    start: Address::new(0x1160),
                    size: 0x104,
                    kind: 't',
                    name: "demo_run".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_rejects_bad_headers()
    {
        assert!(matches!(parse(""), Err(WaypointError::MalformedSymbolFile { .. })));
        assert!(matches!(parse("date only\n"), Err(WaypointError::MalformedSymbolFile { .. })));
        assert!(matches!(
            parse("date\nnothex /usr/lib/libdemo.so\n1000 10 T f\n"),
            Err(WaypointError::MalformedSymbolFile { .. })
        ));
        assert!(matches!(
            parse(&format!("date\n{DIGEST}\n1000 10 T f\n")),
            Err(WaypointError::MalformedSymbolFile { .. })
        ));
    }

    #[test]
    fn test_bad_record_truncates_record_list()
    {
        let text = format!("date\n{DIGEST} libdemo.so extra tokens\n1000 10 T good\nzzzz 10 T bad\n2000 10 T unreachable\n");
        let file = parse(&text).unwrap();
        assert_eq!(file.records.len(), 1);
        assert_eq!(file.records[0].name, "good");

        let text = format!("date\n{DIGEST} libdemo.so\n1000 10 T good\n2000 10\n");
        assert_eq!(parse(&text).unwrap().records.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_ends_records()
    {
        let mut bytes = format!("date\n{DIGEST} /usr/lib/libdemo.so\n1000 10 T good\n1010 10 T bad_").into_bytes();
        bytes.extend_from_slice(b"\xe9name\n1020 10 T after\n");
        let file = SymbolFile::parse_bytes(&bytes, Path::new("libdemo.so.map")).unwrap();
        assert_eq!(file.records.len(), 1);
        assert_eq!(file.records[0].name, "good");

        let header = format!("date\n{DIGEST} /usr/lib/lib\u{e9}.so\n1000 10 T good\n");
        let mut bytes = header.into_bytes();
        let bad = bytes.iter().position(|&byte| byte == 0xc3).unwrap();
        bytes[bad] = 0xe9;
        assert!(matches!(
            SymbolFile::parse_bytes(&bytes, Path::new("libdemo.so.map")),
            Err(WaypointError::MalformedSymbolFile { .. })
        ));
    }

    #[test]
    fn test_digest_must_be_full_width()
    {
        assert!(matches!(
            parse("date\n9e107d9d /usr/lib/libdemo.so\n1000 10 T f\n"),
            Err(WaypointError::MalformedSymbolFile { .. })
        ));
        assert!(matches!(
            parse(&format!("date\n{DIGEST}00 /usr/lib/libdemo.so\n1000 10 T f\n")),
            Err(WaypointError::MalformedSymbolFile { .. })
        ));
    }

    #[test]
    fn test_relocation_rule()
    {
        let base = Address::new(0x5555_0000_0000);
        assert_eq!(relocate(Address::new(0x1130), base), Address::new(0x5555_0000_1130));
        assert_eq!(relocate(base, base), base);
        assert_eq!(relocate(Address::new(0x5555_0000_2000), base), Address::new(0x5555_0000_2000));
    }

    #[test]
    fn test_symbols_are_qualified_and_relocated()
    {
        let text = format!("date\n{DIGEST} /opt/app/bin/server\n400 20 T main\n");
        let file = parse(&text).unwrap();
        let symbols = file.symbols(Path::new("/syms/server.map"), Address::new(0x1000));

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "server::main");
        assert_eq!(symbols[0].raw_name, "main");
        assert_eq!(symbols[0].address, Address::new(0x1400));
        assert_eq!(symbols[0].size, 0x20);
        assert_eq!(symbols[0].file.as_deref(), Some(Path::new("/syms/server.map")));
    }

    #[test]
    fn test_written_file_parses_back()
    {
        let text = format!("generated\n{DIGEST} /usr/lib/libdemo.so\n1130 2a T demo_init\n4010 8 D demo_state\n");
        let file = parse(&text).unwrap();
        let mut out = Vec::new();
        file.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }
}
