//! # String Scanning
//!
//! Detects a run of printable text at an address, the way data views decide
//! whether a pointer "looks like" a string.
//!
//! A run is made of ASCII graphic characters, space and the ASCII whitespace
//! controls. Scanning stops at the first other unit, after `max_length`
//! units, or at the first unreadable unit; the run only counts if it is at
//! least `min_length` units long.

use super::TargetMemory;
use crate::types::Address;

/// A detected string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedString
{
    /// The run with control characters and `"` backslash-escaped.
    pub text: String,
    /// Number of units in memory, before escaping.
    pub raw_length: usize,
}

/// Scan for a string of single bytes at `address`.
pub fn scan_ascii<M>(memory: &M, address: Address, min_length: usize, max_length: usize) -> Option<ScannedString>
where
    M: TargetMemory + ?Sized,
{
    scan(memory, address, min_length, max_length, 1, |unit| is_text(unit[0]).then_some(unit[0]))
}

/// Scan for a string of little-endian UTF-16 code units at `address`.
///
/// Only code units in the ASCII range are accepted; anything else ends the
/// run, so this finds ASCII text stored as UTF-16 rather than arbitrary
/// Unicode.
pub fn scan_utf16<M>(memory: &M, address: Address, min_length: usize, max_length: usize) -> Option<ScannedString>
where
    M: TargetMemory + ?Sized,
{
    scan(memory, address, min_length, max_length, 2, |unit| {
        let value = u16::from_le_bytes([unit[0], unit[1]]);
        u8::try_from(value).ok().filter(|&byte| is_text(byte))
    })
}

fn scan<M, F>(
    memory: &M,
    address: Address,
    min_length: usize,
    max_length: usize,
    unit_size: usize,
    decode: F,
) -> Option<ScannedString>
where
    M: TargetMemory + ?Sized,
    F: Fn(&[u8]) -> Option<u8>,
{
    if min_length > max_length {
        return None;
    }

    let mut run = Vec::new();
    let mut cursor = address;
    while run.len() < max_length {
        let Ok(unit) = memory.read(cursor, unit_size) else {
            break;
        };
        if unit.len() != unit_size {
            break;
        }
        let Some(byte) = decode(&unit) else {
            break;
        };
        run.push(byte);
        cursor = cursor + unit_size as u64;
    }

    if run.len() < min_length {
        return None;
    }

    Some(ScannedString {
        text: escape(&run),
        raw_length: run.len(),
    })
}

fn is_text(byte: u8) -> bool
{
    byte.is_ascii_graphic() || matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn escape(run: &[u8]) -> String
{
    let mut text = String::with_capacity(run.len());
    for &byte in run {
        match byte {
            b'\r' => text.push_str("\\r"),
            b'\n' => text.push_str("\\n"),
            b'\t' => text.push_str("\\t"),
            0x0b => text.push_str("\\v"),
            b'"' => text.push_str("\\\""),
            other => text.push(char::from(other)),
        }
    }
    text
}
