//! # Checksums
//!
//! Content digests used to tell whether a symbol file still describes the
//! module on disk. Symbol files record the MD5 of the module they were
//! generated from; the loader recomputes it and compares.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Result, WaypointError};

/// Fixed-width (16 byte) content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 16]);

impl Digest
{
    pub const fn from_bytes(bytes: [u8; 16]) -> Self
    {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16]
    {
        &self.0
    }

    /// Decodes the 32 hex digit form written into symbol files.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the text is not exactly 16 bytes of hex.
    pub fn from_hex(text: &str) -> Result<Self>
    {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|err| WaypointError::InvalidArgument(format!("bad digest {text:?}: {err}")))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String
    {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.to_hex())
    }
}

/// Something that can fingerprint module contents.
///
/// The symbol table takes this as an injected capability so tests can stub
/// it; [`Md5Digest`] is what real sessions use.
pub trait DigestSource
{
    fn digest_of_bytes(&self, bytes: &[u8]) -> Digest;

    /// Digest of a file's full contents.
    ///
    /// ## Errors
    ///
    /// Propagates the I/O error if the file cannot be read.
    fn digest_of_file(&self, path: &Path) -> Result<Digest>
    {
        let bytes = fs::read(path)?;
        Ok(self.digest_of_bytes(&bytes))
    }
}

/// MD5, the digest symbol files are written with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Digest;

impl DigestSource for Md5Digest
{
    fn digest_of_bytes(&self, bytes: &[u8]) -> Digest
    {
        Digest(md5::compute(bytes).0)
    }
}

/// MD5 of a buffer.
pub fn digest_of_bytes(bytes: &[u8]) -> Digest
{
    Md5Digest.digest_of_bytes(bytes)
}

/// MD5 of a file's contents.
///
/// ## Errors
///
/// Propagates the I/O error if the file cannot be read.
pub fn digest_of_file(path: &Path) -> Result<Digest>
{
    Md5Digest.digest_of_file(path)
}
