//! Streaming content fingerprints.
//!
//! Files are read in fixed-size blocks and folded into a 128-bit MD5 digest.
//! The digest identifies identical content; it is not used for anything
//! security-sensitive.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default read size.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// A 128-bit content digest, displayed as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid fingerprint: expected 32 hex characters")]
pub struct ParseFingerprintError;

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.is_ascii() {
            return Err(ParseFingerprintError);
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseFingerprintError)?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Why a file could not be fingerprinted.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("{} vanished before it could be read", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied reading {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Block-wise fingerprinting with a configurable read size.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    block_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl ContentHasher {
    /// A zero block size is bumped to one byte.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Fingerprints the file at `path` without holding more than one block in memory.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.fingerprint_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Fingerprints everything `reader` yields.
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> io::Result<Fingerprint> {
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; self.block_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            context.consume(&buffer[..read]);
        }

        Ok(Fingerprint(context.compute().0))
    }
}

/// Fingerprints `path` with the default block size.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, HashError> {
    ContentHasher::default().fingerprint(path)
}
