//! File-backed persistence for data-encryption keys.
//!
//! Key files hold raw key bytes only — no envelope, no metadata. This is
//! the raw read/write collaborator; the store layer above maps io failures
//! into its own error kinds. A write interrupted by a crash shows up here
//! as an unreadable or empty file, never as a silent success.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct KeyFiles {
    dir: PathBuf,
}

impl KeyFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Map a key name to its backing file path.
    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.key", sanitize(name)))
    }

    /// Create or truncate the key file for `name`.
    pub fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(name);
        let mut file = open_owner_only(&path)?;
        file.write_all(bytes)?;
        tracing::debug!(key = name, path = %path.display(), "persisted encryption key");
        Ok(())
    }

    /// Read the raw key bytes for `name`. An empty file is corrupt.
    pub fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.key_path(name);
        let bytes = fs::read(&path)?;
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("key file {} is empty", path.display()),
            ));
        }
        Ok(bytes)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.key_path(name).is_file()
    }

    /// Delete the key file for `name`; an absent file is a success.
    pub fn delete(&self, name: &str) -> io::Result<()> {
        let path = self.key_path(name);
        if path.is_file() {
            fs::remove_file(&path)?;
            tracing::debug!(key = name, path = %path.display(), "deleted encryption key file");
        }
        Ok(())
    }
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Keep names filesystem-safe: alphanumerics, `-`, `_` and `.` pass
/// through, everything else is percent-encoded.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
            _ => {
                out.push('%');
                out.push_str(&format!("{b:02x}"));
            }
        }
    }
    out
}
