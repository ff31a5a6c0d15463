//! Destinations for converted images.
//!
//! Packaging into a downloadable container belongs to the caller; this
//! module only defines the `(name, bytes)` hand-off and two plain sinks.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Receives converted images in input order.
pub trait ArchiveSink {
    /// Store one member under `name`.
    fn add(&mut self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Collects members in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, Vec<u8>)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArchiveSink for MemorySink {
    fn add(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Writes each member as a file inside a directory.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Use `root` as the output directory, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveSink for DirectorySink {
    fn add(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        // Only the final path component is used so names cannot escape the root.
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid member name: {name}"))
        })?;
        fs::write(self.root.join(file_name), bytes)
    }
}

/// Hands out member names, suffixing repeats as `name-1.ext`, `name-2.ext`, ...
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };
        let mut n = 1;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
