//! Archive capability abstraction and the zip backend
//!
//! The installer never talks to a concrete archive library directly. It goes
//! through the `ArchiveFormat`/`ArchiveReader` pair so the compression format
//! stays a swappable delegate and tests can substitute their own readers.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// One file or directory record inside an archive.
///
/// Only `path` is load-bearing for install verification; the remaining fields
/// are advisory metadata carried for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the entry relative to the archive root, sanitized so it cannot
    /// escape an extraction directory.
    pub path: PathBuf,
    /// Whether the entry is a directory record.
    pub is_dir: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// CRC-32 recorded in the archive's central directory.
    pub crc32: u32,
}

/// An open archive handle.
///
/// Dropping the reader releases the underlying file handle; there is no
/// explicit close step, every exit path releases deterministically.
pub trait ArchiveReader {
    /// Enumerate the archive's entries in a single forward pass.
    ///
    /// Entries whose stored names would escape the extraction root (absolute
    /// paths, `..` components) are skipped with a warning. `extract_all`
    /// applies the same filter, so enumeration and extraction agree on the
    /// set of produced paths.
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>>;

    /// Unpack every entry into `dest`, reproducing the archive's directory
    /// tree verbatim.
    ///
    /// `dest` must already exist; intermediate directories for nested entries
    /// are created as needed.
    fn extract_all(&mut self, dest: &Path) -> Result<()>;
}

/// Factory for opening archives of a particular format.
pub trait ArchiveFormat: Send + Sync {
    /// Open the archive at `path` for enumeration or extraction.
    fn open(&self, path: &Path) -> Result<Box<dyn ArchiveReader>>;
}

/// The default archive format: zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipFormat;

impl ArchiveFormat for ZipFormat {
    fn open(&self, path: &Path) -> Result<Box<dyn ArchiveReader>> {
        Ok(Box::new(ZipReader::open(path)?))
    }
}

/// Zip-backed `ArchiveReader`.
pub struct ZipReader {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl ZipReader {
    /// Open a zip archive from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open archive {}", path.display()))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("failed to read zip archive {}", path.display()))?;
        Ok(Self {
            archive,
            path: path.to_path_buf(),
        })
    }
}

impl ArchiveReader for ZipReader {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let entry = self
                .archive
                .by_index(index)
                .with_context(|| format!("failed to read entry {} in {}", index, self.path.display()))?;
            let Some(path) = entry.enclosed_name() else {
                warn!(
                    "Skipping entry with unsafe name in {}: {}",
                    self.path.display(),
                    entry.name()
                );
                continue;
            };
            entries.push(ArchiveEntry {
                path,
                is_dir: entry.is_dir(),
                size: entry.size(),
                crc32: entry.crc32(),
            });
        }
        Ok(entries)
    }

    fn extract_all(&mut self, dest: &Path) -> Result<()> {
        if !dest.is_dir() {
            bail!("extraction directory does not exist: {}", dest.display());
        }

        for index in 0..self.archive.len() {
            let mut entry = self
                .archive
                .by_index(index)
                .with_context(|| format!("failed to read entry {} in {}", index, self.path.display()))?;
            let Some(relative) = entry.enclosed_name() else {
                warn!(
                    "Skipping entry with unsafe name in {}: {}",
                    self.path.display(),
                    entry.name()
                );
                continue;
            };
            let out_path = dest.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)
                    .with_context(|| format!("failed to create directory {}", out_path.display()))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
            let mut out_file = File::create(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut out_file)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            debug!("Extracted {}", out_path.display());
        }

        Ok(())
    }
}
