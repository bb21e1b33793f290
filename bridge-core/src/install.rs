//! Install-and-verify pipeline for bundled plugin payloads
//!
//! The pipeline stages an embedded archive to a temporary path, extracts it
//! into the user-chosen destination, then re-opens the staged copy and checks
//! that every enumerated entry exists under the destination. The staged copy
//! is deleted only when the whole install verified; on any failure it is left
//! in place for diagnosis.

use crate::archive::{ArchiveFormat, ZipFormat};
use crate::payload::PayloadStore;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors that can occur during an install.
///
/// Callers that only need the legacy pass/fail signal can use
/// [`Installer::install`]; the distinct kinds are kept for diagnostics.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("embedded payload `{name}` is unavailable")]
    ResourceUnavailable {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("extraction into {} failed", .destination.display())]
    Extraction {
        destination: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("verification failed: {} entries missing under {}", .missing.len(), .destination.display())]
    Verification {
        destination: PathBuf,
        /// Every enumerated entry path absent after extraction.
        missing: Vec<PathBuf>,
    },
}

/// Record of a verified install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    /// Name of the installed payload.
    pub archive_name: String,
    /// Directory the archive was unpacked into.
    pub destination: PathBuf,
    /// Number of archive entries confirmed present at the destination.
    pub entries_verified: usize,
    /// Blake3 hash of the staged payload bytes.
    pub payload_hash: String,
    /// When the install completed.
    pub installed_at: DateTime<Utc>,
}

/// Installs bundled archives into user-chosen directories.
///
/// Synchronous and single-threaded; the call blocks for the duration of
/// copy, extraction, and verification. Concurrent installs of the same
/// archive name race on the shared staging path (last writer wins). The
/// installer assumes one interactive user driving one install at a time.
pub struct Installer {
    payloads: Box<dyn PayloadStore>,
    format: Box<dyn ArchiveFormat>,
    staging_dir: PathBuf,
}

impl Installer {
    /// Create an installer over the given payload namespace.
    ///
    /// Defaults to the zip archive format and the system temp directory for
    /// staging.
    pub fn new(payloads: Box<dyn PayloadStore>) -> Self {
        Self {
            payloads,
            format: Box::new(ZipFormat),
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Override the staging directory.
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Override the archive format delegate.
    pub fn with_format(mut self, format: Box<dyn ArchiveFormat>) -> Self {
        self.format = format;
        self
    }

    /// Install the named embedded archive into `destination`.
    ///
    /// The destination directory must already exist; this component does not
    /// create it. On success the staged temporary copy is removed; on any
    /// failure it is retained at `<staging_dir>/<archive file name>` so the
    /// intermediate state can be inspected.
    pub fn install_embedded_archive(
        &self,
        archive_name: &str,
        destination: &Path,
    ) -> Result<InstallReport, InstallError> {
        info!(
            "Installing embedded archive `{}` into {}",
            archive_name,
            destination.display()
        );

        let staged = self
            .staging_path(archive_name)
            .map_err(|source| InstallError::ResourceUnavailable {
                name: archive_name.to_string(),
                source,
            })?;

        // Stage: copy the payload to temp, overwriting any previous copy.
        let payload_hash = self
            .stage_payload(archive_name, &staged)
            .map_err(|source| InstallError::ResourceUnavailable {
                name: archive_name.to_string(),
                source,
            })?;

        if !destination.is_dir() {
            return Err(InstallError::Extraction {
                destination: destination.to_path_buf(),
                source: anyhow!("destination directory does not exist"),
            });
        }

        // Extract: the reader is dropped before the archive is re-opened for
        // enumeration.
        {
            let mut reader =
                self.format
                    .open(&staged)
                    .map_err(|source| InstallError::Extraction {
                        destination: destination.to_path_buf(),
                        source,
                    })?;
            reader
                .extract_all(destination)
                .map_err(|source| InstallError::Extraction {
                    destination: destination.to_path_buf(),
                    source,
                })?;
        }

        // Enumerate the staged archive, not the destination.
        let entries = {
            let mut reader =
                self.format
                    .open(&staged)
                    .map_err(|source| InstallError::Extraction {
                        destination: destination.to_path_buf(),
                        source,
                    })?;
            reader
                .entries()
                .map_err(|source| InstallError::Extraction {
                    destination: destination.to_path_buf(),
                    source,
                })?
        };

        if entries.is_empty() {
            // An empty manifest verifies vacuously; suspicious enough to log.
            warn!(
                "Archive `{}` enumerated zero entries; nothing to verify",
                archive_name
            );
        }

        // Verify: every enumerated path must exist under the destination.
        let missing: Vec<PathBuf> = entries
            .iter()
            .filter(|entry| !destination.join(&entry.path).exists())
            .map(|entry| entry.path.clone())
            .collect();

        if !missing.is_empty() {
            warn!(
                "Verification failed for `{}`: {} of {} entries missing; staged copy retained at {}",
                archive_name,
                missing.len(),
                entries.len(),
                staged.display()
            );
            return Err(InstallError::Verification {
                destination: destination.to_path_buf(),
                missing,
            });
        }

        // Fully verified: the staged copy is no longer needed.
        if let Err(err) = fs::remove_file(&staged) {
            warn!(
                "Failed to remove staged archive {}: {}",
                staged.display(),
                err
            );
        }

        info!(
            "Installed `{}`: {} entries verified under {}",
            archive_name,
            entries.len(),
            destination.display()
        );

        Ok(InstallReport {
            archive_name: archive_name.to_string(),
            destination: destination.to_path_buf(),
            entries_verified: entries.len(),
            payload_hash,
            installed_at: Utc::now(),
        })
    }

    /// Boolean-coercion convenience over [`install_embedded_archive`].
    ///
    /// Logs the failure kind and returns the legacy pass/fail signal.
    ///
    /// [`install_embedded_archive`]: Installer::install_embedded_archive
    pub fn install(&self, archive_name: &str, destination: &Path) -> bool {
        match self.install_embedded_archive(archive_name, destination) {
            Ok(_) => true,
            Err(err) => {
                error!("Install of `{}` failed: {:#}", archive_name, anyhow!(err));
                false
            }
        }
    }

    /// Where the named archive is staged before extraction.
    pub fn staging_path(&self, archive_name: &str) -> anyhow::Result<PathBuf> {
        // Only the final path component is used, so a separator-bearing name
        // cannot escape the staging directory.
        let file_name = Path::new(archive_name)
            .file_name()
            .ok_or_else(|| anyhow!("archive name `{}` has no file name", archive_name))?;
        Ok(self.staging_dir.join(file_name))
    }

    fn stage_payload(&self, archive_name: &str, staged: &Path) -> anyhow::Result<String> {
        let mut source = self
            .payloads
            .open(archive_name)
            .with_context(|| format!("failed to resolve payload `{}`", archive_name))?;
        let mut bytes = Vec::new();
        source
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read payload `{}`", archive_name))?;
        // Release the source handle before touching the staging path.
        drop(source);

        fs::write(staged, &bytes)
            .with_context(|| format!("failed to stage payload to {}", staged.display()))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveEntry, ArchiveReader};
    use crate::payload::{DirPayloadStore, StaticPayloadStore};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const PAYLOAD_ENTRIES: [(&str, &[u8]); 2] = [
        ("plugin.dll", b"binary payload"),
        ("resources/config.json", b"{\"enabled\":true}"),
    ];

    fn fixture_zip_bytes() -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("resources", options).unwrap();
        for (name, bytes) in PAYLOAD_ENTRIES {
            writer.start_file(name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn empty_zip_bytes() -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer.finish().unwrap().into_inner()
    }

    fn installer_with_fixture(temp: &TempDir, name: &str, bytes: Vec<u8>) -> Installer {
        let payload_dir = temp.path().join("embedded");
        std::fs::create_dir_all(&payload_dir).unwrap();
        std::fs::write(payload_dir.join(name), bytes).unwrap();

        let staging = temp.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();

        Installer::new(Box::new(DirPayloadStore::new(payload_dir))).with_staging_dir(staging)
    }

    #[test]
    fn install_extracts_and_verifies_every_entry() {
        let temp = TempDir::new().unwrap();
        let payload = fixture_zip_bytes();
        let installer = installer_with_fixture(&temp, "bridge.zip", payload.clone());
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        let report = installer
            .install_embedded_archive("bridge.zip", &dest)
            .expect("install should succeed");

        for (name, bytes) in PAYLOAD_ENTRIES {
            assert_eq!(std::fs::read(dest.join(name)).unwrap(), bytes);
        }
        // Directory record plus two files.
        assert_eq!(report.entries_verified, 3);
        assert_eq!(report.destination, dest);
        assert_eq!(
            report.payload_hash,
            blake3::hash(&payload).to_hex().to_string()
        );
    }

    #[test]
    fn staged_copy_removed_after_success() {
        let temp = TempDir::new().unwrap();
        let installer = installer_with_fixture(&temp, "bridge.zip", fixture_zip_bytes());
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        assert!(installer.install("bridge.zip", &dest));
        assert!(!installer.staging_path("bridge.zip").unwrap().exists());
    }

    #[test]
    fn repeated_install_overwrites_stale_staged_copy() {
        let temp = TempDir::new().unwrap();
        let installer = installer_with_fixture(&temp, "bridge.zip", fixture_zip_bytes());
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        // Leftover from a hypothetical earlier failed run.
        let staged = installer.staging_path("bridge.zip").unwrap();
        std::fs::write(&staged, b"stale garbage").unwrap();

        assert!(installer.install("bridge.zip", &dest));
        assert!(installer.install("bridge.zip", &dest));
    }

    #[test]
    fn missing_payload_is_resource_unavailable() {
        let temp = TempDir::new().unwrap();
        let installer = Installer::new(Box::new(StaticPayloadStore::new()))
            .with_staging_dir(temp.path().join("staging"));
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        let err = installer
            .install_embedded_archive("ghost.zip", &dest)
            .unwrap_err();
        assert!(matches!(err, InstallError::ResourceUnavailable { .. }));
    }

    #[test]
    fn missing_destination_fails_and_retains_staged_copy() {
        let temp = TempDir::new().unwrap();
        let installer = installer_with_fixture(&temp, "bridge.zip", fixture_zip_bytes());
        let dest = temp.path().join("never-created");

        let err = installer
            .install_embedded_archive("bridge.zip", &dest)
            .unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }));
        assert!(installer.staging_path("bridge.zip").unwrap().exists());
    }

    #[test]
    fn empty_archive_verifies_vacuously() {
        let temp = TempDir::new().unwrap();
        let installer = installer_with_fixture(&temp, "empty.zip", empty_zip_bytes());
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        let report = installer
            .install_embedded_archive("empty.zip", &dest)
            .expect("empty archive should install");
        assert_eq!(report.entries_verified, 0);
        assert!(!installer.staging_path("empty.zip").unwrap().exists());
    }

    #[test]
    fn separator_bearing_names_stage_by_file_name() {
        let temp = TempDir::new().unwrap();
        let payload_dir = temp.path().join("embedded");
        std::fs::create_dir_all(payload_dir.join("payloads")).unwrap();
        std::fs::write(
            payload_dir.join("payloads/bridge.zip"),
            fixture_zip_bytes(),
        )
        .unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        let installer =
            Installer::new(Box::new(DirPayloadStore::new(payload_dir))).with_staging_dir(&staging);

        assert_eq!(
            installer.staging_path("payloads/bridge.zip").unwrap(),
            staging.join("bridge.zip")
        );

        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();
        assert!(installer.install("payloads/bridge.zip", &dest));
    }

    // Interrupted-extraction scenarios need a reader that claims entries it
    // never writes; the zip backend cannot under-extract on a healthy
    // filesystem.
    struct TruncatingFormat;

    impl ArchiveFormat for TruncatingFormat {
        fn open(&self, _path: &Path) -> anyhow::Result<Box<dyn ArchiveReader>> {
            Ok(Box::new(TruncatingReader))
        }
    }

    struct TruncatingReader;

    impl ArchiveReader for TruncatingReader {
        fn entries(&mut self) -> anyhow::Result<Vec<ArchiveEntry>> {
            Ok(vec![
                ArchiveEntry {
                    path: PathBuf::from("plugin.dll"),
                    is_dir: false,
                    size: 14,
                    crc32: 0,
                },
                ArchiveEntry {
                    path: PathBuf::from("resources/config.json"),
                    is_dir: false,
                    size: 16,
                    crc32: 0,
                },
            ])
        }

        fn extract_all(&mut self, dest: &Path) -> anyhow::Result<()> {
            // Writes the first entry, then "dies" before the second.
            std::fs::write(dest.join("plugin.dll"), b"binary payload")?;
            Ok(())
        }
    }

    #[test]
    fn partial_extraction_reports_all_missing_entries() {
        let temp = TempDir::new().unwrap();
        let installer = installer_with_fixture(&temp, "bridge.zip", fixture_zip_bytes())
            .with_format(Box::new(TruncatingFormat));
        let dest = temp.path().join("plugins");
        std::fs::create_dir_all(&dest).unwrap();

        let err = installer
            .install_embedded_archive("bridge.zip", &dest)
            .unwrap_err();

        match err {
            InstallError::Verification { missing, .. } => {
                assert_eq!(missing, vec![PathBuf::from("resources/config.json")]);
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
        // Staged copy retained for diagnosis.
        assert!(installer.staging_path("bridge.zip").unwrap().exists());
        assert!(!installer.install("bridge.zip", &dest));
    }
}
