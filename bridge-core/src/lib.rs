//! # Bridge Core
//!
//! Support library for content-export bridge plugins hosted inside 3D
//! content-creation applications. The host dialog collects user choices; this
//! crate supplies the parts with real failure semantics:
//!
//! - Embedded payload installation: stage a bundled archive to temp, extract
//!   it into a user-chosen directory, and verify that every archive entry
//!   exists at the destination before declaring success
//! - An archive capability abstraction with a zip backend
//! - An injectable settings repository for persisted dialog state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bridge_core::{DirPayloadStore, Installer};
//! use std::path::Path;
//!
//! let payloads = DirPayloadStore::new("/opt/bridge/embedded");
//! let installer = Installer::new(Box::new(payloads));
//!
//! let report = installer.install_embedded_archive(
//!     "MayaBridge.zip",
//!     Path::new("/home/user/maya/plug-ins"),
//! )?;
//!
//! println!("Verified {} entries", report.entries_verified);
//! # Ok::<(), bridge_core::InstallError>(())
//! ```

pub mod archive;
pub mod install;
pub mod payload;
pub mod settings;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ArchiveFormat, ArchiveReader, ZipFormat, ZipReader};
pub use install::{InstallError, InstallReport, Installer};
pub use payload::{DirPayloadStore, PayloadError, PayloadStore, StaticPayloadStore};
pub use settings::{JsonFileSettings, MemorySettings, SettingsRepository};

use anyhow::Result;
use tracing::info;

/// Version information for the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with structured logging.
///
/// Safe to call more than once; later calls leave the existing subscriber in
/// place.
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bridge_core=info")
        .with_target(false)
        .try_init();

    info!("Initializing Bridge Core v{}", VERSION);

    Ok(())
}
