//! Container persistence.
//!
//! A [`KeyStoreBackend`] reads and writes the container file. The default
//! [`FileBackend`] writes one binary file: a magic header followed by the
//! container JSON sealed with the container password.

use crate::crypto::encryption::{open_with_password, seal_with_password};
use crate::crypto::password::Password;
use crate::error::{KeystoreError, Result};
use crate::storage::container::Container;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Container file name used when the configured path is a directory.
pub const KEYSTORE_FILENAME: &str = "keystore.ks";

/// Magic bytes at the start of every container file.
const MAGIC: &[u8; 4] = b"GKS1";

/// Loads and stores keystore containers.
pub trait KeyStoreBackend: Send + Sync {
    /// Whether a container exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Load the container at `path`, opening it with `password`.
    fn load(&self, path: &Path, password: &Password) -> Result<Container>;

    /// Write `container` to `path`, sealed with `password`.
    fn store(&self, container: &Container, path: &Path, password: &Password) -> Result<()>;
}

/// Stores containers as sealed files on the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBackend;

impl FileBackend {
    pub fn new() -> Self {
        Self
    }

    /// The file a configured path refers to.
    ///
    /// A path naming an existing directory holds the container as
    /// [`KEYSTORE_FILENAME`] inside it.
    pub fn container_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(KEYSTORE_FILENAME)
        } else {
            path.to_path_buf()
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl KeyStoreBackend for FileBackend {
    fn exists(&self, path: &Path) -> bool {
        Self::container_path(path).is_file()
    }

    fn load(&self, path: &Path, password: &Password) -> Result<Container> {
        let file = Self::container_path(path);
        let contents = fs::read(&file)?;

        let sealed = contents.strip_prefix(MAGIC.as_slice()).ok_or_else(|| {
            KeystoreError::StoreLoadError(format!(
                "{} is not a keystore container",
                file.display()
            ))
        })?;

        let json = open_with_password(sealed, password.as_bytes())?;
        let container = Container::from_json(&json)?;

        debug!(path = %file.display(), entries = container.len(), "keystore loaded");
        Ok(container)
    }

    fn store(&self, container: &Container, path: &Path, password: &Password) -> Result<()> {
        let file = Self::container_path(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = zeroize::Zeroizing::new(container.to_json()?);
        let sealed = seal_with_password(&json, password.as_bytes())?;

        let mut contents = Vec::with_capacity(MAGIC.len() + sealed.len());
        contents.extend_from_slice(MAGIC);
        contents.extend_from_slice(&sealed);

        // Write beside the target and rename so readers never see a torn file.
        let temp = Self::temp_path(&file);
        fs::write(&temp, &contents)?;
        if let Err(e) = fs::rename(&temp, &file) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(path = %file.display(), entries = container.len(), "keystore stored");
        Ok(())
    }
}
