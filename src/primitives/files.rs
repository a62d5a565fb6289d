//! Idempotent file and directory management with owner and mode.
//!
//! Every method reports whether it changed anything, which is what drives
//! the restart decision in `apply`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid, User, chown};
use tracing::{debug, info, warn};

use crate::error::{JmxError, Result};

/// Resolved OS account owning generated artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Look up an existing account by name (the account is never created)
    pub fn lookup(name: &str) -> Result<Self> {
        let user = User::from_name(name)
            .map_err(|e| JmxError::UnknownUser(format!("{}: {}", name, e)))?
            .ok_or_else(|| JmxError::UnknownUser(name.to_string()))?;
        Ok(Self::from(user))
    }

    /// The account this process runs as
    pub fn current() -> Result<Self> {
        let uid = Uid::current();
        let user = User::from_uid(uid)
            .map_err(|e| JmxError::UnknownUser(format!("uid {}: {}", uid, e)))?
            .ok_or_else(|| JmxError::UnknownUser(format!("uid {}", uid)))?;
        Ok(Self::from(user))
    }
}

impl From<User> for Owner {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        }
    }
}

/// File primitive used by the applier.
///
/// All operations are idempotent; the returned `bool` is "changed".
pub trait FileManager {
    /// Create `path` (and parents) if missing, then enforce owner and mode
    fn ensure_directory(&self, path: &Path, owner: &Owner, mode: u32) -> Result<bool>;

    /// Make `path` hold exactly `content`, then enforce owner and mode
    fn ensure_file(&self, path: &Path, content: &[u8], owner: &Owner, mode: u32) -> Result<bool>;

    /// Enforce owner and mode on an existing file written by another tool
    fn ensure_attributes(&self, path: &Path, owner: &Owner, mode: u32) -> Result<bool>;

    /// Remove a file; missing is not an error
    fn remove_file(&self, path: &Path) -> Result<bool>;

    /// Remove an empty directory; missing is not an error, non-empty is left in place
    fn remove_directory(&self, path: &Path) -> Result<bool>;
}

/// [`FileManager`] over the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl LocalFiles {
    pub fn new() -> Self {
        Self
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.jmxctl-tmp", name))
}

impl FileManager for LocalFiles {
    fn ensure_directory(&self, path: &Path, owner: &Owner, mode: u32) -> Result<bool> {
        let mut changed = false;
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(JmxError::validation(format!(
                    "{:?} exists and is not a directory",
                    path
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(path)?;
                info!(path = %path.display(), "created directory");
                changed = true;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.ensure_attributes(path, owner, mode)? || changed)
    }

    fn ensure_file(&self, path: &Path, content: &[u8], owner: &Owner, mode: u32) -> Result<bool> {
        let current = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut changed = false;
        if current.as_deref() != Some(content) {
            // Write beside the target with the final mode, then rename over it,
            // so the file never exists with looser permissions or partial content
            let tmp = temp_path_for(path);
            let _ = fs::remove_file(&tmp);
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(mode)
                .open(&tmp)?;
            file.write_all(content)?;
            file.sync_all()?;
            drop(file);
            if let Err(e) = fs::rename(&tmp, path) {
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
            info!(path = %path.display(), bytes = content.len(), "wrote file");
            changed = true;
        } else {
            debug!(path = %path.display(), "content unchanged");
        }

        Ok(self.ensure_attributes(path, owner, mode)? || changed)
    }

    fn ensure_attributes(&self, path: &Path, owner: &Owner, mode: u32) -> Result<bool> {
        let meta = fs::metadata(path)?;
        let mut changed = false;

        if meta.uid() != owner.uid || meta.gid() != owner.gid {
            chown(
                path,
                Some(Uid::from_raw(owner.uid)),
                Some(Gid::from_raw(owner.gid)),
            )
            .map_err(std::io::Error::from)?;
            info!(path = %path.display(), owner = %owner.name, "changed ownership");
            changed = true;
        }

        if meta.permissions().mode() & 0o7777 != mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            info!(path = %path.display(), mode = %format!("{:o}", mode), "changed mode");
            changed = true;
        }

        Ok(changed)
    }

    fn remove_file(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "removed file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_directory(&self, path: &Path) -> Result<bool> {
        match fs::remove_dir(path) {
            Ok(()) => {
                info!(path = %path.display(), "removed directory");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
                warn!(
                    path = %path.display(),
                    "directory holds files jmxctl does not manage; leaving it in place"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
