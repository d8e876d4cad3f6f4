//! Socket file permissions/ownership and the process privilege drop.

use std::fmt;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors raised while preparing the socket or switching identity.
#[derive(Debug)]
pub enum SetupError {
    Bind(PathBuf, io::Error),
    Chmod(PathBuf, io::Error),
    Chown(PathBuf, io::Error),
    SetGroups(u32, io::Error),
    SetGid(u32, io::Error),
    SetUid(u32, io::Error),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Bind(path, e) => {
                write!(f, "Failed to bind socket '{}': {}", path.display(), e)
            }
            SetupError::Chmod(path, e) => {
                write!(f, "Failed to set permissions on '{}': {}", path.display(), e)
            }
            SetupError::Chown(path, e) => {
                write!(f, "Failed to set owner of '{}': {}", path.display(), e)
            }
            SetupError::SetGroups(gid, e) => {
                write!(f, "Failed to reset supplementary groups to {}: {}", gid, e)
            }
            SetupError::SetGid(gid, e) => write!(f, "Failed to switch to gid {}: {}", gid, e),
            SetupError::SetUid(uid, e) => write!(f, "Failed to switch to uid {}: {}", uid, e),
        }
    }
}

impl std::error::Error for SetupError {}

/// Apply permission bits to the socket file.
pub fn set_mode(path: &Path, mode: u32) -> Result<(), SetupError> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| SetupError::Chmod(path.to_path_buf(), e))?;
    debug!(mode = %format!("{:o}", mode), "Permissions set");
    Ok(())
}

/// Hand the socket file to `uid`/`gid`.
pub fn set_owner(path: &Path, uid: u32, gid: u32) -> Result<(), SetupError> {
    std::os::unix::fs::chown(path, Some(uid), Some(gid))
        .map_err(|e| SetupError::Chown(path.to_path_buf(), e))?;
    debug!(uid, gid, "Set socket owner");
    Ok(())
}

/// Switch the process to `uid`/`gid`. The groups are changed first, while
/// the process may still have the right to do so. When running as root the
/// supplementary group list is replaced by `gid` alone.
pub fn drop_to(uid: u32, gid: u32) -> Result<(), SetupError> {
    // SAFETY: geteuid cannot fail and touches no memory.
    if unsafe { libc::geteuid() } == 0 {
        let groups = [gid as libc::gid_t];
        // SAFETY: `groups` outlives the call and its length is passed alongside.
        if unsafe { libc::setgroups(groups.len() as _, groups.as_ptr()) } != 0 {
            return Err(SetupError::SetGroups(gid, io::Error::last_os_error()));
        }
    }
    // SAFETY: setgid/setuid take plain integers and report failure via errno.
    if unsafe { libc::setgid(gid) } != 0 {
        return Err(SetupError::SetGid(gid, io::Error::last_os_error()));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return Err(SetupError::SetUid(uid, io::Error::last_os_error()));
    }
    debug!(uid, gid, "Set process identity");
    Ok(())
}
