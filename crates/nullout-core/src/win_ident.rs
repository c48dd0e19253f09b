//! Filesystem identity capture. The (volume serial, file id) pair is the sole
//! anti-TOCTOU anchor: captured once at scan time, re-derived live before any
//! destructive or attribution operation.

use crate::model::EntryIdentity;
use crate::win_path;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum IdentityError {
    NotFound,
    AccessDenied,
    Io(io::Error),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::NotFound => write!(f, "entry not found"),
            IdentityError::AccessDenied => write!(f, "access denied opening entry"),
            IdentityError::Io(err) => write!(f, "identity probe failed: {err}"),
        }
    }
}

impl std::error::Error for IdentityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IdentityError::Io(err) => Some(err),
            _ => None,
        }
    }
}

fn classify_io(err: io::Error) -> IdentityError {
    match err.kind() {
        io::ErrorKind::NotFound => IdentityError::NotFound,
        io::ErrorKind::PermissionDenied => IdentityError::AccessDenied,
        _ => IdentityError::Io(err),
    }
}

/// Open the entry through the extended namespace and read its identity.
///
/// The open uses generic-read access, full share mode, and backup semantics
/// so directories (and entries other processes hold open) can be probed. The
/// handle is owned by the `File` and released on every exit path.
#[cfg(windows)]
pub fn probe_identity(path: &str) -> Result<EntryIdentity, IdentityError> {
    use std::os::windows::fs::OpenOptionsExt;
    use std::os::windows::io::AsRawHandle;
    use windows::Win32::Foundation::{GENERIC_READ, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION, FILE_FLAG_BACKUP_SEMANTICS,
        FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    };

    let extended = win_path::to_extended_path(path);
    let entry = std::fs::OpenOptions::new()
        .access_mode(GENERIC_READ.0)
        .share_mode((FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE).0)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS.0)
        .open(&extended)
        .map_err(classify_io)?;

    let mut info = BY_HANDLE_FILE_INFORMATION::default();
    // SAFETY: the handle stays owned by `entry` for the whole call and `info`
    // is a stack struct the call writes into.
    unsafe { GetFileInformationByHandle(HANDLE(entry.as_raw_handle() as _), &mut info) }
        .map_err(|err| IdentityError::Io(io::Error::other(err)))?;

    let file_id = (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow);
    Ok(EntryIdentity::new(
        format!("0x{:08X}", info.dwVolumeSerialNumber),
        format!("0x{file_id:016X}"),
    ))
}

/// POSIX fallback: (device, inode) plays the role of (volume serial, file id)
/// so the whole pipeline stays exercisable on non-Windows CI hosts.
#[cfg(not(windows))]
pub fn probe_identity(path: &str) -> Result<EntryIdentity, IdentityError> {
    use std::os::unix::fs::MetadataExt;

    let md = std::fs::metadata(win_path::addressable(path)).map_err(classify_io)?;
    Ok(EntryIdentity::new(
        format!("0x{:08X}", md.dev()),
        format!("0x{:016X}", md.ino()),
    ))
}
