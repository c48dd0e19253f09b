//! Path handling for names the Win32 layer mishandles.
//!
//! The standard full-path routines strip trailing dots and spaces from each
//! component, which are exactly the characters this crate exists to address.
//! The canonicalizer therefore works at the string level: no syscalls, no
//! normalization beyond what is written down here.

use std::path::PathBuf;

/// Longest path the legacy Win32 layer accepts without the extended prefix.
pub const MAX_PATH_LEGACY: usize = 260;

const EXTENDED_PREFIX: &str = r"\\?\";
const EXTENDED_UNC_PREFIX: &str = r"\\?\UNC\";

/// Convert a path to `\\?\` extended form.
///
/// Local `C:\foo` becomes `\\?\C:\foo`, UNC `\\server\share` becomes
/// `\\?\UNC\server\share`, and an already-extended path is returned as-is.
/// Idempotent, total, and preserves trailing dots/spaces.
pub fn to_extended_path(path: &str) -> String {
    if path.starts_with(EXTENDED_PREFIX) {
        return path.to_string();
    }
    let abs = safe_abspath(path);
    if let Some(unc) = abs.strip_prefix(r"\\") {
        return format!("{EXTENDED_UNC_PREFIX}{}", unc.trim_start_matches('\\'));
    }
    format!("{EXTENDED_PREFIX}{abs}")
}

/// Absolute form preserving trailing dots/spaces, without the extended prefix.
/// Relative inputs are joined onto the process working directory at the
/// string level only.
pub fn safe_abspath(path: &str) -> String {
    if let Some(rest) = path.strip_prefix(EXTENDED_UNC_PREFIX) {
        return format!(r"\\{rest}");
    }
    if let Some(rest) = path.strip_prefix(EXTENDED_PREFIX) {
        return rest.to_string();
    }
    let p = path.replace('/', "\\");
    if p.starts_with('\\') || has_drive_prefix(&p) {
        return p;
    }
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.to_string_lossy().replace('/', "\\"),
        Err(_) => return p,
    };
    format!("{}\\{}", cwd.trim_end_matches('\\'), p)
}

/// Case-folded, separator-normalized containment check. `.` and `..`
/// components are resolved lexically, so `root\..\escape` is not under
/// `root`. The root itself counts as under.
pub fn is_under_root(target: &str, root: &str) -> bool {
    let t = compare_key(target);
    let r = compare_key(root);
    let r = r.trim_end_matches('\\');
    t == r || t.starts_with(&format!("{r}\\"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn compare_key(path: &str) -> String {
    let mut s = path.replace('/', "\\");
    if let Some(rest) = s.strip_prefix(EXTENDED_UNC_PREFIX) {
        s = format!(r"\\{rest}");
    } else if let Some(rest) = s.strip_prefix(EXTENDED_PREFIX) {
        s = rest.to_string();
    }
    let lower = s.to_lowercase();
    let (prefix, rest): (String, &str) = if let Some(r) = lower.strip_prefix(r"\\") {
        (r"\\".to_string(), r)
    } else if has_drive_prefix(&lower) {
        (lower[..2].to_string(), lower[2..].trim_start_matches('\\'))
    } else if let Some(r) = lower.strip_prefix('\\') {
        ("\\".to_string(), r)
    } else {
        (String::new(), lower.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for comp in rest.split('\\') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if prefix.is_empty() {
        parts.join("\\")
    } else if prefix == r"\\" || prefix == "\\" {
        format!("{prefix}{}", parts.join("\\"))
    } else {
        format!("{prefix}\\{}", parts.join("\\"))
    }
}

/// The form used to actually reach an entry on disk.
#[cfg(windows)]
pub fn addressable(path: &str) -> PathBuf {
    PathBuf::from(to_extended_path(path))
}

/// On non-Windows hosts there is no extended namespace; the absolute path
/// itself is fully addressable.
#[cfg(not(windows))]
pub fn addressable(path: &str) -> PathBuf {
    let p = std::path::Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(p),
        Err(_) => p.to_path_buf(),
    }
}

/// Canonical (wire-visible) spelling of a path for findings and root listings.
#[cfg(windows)]
pub fn canonical_form(path: &str) -> String {
    to_extended_path(path)
}

#[cfg(not(windows))]
pub fn canonical_form(path: &str) -> String {
    addressable(path).to_string_lossy().into_owned()
}

/// Live reparse-attribute probe through the addressable namespace, so a
/// trailing-dot name is actually queried rather than its normalized sibling.
/// Unreachable entries report `false`.
#[cfg(windows)]
pub fn is_reparse_point(path: &str) -> bool {
    use std::os::windows::fs::MetadataExt;
    use windows::Win32::Storage::FileSystem::FILE_ATTRIBUTE_REPARSE_POINT;

    match std::fs::symlink_metadata(addressable(path)) {
        Ok(md) => md.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT.0 != 0,
        Err(_) => false,
    }
}

#[cfg(not(windows))]
pub fn is_reparse_point(path: &str) -> bool {
    std::fs::symlink_metadata(addressable(path))
        .map(|md| md.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_prefix_is_idempotent() {
        let once = to_extended_path(r"C:\temp\NUL.txt");
        assert_eq!(once, r"\\?\C:\temp\NUL.txt");
        assert_eq!(to_extended_path(&once), once);
    }

    #[test]
    fn trailing_dot_survives_canonicalization() {
        assert_eq!(to_extended_path(r"C:\temp\backup."), r"\\?\C:\temp\backup.");
        assert_eq!(to_extended_path(r"C:\temp\notes "), r"\\?\C:\temp\notes ");
    }

    #[test]
    fn forward_slashes_become_backslashes() {
        assert_eq!(to_extended_path("C:/temp/f.txt"), r"\\?\C:\temp\f.txt");
    }

    #[test]
    fn unc_paths_get_the_unc_prefix() {
        assert_eq!(
            to_extended_path(r"\\server\share\f."),
            r"\\?\UNC\server\share\f."
        );
    }

    #[test]
    fn safe_abspath_strips_extended_prefixes() {
        assert_eq!(safe_abspath(r"\\?\C:\temp\f."), r"C:\temp\f.");
        assert_eq!(safe_abspath(r"\\?\UNC\srv\share\f"), r"\\srv\share\f");
    }

    #[test]
    fn containment_accepts_children_and_the_root_itself() {
        assert!(is_under_root(r"C:\t\f.", r"C:\t"));
        assert!(is_under_root(r"C:\t", r"C:\t"));
        assert!(is_under_root(r"C:\t\a\b\c", r"C:\t"));
        assert!(is_under_root(r"\\?\C:\t\f.", r"C:\t"));
    }

    #[test]
    fn containment_is_case_and_separator_insensitive() {
        assert!(is_under_root(r"c:\T\f", r"C:\t"));
        assert!(is_under_root("C:/t/sub/f", r"C:\t"));
    }

    #[test]
    fn dotdot_escapes_are_rejected() {
        assert!(!is_under_root(r"C:\t\..\escape.txt", r"C:\t"));
        assert!(is_under_root(r"C:\t\sub\..\f", r"C:\t"));
        assert!(!is_under_root("/tmp/root/../escape", "/tmp/root"));
    }

    #[test]
    fn sibling_prefix_does_not_count_as_under() {
        assert!(!is_under_root(r"C:\t2\f", r"C:\t"));
        assert!(!is_under_root("/tmp/root2/f", "/tmp/root"));
    }

    #[test]
    fn posix_paths_use_the_same_containment_logic() {
        assert!(is_under_root("/tmp/root/child", "/tmp/root"));
        assert!(is_under_root("/tmp/root", "/tmp/root"));
        assert!(!is_under_root("/tmp/other", "/tmp/root"));
    }
}
