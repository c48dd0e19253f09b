//! Environment-driven configuration: the allowlist of roots and the token
//! signing secret. Both fail closed; the server refuses to start without
//! them.

use crate::win_path;
use eyre::{bail, Result, WrapErr};
use serde::Serialize;

pub const REPARSE_POLICY: &str = "deny_all";
pub const DELETE_POLICY: &str = "empty_dirs_and_files_only";
pub const DELETE_STRATEGY: &str = "WIN_EXTENDED_PATH_DELETE";
pub const TOKEN_TTL_SECONDS: i64 = 300;
pub const DEFAULT_MAX_DEPTH: u32 = 50;

pub const ROOTS_ENV: &str = "NULLOUT_ROOTS";
pub const TOKEN_SECRET_ENV: &str = "NULLOUT_TOKEN_SECRET";

/// An operator-allowlisted absolute directory the service may operate in.
#[derive(Debug, Clone)]
pub struct Root {
    pub root_id: String,
    pub display_name: String,
    pub path: String,
}

/// Allowlisted roots in configuration order, keyed by `root_id`.
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    roots: Vec<Root>,
}

impl RootSet {
    pub fn insert(&mut self, root: Root) {
        self.roots.push(root);
    }

    pub fn get(&self, root_id: &str) -> Option<&Root> {
        self.roots.iter().find(|r| r.root_id == root_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Root> {
        self.roots.iter()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Load allowlisted roots from `NULLOUT_ROOTS` (semicolon-separated absolute
/// directories).
pub fn load_roots() -> Result<RootSet> {
    let raw = std::env::var(ROOTS_ENV).unwrap_or_default();
    if raw.is_empty() {
        bail!(
            "{ROOTS_ENV} environment variable is required; \
             set semicolon-separated absolute directories, e.g. C:\\Users\\me\\Downloads;C:\\temp"
        );
    }
    parse_roots(&raw)
}

pub fn parse_roots(raw: &str) -> Result<RootSet> {
    let mut roots = RootSet::default();
    for (index, item) in raw.split(';').enumerate() {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let abs = std::path::absolute(item)
            .wrap_err_with(|| format!("resolving configured root: {item}"))?;
        if !abs.is_dir() {
            bail!(
                "configured root does not exist or is not a directory: {}",
                abs.display()
            );
        }
        let path = abs.to_string_lossy().into_owned();
        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Roots themselves must be addressable without the extended namespace.
        if name.ends_with('.') || name.ends_with(' ') {
            bail!("configured root has a trailing dot or space: {path}");
        }
        let root_id = format!("root_{index}");
        roots.insert(Root {
            root_id: root_id.clone(),
            display_name: if name.is_empty() { path.clone() } else { name },
            path,
        });
    }
    if roots.is_empty() {
        bail!("{ROOTS_ENV} is set but contains no valid paths");
    }
    Ok(roots)
}

/// Token signing secret from `NULLOUT_TOKEN_SECRET`.
pub fn token_secret() -> Result<Vec<u8>> {
    let secret = std::env::var(TOKEN_SECRET_ENV).unwrap_or_default();
    if secret.is_empty() {
        bail!("{TOKEN_SECRET_ENV} environment variable is required; generate a long random value");
    }
    Ok(secret.into_bytes())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootListing {
    pub roots: Vec<RootInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub root_id: String,
    pub display_name: String,
    pub path: String,
    pub canonical_path: String,
    pub reparse_policy: &'static str,
}

pub fn list_allowed_roots(roots: &RootSet) -> RootListing {
    RootListing {
        roots: roots
            .iter()
            .map(|root| RootInfo {
                root_id: root.root_id.clone(),
                display_name: root.display_name.clone(),
                path: root.path.clone(),
                canonical_path: win_path::canonical_form(&root.path),
                reparse_policy: REPARSE_POLICY,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roots_in_order() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        let raw = format!("{};{}", a.path().display(), b.path().display());

        let roots = parse_roots(&raw).expect("parse");
        assert_eq!(roots.len(), 2);
        let ids: Vec<&str> = roots.iter().map(|r| r.root_id.as_str()).collect();
        assert_eq!(ids, ["root_0", "root_1"]);
        assert!(roots.get("root_1").is_some());
        assert!(roots.get("root_9").is_none());
    }

    #[test]
    fn skips_empty_items_but_keeps_indices() {
        let a = tempfile::tempdir().expect("tempdir");
        let raw = format!(";{};", a.path().display());

        let roots = parse_roots(&raw).expect("parse");
        assert_eq!(roots.len(), 1);
        assert_eq!(roots.iter().next().unwrap().root_id, "root_1");
    }

    #[test]
    fn missing_directory_fails_closed() {
        let a = tempfile::tempdir().expect("tempdir");
        let gone = a.path().join("does-not-exist");
        assert!(parse_roots(&gone.to_string_lossy()).is_err());
    }

    #[test]
    fn blank_roots_value_fails_closed() {
        assert!(parse_roots(";;").is_err());
    }

    #[test]
    fn listing_carries_policy_and_canonical_path() {
        let a = tempfile::tempdir().expect("tempdir");
        let roots = parse_roots(&a.path().to_string_lossy()).expect("parse");

        let listing = list_allowed_roots(&roots);
        assert_eq!(listing.roots.len(), 1);
        assert_eq!(listing.roots[0].reparse_policy, "deny_all");
        assert!(!listing.roots[0].canonical_path.is_empty());
    }
}
