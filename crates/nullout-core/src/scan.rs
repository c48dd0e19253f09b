//! Depth-bounded hazard scan. Walks an allowlisted root without crossing
//! reparse points, classifies every entry name, captures identity evidence,
//! and registers findings in the store.

use crate::config::{RootSet, DEFAULT_MAX_DEPTH};
use crate::error::{ErrorCode, ToolError, ToolResult};
use crate::hazard;
use crate::model::{
    EntryType, Evidence, Finding, FsEvidence, Hazard, HazardCode, Win32Evidence,
};
use crate::store::Store;
use crate::win_ident;
use crate::win_path;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub root_id: String,
    pub recursive: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub include_dirs: bool,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: String,
    pub root_id: String,
    pub findings: Vec<Finding>,
    pub stats: ScanStats,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub visited: u64,
    pub flagged: u64,
    pub skipped_reparse_points: u64,
}

pub fn scan_reserved_names(
    req: &ScanRequest,
    roots: &RootSet,
    store: &mut Store,
) -> ToolResult<ScanReport> {
    let root = roots.get(&req.root_id).ok_or_else(|| {
        ToolError::new(ErrorCode::RootNotAllowed, "Unknown or not allowlisted root.")
            .with_details(json!({ "rootId": req.root_id }))
    })?;
    let root_path = root.path.clone();

    let scan_id = store.mint_id("scan");
    let mut walk = Walk {
        recursive: req.recursive,
        max_depth: req.max_depth,
        include_dirs: req.include_dirs,
        root_id: &req.root_id,
        root_path: &root_path,
        scan_id: &scan_id,
        store: &mut *store,
        findings: Vec::new(),
        stats: ScanStats::default(),
    };
    walk.visit_dir(&root_path, 0).map_err(|err| {
        ToolError::new(ErrorCode::Internal, "Scan failed while walking the root.")
            .with_details(json!({ "rootId": req.root_id, "error": err.to_string() }))
    })?;

    let Walk {
        findings, stats, ..
    } = walk;
    let finding_ids = findings.iter().map(|f| f.finding_id.clone()).collect();
    store.register_scan(scan_id.clone(), finding_ids);

    log::debug!(
        "scan {scan_id}: visited {} flagged {} skipped {} reparse point(s)",
        stats.visited,
        stats.flagged,
        stats.skipped_reparse_points
    );

    Ok(ScanReport {
        scan_id,
        root_id: req.root_id.clone(),
        findings,
        stats,
    })
}

struct Walk<'a> {
    recursive: bool,
    max_depth: u32,
    include_dirs: bool,
    root_id: &'a str,
    root_path: &'a str,
    scan_id: &'a str,
    store: &'a mut Store,
    findings: Vec<Finding>,
    stats: ScanStats,
}

impl Walk<'_> {
    fn visit_dir(&mut self, dir: &str, depth: u32) -> io::Result<()> {
        if depth > self.max_depth {
            return Ok(());
        }
        let entries = match std::fs::read_dir(win_path::addressable(dir)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                // Unreadable subtrees are non-fatal.
                log::debug!("scan: skipping unreadable directory {dir}");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("scan: unreadable entry under {dir}: {err}");
                    continue;
                }
            };
            self.stats.visited += 1;

            let name = entry.file_name().to_string_lossy().into_owned();
            let observed = join_observed(dir, &name);
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            // deny_all: reparse points are recorded but never traversed.
            if win_path::is_reparse_point(&observed) {
                self.stats.skipped_reparse_points += 1;
                let hazards =
                    hazard::classify(&name, win_path::canonical_form(&observed).len(), true);
                self.emit(&observed, &name, is_dir, hazards);
                continue;
            }

            if is_dir && !self.include_dirs {
                if self.recursive {
                    self.visit_dir(&observed, depth + 1)?;
                }
                continue;
            }

            let hazards = hazard::classify(&name, win_path::canonical_form(&observed).len(), false);
            if !hazards.is_empty() {
                self.emit(&observed, &name, is_dir, hazards);
            }

            if self.recursive && is_dir {
                self.visit_dir(&observed, depth + 1)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, observed: &str, name: &str, is_dir: bool, hazards: Vec<Hazard>) {
        let entry_type = if is_dir { EntryType::Dir } else { EntryType::File };
        let canonical = win_path::canonical_form(observed);
        let is_reparse = hazards
            .iter()
            .any(|h| h.code == HazardCode::ReparsePointPresent);

        let identity = match win_ident::probe_identity(observed) {
            Ok(identity) => Some(identity),
            Err(err) => {
                log::debug!("scan: identity probe failed for {observed}: {err}");
                None
            }
        };
        let size_bytes = if is_dir || is_reparse {
            None
        } else {
            std::fs::symlink_metadata(win_path::addressable(observed))
                .ok()
                .map(|md| md.len())
        };
        let (base_name, extension) = hazard::parse_basename(name);

        let finding = Finding {
            finding_id: self.store.mint_id("fnd"),
            root_id: self.root_id.to_string(),
            scan_id: self.scan_id.to_string(),
            relative_path: relative_to_root(observed, self.root_path),
            observed_path: observed.to_string(),
            canonical_path: canonical.clone(),
            entry_type,
            name: name.to_string(),
            base_name: base_name.to_string(),
            extension: extension.to_string(),
            hazards,
            evidence: Evidence {
                fs: FsEvidence {
                    exists_at_scan: true,
                    size_bytes,
                    attributes: Vec::new(),
                    is_directory: is_dir,
                    is_reparse_point: is_reparse,
                },
                win32: Win32Evidence {
                    requires_extended_path: true,
                    has_trailing_dot_or_space: hazard::has_trailing_dot_or_space(name),
                    exceeds_max_path_legacy: canonical.len() > win_path::MAX_PATH_LEGACY,
                    is_unc_path: observed.starts_with(r"\\"),
                    is_device_path: false,
                    is_ads_suspected: name.chars().skip(2).any(|c| c == ':'),
                },
                identity,
            },
        };

        self.stats.flagged += 1;
        self.store.insert_finding(finding.clone());
        self.findings.push(finding);
    }
}

fn join_observed(dir: &str, name: &str) -> String {
    let sep = std::path::MAIN_SEPARATOR;
    if dir.ends_with(sep) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{sep}{name}")
    }
}

fn relative_to_root(observed: &str, root: &str) -> String {
    observed
        .strip_prefix(root)
        .map(|rel| rel.trim_start_matches(['\\', '/']).to_string())
        .unwrap_or_else(|| observed.to_string())
}
