//! Shared fixtures: a temp allowlisted root plus helpers that create entries
//! through the addressable namespace, so hostile names survive on Windows.

#![allow(dead_code)]

use nullout_core::config::{Root, RootSet};
use nullout_core::model::{
    Confidence, EntryType, Evidence, Finding, FsEvidence, Hazard, HazardCode, Severity,
    Win32Evidence,
};
use nullout_core::plan::{plan_cleanup, PlanRequest};
use nullout_core::scan::{scan_reserved_names, ScanReport, ScanRequest};
use nullout_core::store::Store;
use nullout_core::win_ident;
use nullout_core::win_path;
use std::path::Path;
use tempfile::TempDir;

pub const TEST_SECRET: &[u8] = b"test-secret-do-not-use-in-production";

pub struct TestRoot {
    pub dir: TempDir,
    pub root_id: String,
    pub roots: RootSet,
}

pub fn test_root() -> TestRoot {
    let dir = tempfile::tempdir().expect("temp root");
    let path = dir.path().to_string_lossy().into_owned();
    let root_id = "root_test".to_string();
    let mut roots = RootSet::default();
    roots.insert(Root {
        root_id: root_id.clone(),
        display_name: "Test".to_string(),
        path,
    });
    TestRoot {
        dir,
        root_id,
        roots,
    }
}

impl TestRoot {
    pub fn path(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn join(&self, name: &str) -> String {
        let sep = std::path::MAIN_SEPARATOR;
        format!("{}{sep}{name}", self.path().trim_end_matches(sep))
    }
}

impl Drop for TestRoot {
    fn drop(&mut self) {
        // TempDir cleanup uses normal paths, which cannot see trailing
        // dot/space leftovers on Windows; scrub those first.
        scrub(&self.path());
    }
}

pub fn create_file(observed: &str, contents: &str) {
    std::fs::write(win_path::addressable(observed), contents).expect("create fixture file");
}

pub fn create_dir(observed: &str) {
    std::fs::create_dir_all(win_path::addressable(observed)).expect("create fixture dir");
}

pub fn exists(observed: &str) -> bool {
    std::fs::symlink_metadata(win_path::addressable(observed)).is_ok()
}

/// Remove everything under `dir` through the addressable namespace, ignoring
/// errors. No-op where normal deletion already works.
#[cfg(windows)]
pub fn scrub(dir: &str) {
    let Ok(entries) = std::fs::read_dir(win_path::addressable(dir)) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let sep = std::path::MAIN_SEPARATOR;
        let child = format!("{}{sep}{name}", dir.trim_end_matches(sep));
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            scrub(&child);
            let _ = std::fs::remove_dir(win_path::addressable(&child));
        } else if std::fs::remove_file(win_path::addressable(&child)).is_err() {
            // Junctions enumerate as non-directories but unlink like
            // directories.
            let _ = std::fs::remove_dir(win_path::addressable(&child));
        }
    }
}

#[cfg(not(windows))]
pub fn scrub(_dir: &str) {}

pub fn scan_all(root: &TestRoot, store: &mut Store) -> ScanReport {
    scan_reserved_names(
        &ScanRequest {
            root_id: root.root_id.clone(),
            recursive: true,
            max_depth: 50,
            include_dirs: true,
        },
        &root.roots,
        store,
    )
    .expect("scan")
}

/// Plan a single-finding DELETE and return its confirm token.
pub fn plan_token(store: &mut Store, finding_id: &str) -> String {
    let plan = plan_cleanup(
        &PlanRequest {
            finding_ids: vec![finding_id.to_string()],
            requested_actions: vec!["DELETE".to_string()],
        },
        store,
        TEST_SECRET,
    )
    .expect("plan");
    plan.entries[0].confirm_token.clone()
}

/// Build a finding by hand (the way the scan engine would) for targets the
/// scan cannot produce, like traversal escapes.
pub fn synthetic_finding(
    store: &mut Store,
    root_id: &str,
    observed: &str,
    entry_type: EntryType,
) -> Finding {
    let name = Path::new(observed)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let identity = win_ident::probe_identity(observed).ok();
    let finding = Finding {
        finding_id: store.mint_id("fnd"),
        root_id: root_id.to_string(),
        scan_id: "scan_test".to_string(),
        relative_path: name.clone(),
        observed_path: observed.to_string(),
        canonical_path: win_path::canonical_form(observed),
        entry_type,
        name: name.clone(),
        base_name: name.clone(),
        extension: String::new(),
        hazards: vec![Hazard {
            code: HazardCode::TrailingDotSpace,
            severity: Severity::Medium,
            confidence: Confidence::High,
        }],
        evidence: Evidence {
            fs: FsEvidence {
                exists_at_scan: true,
                size_bytes: None,
                attributes: Vec::new(),
                is_directory: entry_type == EntryType::Dir,
                is_reparse_point: false,
            },
            win32: Win32Evidence {
                requires_extended_path: true,
                has_trailing_dot_or_space: false,
                exceeds_max_path_legacy: false,
                is_unc_path: false,
                is_device_path: false,
                is_ads_suspected: false,
            },
            identity,
        },
    };
    store.insert_finding(finding.clone());
    finding
}
