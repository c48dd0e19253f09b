//! Data model: findings, hazards, and the evidence captured for each entry.
//!
//! A `Finding` is created by the scan engine and never mutated afterward; its
//! stored identity is the anchor every later destructive decision checks
//! against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Dir => "dir",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardCode {
    #[serde(rename = "REPARSE_POINT_PRESENT")]
    ReparsePointPresent,
    #[serde(rename = "WIN_RESERVED_DEVICE_BASENAME")]
    ReservedDeviceBasename,
    #[serde(rename = "WIN_TRAILING_DOT_SPACE")]
    TrailingDotSpace,
    #[serde(rename = "WIN_PATH_TOO_LONG")]
    PathTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hazard {
    pub code: HazardCode,
    pub severity: Severity,
    pub confidence: Confidence,
}

/// The (volume serial, file id) pair naming an entry on this host. Captured
/// once at scan time and compared live before anything destructive runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryIdentity {
    pub volume_serial: String,
    pub file_id: String,
    pub fingerprint_version: u32,
}

impl EntryIdentity {
    pub fn new(volume_serial: String, file_id: String) -> Self {
        Self {
            volume_serial,
            file_id,
            fingerprint_version: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsEvidence {
    pub exists_at_scan: bool,
    pub size_bytes: Option<u64>,
    pub attributes: Vec<String>,
    pub is_directory: bool,
    pub is_reparse_point: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Win32Evidence {
    pub requires_extended_path: bool,
    pub has_trailing_dot_or_space: bool,
    pub exceeds_max_path_legacy: bool,
    pub is_unc_path: bool,
    pub is_device_path: bool,
    pub is_ads_suspected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub fs: FsEvidence,
    pub win32: Win32Evidence,
    /// Null when the identity probe failed at scan time; a delete against such
    /// a finding can never pass the live identity gate.
    pub identity: Option<EntryIdentity>,
}

/// A single hazardous entry discovered by a scan, with all evidence gathered
/// about it. `observed_path` preserves trailing dots/spaces exactly as they
/// are on disk; `canonical_path` is the addressable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub finding_id: String,
    pub root_id: String,
    pub scan_id: String,
    pub relative_path: String,
    pub observed_path: String,
    pub canonical_path: String,
    pub entry_type: EntryType,
    pub name: String,
    pub base_name: String,
    pub extension: String,
    pub hazards: Vec<Hazard>,
    pub evidence: Evidence,
}
