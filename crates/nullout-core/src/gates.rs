//! Safety gates shared by the destructive and attribution paths. Every gate
//! re-derives its answer from live state; no gate result is ever cached.

use crate::config::{Root, RootSet};
use crate::error::{ErrorCode, ToolError};
use crate::model::{EntryIdentity, Finding};
use crate::win_ident::{self, IdentityError};
use crate::win_path;
use serde_json::json;

/// The finding's root must still be allowlisted and the observed path must
/// still resolve under it.
pub(crate) fn confine_to_root<'a>(
    finding: &Finding,
    roots: &'a RootSet,
) -> Result<&'a Root, ToolError> {
    let root = roots.get(&finding.root_id).ok_or_else(|| {
        ToolError::new(ErrorCode::RootNotAllowed, "Root not allowlisted.")
            .with_details(json!({ "rootId": finding.root_id }))
    })?;
    if !win_path::is_under_root(&finding.observed_path, &root.path) {
        return Err(ToolError::new(
            ErrorCode::TraversalRejected,
            "Target escapes allowlisted root.",
        )
        .with_details(json!({ "target": finding.observed_path, "root": root.path })));
    }
    Ok(root)
}

/// deny_all: a live reparse attribute on the target aborts the operation.
pub(crate) fn deny_reparse(target: &str) -> Result<(), ToolError> {
    if win_path::is_reparse_point(target) {
        return Err(ToolError::new(
            ErrorCode::ReparsePolicyBlocked,
            "Reparse points are blocked by policy (deny_all).",
        )
        .with_details(json!({ "target": target })));
    }
    Ok(())
}

/// The live (volume serial, file id) must equal the identity captured at scan
/// time; anything else means the entry was swapped out underneath us.
pub(crate) fn match_scan_identity(finding: &Finding) -> Result<EntryIdentity, ToolError> {
    let live = match win_ident::probe_identity(&finding.observed_path) {
        Ok(identity) => identity,
        Err(IdentityError::NotFound) => {
            return Err(
                ToolError::new(ErrorCode::NotFound, "Target no longer exists.")
                    .with_details(json!({ "target": finding.observed_path })),
            );
        }
        Err(err) => {
            return Err(ToolError::new(
                ErrorCode::Internal,
                "Failed to open target for identity verification.",
            )
            .with_details(json!({ "target": finding.observed_path, "error": err.to_string() })));
        }
    };

    let matches = finding.evidence.identity.as_ref().is_some_and(|stored| {
        stored.volume_serial == live.volume_serial && stored.file_id == live.file_id
    });
    if !matches {
        return Err(ToolError::new(
            ErrorCode::ChangedSinceScan,
            "Target changed since scan (identity mismatch).",
        )
        .with_details(json!({
            "target": finding.observed_path,
            "expected": finding.evidence.identity,
            "observed": { "volumeSerial": live.volume_serial, "fileId": live.file_id },
        })));
    }
    Ok(live)
}
