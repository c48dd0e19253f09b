//! The destructive state machine: verify -> confine -> deny-reparse ->
//! re-identify -> empty-check -> unlink. Each gate owns a distinct error
//! code; any failure is terminal and the caller must re-plan, since the
//! target's identity or state may have changed.

use crate::config::{RootSet, DELETE_STRATEGY};
use crate::error::{ErrorCode, ToolError, ToolResult};
use crate::gates;
use crate::model::{EntryType, Finding};
use crate::plan::confirm_claims_for;
use crate::store::Store;
use crate::token::{verify_confirm_token, ConfirmClaims, TokenError};
use crate::win_path;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;
use std::time::Instant;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub finding_id: String,
    pub confirm_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub finding_id: String,
    pub deleted: bool,
    pub strategy: &'static str,
    pub entry_type: EntryType,
    pub telemetry: DeleteTelemetry,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTelemetry {
    pub duration_ms: u64,
    pub used_extended_namespace: bool,
}

pub fn delete_entry(
    req: &DeleteRequest,
    roots: &RootSet,
    store: &Store,
    secret: &[u8],
) -> ToolResult<DeleteReport> {
    // Gate 1: the finding must exist.
    let finding = store.finding(&req.finding_id).ok_or_else(|| {
        ToolError::new(ErrorCode::NotFound, "Finding not found.")
            .with_details(json!({ "findingId": req.finding_id }))
    })?;

    // Gate 2: the token must carry a valid, unexpired signature.
    let claims = verify_confirm_token(&req.confirm_token, secret).map_err(|err| match err {
        TokenError::Expired => {
            ToolError::new(ErrorCode::ConfirmTokenExpired, "Confirmation token expired.")
                .with_details(json!({ "findingId": req.finding_id }))
        }
        TokenError::Malformed | TokenError::BadSignature => {
            ToolError::new(ErrorCode::ConfirmTokenInvalid, "Confirmation token invalid.")
                .with_details(json!({ "findingId": req.finding_id }))
        }
    })?;

    // Gate 3: every binding in the token must match the finding as stored.
    check_bindings(&claims, finding)?;

    // Gate 4: root confinement.
    gates::confine_to_root(finding, roots)?;

    // Gate 5: deny_all reparse policy, probed live.
    gates::deny_reparse(&finding.observed_path)?;

    // Gate 6: live identity must equal the identity captured at scan time.
    gates::match_scan_identity(finding)?;

    // Gate 7: directories must be empty.
    if finding.entry_type == EntryType::Dir {
        ensure_dir_empty(&finding.observed_path)?;
    }

    // Gate 8: unlink through the extended namespace.
    let target = win_path::addressable(&finding.observed_path);
    let started = Instant::now();
    match finding.entry_type {
        EntryType::Dir => std::fs::remove_dir(&target),
        EntryType::File => std::fs::remove_file(&target),
    }
    .map_err(|err| translate_unlink_error(&err, finding))?;
    let duration_ms = started.elapsed().as_millis() as u64;

    log::info!(
        "deleted {} ({})",
        finding.observed_path,
        finding.entry_type.as_str()
    );

    Ok(DeleteReport {
        finding_id: finding.finding_id.clone(),
        deleted: true,
        strategy: DELETE_STRATEGY,
        entry_type: finding.entry_type,
        telemetry: DeleteTelemetry {
            duration_ms,
            used_extended_namespace: true,
        },
        warnings: Vec::new(),
    })
}

fn check_bindings(claims: &ConfirmClaims, finding: &Finding) -> Result<(), ToolError> {
    let expected = confirm_claims_for(finding, claims.exp);
    let fields: [(&str, bool); 7] = [
        ("findingId", claims.finding_id == expected.finding_id),
        ("rootId", claims.root_id == expected.root_id),
        ("scanId", claims.scan_id == expected.scan_id),
        ("volumeSerial", claims.volume_serial == expected.volume_serial),
        ("fileId", claims.file_id == expected.file_id),
        ("strategy", claims.strategy == expected.strategy),
        ("reparsePolicy", claims.reparse_policy == expected.reparse_policy),
    ];
    for (field, matches) in fields {
        if !matches {
            return Err(ToolError::new(
                ErrorCode::ConfirmTokenInvalid,
                format!("Token binding mismatch on '{field}'."),
            )
            .with_details(json!({ "findingId": finding.finding_id, "field": field })));
        }
    }
    Ok(())
}

fn ensure_dir_empty(observed: &str) -> Result<(), ToolError> {
    let mut entries = match std::fs::read_dir(win_path::addressable(observed)) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            return Err(ToolError::new(
                ErrorCode::AccessDenied,
                "Access denied while checking directory contents.",
            )
            .with_details(json!({ "target": observed })));
        }
        Err(err) => {
            return Err(ToolError::new(
                ErrorCode::Internal,
                "Failed to enumerate directory contents.",
            )
            .with_details(json!({ "target": observed, "error": err.to_string() })));
        }
    };
    if entries.next().is_some() {
        return Err(ToolError::new(
            ErrorCode::DirNotEmpty,
            "Directory is not empty; v1 only deletes empty directories.",
        )
        .with_details(json!({ "target": observed })));
    }
    Ok(())
}

fn translate_unlink_error(err: &io::Error, finding: &Finding) -> ToolError {
    let target = &finding.observed_path;

    #[cfg(windows)]
    {
        // Win32: 32 sharing violation, 23/1117/1392 media or corruption
        // classes, 145 directory not empty.
        match err.raw_os_error() {
            Some(32) => {
                return ToolError::new(ErrorCode::InUse, "Target is in use by another process.")
                    .with_details(json!({
                        "target": target,
                        "strategy": DELETE_STRATEGY,
                        "win32LastError": 32,
                    }))
                    .with_next_steps(vec![json!({
                        "action": "WHO_IS_USING",
                        "tool": "who_is_using",
                        "args": { "findingId": finding.finding_id },
                    })]);
            }
            Some(code @ (23 | 1117 | 1392)) => {
                return ToolError::new(ErrorCode::IoError, "I/O error or corruption suspected.")
                    .with_details(json!({ "target": target, "win32LastError": code }));
            }
            Some(145) => {
                return ToolError::new(ErrorCode::DirNotEmpty, "Directory is not empty.")
                    .with_details(json!({ "target": target, "win32LastError": 145 }));
            }
            _ => {}
        }
    }

    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(libc::ENOTEMPTY) {
            return ToolError::new(ErrorCode::DirNotEmpty, "Directory is not empty.")
                .with_details(json!({ "target": target, "errno": libc::ENOTEMPTY }));
        }
    }

    if err.kind() == io::ErrorKind::PermissionDenied {
        return ToolError::new(ErrorCode::AccessDenied, "Access denied while deleting target.")
            .with_details(json!({ "target": target, "strategy": DELETE_STRATEGY }));
    }

    ToolError::new(ErrorCode::Internal, "Delete failed.").with_details(json!({
        "target": target,
        "error": err.to_string(),
        "osError": err.raw_os_error(),
    }))
}
