//! Lock attribution via the Windows Restart Manager. Strictly read-only: the
//! service reports which processes hold a target open and never kills,
//! restarts, or signals any of them.
//!
//! The same confinement, reparse, and identity gates as the delete engine run
//! first, so attribution cannot be used to probe paths outside a root.

use crate::config::RootSet;
use crate::error::{ErrorCode, ToolError, ToolResult};
use crate::gates;
use crate::hazard::has_trailing_dot_or_space;
use crate::model::Confidence;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::json;
#[cfg(windows)]
use std::io;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoIsUsingRequest {
    pub finding_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionReport {
    pub finding_id: String,
    pub processes: Vec<LockingProcess>,
    pub confidence: Confidence,
    pub limitations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockingProcess {
    pub pid: u32,
    pub app_name: String,
    pub service_short_name: String,
    #[serde(rename = "type")]
    pub app_type: String,
    pub session_id: u32,
    pub restartable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Whether the attribution backend exists on this host.
#[cfg(windows)]
pub fn restart_manager_available() -> bool {
    true
}

#[cfg(not(windows))]
pub fn restart_manager_available() -> bool {
    false
}

pub fn who_is_using(
    req: &WhoIsUsingRequest,
    roots: &RootSet,
    store: &Store,
) -> ToolResult<AttributionReport> {
    let finding = store.finding(&req.finding_id).ok_or_else(|| {
        ToolError::new(ErrorCode::NotFound, "Finding not found.")
            .with_details(json!({ "findingId": req.finding_id }))
    })?;

    gates::confine_to_root(finding, roots)?;
    gates::deny_reparse(&finding.observed_path)?;
    gates::match_scan_identity(finding)?;

    // An absent backend is an advisory answer, never an error.
    if !restart_manager_available() {
        return Ok(AttributionReport {
            finding_id: finding.finding_id.clone(),
            processes: Vec::new(),
            confidence: Confidence::Low,
            limitations: vec![
                "Restart Manager (rstrtmgr.dll) is not available on this platform.".to_string(),
            ],
        });
    }

    let mut limitations = Vec::new();
    if has_trailing_dot_or_space(&finding.name) {
        limitations.push(
            "Target has trailing dot/space; Win32 path normalization may prevent \
             Restart Manager from identifying all lockers."
                .to_string(),
        );
    }

    let target = finding.observed_path.clone();
    let mut processes = query_file_lockers(&target).map_err(|err| {
        ToolError::new(ErrorCode::Internal, "Restart Manager query failed.")
            .with_details(json!({ "target": target, "rmError": err.raw_os_error() }))
    })?;

    // The exact on-disk name may be invisible to the normalized Win32 view.
    // Query the stripped sibling as a best-effort hint and tag every result.
    if processes.is_empty() && has_trailing_dot_or_space(&finding.name) {
        let normalized = target.trim_end_matches(['.', ' ']).to_string();
        if normalized != target {
            if let Ok(mut hints) = query_file_lockers(&normalized) {
                for hint in &mut hints {
                    hint.source = Some("normalized_path_hint".to_string());
                }
                if !hints.is_empty() {
                    limitations.push(
                        "Results are from a normalized-path hint query (trailing chars \
                         stripped). These processes may not hold the exact on-disk entry."
                            .to_string(),
                    );
                }
                processes = hints;
            }
        }
    }

    let confidence = match (processes.is_empty(), limitations.is_empty()) {
        (false, true) => Confidence::High,
        (false, false) => Confidence::Medium,
        (true, false) => Confidence::Low,
        (true, true) => Confidence::Medium,
    };

    Ok(AttributionReport {
        finding_id: finding.finding_id.clone(),
        processes,
        confidence,
        limitations,
    })
}

#[cfg(windows)]
fn query_file_lockers(path: &str) -> io::Result<Vec<LockingProcess>> {
    use crate::win_path;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SUCCESS};
    use windows_sys::Win32::System::RestartManager::{
        RmEndSession, RmGetList, RmRegisterResources, RmStartSession, CCH_RM_SESSION_KEY,
        RM_PROCESS_INFO,
    };

    struct RmSession(u32);
    impl Drop for RmSession {
        fn drop(&mut self) {
            // SAFETY: the handle came from a successful RmStartSession.
            unsafe { RmEndSession(self.0) };
        }
    }

    // Restart Manager wants the normal Win32 spelling, not the \\?\ form.
    let wide: Vec<u16> = std::ffi::OsStr::new(&win_path::safe_abspath(path))
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut handle: u32 = 0;
    let mut session_key = [0u16; CCH_RM_SESSION_KEY as usize + 1];
    // SAFETY: out-pointers reference locals that outlive the call and the
    // session key buffer has the documented capacity.
    let rc = unsafe { RmStartSession(&mut handle, 0, session_key.as_mut_ptr()) };
    if rc != ERROR_SUCCESS {
        return Err(io::Error::from_raw_os_error(rc as i32));
    }
    let session = RmSession(handle);

    let file_names = [wide.as_ptr()];
    // SAFETY: `file_names` points at one NUL-terminated wide string that
    // outlives the session; the application and service arrays are empty.
    let rc = unsafe {
        RmRegisterResources(
            session.0,
            1,
            file_names.as_ptr(),
            0,
            std::ptr::null(),
            0,
            std::ptr::null(),
        )
    };
    if rc != ERROR_SUCCESS {
        return Err(io::Error::from_raw_os_error(rc as i32));
    }

    let mut needed: u32 = 0;
    let mut count: u32 = 0;
    let mut reboot_reasons: u32 = 0;
    // SAFETY: sizing call; a null process array is documented for this mode.
    let rc = unsafe {
        RmGetList(
            session.0,
            &mut needed,
            &mut count,
            std::ptr::null_mut(),
            &mut reboot_reasons,
        )
    };
    if rc == ERROR_SUCCESS && needed == 0 {
        return Ok(Vec::new());
    }
    if rc != ERROR_SUCCESS && rc != ERROR_MORE_DATA {
        return Err(io::Error::from_raw_os_error(rc as i32));
    }

    let capacity = needed.max(1) as usize;
    // SAFETY: RM_PROCESS_INFO is plain old data; zeroed entries are valid.
    let mut buffer: Vec<RM_PROCESS_INFO> = vec![unsafe { std::mem::zeroed() }; capacity];
    count = capacity as u32;
    // SAFETY: `buffer` holds `count` writable entries for the whole call.
    let rc = unsafe {
        RmGetList(
            session.0,
            &mut needed,
            &mut count,
            buffer.as_mut_ptr(),
            &mut reboot_reasons,
        )
    };
    if rc != ERROR_SUCCESS {
        return Err(io::Error::from_raw_os_error(rc as i32));
    }

    Ok(buffer
        .iter()
        .take(count as usize)
        .map(locking_process)
        .collect())
}

#[cfg(not(windows))]
fn query_file_lockers(_path: &str) -> std::io::Result<Vec<LockingProcess>> {
    Ok(Vec::new())
}

#[cfg(windows)]
fn locking_process(
    info: &windows_sys::Win32::System::RestartManager::RM_PROCESS_INFO,
) -> LockingProcess {
    LockingProcess {
        pid: info.Process.dwProcessId,
        app_name: wide_to_string(&info.strAppName),
        service_short_name: wide_to_string(&info.strServiceShortName),
        app_type: app_type_name(info.ApplicationType),
        session_id: info.TSSessionId,
        restartable: info.bRestartable != 0,
        source: None,
    }
}

#[cfg(windows)]
fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[cfg(windows)]
fn app_type_name(app_type: i32) -> String {
    match app_type {
        0 => "unknown".to_string(),
        1 => "main_window".to_string(),
        2 => "other_window".to_string(),
        3 => "service".to_string(),
        4 => "explorer".to_string(),
        5 => "console".to_string(),
        6 => "critical".to_string(),
        other => format!("unknown_{other}"),
    }
}
