//! Hazard classification: reserved device basenames, trailing dot/space,
//! legacy path-length overflow, and reparse presence. Pure functions only.

use crate::model::{Confidence, Hazard, HazardCode, Severity};
use crate::win_path::MAX_PATH_LEGACY;

/// Device basenames the Win32 name parser claims for itself, with or without
/// an extension. The check is case-insensitive.
pub const RESERVED_BASENAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Split a filename at the first dot: `"NUL.tar.gz"` -> `("NUL", ".tar.gz")`,
/// `"README"` -> `("README", "")`.
pub fn parse_basename(name: &str) -> (&str, &str) {
    match name.find('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

pub fn is_reserved_device_name(name: &str) -> bool {
    let (base, _) = parse_basename(name);
    let upper = base.to_ascii_uppercase();
    RESERVED_BASENAMES.contains(&upper.as_str())
}

/// Win32 full-path routines normalize these away, which makes such entries
/// unreachable through ordinary tooling.
pub fn has_trailing_dot_or_space(name: &str) -> bool {
    name.ends_with(' ') || name.ends_with('.')
}

/// Classify an entry name. For reparse points no further name analysis is
/// meaningful; the reparse hazard stands alone.
pub fn classify(name: &str, canonical_len: usize, is_reparse: bool) -> Vec<Hazard> {
    let mut hazards = Vec::new();

    if is_reparse {
        hazards.push(Hazard {
            code: HazardCode::ReparsePointPresent,
            severity: Severity::High,
            confidence: Confidence::High,
        });
        return hazards;
    }

    if is_reserved_device_name(name) {
        hazards.push(Hazard {
            code: HazardCode::ReservedDeviceBasename,
            severity: Severity::High,
            confidence: Confidence::High,
        });
    }

    if has_trailing_dot_or_space(name) {
        hazards.push(Hazard {
            code: HazardCode::TrailingDotSpace,
            severity: Severity::Medium,
            confidence: Confidence::High,
        });
    }

    if canonical_len > MAX_PATH_LEGACY {
        hazards.push(Hazard {
            code: HazardCode::PathTooLong,
            severity: Severity::Medium,
            confidence: Confidence::High,
        });
    }

    hazards
}
