//! Token-gate coverage for the delete state machine: tampering, expiry, and
//! binding mismatches, each mapped to its own terminal error code.

mod common;

use common::*;
use nullout_core::delete::{delete_entry, DeleteRequest};
use nullout_core::error::ErrorCode;
use nullout_core::plan::confirm_claims_for;
use nullout_core::store::Store;
use nullout_core::token::mint_confirm_token;
use std::time::{SystemTime, UNIX_EPOCH};

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}

fn try_delete(
    root: &TestRoot,
    store: &Store,
    finding_id: &str,
    token: String,
) -> nullout_core::error::ToolError {
    delete_entry(
        &DeleteRequest {
            finding_id: finding_id.to_string(),
            confirm_token: token,
        },
        &root.roots,
        store,
        TEST_SECRET,
    )
    .expect_err("delete must be rejected")
}

#[test]
fn unknown_finding_is_rejected_before_token_checks() {
    let root = test_root();
    let store = Store::new();
    let err = try_delete(&root, &store, "fnd_missing", "junk".to_string());
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn tampered_token_is_rejected() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("victim.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];
    let token = plan_token(&mut store, &finding.finding_id);

    let mid = token.len() / 2;
    let mut chars: Vec<char> = token.chars().collect();
    chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    let err = try_delete(&root, &store, &finding.finding_id, tampered);
    assert_eq!(err.code, ErrorCode::ConfirmTokenInvalid);
    assert!(exists(&target));
}

#[test]
fn expired_token_is_rejected() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("stale.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];

    let claims = confirm_claims_for(finding, now() - 10);
    let token = mint_confirm_token(&claims, TEST_SECRET);

    let err = try_delete(&root, &store, &finding.finding_id, token);
    assert_eq!(err.code, ErrorCode::ConfirmTokenExpired);
    assert!(exists(&target));
}

#[test]
fn token_for_another_finding_names_the_mismatched_field() {
    let root = test_root();
    let mut store = Store::new();
    create_file(&root.join("first."), "a");
    create_file(&root.join("second."), "b");

    let report = scan_all(&root, &mut store);
    assert_eq!(report.findings.len(), 2);
    let first = &report.findings[0];
    let second = &report.findings[1];

    let token_for_first = plan_token(&mut store, &first.finding_id);
    let err = try_delete(&root, &store, &second.finding_id, token_for_first);
    assert_eq!(err.code, ErrorCode::ConfirmTokenInvalid);
    assert!(err.message.contains("findingId"));
}

#[test]
fn altered_scan_binding_is_rejected() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("bound.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];

    let mut claims = confirm_claims_for(finding, now() + 300);
    claims.scan_id = "scan_forged".to_string();
    let token = mint_confirm_token(&claims, TEST_SECRET);

    let err = try_delete(&root, &store, &finding.finding_id, token);
    assert_eq!(err.code, ErrorCode::ConfirmTokenInvalid);
    assert!(err.message.contains("scanId"));
    assert_eq!(err.details["field"], "scanId");
}

#[test]
fn altered_strategy_binding_is_rejected() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("strat.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];

    let mut claims = confirm_claims_for(finding, now() + 300);
    claims.strategy = "WIN_SHELL_DELETE".to_string();
    let token = mint_confirm_token(&claims, TEST_SECRET);

    let err = try_delete(&root, &store, &finding.finding_id, token);
    assert_eq!(err.code, ErrorCode::ConfirmTokenInvalid);
    assert!(err.message.contains("strategy"));
}

#[test]
fn altered_identity_binding_is_rejected() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("ident.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];

    let mut claims = confirm_claims_for(finding, now() + 300);
    claims.file_id = Some("0xDEADBEEFDEADBEEF".to_string());
    let token = mint_confirm_token(&claims, TEST_SECRET);

    let err = try_delete(&root, &store, &finding.finding_id, token);
    assert_eq!(err.code, ErrorCode::ConfirmTokenInvalid);
    assert!(err.message.contains("fileId"));
    assert!(exists(&target));
}

#[test]
fn expiry_is_checked_before_bindings() {
    let root = test_root();
    let mut store = Store::new();
    let target = root.join("order.");
    create_file(&target, "x");

    let report = scan_all(&root, &mut store);
    let finding = &report.findings[0];

    // Expired AND mis-bound: expiry must win.
    let mut claims = confirm_claims_for(finding, now() - 10);
    claims.scan_id = "scan_forged".to_string();
    let token = mint_confirm_token(&claims, TEST_SECRET);

    let err = try_delete(&root, &store, &finding.finding_id, token);
    assert_eq!(err.code, ErrorCode::ConfirmTokenExpired);
}
