//! Plan engine: fan findings out into plan entries, each carrying a freshly
//! minted confirm token. The plan itself is never persisted; it is a view
//! over the tokens.

use crate::config::{DELETE_STRATEGY, REPARSE_POLICY, TOKEN_TTL_SECONDS};
use crate::error::{ErrorCode, ToolError, ToolResult};
use crate::model::Finding;
use crate::store::Store;
use crate::token::{mint_confirm_token, ConfirmClaims};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub finding_ids: Vec<String>,
    pub requested_actions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub plan_id: String,
    pub expires_utc: String,
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub finding_id: String,
    pub action: &'static str,
    pub strategy: &'static str,
    pub confirm_token: String,
    /// Token bindings echoed for human review.
    pub bindings: Bindings,
    pub risk_notes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bindings {
    pub root_id: String,
    pub scan_id: String,
    pub volume_serial: Option<String>,
    pub file_id: Option<String>,
    pub strategy: String,
    pub reparse_policy: String,
}

/// The claims a token for this finding must carry. Shared with the delete
/// engine's binding check so both sides always agree on the tuple.
pub fn confirm_claims_for(finding: &Finding, exp: i64) -> ConfirmClaims {
    let identity = finding.evidence.identity.as_ref();
    ConfirmClaims {
        finding_id: finding.finding_id.clone(),
        root_id: finding.root_id.clone(),
        scan_id: finding.scan_id.clone(),
        volume_serial: identity.map(|i| i.volume_serial.clone()),
        file_id: identity.map(|i| i.file_id.clone()),
        strategy: DELETE_STRATEGY.to_string(),
        reparse_policy: REPARSE_POLICY.to_string(),
        exp,
    }
}

pub fn plan_cleanup(req: &PlanRequest, store: &mut Store, secret: &[u8]) -> ToolResult<PlanReport> {
    if !req.requested_actions.iter().any(|a| a == "DELETE") {
        return Err(ToolError::new(
            ErrorCode::InvalidRequest,
            "Only DELETE is supported in v1.",
        ));
    }

    // Resolve every finding up front so an unknown id fails the whole plan.
    let mut targets = Vec::with_capacity(req.finding_ids.len());
    for finding_id in &req.finding_ids {
        let finding = store.finding(finding_id).ok_or_else(|| {
            ToolError::new(ErrorCode::NotFound, "Finding not found.")
                .with_details(json!({ "findingId": finding_id }))
        })?;
        targets.push(finding.clone());
    }

    let exp = Utc::now().timestamp() + TOKEN_TTL_SECONDS;
    let entries = targets
        .iter()
        .map(|finding| {
            let claims = confirm_claims_for(finding, exp);
            let confirm_token = mint_confirm_token(&claims, secret);
            PlanEntry {
                finding_id: finding.finding_id.clone(),
                action: "DELETE",
                strategy: DELETE_STRATEGY,
                confirm_token,
                bindings: Bindings {
                    root_id: claims.root_id,
                    scan_id: claims.scan_id,
                    volume_serial: claims.volume_serial,
                    file_id: claims.file_id,
                    strategy: claims.strategy,
                    reparse_policy: claims.reparse_policy,
                },
                risk_notes: vec![
                    "Windows reserved-name / Win32-hostile entry; delete will use extended namespace."
                        .to_string(),
                ],
            }
        })
        .collect();

    Ok(PlanReport {
        plan_id: store.mint_id("plan"),
        expires_utc: format_expiry(exp),
        entries,
    })
}

fn format_expiry(exp: i64) -> String {
    DateTime::<Utc>::from_timestamp(exp, 0)
        .map(|ts| ts.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}
