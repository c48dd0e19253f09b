//! JSON-RPC 2.0 dispatch: one request per line in, one response per line out.
//! Handler failures become `{ok:false, error}` envelopes; only protocol-level
//! problems (-32700, -32601) surface as JSON-RPC errors.

use nullout_core::config::{self, RootSet};
use nullout_core::delete::{delete_entry, DeleteRequest};
use nullout_core::error::{ErrorCode, ToolError};
use nullout_core::plan::{plan_cleanup, PlanRequest};
use nullout_core::restart::{restart_manager_available, who_is_using, WhoIsUsingRequest};
use nullout_core::scan::{scan_reserved_names, ScanRequest};
use nullout_core::store::Store;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct NullOutService {
    roots: RootSet,
    store: Store,
    secret: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetFindingRequest {
    finding_id: String,
}

impl NullOutService {
    pub fn new(roots: RootSet, secret: Vec<u8>) -> Self {
        Self {
            roots,
            store: Store::new(),
            secret,
        }
    }

    /// Handle one newline-framed request, returning the serialized response.
    pub fn handle_line(&mut self, line: &str) -> String {
        let req: RpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(_) => {
                return to_json(&json!({
                    "jsonrpc": "2.0",
                    "id": Value::Null,
                    "error": { "code": -32700, "message": "Parse error" },
                }));
            }
        };
        let response = match self.rpc_result(&req.method, req.params) {
            Some(result) => json!({ "jsonrpc": "2.0", "id": req.id, "result": result }),
            None => json!({
                "jsonrpc": "2.0",
                "id": req.id,
                "error": { "code": -32601, "message": format!("Method not found: {}", req.method) },
            }),
        };
        to_json(&response)
    }

    fn rpc_result(&mut self, method: &str, params: Value) -> Option<Value> {
        if method == "tools/list" {
            return Some(json!({ "tools": tool_catalog() }));
        }
        let result = match method {
            "list_allowed_roots" => envelope(Ok(config::list_allowed_roots(&self.roots))),
            "scan_reserved_names" => envelope(parse_params(params).and_then(
                |req: ScanRequest| scan_reserved_names(&req, &self.roots, &mut self.store),
            )),
            "get_finding" => envelope(
                parse_params(params).and_then(|req: GetFindingRequest| self.get_finding(&req)),
            ),
            "plan_cleanup" => envelope(parse_params(params).and_then(|req: PlanRequest| {
                plan_cleanup(&req, &mut self.store, &self.secret)
            })),
            "delete_entry" => envelope(parse_params(params).and_then(|req: DeleteRequest| {
                delete_entry(&req, &self.roots, &self.store, &self.secret)
            })),
            "who_is_using" => envelope(parse_params(params).and_then(
                |req: WhoIsUsingRequest| who_is_using(&req, &self.roots, &self.store),
            )),
            "get_server_info" => envelope(Ok(server_info())),
            _ => return None,
        };
        Some(result)
    }

    fn get_finding(&self, req: &GetFindingRequest) -> Result<Value, ToolError> {
        let finding = self.store.finding(&req.finding_id).ok_or_else(|| {
            ToolError::new(ErrorCode::NotFound, "Finding not found.")
                .with_details(json!({ "findingId": req.finding_id }))
        })?;
        Ok(json!({ "finding": finding }))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|err| {
        ToolError::new(
            ErrorCode::InvalidRequest,
            format!("Invalid parameters: {err}"),
        )
    })
}

fn envelope<T: serde::Serialize>(outcome: Result<T, ToolError>) -> Value {
    let serialized = outcome.and_then(|report| {
        serde_json::to_value(report).map_err(|err| {
            ToolError::new(ErrorCode::Internal, "Failed to serialize result.")
                .with_details(json!({ "error": err.to_string() }))
        })
    });
    match serialized {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(err) => json!({ "ok": false, "error": err }),
    }
}

fn to_json(value: &Value) -> String {
    serde_json::to_string(value).expect("JSON value serializes")
}

fn server_info() -> Value {
    json!({
        "name": "nullout",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": "win32",
        "registryName": "io.github.mcp-tool-shop/nullout",
        "policies": {
            "reparsePolicy": config::REPARSE_POLICY,
            "deletePolicy": config::DELETE_POLICY,
            "tokenTtlSeconds": config::TOKEN_TTL_SECONDS,
        },
        "capabilities": { "restartManager": restart_manager_available() },
    })
}

fn tool_catalog() -> Value {
    json!([
        {
            "name": "list_allowed_roots",
            "description": "List allowlisted roots. Windows-only. Reparse policy: deny_all.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false },
            "annotations": { "readOnlyHint": true },
        },
        {
            "name": "scan_reserved_names",
            "description": "Scan an allowlisted root for reserved-device / Win32-hostile entries. Does not traverse reparse points (deny_all).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "rootId": { "type": "string" },
                    "recursive": { "type": "boolean" },
                    "maxDepth": { "type": "integer", "minimum": 0 },
                    "includeDirs": { "type": "boolean" },
                },
                "required": ["rootId", "recursive", "includeDirs"],
                "additionalProperties": false,
            },
            "annotations": { "readOnlyHint": true },
        },
        {
            "name": "get_finding",
            "description": "Return full details for a findingId returned by scan.",
            "inputSchema": {
                "type": "object",
                "properties": { "findingId": { "type": "string" } },
                "required": ["findingId"],
                "additionalProperties": false,
            },
            "annotations": { "readOnlyHint": true },
        },
        {
            "name": "plan_cleanup",
            "description": "Create an explicit plan and per-entry confirmToken (TTL) bound to finding identity (volumeSerial+fileId) and strategy.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "findingIds": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                    "requestedActions": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["DELETE"] },
                        "minItems": 1,
                    },
                },
                "required": ["findingIds", "requestedActions"],
                "additionalProperties": false,
            },
            "annotations": { "readOnlyHint": true },
        },
        {
            "name": "delete_entry",
            "description": "Delete a file or an EMPTY directory only. Requires confirmToken. No raw paths accepted.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "findingId": { "type": "string" },
                    "confirmToken": { "type": "string" },
                },
                "required": ["findingId", "confirmToken"],
                "additionalProperties": false,
            },
            "annotations": { "destructiveHint": true },
        },
        {
            "name": "who_is_using",
            "description": "List processes currently using the target via Windows Restart Manager. Read-only — never kills processes.",
            "inputSchema": {
                "type": "object",
                "properties": { "findingId": { "type": "string" } },
                "required": ["findingId"],
                "additionalProperties": false,
            },
            "annotations": { "readOnlyHint": true },
        },
        {
            "name": "get_server_info",
            "description": "Server metadata: name, version, platform, policies, and capabilities.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false },
            "annotations": { "readOnlyHint": true },
        },
    ])
}
