//! Error taxonomy shared by every tool: each failure mode has a stable code,
//! and handlers convert everything into the `{ok|error}` envelope. Nothing
//! escapes to the transport layer except protocol-level errors.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_NOT_FOUND")]
    NotFound,
    #[serde(rename = "E_ROOT_NOT_ALLOWED")]
    RootNotAllowed,
    #[serde(rename = "E_TRAVERSAL_REJECTED")]
    TraversalRejected,
    #[serde(rename = "E_REPARSE_POLICY_BLOCKED")]
    ReparsePolicyBlocked,
    #[serde(rename = "E_CONFIRM_TOKEN_INVALID")]
    ConfirmTokenInvalid,
    #[serde(rename = "E_CONFIRM_TOKEN_EXPIRED")]
    ConfirmTokenExpired,
    #[serde(rename = "E_CHANGED_SINCE_SCAN")]
    ChangedSinceScan,
    #[serde(rename = "E_DIR_NOT_EMPTY")]
    DirNotEmpty,
    #[serde(rename = "E_IN_USE")]
    InUse,
    #[serde(rename = "E_ACCESS_DENIED")]
    AccessDenied,
    #[serde(rename = "E_IO_ERROR")]
    IoError,
    #[serde(rename = "E_INVALID_REQUEST")]
    InvalidRequest,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "E_NOT_FOUND",
            ErrorCode::RootNotAllowed => "E_ROOT_NOT_ALLOWED",
            ErrorCode::TraversalRejected => "E_TRAVERSAL_REJECTED",
            ErrorCode::ReparsePolicyBlocked => "E_REPARSE_POLICY_BLOCKED",
            ErrorCode::ConfirmTokenInvalid => "E_CONFIRM_TOKEN_INVALID",
            ErrorCode::ConfirmTokenExpired => "E_CONFIRM_TOKEN_EXPIRED",
            ErrorCode::ChangedSinceScan => "E_CHANGED_SINCE_SCAN",
            ErrorCode::DirNotEmpty => "E_DIR_NOT_EMPTY",
            ErrorCode::InUse => "E_IN_USE",
            ErrorCode::AccessDenied => "E_ACCESS_DENIED",
            ErrorCode::IoError => "E_IO_ERROR",
            ErrorCode::InvalidRequest => "E_INVALID_REQUEST",
            ErrorCode::Internal => "E_INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured tool failure. Serializes as the `error` half of the result
/// envelope: `{code, message, details, nextSteps}`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    #[serde(rename = "nextSteps")]
    pub next_steps: Vec<Value>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Value::Object(serde_json::Map::new()),
            next_steps: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_next_steps(mut self, steps: Vec<Value>) -> Self {
        self.next_steps = steps;
        self
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

pub type ToolResult<T> = std::result::Result<T, ToolError>;
