//! JSON-RPC 2.0 framing for the engine's stdin/stdout channel.
//!
//! One request or response per line. Requests carry a numeric id; responses
//! carry either `result` or `error`.
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const REPO_SETUP_ERROR: i64 = -32000;
pub const OPERATION_ERROR: i64 = -32001;
pub const SERVICE_NOT_AVAILABLE: i64 = -32002;
pub const MISSING_DEPENDENCY: i64 = -32003;
pub const PARAMETER_ERROR: i64 = -32004;

/// Codes that reject the request itself; resending it unchanged cannot succeed.
pub fn is_validation_code(code: i64) -> bool {
    matches!(
        code,
        INVALID_REQUEST | METHOD_NOT_FOUND | INVALID_PARAMS | PARAMETER_ERROR
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    /// Null when the engine could not parse the request line at all.
    #[serde(default)]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// `data` flattened to text; the engine sends the exception class name.
    pub fn data_text(&self) -> Option<String> {
        match &self.data {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}
