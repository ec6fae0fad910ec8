use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API version pinned on batch envelopes so the server does not warn.
pub const API_VERSION: &str = "2.253";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    /// Positional `[args, options]`.
    pub params: Value,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One command inside a `batch` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubRequest {
    pub method: String,
    pub params: Value,
}

impl SubRequest {
    pub fn new(method: &str, args: Value, options: Value) -> Self {
        Self {
            method: method.to_string(),
            params: Value::Array(vec![args, options]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEnvelope {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// Per-command outcome of a batch, parallel to the submitted sub-requests.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub count: usize,
    pub results: Vec<Result<Value, String>>,
}

impl BatchResult {
    pub(crate) fn from_envelope(envelope: BatchEnvelope) -> Self {
        let results = envelope
            .results
            .into_iter()
            .map(|item| match item.get("error") {
                None | Some(Value::Null) => Ok(item),
                Some(Value::String(message)) => Err(message.clone()),
                Some(other) => Err(other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string())),
            })
            .collect();

        Self {
            count: envelope.count,
            results,
        }
    }
}

/// Group attributes as returned by `group_show`. Every attribute is multi-valued.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GroupRecord {
    #[serde(default)]
    pub cn: Vec<String>,
    #[serde(default)]
    pub membermanager_user: Vec<String>,
    #[serde(default)]
    pub membermanager_group: Vec<String>,
    #[serde(default)]
    pub member_user: Vec<String>,
}

/// Reads the `count` field of a `user_find` result.
pub fn find_count(result: &Value) -> Option<u64> {
    result.get("count").and_then(Value::as_u64)
}
