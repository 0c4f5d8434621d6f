//! Invocation engine: schema-driven argument coercion, the `tools/call`
//! round-trip and normalization of the result to text.

use crate::error::{ErrorKind, McpError};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Returned when a call succeeds but carries no text segments.
pub const NO_TEXT_CONTENT: &str = "Tool executed, but no text content was returned.";

/// A raw, user-supplied argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl ArgValue {
    fn to_json(&self) -> Value {
        match self {
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Number(n) => Value::Number(n.clone()),
            ArgValue::Text(s) => Value::String(s.clone()),
        }
    }

    fn to_text(&self) -> String {
        match self {
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Number(n) => n.to_string(),
            ArgValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Number(n.into())
    }
}

/// A tool name plus the caller's raw arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, ArgValue>,
}

impl InvocationRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }
}

/// Outcome of one tool call. Never an unhandled error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Text(String),
    Failure { kind: ErrorKind, message: String },
}

impl InvocationResult {
    pub fn from_error(err: &McpError) -> Self {
        InvocationResult::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, InvocationResult::Text(_))
    }
}

impl fmt::Display for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationResult::Text(text) => f.write_str(text),
            InvocationResult::Failure { message, .. } => write!(f, "Error: {message}"),
        }
    }
}

/// One content item of a `tools/call` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentSegment>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Coerce raw arguments to the primitive types an input schema declares.
///
/// Without a schema the values pass through untouched. With one, only
/// declared properties are sent; a value that does not parse as its declared
/// type is sent as given and left for the server to reject.
pub fn coerce_arguments(
    arguments: &BTreeMap<String, ArgValue>,
    schema: Option<&Value>,
) -> Map<String, Value> {
    let Some(schema) = schema else {
        return arguments
            .iter()
            .map(|(name, raw)| (name.clone(), raw.to_json()))
            .collect();
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let mut coerced = Map::new();
    for (name, raw) in arguments {
        let Some(property) = properties.and_then(|p| p.get(name)) else {
            tracing::warn!("Dropping argument '{name}': not declared by the tool's input schema");
            continue;
        };
        coerced.insert(name.clone(), coerce_value(raw, declared_type(property)));
    }
    coerced
}

/// The first non-null `type` of a property schema.
fn declared_type(property: &Value) -> Option<&str> {
    match property.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    }
}

fn coerce_value(raw: &ArgValue, declared: Option<&str>) -> Value {
    let coerced = match declared {
        Some("integer") => parse_integer(raw).map(Value::from),
        Some("number") => parse_number(raw),
        Some("boolean") => parse_bool(raw).map(Value::Bool),
        _ => Some(Value::String(raw.to_text())),
    };
    coerced.unwrap_or_else(|| raw.to_json())
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_integer(raw: &ArgValue) -> Option<i64> {
    match raw {
        ArgValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        ArgValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        ArgValue::Bool(_) => None,
    }
}

fn parse_number(raw: &ArgValue) -> Option<Value> {
    match raw {
        ArgValue::Number(n) => Some(Value::Number(n.clone())),
        ArgValue::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            let f = s.parse::<f64>().ok()?;
            match integral(f) {
                Some(i) => Some(Value::from(i)),
                None => serde_json::Number::from_f64(f).map(Value::Number),
            }
        }
        ArgValue::Bool(_) => None,
    }
}

fn parse_bool(raw: &ArgValue) -> Option<bool> {
    match raw {
        ArgValue::Bool(b) => Some(*b),
        ArgValue::Number(n) => n.as_f64().map(|f| f != 0.0),
        ArgValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
    }
}

/// Join the text segments of a result, in order, one per line.
pub fn text_content(content: &[ContentSegment]) -> Option<String> {
    let texts: Vec<&str> = content
        .iter()
        .filter(|segment| segment.kind == "text")
        .filter_map(|segment| segment.text.as_deref())
        .collect();
    (!texts.is_empty()).then(|| texts.join("\n"))
}

/// Call a tool over a ready session and normalize the outcome.
pub async fn invoke(
    session: &mut Session,
    request: &InvocationRequest,
    schema: Option<&Value>,
) -> InvocationResult {
    let server = session.server_name().to_string();
    let arguments = coerce_arguments(&request.arguments, schema);

    match call_tool(session, &request.tool_name, arguments).await {
        Ok(text) => InvocationResult::Text(text),
        Err(e) => {
            let err = if matches!(e, McpError::ToolCallFailed { .. }) {
                e
            } else {
                McpError::ToolCallFailed {
                    server,
                    tool: request.tool_name.clone(),
                    reason: e.to_string(),
                }
            };
            tracing::warn!("{err}");
            InvocationResult::from_error(&err)
        }
    }
}

async fn call_tool(
    session: &mut Session,
    tool: &str,
    arguments: Map<String, Value>,
) -> Result<String, McpError> {
    let server = session.server_name().to_string();
    let transport = session.begin_operation()?;

    tracing::debug!("Calling '{tool}' on MCP server '{server}'");
    let params = serde_json::json!({
        "name": tool,
        "arguments": arguments,
    });
    let resp = transport.send_request("tools/call", Some(params)).await?;

    if let Some(err) = resp.error {
        return Err(McpError::JsonRpc {
            server,
            code: err.code,
            message: err.message,
        });
    }
    let result = resp.result.ok_or_else(|| {
        McpError::Protocol("tools/call response has neither result nor error".to_string())
    })?;
    let call: CallToolResult = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

    let text = text_content(&call.content);
    if call.is_error {
        return Err(McpError::ToolCallFailed {
            server,
            tool: tool.to_string(),
            reason: text.unwrap_or_else(|| "the tool reported an error".to_string()),
        });
    }
    Ok(text.unwrap_or_else(|| NO_TEXT_CONTENT.to_string()))
}
