use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Correlation id tying a response to its request.
///
/// Vim sends numeric ids for `request_async` calls, the Rust side allocates
/// its own numeric ids, and `Null`/`Str` exist for wire completeness.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    Null,
    Num(u64),
    Str(String),
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Null => f.write_str("null"),
            Id::Num(num) => write!(f, "{num}"),
            Id::Str(string) => f.write_str(string),
        }
    }
}

/// Parameters attached to a request or notification.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(untagged)]
pub enum Params {
    None,
    Array(Vec<Value>),
    Map(serde_json::Map<String, Value>),
}

impl Params {
    /// Deserializes the params into the concrete type the handler expects.
    pub fn parse<D>(self) -> Result<D, Error>
    where
        D: DeserializeOwned,
    {
        let value: Value = self.into();
        serde_json::value::from_value(value)
            .map_err(|e| Error::invalid_params(format!("Invalid params: {e}.")))
    }

    /// Parses autocmd params, which are always `[bufnr]` on this wire.
    pub fn parse_bufnr(self) -> Result<usize, Error> {
        let params: Vec<usize> = self.parse()?;
        params
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_params("bufnr not found in params"))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Value {
        match params {
            Params::Array(vec) => Value::Array(vec),
            Params::Map(map) => Value::Object(map),
            Params::None => Value::Null,
        }
    }
}

fn default_params() -> Params {
    Params::None
}

/// Call expecting a response carrying the same id back.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RpcRequest {
    pub id: Id,
    pub method: String,
    #[serde(default = "default_params", skip_serializing_if = "Params::is_none")]
    pub params: Params,
}

/// Fire-and-forget call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RpcNotification {
    pub method: String,
    #[serde(default = "default_params", skip_serializing_if = "Params::is_none")]
    pub params: Params,
}

/// Any message that can travel over the stdio channel, in either direction.
///
/// Untagged, the variants are told apart by their fields alone. The order
/// matters for ambiguous payloads, a request must be tried before a
/// notification.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RpcMessage {
    Request(RpcRequest),
    Notification(RpcNotification),
    Response(RpcResponse),
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Success {
    pub result: Value,
    pub id: Id,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Failure {
    pub error: Error,
    pub id: Id,
}

/// Response to a request, successful or not.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(Success),
    Failure(Failure),
}

impl RpcResponse {
    pub fn id(&self) -> &Id {
        match self {
            Self::Success(s) => &s.id,
            Self::Failure(f) => &f.id,
        }
    }
}

/// JSON-RPC 2.0 error code.
///
/// Serialized as the bare integer code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Implementation-defined server error.
    ServerError(i64),
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerError(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            code => ErrorCode::ServerError(code),
        }
    }
}

impl<'a> Deserialize<'a> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<ErrorCode, D::Error>
    where
        D: Deserializer<'a>,
    {
        let code: i64 = Deserialize::deserialize(deserializer)?;
        Ok(ErrorCode::from(code))
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

/// Error object carried inside a [`Failure`] response.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Error {
    pub fn invalid_params<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Error {
            code: ErrorCode::InvalidParams,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode, Params, RpcMessage, Value};

    #[test]
    fn params_deserialization() {
        let deserialized: Params =
            serde_json::from_str(r#"[2, "x^2", [3, 7], {"image": "px-0.png"}]"#).unwrap();

        let mut map = serde_json::Map::new();
        map.insert("image".to_string(), Value::String("px-0.png".to_string()));

        assert_eq!(
            Params::Array(vec![
                Value::from(2),
                Value::String("x^2".to_string()),
                Value::Array(vec![Value::from(3), Value::from(7)]),
                Value::Object(map),
            ]),
            deserialized
        );

        let empty: Params = serde_json::from_str("[]").unwrap();
        assert_eq!(Params::Array(vec![]), empty);
    }

    #[test]
    fn parse_failure_reports_the_cause() {
        let params = || serde_json::from_str::<Params>(r#"[1, true]"#).unwrap();

        let err: Error = params()
            .parse::<(Option<u8>, String)>()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(
            err.message,
            "Invalid params: invalid type: boolean `true`, expected a string."
        );
        assert_eq!(err.data, None);

        let err: Error = params().parse::<(u8, bool, String)>().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(
            err.message,
            "Invalid params: invalid length 2, expected a tuple of size 3."
        );
    }

    #[test]
    fn single_param_parsed_as_tuple() {
        let params: (u64,) = Params::Array(vec![Value::from(1)]).parse().unwrap();
        assert_eq!(params, (1,));
    }

    #[test]
    fn untagged_message_dispatch() {
        let request: RpcMessage =
            serde_json::from_str(r#"{"id": 1, "method": "texmath.preview"}"#).unwrap();
        assert!(matches!(request, RpcMessage::Request(_)));

        let notification: RpcMessage =
            serde_json::from_str(r#"{"method": "BufDelete", "params": [2]}"#).unwrap();
        assert!(matches!(notification, RpcMessage::Notification(_)));

        let response: RpcMessage =
            serde_json::from_str(r#"{"id": 1, "result": "ok"}"#).unwrap();
        assert!(matches!(response, RpcMessage::Response(_)));
    }

    #[test]
    fn error_code_round_trips_as_integer() {
        let error: Error =
            serde_json::from_str(r#"{"code": -32602, "message": "Invalid params"}"#).unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams);

        let serialized = serde_json::to_string(&Error::invalid_params("bad bufnr")).unwrap();
        assert_eq!(serialized, r#"{"code":-32602,"message":"bad bufnr"}"#);
    }
}
