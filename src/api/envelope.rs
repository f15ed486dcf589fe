// api/envelope.rs - response envelope returned by every handler
// {statusCode, headers, body, isBase64Encoded}

use std::collections::BTreeMap;

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::request::Method;
use crate::error::ApiError;

const ALLOWED_HEADERS: &str = "Content-Type, X-Session-Token";
const PREFLIGHT_MAX_AGE: &str = "86400";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl Envelope {
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        Self {
            status_code: status.as_u16(),
            headers,
            body: body.to_string(),
            is_base64_encoded: false,
        }
    }

    pub fn error(err: &ApiError) -> Self {
        Self::json(err.status_code(), &err.to_json())
    }

    /// CORS pre-flight answer: 200 with an empty body.
    pub fn preflight(allowed: &[Method]) -> Self {
        let methods = allowed
            .iter()
            .chain(std::iter::once(&Method::Options))
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let mut headers = BTreeMap::new();
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert("Access-Control-Allow-Methods".to_string(), methods);
        headers.insert("Access-Control-Allow-Headers".to_string(), ALLOWED_HEADERS.to_string());
        headers.insert("Access-Control-Max-Age".to_string(), PREFLIGHT_MAX_AGE.to_string());
        Self {
            status_code: StatusCode::OK.as_u16(),
            headers,
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parsed body; `Value::Null` when empty or not JSON.
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Successful handler outcome before it is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: StatusCode::OK, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: StatusCode::CREATED, body }
    }
}

impl From<Result<Reply, ApiError>> for Envelope {
    fn from(result: Result<Reply, ApiError>) -> Self {
        match result {
            Ok(reply) => Envelope::json(reply.status, &reply.body),
            Err(err) => Envelope::error(&err),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("Dropping unrepresentable response header {}", name),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_carries_message_and_cors() {
        let envelope = Envelope::error(&ApiError::not_found("File not found"));
        assert_eq!(envelope.status_code, 404);
        assert_eq!(envelope.header("access-control-allow-origin"), Some("*"));
        assert_eq!(envelope.header("Content-Type"), Some("application/json"));
        assert_eq!(envelope.json_body(), json!({"error": "File not found"}));
        assert!(!envelope.is_base64_encoded);
    }

    #[test]
    fn preflight_lists_methods_with_empty_body() {
        let envelope = Envelope::preflight(&[Method::Get, Method::Post, Method::Delete]);
        assert_eq!(envelope.status_code, 200);
        assert!(envelope.body.is_empty());
        assert_eq!(
            envelope.header("Access-Control-Allow-Methods"),
            Some("GET, POST, DELETE, OPTIONS")
        );
        assert_eq!(
            envelope.header("Access-Control-Allow-Headers"),
            Some("Content-Type, X-Session-Token")
        );
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Envelope::json(StatusCode::CREATED, &json!({"ok": true}))).unwrap();
        assert_eq!(value["statusCode"], 201);
        assert_eq!(value["isBase64Encoded"], false);
        assert_eq!(value["body"], "{\"ok\":true}");
    }
}
