//! Normalized inbound request shared by every handler.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Options,
    Other,
}

impl Method {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Other => "OTHER",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-independent request: `{httpMethod, headers, body, queryStringParameters}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerRequest {
    #[serde(default)]
    pub http_method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl HandlerRequest {
    pub fn new(method: &str) -> Self {
        Self {
            http_method: method.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Defaults to GET when the front door sent no method.
    pub fn method(&self) -> Method {
        if self.http_method.is_empty() {
            Method::Get
        } else {
            Method::parse(&self.http_method)
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn session_token(&self) -> Option<&str> {
        self.header(SESSION_TOKEN_HEADER)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()?
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn json_body(&self) -> Result<JsonBody, ApiError> {
        JsonBody::parse(self.body.as_deref())
    }
}

/// Parsed JSON object body. An absent or blank body is `{}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBody(Map<String, Value>);

impl JsonBody {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(raw) => raw,
        };
        match serde_json::from_str::<Value>(raw).map_err(ApiError::malformed_body)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty string value.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str().filter(|s| !s.is_empty())
    }

    /// Optional string with a default; present values of another type are rejected.
    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ApiError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(invalid_field(key)),
        }
    }

    /// Optional number with a default; present values of another type are rejected.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, ApiError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid_field(key)),
            Some(_) => Err(invalid_field(key)),
        }
    }

    /// Row id given as a JSON number or a numeric string.
    pub fn id(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => parse_id(s),
            _ => None,
        }
    }
}

pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn invalid_field(key: &str) -> ApiError {
    ApiError::bad_request(format!("Invalid value for field '{}'", key))
}
