//! Wire types of the vector-data query endpoint.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One query against the service: an endpoint plus its query-string parameters.
///
/// Parameters live in a `BTreeMap` so that requests compare and log in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
}

impl QueryRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}?{}",
            self.endpoint,
            self.params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .join("&")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Tabular payload of a successful reply: column names plus one row per feature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRows {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: String,
}

/// Reply of the query endpoint.
///
/// ```json
/// {"Status": "ok", "Result": {"fields": ["fsc_id"], "values": [["A-1"]]}}
/// {"Status": "error", "ErrorInfo": {"ErrorMessage": "timeout"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "Status")]
    pub status: ResponseStatus,
    #[serde(rename = "Result", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryRows>,
    #[serde(rename = "ErrorInfo", default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

impl QueryResponse {
    pub fn ok(fields: Vec<String>, values: Vec<Vec<Value>>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            result: Some(QueryRows { fields, values }),
            error_info: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: None,
            error_info: Some(ErrorInfo {
                error_message: message.into(),
            }),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Server-reported message, or a generic one when the error payload is missing.
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        Some(
            self.error_info
                .as_ref()
                .map_or("unspecified server error", |info| {
                    info.error_message.as_str()
                }),
        )
    }
}
