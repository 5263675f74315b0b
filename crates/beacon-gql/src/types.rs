//! GraphQL request and response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GraphQL operation as POSTed to the endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GqlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Name used in logs.
    pub fn label(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }
}

/// Standard `{ data, errors }` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct GqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GqlErrorEntry>>,
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GqlErrorEntry {
    pub message: String,
    #[serde(default)]
    pub path: Vec<Value>,
    #[serde(default)]
    pub locations: Vec<ErrorLocation>,
    #[serde(default)]
    pub extensions: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}
