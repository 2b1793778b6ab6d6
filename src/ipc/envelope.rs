//! Coordinator ↔ worker message shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Correlates a query reply with the call that produced it.
pub type CorrelationId = u64;

/// Result rows, one JSON object per row.
pub type Rows = Vec<Value>;

/// Envelope discriminator. Only `sql` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sql,
}

/// Worker → coordinator: run a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub kind: MessageKind,
    pub correlation_id: CorrelationId,
    pub statement: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
}

impl QueryRequest {
    pub fn sql(correlation_id: CorrelationId, statement: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            kind: MessageKind::Sql,
            correlation_id,
            statement: statement.into(),
            parameters,
        }
    }
}

/// Diagnostic fields reported by the database engine for a failed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct QueryFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl QueryFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            constraint: None,
            table: None,
        }
    }
}

/// Reply body: rows on success, failure details otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Rows(Rows),
    Error(QueryFailure),
}

/// Coordinator → worker: outcome of a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub kind: MessageKind,
    pub correlation_id: CorrelationId,
    pub failed: bool,
    pub payload: Payload,
}

impl QueryResponse {
    /// Build the reply for `correlation_id`, tagging `failed` from the outcome.
    pub fn for_outcome(correlation_id: CorrelationId, outcome: Result<Rows, QueryFailure>) -> Self {
        let (failed, payload) = match outcome {
            Ok(rows) => (false, Payload::Rows(rows)),
            Err(failure) => (true, Payload::Error(failure)),
        };
        Self {
            kind: MessageKind::Sql,
            correlation_id,
            failed,
            payload,
        }
    }

    /// Turn the envelope back into the outcome it carries.
    ///
    /// A reply flagged `failed` whose payload is not an error object still
    /// fails, with a generic description.
    pub fn into_result(self) -> Result<Rows, QueryFailure> {
        match (self.failed, self.payload) {
            (false, Payload::Rows(rows)) => Ok(rows),
            (_, Payload::Error(failure)) => Err(failure),
            (true, Payload::Rows(_)) => Err(QueryFailure::new("query failed without diagnostics")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let request = QueryRequest::sql(42, "SELECT * FROM users WHERE id = $1", vec![json!(7)]);
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            json!({
                "kind": "sql",
                "correlationId": 42,
                "statement": "SELECT * FROM users WHERE id = $1",
                "parameters": [7]
            })
        );
    }

    #[test]
    fn failed_response_keeps_diagnostics() {
        let wire = json!({
            "kind": "sql",
            "correlationId": 9,
            "failed": true,
            "payload": {
                "message": "UNIQUE constraint failed: users.username",
                "code": "2067",
                "table": "users"
            }
        });
        let response: QueryResponse = serde_json::from_value(wire).unwrap();
        let failure = response.into_result().unwrap_err();
        assert_eq!(failure.code.as_deref(), Some("2067"));
        assert_eq!(failure.table.as_deref(), Some("users"));
        assert_eq!(failure.constraint, None);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let wire = json!({"kind": "ping", "correlationId": 1, "statement": "", "parameters": []});
        assert!(serde_json::from_value::<QueryRequest>(wire).is_err());
    }

    #[test]
    fn failed_flag_without_error_payload_still_fails() {
        let response = QueryResponse {
            kind: MessageKind::Sql,
            correlation_id: 3,
            failed: true,
            payload: Payload::Rows(vec![]),
        };
        assert!(response.into_result().is_err());
    }
}
