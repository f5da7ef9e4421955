//! Tool response envelope.
//!
//! Every tool answers with `{ok, result?, error?, mission_context_note?}` as
//! one JSON text content. Raw errors never leak: internal failures are
//! replaced by a short correlation id that also appears in the log stream.

use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use stg_domain::error::{Error, FieldError};

/// The agent-visible error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable kind string from the error taxonomy
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// The uniform tool envelope.
#[derive(Debug, Serialize)]
pub struct ToolEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_context_note: Option<String>,
}

impl ToolEnvelope {
    /// Successful envelope around a serialisable result.
    pub fn success<T: Serialize>(result: &T, mission_context_note: Option<String>) -> Self {
        Self {
            ok: true,
            result: serde_json::to_value(result).ok(),
            error: None,
            mission_context_note,
        }
    }

    /// Failure envelope; internal errors are masked behind a correlation id.
    #[must_use]
    pub fn failure(err: &Error) -> Self {
        let kind = err.kind();
        let message = if kind == "internal" {
            let reference = uuid::Uuid::new_v4().simple().to_string();
            let reference = &reference[..8];
            error!(reference, %err, "internal error surfaced to agent");
            format!("internal error (ref {reference})")
        } else {
            err.to_string()
        };
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: kind.to_owned(),
                message,
                fields: err.fields().map(<[FieldError]>::to_vec),
            }),
            mission_context_note: None,
        }
    }

    /// Render as an MCP tool result.
    pub fn render(self) -> Result<CallToolResult, ErrorData> {
        let ok = self.ok;
        let text = serde_json::to_string_pretty(&self)
            .map_err(|e| ErrorData::internal_error(format!("envelope encode failed: {e}"), None))?;
        if ok {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }
}

/// Shorthand: render a service outcome into the envelope.
pub fn respond<T: Serialize>(
    outcome: stg_domain::error::Result<T>,
    mission_context_note: Option<String>,
) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(result) => ToolEnvelope::success(&result, mission_context_note).render(),
        Err(err) => ToolEnvelope::failure(&err).render(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn success_envelope_carries_result_and_note() {
        let envelope = ToolEnvelope::success(
            &serde_json::json!({"id": "x"}),
            Some("Logged to mission m (probe)".to_owned()),
        );
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains("\"ok\":true"));
        assert!(text.contains("Logged to mission"));
    }

    #[test]
    fn failure_envelope_exposes_the_stable_kind() {
        let envelope = ToolEnvelope::failure(&Error::not_found("mission x"));
        let error = envelope.error.expect("error body");
        assert_eq!(error.kind, "not_found");
        assert!(envelope.result.is_none());
    }

    #[test]
    fn internal_errors_are_masked_with_a_reference() {
        let envelope = ToolEnvelope::failure(&Error::internal("secret detail"));
        let error = envelope.error.expect("error body");
        assert_eq!(error.kind, "internal");
        assert!(!error.message.contains("secret detail"));
        assert!(error.message.contains("ref "));
    }

    #[test]
    fn validation_failures_list_every_field() {
        let err = Error::validation(
            "invalid parameters: a, b",
            vec![
                FieldError::new("a", "bad", None),
                FieldError::new("b", "bad", None),
            ],
        );
        let envelope = ToolEnvelope::failure(&err);
        assert_eq!(envelope.error.expect("error").fields.expect("fields").len(), 2);
    }
}
