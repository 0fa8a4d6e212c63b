use crate::rules::RuleViolation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Error,
    Exists,
    AlreadyCompleted,
    AlreadyApplied,
    PendingPayment,
    NotReady,
}

/// `{status, message, ...}` envelope returned by every method call. Extra
/// fields are flattened next to `status` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReply {
    pub status: ReplyStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl MethodReply {
    pub fn new(status: ReplyStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            warnings: Vec::new(),
            data: Map::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ReplyStatus::Success, message)
    }

    pub fn failed(code: &str, message: impl Into<String>) -> Self {
        let mut reply = Self::new(ReplyStatus::Error, message);
        reply.code = Some(code.to_string());
        reply
    }

    pub fn rejected(violation: &RuleViolation) -> Self {
        Self::failed(violation.code(), violation.to_string())
    }

    /// Attaches a field; values that fail to serialize are dropped.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_fields_sit_beside_status() {
        let reply = MethodReply::success("Pre-inspection completed successfully").with("new_status", "Out");
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "message": "Pre-inspection completed successfully",
                "new_status": "Out"
            })
        );
    }

    #[test]
    fn rejection_carries_reason_code() {
        let violation = RuleViolation::MissingField { field: "vehicle" };
        let reply = MethodReply::rejected(&violation);
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.code.as_deref(), Some("missing_field"));
        assert_eq!(reply.message, "vehicle is required");
    }
}
