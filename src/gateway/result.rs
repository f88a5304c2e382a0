//! 模型调用结果：成功载荷或失败描述，二者恰有其一

use serde::Serialize;
use serde_json::Value;

/// 失败类型；只有 Timeout / Connection 属于可重试的瞬时错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownBackend,
    UnsupportedOperation,
    Validation,
    Timeout,
    Connection,
    Rejected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnknownBackend => "unknown_backend",
            FailureKind::UnsupportedOperation => "unsupported_operation",
            FailureKind::Validation => "validation",
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::Rejected => "rejected",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::Connection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Success { payload: Value },
    Failure { kind: FailureKind, message: String },
}

/// 单次 `invoke` 的完整记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInvocationResult {
    pub backend: String,
    pub operation: String,
    pub params: Value,
    #[serde(flatten)]
    pub outcome: InvocationOutcome,
    pub duration_ms: u64,
    /// 实际发起的尝试次数；校验类失败为 0
    pub attempts: u32,
}

impl ModelInvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            InvocationOutcome::Success { payload } => Some(payload),
            InvocationOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            InvocationOutcome::Success { .. } => None,
            InvocationOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// `backend/operation`
    pub fn target(&self) -> String {
        format!("{}/{}", self.backend, self.operation)
    }

    /// 载荷中的置信度（`confidence` 或 `model_confidence`）
    pub fn payload_confidence(&self) -> Option<f64> {
        let payload = self.payload()?;
        payload
            .get("confidence")
            .or_else(|| payload.get("model_confidence"))
            .and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let result = ModelInvocationResult {
            backend: "climada".into(),
            operation: "impact_assessment".into(),
            params: json!({"intensity": 0.5}),
            outcome: InvocationOutcome::Failure {
                kind: FailureKind::Timeout,
                message: "no response".into(),
            },
            duration_ms: 10,
            attempts: 3,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["attempts"], 3);
        assert!(value.get("payload").is_none());
        assert!(!result.is_success());
        assert_eq!(result.target(), "climada/impact_assessment");
    }

    #[test]
    fn test_payload_confidence() {
        let result = ModelInvocationResult {
            backend: "aurora".into(),
            operation: "forecast".into(),
            params: json!({}),
            outcome: InvocationOutcome::Success {
                payload: json!({"model_confidence": 0.92}),
            },
            duration_ms: 0,
            attempts: 1,
        };
        assert_eq!(result.payload_confidence(), Some(0.92));
        assert!(FailureKind::Connection.is_transient());
        assert!(!FailureKind::Validation.is_transient());
    }
}
