//! 后端抽象：所有外部模型服务实现 Backend，由 ModelGateway 统一调度

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::gateway::FailureKind;

/// 单次后端调用的失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid parameters: {0}")]
    Validation(String),

    #[error("Rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Timeout(_) => FailureKind::Timeout,
            BackendError::Connection(_) => FailureKind::Connection,
            BackendError::Validation(_) => FailureKind::Validation,
            BackendError::Rejected(_) => FailureKind::Rejected,
        }
    }
}

/// 外部模型后端 trait：id、描述、支持的操作、调用与健康探测
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn operations(&self) -> Vec<String>;

    /// 调用操作；params 已保证为 JSON 对象
    async fn call(&self, operation: &str, params: &Value) -> Result<Value, BackendError>;

    async fn health(&self) -> bool;
}
