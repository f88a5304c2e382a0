//! 错误类型：校验错误、阶段错误与管线失败
//!
//! 与 RecoveryEngine 配合：根据 (阶段, PhaseError) 决定 ContinueDegraded / Abort。

use thiserror::Error;

use crate::core::state::{RunState, Step};

/// 观测输入校验失败（在进入状态机之前拒绝，不重试）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported modality: {0}")]
    UnsupportedModality(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid coordinate {field}: {value}")]
    InvalidCoordinate { field: &'static str, value: f64 },

    #[error("Malformed {modality} content: {reason}")]
    MalformedContent { modality: String, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown {field} hint: {value}")]
    UnknownHint { field: &'static str, value: String },
}

/// 协调阶段的不足：所有被选中的专家均失败
#[derive(Error, Debug, Clone)]
pub enum CoordinationError {
    #[error("No experts available: all of [{}] failed", attempted.join(", "))]
    NoExpertsAvailable {
        attempted: Vec<String>,
        failures: Vec<String>,
    },
}

/// 单个阶段函数的失败
#[derive(Error, Debug, Clone)]
pub enum PhaseError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error("Phase timed out after {0}s")]
    Timeout(u64),

    #[error("Missing upstream state: {0}")]
    MissingState(&'static str),

    #[error("Phase failed: {0}")]
    Internal(String),
}

/// 顶层管线失败：携带阶段名、部分 RunState 与原因，供调用方渲染部分报告
#[derive(Error, Debug)]
#[error("Pipeline failed in phase {phase}: {source}")]
pub struct PipelineFailure {
    pub phase: Step,
    pub partial: Box<RunState>,
    #[source]
    pub source: PhaseError,
}

/// 恢复引擎根据阶段与错误类型给出的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 使用阶段默认增量继续，并在日志中记录降级
    ContinueDegraded(String),
    /// 终止管线，返回 PipelineFailure
    Abort,
}
