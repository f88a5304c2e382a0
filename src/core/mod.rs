//! 核心层：运行状态与状态机、错误分类与恢复

pub mod error;
pub mod recovery;
pub mod state;

pub use error::{CoordinationError, PhaseError, PipelineFailure, RecoveryAction, ValidationError};
pub use recovery::RecoveryEngine;
pub use state::{
    LogEntry, LogLevel, LogNote, Phase, PhaseDelta, PhaseOutput, RunState, Step,
};
