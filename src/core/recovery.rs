//! 错误恢复引擎
//!
//! 根据 (阶段, PhaseError) 返回 RecoveryAction，引擎据此决定用默认增量降级继续还是终止管线。
//! 可恢复 / 致命的划分只在这里定义。

use crate::core::{PhaseError, RecoveryAction, Step};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 输入归一化、威胁识别、专家协调没有可用的默认结果
    pub fn is_critical(step: Step) -> bool {
        matches!(
            step,
            Step::InputNormalization | Step::ThreatDetection | Step::AgentCoordination
        )
    }

    pub fn handle(&self, step: Step, err: &PhaseError) -> RecoveryAction {
        match err {
            PhaseError::Coordination(_) | PhaseError::MissingState(_) => RecoveryAction::Abort,
            PhaseError::Timeout(_) | PhaseError::Internal(_) if Self::is_critical(step) => {
                RecoveryAction::Abort
            }
            PhaseError::Timeout(_) | PhaseError::Internal(_) => {
                RecoveryAction::ContinueDegraded(format!("{step} degraded: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoordinationError;

    #[test]
    fn test_timeout_in_critical_phase_aborts() {
        let engine = RecoveryEngine::new();
        for step in [Step::InputNormalization, Step::ThreatDetection, Step::AgentCoordination] {
            assert_eq!(engine.handle(step, &PhaseError::Timeout(120)), RecoveryAction::Abort);
        }
    }

    #[test]
    fn test_timeout_in_other_phases_degrades() {
        let engine = RecoveryEngine::new();
        for step in [
            Step::AlertGeneration,
            Step::ResponseExecution,
            Step::DamageAssessment,
            Step::ReportSynthesis,
        ] {
            match engine.handle(step, &PhaseError::Timeout(120)) {
                RecoveryAction::ContinueDegraded(reason) => {
                    assert!(reason.starts_with(step.name()));
                    assert!(reason.contains("120s"));
                }
                other => panic!("Expected ContinueDegraded, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_no_experts_available_aborts() {
        let engine = RecoveryEngine::new();
        let err = PhaseError::from(CoordinationError::NoExpertsAvailable {
            attempted: vec!["general".into()],
            failures: vec!["boom".into()],
        });
        assert_eq!(engine.handle(Step::AgentCoordination, &err), RecoveryAction::Abort);
    }

    #[test]
    fn test_missing_state_aborts_everywhere() {
        let engine = RecoveryEngine::new();
        let err = PhaseError::MissingState("threat");
        assert_eq!(engine.handle(Step::AlertGeneration, &err), RecoveryAction::Abort);
    }
}
