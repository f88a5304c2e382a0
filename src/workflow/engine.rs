//! 工作流引擎
//!
//! 按状态机逐阶段推进单个事件：每次迁移调用恰好一个阶段函数，外加阶段级超时；
//! 阶段失败交给 RecoveryEngine 分类，可恢复则写入默认增量与降级日志后继续，
//! 致命则返回携带部分 RunState 的 PipelineFailure。阶段本身不重试。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::core::{
    LogNote, PhaseError, PhaseOutput, PipelineFailure, RecoveryAction, RecoveryEngine, RunState, Step,
};
use crate::experts::ExpertRegistry;
use crate::gateway::ModelGateway;
use crate::incident::EmergencyObservation;
use crate::llm;
use crate::workflow::phases;
use crate::workflow::summary::Summarizer;
use crate::workflow::FinalReport;

pub struct WorkflowEngine {
    coordinator: Coordinator,
    summarizer: Summarizer,
    recovery: RecoveryEngine,
    phase_timeout: Duration,
}

impl WorkflowEngine {
    pub fn new(coordinator: Coordinator, summarizer: Summarizer, phase_timeout: Duration) -> Self {
        Self {
            coordinator,
            summarizer,
            recovery: RecoveryEngine::new(),
            phase_timeout,
        }
    }

    /// 按配置装配：标准专家注册表、共享网关、可选摘要模型
    pub fn from_config(cfg: &AppConfig, gateway: Arc<ModelGateway>) -> Self {
        let coordinator = Coordinator::new(
            Arc::new(ExpertRegistry::standard()),
            gateway,
            Duration::from_secs(cfg.coordinator.expert_timeout_secs),
        );
        let summarizer = match llm::create_client(&cfg.llm) {
            Some(client) => Summarizer::with_llm(client, Duration::from_secs(cfg.llm.timeout_secs)),
            None => Summarizer::template_only(),
        };
        Self::new(
            coordinator,
            summarizer,
            Duration::from_secs(cfg.workflow.phase_timeout_secs),
        )
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        self.coordinator.gateway()
    }

    /// 阶段名称，按执行顺序
    pub fn phase_names() -> Vec<&'static str> {
        Step::ALL.iter().map(Step::name).collect()
    }

    /// 处理一个事件，直到报告生成或遇到致命阶段失败
    pub async fn process(&self, observation: EmergencyObservation) -> Result<FinalReport, PipelineFailure> {
        let mut state = RunState::new(observation);
        let run_id = state.run_id().to_string();
        tracing::info!(run_id = %run_id, region = state.observation().region(), "Processing emergency event");

        while let Some(step) = state.phase().next_step() {
            let started = Instant::now();
            let outcome = match timeout(self.phase_timeout, self.run_step(step, &state)).await {
                Ok(result) => result,
                Err(_) => Err(PhaseError::Timeout(self.phase_timeout.as_secs())),
            };

            match outcome {
                Ok(output) => {
                    tracing::debug!(
                        run_id = %run_id,
                        phase = step.name(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Phase complete"
                    );
                    state.apply(step, output);
                }
                Err(err) => match self.recovery.handle(step, &err) {
                    RecoveryAction::ContinueDegraded(reason) => {
                        let Some(delta) = phases::fallback(step, &state, &reason) else {
                            return Err(self.fail(state, step, err));
                        };
                        tracing::warn!(run_id = %run_id, phase = step.name(), %reason, "Phase degraded");
                        state.apply(step, PhaseOutput::new(delta).with_note(LogNote::degraded(reason)));
                    }
                    RecoveryAction::Abort => return Err(self.fail(state, step, err)),
                },
            }
        }

        let report = state.take_report();
        match report {
            Some(report) => {
                tracing::info!(
                    run_id = %run_id,
                    report_id = %report.report_id,
                    degraded = report.is_degraded(),
                    "Emergency event processed"
                );
                Ok(report)
            }
            None => Err(self.fail(state, Step::ReportSynthesis, PhaseError::MissingState("final report"))),
        }
    }

    async fn run_step(&self, step: Step, state: &RunState) -> Result<PhaseOutput, PhaseError> {
        match step {
            Step::InputNormalization => phases::normalize(state),
            Step::ThreatDetection => phases::detect_threat(state),
            Step::AlertGeneration => phases::generate_alerts(state),
            Step::AgentCoordination => phases::coordinate(&self.coordinator, state).await,
            Step::ResponseExecution => phases::execute_response(state),
            Step::DamageAssessment => phases::assess_damage(self.gateway(), state).await,
            Step::ReportSynthesis => phases::synthesize_report(&self.summarizer, state).await,
        }
    }

    fn fail(&self, mut state: RunState, step: Step, err: PhaseError) -> PipelineFailure {
        tracing::error!(run_id = %state.run_id(), phase = step.name(), error = %err, "Pipeline failed");
        state.push_log(step, LogNote::failed(format!("Phase failed: {err}")));
        PipelineFailure {
            phase: step,
            partial: Box::new(state),
            source: err,
        }
    }
}
