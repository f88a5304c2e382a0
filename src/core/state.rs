//! 运行状态：阶段状态机、处理日志与 RunState 聚合
//!
//! RunState 只由 WorkflowEngine 持有与修改；各阶段函数只读取 `&RunState`，
//! 返回 PhaseDelta，由引擎在推进阶段前合并。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coordinator::CoordinationPlan;
use crate::gateway::ModelInvocationResult;
use crate::incident::{Alert, EmergencyObservation, Signals, ThreatAssessment};
use crate::workflow::{DamageAssessment, FinalReport, ResponseExecution};

/// 状态机中的状态（严格单向：Received → … → Reported）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Received,
    Normalized,
    ThreatClassified,
    Alerted,
    Coordinated,
    ResponseExecuted,
    Assessed,
    Reported,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Reported)
    }

    /// 离开当前状态所执行的阶段函数；终态返回 None
    pub fn next_step(&self) -> Option<Step> {
        match self {
            Phase::Received => Some(Step::InputNormalization),
            Phase::Normalized => Some(Step::ThreatDetection),
            Phase::ThreatClassified => Some(Step::AlertGeneration),
            Phase::Alerted => Some(Step::AgentCoordination),
            Phase::Coordinated => Some(Step::ResponseExecution),
            Phase::ResponseExecuted => Some(Step::DamageAssessment),
            Phase::Assessed => Some(Step::ReportSynthesis),
            Phase::Reported => None,
        }
    }
}

/// 阶段函数（每次状态迁移恰好调用一个）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    InputNormalization,
    ThreatDetection,
    AlertGeneration,
    AgentCoordination,
    ResponseExecution,
    DamageAssessment,
    ReportSynthesis,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::InputNormalization,
        Step::ThreatDetection,
        Step::AlertGeneration,
        Step::AgentCoordination,
        Step::ResponseExecution,
        Step::DamageAssessment,
        Step::ReportSynthesis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::InputNormalization => "input_normalization",
            Step::ThreatDetection => "threat_detection",
            Step::AlertGeneration => "alert_generation",
            Step::AgentCoordination => "agent_coordination",
            Step::ResponseExecution => "response_execution",
            Step::DamageAssessment => "damage_assessment",
            Step::ReportSynthesis => "report_synthesis",
        }
    }

    /// 阶段成功后到达的状态
    pub fn target(&self) -> Phase {
        match self {
            Step::InputNormalization => Phase::Normalized,
            Step::ThreatDetection => Phase::ThreatClassified,
            Step::AlertGeneration => Phase::Alerted,
            Step::AgentCoordination => Phase::Coordinated,
            Step::ResponseExecution => Phase::ResponseExecuted,
            Step::DamageAssessment => Phase::Assessed,
            Step::ReportSynthesis => Phase::Reported,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Degraded,
    /// 致命阶段失败，之后管线终止
    Failed,
}

/// 处理日志条目（只追加，seq 严格递增，时间戳单调不减）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    pub phase: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// 阶段函数附带的日志说明，由引擎写入处理日志
#[derive(Debug, Clone, PartialEq)]
pub struct LogNote {
    pub level: LogLevel,
    pub message: String,
}

impl LogNote {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Degraded,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Failed,
            message: message.into(),
        }
    }
}

/// 阶段输出的状态增量
#[derive(Debug, Clone)]
pub enum PhaseDelta {
    Normalized(Signals),
    ThreatClassified(ThreatAssessment),
    Alerted(Vec<Alert>),
    Coordinated(CoordinationPlan),
    ResponseExecuted(ResponseExecution),
    Assessed {
        assessment: DamageAssessment,
        results: Vec<ModelInvocationResult>,
    },
    Reported(FinalReport),
}

/// 阶段函数的完整输出：增量 + 日志说明
#[derive(Debug, Clone)]
pub struct PhaseOutput {
    pub delta: PhaseDelta,
    pub notes: Vec<LogNote>,
}

impl PhaseOutput {
    pub fn new(delta: PhaseDelta) -> Self {
        Self {
            delta,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: LogNote) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_notes(mut self, notes: impl IntoIterator<Item = LogNote>) -> Self {
        self.notes.extend(notes);
        self
    }
}

/// 单次事件处理的累积状态
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: String,
    observation: EmergencyObservation,
    phase: Phase,
    log: Vec<LogEntry>,
    signals: Option<Signals>,
    threat: Option<ThreatAssessment>,
    alerts: Vec<Alert>,
    plan: Option<CoordinationPlan>,
    response: Option<ResponseExecution>,
    model_results: Vec<ModelInvocationResult>,
    damage: Option<DamageAssessment>,
    report: Option<FinalReport>,
}

impl RunState {
    pub(crate) fn new(observation: EmergencyObservation) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            observation,
            phase: Phase::Received,
            log: Vec::new(),
            signals: None,
            threat: None,
            alerts: Vec::new(),
            plan: None,
            response: None,
            model_results: Vec::new(),
            damage: None,
            report: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn observation(&self) -> &EmergencyObservation {
        &self.observation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn signals(&self) -> Option<&Signals> {
        self.signals.as_ref()
    }

    pub fn threat(&self) -> Option<&ThreatAssessment> {
        self.threat.as_ref()
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn plan(&self) -> Option<&CoordinationPlan> {
        self.plan.as_ref()
    }

    pub fn response(&self) -> Option<&ResponseExecution> {
        self.response.as_ref()
    }

    pub fn model_results(&self) -> &[ModelInvocationResult] {
        &self.model_results
    }

    pub fn damage(&self) -> Option<&DamageAssessment> {
        self.damage.as_ref()
    }

    pub fn report(&self) -> Option<&FinalReport> {
        self.report.as_ref()
    }

    pub(crate) fn take_report(&mut self) -> Option<FinalReport> {
        self.report.take()
    }

    /// 追加日志条目；时间戳钳制为不早于上一条
    pub(crate) fn push_log(&mut self, step: Step, note: LogNote) {
        let mut timestamp = Utc::now();
        if let Some(last) = self.log.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }
        let seq = self.log.len() as u64 + 1;
        self.log.push(LogEntry {
            seq,
            phase: step.name().to_string(),
            timestamp,
            level: note.level,
            message: note.message,
        });
    }

    /// 合并阶段增量并推进到 step 的目标状态
    pub(crate) fn apply(&mut self, step: Step, output: PhaseOutput) {
        for note in output.notes {
            self.push_log(step, note);
        }
        match output.delta {
            PhaseDelta::Normalized(signals) => self.signals = Some(signals),
            PhaseDelta::ThreatClassified(threat) => self.threat = Some(threat),
            PhaseDelta::Alerted(alerts) => self.alerts = alerts,
            PhaseDelta::Coordinated(plan) => {
                self.model_results
                    .extend(plan.opinions.iter().flat_map(|o| o.consumed.iter().cloned()));
                self.plan = Some(plan);
            }
            PhaseDelta::ResponseExecuted(response) => self.response = Some(response),
            PhaseDelta::Assessed {
                assessment,
                results,
            } => {
                self.model_results.extend(results);
                self.damage = Some(assessment);
            }
            PhaseDelta::Reported(mut report) => {
                report.seal(&self.log);
                self.report = Some(report);
            }
        }
        self.phase = step.target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_walk_is_linear() {
        let mut phase = Phase::Received;
        let mut steps = Vec::new();
        while let Some(step) = phase.next_step() {
            assert!(step.target() > phase);
            steps.push(step);
            phase = step.target();
        }
        assert!(phase.is_terminal());
        assert_eq!(steps, Step::ALL.to_vec());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(Step::AgentCoordination.name(), "agent_coordination");
        assert_eq!(Step::ReportSynthesis.to_string(), "report_synthesis");
    }
}
