//! 最终报告：终止阶段由 RunState 折叠而成，之后不可变
//!
//! 每个字段都有明确的 "unavailable" 表示，上游降级时报告结构依然完整。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::coordinator::FailedExpert;
use crate::core::{LogEntry, LogLevel, RunState};
use crate::experts::Capability;
use crate::gateway::ModelInvocationResult;
use crate::incident::{Alert, ThreatAssessment};
use crate::workflow::{DamageAssessment, ResponseExecution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Complete,
    Partial,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentSummary {
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub modality: String,
    pub source: String,
    pub captured_at: DateTime<Utc>,
}

/// 模型调用的报告视图（不含耗时，保证同输入同内容）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCallSummary {
    pub target: String,
    pub ok: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&ModelInvocationResult> for ModelCallSummary {
    fn from(r: &ModelInvocationResult) -> Self {
        Self {
            target: r.target(),
            ok: r.is_success(),
            attempts: r.attempts,
            failure: r.failure_kind().map(|k| k.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpinionSummary {
    pub expert: Capability,
    pub strategy: &'static str,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub findings: Value,
    pub model_calls: Vec<ModelCallSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinationResults {
    pub status: SectionStatus,
    pub activated_experts: Vec<Capability>,
    pub responding_experts: Vec<Capability>,
    pub failed_experts: Vec<FailedExpert>,
    pub aggregate_confidence: f64,
    pub resource_allocation: BTreeMap<String, u32>,
    pub expert_opinions: Vec<OpinionSummary>,
}

impl CoordinationResults {
    fn unavailable() -> Self {
        Self {
            status: SectionStatus::Unavailable,
            activated_experts: Vec::new(),
            responding_experts: Vec::new(),
            failed_experts: Vec::new(),
            aggregate_confidence: 0.0,
            resource_allocation: BTreeMap::new(),
            expert_opinions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalReport {
    pub report_id: String,
    pub status: ReportStatus,
    pub incident: IncidentSummary,
    pub threat_assessment: ThreatAssessment,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
    pub coordination_results: CoordinationResults,
    pub response_execution: ResponseExecution,
    pub damage_assessment: DamageAssessment,
    pub model_invocations: Vec<ModelCallSummary>,
    pub processing_log: Vec<LogEntry>,
    pub summary: String,
}

impl FinalReport {
    /// 写入最终日志快照并据此确定报告状态（由 RunState 在合并终止阶段时调用）
    pub(crate) fn seal(&mut self, log: &[LogEntry]) {
        self.processing_log = log.to_vec();
        self.status = if log.iter().any(|e| e.level != LogLevel::Info) {
            ReportStatus::Degraded
        } else {
            ReportStatus::Complete
        };
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ReportStatus::Degraded
    }
}

/// 报告编号由来源与采集时间决定，同一观测总是得到同一编号
fn report_id(source: &str, captured_at: DateTime<Utc>) -> String {
    format!("rpt-{}-{}", source, captured_at.format("%Y%m%dT%H%M%SZ"))
}

pub struct ReportAggregator;

impl ReportAggregator {
    pub fn build(state: &RunState, summary: String) -> FinalReport {
        let obs = state.observation();
        let loc = obs.location();

        let coordination_results = match state.plan() {
            Some(plan) => CoordinationResults {
                status: if plan.failed_experts.is_empty() {
                    SectionStatus::Complete
                } else {
                    SectionStatus::Partial
                },
                activated_experts: plan.activated_experts.clone(),
                responding_experts: plan.responding_experts(),
                failed_experts: plan.failed_experts.clone(),
                aggregate_confidence: plan.aggregate_confidence,
                resource_allocation: plan.resource_allocation.clone(),
                expert_opinions: plan
                    .opinions
                    .iter()
                    .map(|o| OpinionSummary {
                        expert: o.expert,
                        strategy: o.strategy,
                        confidence: o.confidence,
                        recommendations: o.recommendations.clone(),
                        findings: o.findings.clone(),
                        model_calls: o.consumed.iter().map(ModelCallSummary::from).collect(),
                    })
                    .collect(),
            },
            None => CoordinationResults::unavailable(),
        };

        let mut report = FinalReport {
            report_id: report_id(obs.source(), obs.captured_at()),
            status: ReportStatus::Complete,
            incident: IncidentSummary {
                region: loc.region.clone(),
                latitude: loc.latitude,
                longitude: loc.longitude,
                modality: obs.modality().as_str().to_string(),
                source: obs.source().to_string(),
                captured_at: obs.captured_at(),
            },
            threat_assessment: state
                .threat()
                .cloned()
                .unwrap_or_else(ThreatAssessment::unclassified),
            alerts: state.alerts().to_vec(),
            recommendations: state
                .plan()
                .map(|p| p.recommendations.clone())
                .unwrap_or_default(),
            coordination_results,
            response_execution: state
                .response()
                .cloned()
                .unwrap_or_else(ResponseExecution::not_started),
            damage_assessment: state
                .damage()
                .cloned()
                .unwrap_or_else(|| DamageAssessment::unavailable("damage assessment did not run")),
            model_invocations: state
                .model_results()
                .iter()
                .map(ModelCallSummary::from)
                .collect(),
            processing_log: Vec::new(),
            summary,
        };
        report.seal(state.log());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_id_is_stable() {
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 0).unwrap();
        assert_eq!(report_id("station-7", at), "rpt-station-7-20240701T123000Z");
    }
}
