//! 七个阶段函数：只读 `&RunState`，返回 PhaseOutput（增量 + 日志说明）
//!
//! 日志说明不含耗时等易变内容，同一观测在确定性网关下得到同一日志文本。

use crate::coordinator::Coordinator;
use crate::core::{LogNote, PhaseDelta, PhaseError, PhaseOutput, RunState, Step};
use crate::experts::Capability;
use crate::gateway::ModelGateway;
use crate::incident::{Alert, KeywordSet, Signals, ThreatAssessment};
use crate::workflow::summary::{template_summary, Summarizer};
use crate::workflow::{damage, DamageAssessment, ReportAggregator, ResponseExecution};

fn require_threat(state: &RunState) -> Result<&ThreatAssessment, PhaseError> {
    state.threat().ok_or(PhaseError::MissingState("threat assessment"))
}

pub fn normalize(state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let keywords = KeywordSet::shared()
        .map_err(|e| PhaseError::Internal(format!("keyword patterns failed to compile: {e}")))?;
    let obs = state.observation();
    let signals = Signals::extract(obs, keywords);
    let keyword_hits: usize = signals.keywords.values().map(Vec::len).sum();
    let note = LogNote::info(format!(
        "Normalized {} observation from {}: {} reading(s), {} keyword indicator(s)",
        obs.modality(),
        obs.region(),
        signals.readings.len(),
        keyword_hits
    ));
    Ok(PhaseOutput::new(PhaseDelta::Normalized(signals)).with_note(note))
}

pub fn detect_threat(state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let signals = state
        .signals()
        .ok_or(PhaseError::MissingState("normalized signals"))?;
    let threat = ThreatAssessment::assess(signals, state.observation().hints());
    let note = LogNote::info(format!(
        "Classified as {} {} (confidence {:.2}, indicators: {})",
        threat.severity.as_str(),
        threat.disaster_type.as_str(),
        threat.confidence,
        if threat.indicators.is_empty() {
            "none".to_string()
        } else {
            threat.indicators.join(", ")
        }
    ));
    Ok(PhaseOutput::new(PhaseDelta::ThreatClassified(threat)).with_note(note))
}

pub fn generate_alerts(state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let threat = require_threat(state)?;
    let alert = Alert::generate(threat, state.observation().region());
    let note = LogNote::info(format!(
        "Issued {} alert {} via {} channel(s)",
        alert.level.as_str(),
        alert.alert_id,
        alert.channels.len()
    ));
    Ok(PhaseOutput::new(PhaseDelta::Alerted(vec![alert])).with_note(note))
}

pub async fn coordinate(coordinator: &Coordinator, state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let threat = require_threat(state)?;
    let plan = coordinator.coordinate(threat, state.observation()).await?;

    let keys = plan
        .activated_experts
        .iter()
        .map(Capability::key)
        .collect::<Vec<_>>()
        .join(", ");
    let mut notes = vec![LogNote::info(format!(
        "Activated {} expert(s) [{}]; {} responded, aggregate confidence {:.2}",
        plan.activated_experts.len(),
        keys,
        plan.opinions.len(),
        plan.aggregate_confidence
    ))];
    notes.extend(
        plan.failed_experts
            .iter()
            .map(|f| LogNote::degraded(format!("Expert {} unavailable: {}", f.expert, f.reason))),
    );
    Ok(PhaseOutput::new(PhaseDelta::Coordinated(plan)).with_notes(notes))
}

pub fn execute_response(state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let plan = state
        .plan()
        .ok_or(PhaseError::MissingState("coordination plan"))?;
    let response = ResponseExecution::from_plan(plan);
    let note = LogNote::info(format!(
        "Response in progress: {} team(s), {} resource type(s), estimated completion {}",
        response.response_teams.len(),
        response.deployed_resources.len(),
        response.estimated_completion
    ));
    Ok(PhaseOutput::new(PhaseDelta::ResponseExecuted(response)).with_note(note))
}

pub async fn assess_damage(gateway: &ModelGateway, state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let threat = require_threat(state)?;
    let requests = damage::damage_requests(state.observation(), threat);
    let results = gateway.invoke_many(requests).await;
    let (assessment, notes) = damage::summarize(&results);
    Ok(PhaseOutput::new(PhaseDelta::Assessed {
        assessment,
        results,
    })
    .with_notes(notes))
}

pub async fn synthesize_report(summarizer: &Summarizer, state: &RunState) -> Result<PhaseOutput, PhaseError> {
    let (summary, note) = summarizer.summarize(template_summary(state)).await;
    let report = ReportAggregator::build(state, summary);
    let mut output = PhaseOutput::new(PhaseDelta::Reported(report));
    if let Some(note) = note {
        output = output.with_note(note);
    }
    Ok(output.with_note(LogNote::info("Final report synthesized")))
}

/// 可恢复阶段的默认增量；关键阶段没有默认值
pub fn fallback(step: Step, state: &RunState, reason: &str) -> Option<PhaseDelta> {
    match step {
        Step::AlertGeneration => Some(PhaseDelta::Alerted(Vec::new())),
        Step::ResponseExecution => Some(PhaseDelta::ResponseExecuted(ResponseExecution::not_started())),
        Step::DamageAssessment => Some(PhaseDelta::Assessed {
            assessment: DamageAssessment::unavailable(reason),
            results: Vec::new(),
        }),
        Step::ReportSynthesis => Some(PhaseDelta::Reported(ReportAggregator::build(
            state,
            template_summary(state),
        ))),
        Step::InputNormalization | Step::ThreatDetection | Step::AgentCoordination => None,
    }
}
