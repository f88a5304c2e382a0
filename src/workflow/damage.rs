//! 损失评估：按灾害类型选择损失模型，并发调用后汇总
//!
//! - 所有类型：climada/impact_assessment
//! - 野火追加 cell2fire/simulate；洪水、飓风追加 lisflood/simulation；地震追加 climada/hazard_modeling
//!
//! 部分失败记降级日志；全部失败返回 `Unavailable`，从不致命。

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::LogNote;
use crate::gateway::{ModelInvocationResult, ModelRequest};
use crate::incident::{DisasterType, EmergencyObservation, SeverityLevel, ThreatAssessment};

/// 洪水模拟最高水位超过该值时风险至少为 high（米）
const WATER_LEVEL_ALERT_M: f64 = 2.0;
const SIMULATION_DAYS: i64 = 5;
/// 载荷未给出置信度时使用
const DEFAULT_PAYLOAD_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DamageAssessment {
    Available {
        economic_damage: f64,
        affected_people: u64,
        risk_level: SeverityLevel,
        confidence: f64,
        sources: Vec<String>,
        failed_sources: Vec<String>,
    },
    Unavailable {
        reason: String,
    },
}

impl DamageAssessment {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        DamageAssessment::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, DamageAssessment::Available { .. })
    }
}

/// 区域名转为流域 id：小写字母数字，其余折叠为 `_`
fn catchment_id(region: &str) -> String {
    let mut id = String::new();
    for ch in region.chars() {
        if ch.is_ascii_alphanumeric() {
            id.push(ch.to_ascii_lowercase());
        } else if !id.ends_with('_') && !id.is_empty() {
            id.push('_');
        }
    }
    id.trim_end_matches('_').to_string()
}

pub fn damage_requests(observation: &EmergencyObservation, threat: &ThreatAssessment) -> Vec<ModelRequest> {
    let loc = observation.location();
    let location = json!({ "lat": loc.latitude, "lng": loc.longitude, "region": loc.region });
    let mut requests = vec![ModelRequest::new(
        "climada",
        "impact_assessment",
        json!({
            "hazard_type": threat.disaster_type.as_str(),
            "location": location.clone(),
            "intensity": threat.severity.factor(),
        }),
    )];

    match threat.disaster_type {
        DisasterType::Wildfire => {
            let reading = |key: &str, default: f64| observation.reading(key).unwrap_or(default);
            requests.push(ModelRequest::new(
                "cell2fire",
                "simulate",
                json!({
                    "ignition_points": [{ "x": loc.longitude, "y": loc.latitude, "ignition_time": 0 }],
                    "weather_scenario": {
                        "wind_speed": reading("wind_speed", 10.0),
                        "wind_direction": reading("wind_direction", 0.0),
                        "temperature": reading("temperature", 20.0),
                        "humidity": reading("humidity", 50.0),
                    },
                    "simulation_time": 1440,
                }),
            ));
        }
        DisasterType::Flood | DisasterType::Hurricane => {
            let start = observation.captured_at();
            let end = start + ChronoDuration::days(SIMULATION_DAYS);
            requests.push(ModelRequest::new(
                "lisflood",
                "simulation",
                json!({
                    "catchment_id": catchment_id(&loc.region),
                    "start_date": start.format("%Y-%m-%d").to_string(),
                    "end_date": end.format("%Y-%m-%d").to_string(),
                }),
            ));
        }
        DisasterType::Earthquake => {
            requests.push(ModelRequest::new(
                "climada",
                "hazard_modeling",
                json!({
                    "hazard_type": "earthquake",
                    "location": location,
                    "time_horizon": 50,
                }),
            ));
        }
        DisasterType::Other => {}
    }
    requests
}

fn risk_from_damage(economic_damage: f64) -> SeverityLevel {
    if economic_damage > 5_000_000.0 {
        SeverityLevel::Critical
    } else if economic_damage > 1_000_000.0 {
        SeverityLevel::High
    } else if economic_damage > 100_000.0 {
        SeverityLevel::Medium
    } else {
        SeverityLevel::Low
    }
}

fn max_water_level(payload: &Value) -> Option<f64> {
    payload.pointer("/results/max_water_level").and_then(Value::as_f64)
}

/// 汇总损失模型结果，返回评估与日志说明
pub fn summarize(results: &[ModelInvocationResult]) -> (DamageAssessment, Vec<LogNote>) {
    let total = results.len();
    let (succeeded, failed): (Vec<&ModelInvocationResult>, Vec<&ModelInvocationResult>) =
        results.iter().partition(|r| r.is_success());
    let failed_sources: Vec<String> = failed.iter().map(|r| r.target()).collect();

    if succeeded.is_empty() {
        let detail = failed
            .iter()
            .map(|r| {
                let kind = r.failure_kind().map(|k| k.as_str()).unwrap_or("unknown");
                format!("{} ({kind})", r.target())
            })
            .collect::<Vec<_>>()
            .join(", ");
        let reason = format!("all {total} damage model calls failed: {detail}");
        let note = LogNote::degraded(format!("Damage assessment unavailable: {reason}"));
        return (DamageAssessment::unavailable(reason), vec![note]);
    }

    let mut economic_damage = 0.0;
    let mut affected_people = 0u64;
    let mut risk_floor = SeverityLevel::Low;
    let mut best_confidence: Option<f64> = None;
    for result in &succeeded {
        let Some(payload) = result.payload() else {
            continue;
        };
        economic_damage += payload.get("economic_damage").and_then(Value::as_f64).unwrap_or(0.0);
        let people = payload
            .get("affected_people")
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
            .unwrap_or(0);
        affected_people = affected_people.saturating_add(people);
        if max_water_level(payload).is_some_and(|level| level > WATER_LEVEL_ALERT_M) {
            risk_floor = SeverityLevel::High;
        }
        if let Some(c) = result.payload_confidence() {
            best_confidence = Some(best_confidence.map_or(c, |b: f64| b.max(c)));
        }
    }

    let success_ratio = succeeded.len() as f64 / total as f64;
    let confidence = best_confidence.unwrap_or(DEFAULT_PAYLOAD_CONFIDENCE) * success_ratio;
    let risk_level = risk_from_damage(economic_damage).max(risk_floor);

    let note = if failed.is_empty() {
        LogNote::info(format!(
            "Damage assessed from {total} model(s): risk {}",
            risk_level.as_str()
        ))
    } else {
        LogNote::degraded(format!(
            "Damage assessment degraded: {} of {total} model calls failed ({})",
            failed.len(),
            failed_sources.join(", ")
        ))
    };

    (
        DamageAssessment::Available {
            economic_damage,
            affected_people,
            risk_level,
            confidence,
            sources: succeeded.iter().map(|r| r.target()).collect(),
            failed_sources,
        },
        vec![note],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::gateway::{FailureKind, InvocationOutcome};

    fn ok(backend: &str, operation: &str, payload: Value) -> ModelInvocationResult {
        ModelInvocationResult {
            backend: backend.into(),
            operation: operation.into(),
            params: json!({}),
            outcome: InvocationOutcome::Success { payload },
            duration_ms: 1,
            attempts: 1,
        }
    }

    fn timed_out(backend: &str, operation: &str) -> ModelInvocationResult {
        ModelInvocationResult {
            backend: backend.into(),
            operation: operation.into(),
            params: json!({}),
            outcome: InvocationOutcome::Failure {
                kind: FailureKind::Timeout,
                message: "deadline elapsed".into(),
            },
            duration_ms: 1,
            attempts: 3,
        }
    }

    #[test]
    fn test_catchment_id() {
        assert_eq!(catchment_id("Lower Rhine / Basin"), "lower_rhine_basin");
        assert_eq!(catchment_id("  Test County "), "test_county");
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(risk_from_damage(6e6), SeverityLevel::Critical);
        assert_eq!(risk_from_damage(2e6), SeverityLevel::High);
        assert_eq!(risk_from_damage(5e5), SeverityLevel::Medium);
        assert_eq!(risk_from_damage(1e5), SeverityLevel::Low);
    }

    #[test]
    fn test_partial_failure_is_degraded() {
        let results = vec![
            ok("climada", "impact_assessment", json!({"economic_damage": 750000.0, "affected_people": 7500, "confidence": 0.8})),
            timed_out("lisflood", "simulation"),
        ];
        let (assessment, notes) = summarize(&results);
        match assessment {
            DamageAssessment::Available {
                risk_level,
                confidence,
                failed_sources,
                ..
            } => {
                assert_eq!(risk_level, SeverityLevel::Medium);
                assert!((confidence - 0.4).abs() < 1e-9);
                assert_eq!(failed_sources, vec!["lisflood/simulation"]);
            }
            other => panic!("expected available assessment, got {other:?}"),
        }
        assert_eq!(notes[0].level, LogLevel::Degraded);
    }

    #[test]
    fn test_water_level_forces_high_risk() {
        let results = vec![
            ok("climada", "impact_assessment", json!({"economic_damage": 50000.0, "confidence": 0.8})),
            ok("lisflood", "simulation", json!({"results": {"max_water_level": 3.8}})),
        ];
        let (assessment, notes) = summarize(&results);
        assert!(matches!(
            assessment,
            DamageAssessment::Available { risk_level: SeverityLevel::High, .. }
        ));
        assert_eq!(notes[0].level, LogLevel::Info);
    }

    #[test]
    fn test_affected_people_saturates() {
        let results = vec![
            ok("climada", "impact_assessment", json!({"affected_people": u64::MAX})),
            ok("climada", "hazard_modeling", json!({"affected_people": u64::MAX})),
        ];
        let (assessment, _) = summarize(&results);
        assert!(matches!(
            assessment,
            DamageAssessment::Available { affected_people: u64::MAX, .. }
        ));
    }

    #[test]
    fn test_total_failure_is_unavailable() {
        let (assessment, notes) = summarize(&[timed_out("climada", "impact_assessment")]);
        assert!(!assessment.is_available());
        assert_eq!(notes[0].level, LogLevel::Degraded);
        assert!(notes[0].message.contains("climada/impact_assessment (timeout)"));
    }
}
