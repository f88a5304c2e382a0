//! 地震专家
//!
//! - `SeismicImpact`：震级 / 震源深度估算地表烈度与破坏概率，调用 CLIMADA 危险建模
//! - `StructuralIntegrity`：建筑与基础设施评估，洪水与地震场景共用，不调用外部模型

use serde_json::{json, Value};

use crate::experts::{ensure_finite, round2, Capability, ExpertContext, ExpertError, OpinionDraft};
use crate::incident::DisasterType;

const HAZARD_HORIZON_YEARS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeismicFocus {
    SeismicImpact,
    StructuralIntegrity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeExpert {
    focus: SeismicFocus,
}

#[derive(Debug, Clone, Copy)]
struct GroundShaking {
    magnitude: f64,
    depth_km: f64,
    surface_intensity: f64,
    damage_probability: f64,
}

impl GroundShaking {
    fn estimate(magnitude: f64, depth_km: f64, vulnerability: f64) -> Self {
        Self {
            magnitude,
            depth_km,
            surface_intensity: magnitude - 0.0031 * depth_km,
            damage_probability: ((magnitude - 4.0) / 5.0).clamp(0.0, 1.0) * vulnerability,
        }
    }
}

impl EarthquakeExpert {
    pub fn new(focus: SeismicFocus) -> Self {
        Self { focus }
    }

    pub fn capability(&self) -> Capability {
        match self.focus {
            SeismicFocus::SeismicImpact => Capability::SeismicImpact,
            SeismicFocus::StructuralIntegrity => Capability::StructuralIntegrity,
        }
    }

    pub(crate) async fn analyze(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        match self.focus {
            SeismicFocus::SeismicImpact => self.seismic_impact(ctx).await,
            SeismicFocus::StructuralIntegrity => self.structural_integrity(ctx),
        }
    }

    async fn seismic_impact(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let (magnitude, m_missing) = ctx.reading("magnitude", 0.0);
        let (depth, _) = ctx.reading("depth", 10.0);
        let (vulnerability, _) = ctx.reading("vulnerability_index", 0.5);
        let shaking = GroundShaking::estimate(magnitude, depth, vulnerability);
        ensure_finite(
            self.capability(),
            &[
                ("surface_intensity", shaking.surface_intensity),
                ("damage_probability", shaking.damage_probability),
            ],
        )?;

        let hazard = ctx
            .gateway
            .invoke(
                "climada",
                "hazard_modeling",
                json!({
                    "hazard_type": DisasterType::Earthquake.as_str(),
                    "location": ctx.location(),
                    "time_horizon": HAZARD_HORIZON_YEARS,
                }),
                ctx.gateway.settings().request_timeout,
            )
            .await;

        let mut recommendations = Vec::new();
        if shaking.magnitude >= 6.0 {
            recommendations.push("Launch urban search and rescue operations".to_string());
            recommendations.push("Evacuate structurally compromised buildings".to_string());
        } else {
            recommendations.push("Conduct rapid visual screening of buildings".to_string());
        }
        recommendations.push("Prepare for aftershocks and keep open-air shelters available".to_string());
        if shaking.damage_probability > 0.3 {
            recommendations.push("Stage medical triage near the most affected districts".to_string());
        }

        let mut findings = json!({
            "magnitude": round2(shaking.magnitude),
            "depth_km": round2(shaking.depth_km),
            "surface_intensity": round2(shaking.surface_intensity),
            "damage_probability": round2(shaking.damage_probability),
        });
        if let Some(payload) = hazard.payload() {
            findings["hazard_scenarios"] = payload.get("scenario_results").cloned().unwrap_or(Value::Null);
        }

        Ok(OpinionDraft {
            base_confidence: 0.8,
            recommendations,
            findings,
            consumed: vec![hazard],
            missing_readings: m_missing,
        })
    }

    fn structural_integrity(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let mut recommendations = Vec::new();
        let mut findings = json!({ "context": ctx.threat.disaster_type.as_str() });
        let missing = match ctx.threat.disaster_type {
            DisasterType::Flood | DisasterType::Hurricane => {
                let (river_level, r_missing) = ctx.reading("river_level", 0.0);
                let scour_risk = (river_level / 10.0).clamp(0.0, 1.0);
                ensure_finite(self.capability(), &[("scour_risk", scour_risk)])?;
                if scour_risk > 0.5 {
                    recommendations.push("Close bridges and embankments with scour risk".to_string());
                }
                recommendations.push("Inspect levees and flood defences for seepage".to_string());
                findings["scour_risk"] = json!(round2(scour_risk));
                findings["inspection_teams"] = json!(((scour_risk * 10.0) as u64).max(2));
                r_missing
            }
            _ => {
                let (magnitude, m_missing) = ctx.reading("magnitude", 0.0);
                ensure_finite(self.capability(), &[("magnitude", magnitude)])?;
                let engineers = (magnitude as u64).max(2);
                recommendations.push(format!(
                    "Dispatch {engineers} structural engineering teams for damage triage"
                ));
                recommendations.push("Tag unsafe buildings and restrict access".to_string());
                findings["engineering_teams"] = json!(engineers);
                m_missing
            }
        };
        recommendations.push("Check critical facilities (hospitals, schools, power)".to_string());

        Ok(OpinionDraft {
            base_confidence: 0.75,
            recommendations,
            findings,
            consumed: Vec::new(),
            missing_readings: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_shaking_estimate() {
        let s = GroundShaking::estimate(7.0, 10.0, 0.5);
        assert!((s.surface_intensity - 6.969).abs() < 1e-9);
        // (7-4)/5 * 0.5
        assert!((s.damage_probability - 0.3).abs() < 1e-9);

        let small = GroundShaking::estimate(3.0, 10.0, 0.5);
        assert_eq!(small.damage_probability, 0.0);
    }
}
