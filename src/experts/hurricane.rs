//! 飓风专家：Saffir-Simpson 分级、风暴潮风险，结合 Pangu 与 Aurora 预报

use serde_json::{json, Value};

use crate::experts::{ensure_finite, round2, Capability, ExpertContext, ExpertError, OpinionDraft};
use crate::gateway::ModelRequest;

/// 1~5 级的最低持续风速（km/h）
const CATEGORY_THRESHOLDS: [f64; 5] = [119.0, 154.0, 178.0, 209.0, 252.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HurricaneExpert;

/// 0 表示未达飓风强度
fn storm_category(wind_speed: f64) -> u8 {
    CATEGORY_THRESHOLDS
        .iter()
        .take_while(|&&min| wind_speed >= min)
        .count() as u8
}

#[derive(Debug, Clone, Copy)]
struct StormImpact {
    category: u8,
    wind_damage: f64,
    surge_damage: f64,
}

impl StormImpact {
    fn estimate(wind_speed: f64, storm_surge: f64) -> Self {
        Self {
            category: storm_category(wind_speed),
            wind_damage: (wind_speed / 250.0).min(1.0),
            surge_damage: (storm_surge / 10.0).min(1.0),
        }
    }

    fn combined(&self) -> f64 {
        self.wind_damage.max(self.surge_damage)
    }
}

impl HurricaneExpert {
    pub(crate) async fn analyze(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let (wind_speed, w_missing) = ctx.reading("wind_speed", 0.0);
        let (pressure, _) = ctx.reading("pressure", 1013.0);
        let (storm_surge, _) = ctx.reading("storm_surge", 0.0);
        let impact = StormImpact::estimate(wind_speed, storm_surge);
        ensure_finite(
            Capability::StormTracking,
            &[("wind_damage", impact.wind_damage), ("surge_damage", impact.surge_damage)],
        )?;

        let loc = ctx.observation.location();
        let results = ctx
            .gateway
            .invoke_many(vec![
                ModelRequest::new(
                    "pangu",
                    "forecast",
                    json!({ "location": ctx.location(), "forecast_hours": 120 }),
                ),
                ModelRequest::new(
                    "aurora",
                    "forecast",
                    json!({
                        "region": {
                            "lat_min": loc.latitude - 2.0,
                            "lat_max": loc.latitude + 2.0,
                            "lon_min": loc.longitude - 2.0,
                            "lon_max": loc.longitude + 2.0,
                        },
                        "forecast_steps": 40,
                    }),
                ),
            ])
            .await;

        let mandatory = wind_speed > 150.0 || storm_surge > 3.0;
        let shelters = ((impact.combined() * 10.0) as u64).max(3);
        let evacuation_hours = if impact.category >= 3 { 72 } else { 48 };

        let mut recommendations = Vec::new();
        if mandatory {
            recommendations.push(format!(
                "Order mandatory evacuation of coastal zones within {evacuation_hours} hours"
            ));
        } else {
            recommendations.push("Issue voluntary evacuation advisory for coastal zones".to_string());
        }
        recommendations.push(format!("Open {shelters} emergency shelters inland"));
        recommendations.push("Secure loose objects and board up windows".to_string());
        if storm_surge > 1.0 {
            recommendations.push("Close coastal roads ahead of storm surge".to_string());
        }

        let mut findings = json!({
            "category": impact.category,
            "central_pressure": round2(pressure),
            "wind_damage": round2(impact.wind_damage),
            "surge_damage": round2(impact.surge_damage),
            "mandatory_evacuation": mandatory,
            "evacuation_window_hours": evacuation_hours,
            "shelters": shelters,
        });
        if let Some(payload) = results[0].payload() {
            findings["weather_forecast"] = payload.get("forecast").cloned().unwrap_or(Value::Null);
        }
        if let Some(payload) = results[1].payload() {
            findings["atmospheric_forecast"] = payload
                .get("atmospheric_variables")
                .cloned()
                .unwrap_or(Value::Null);
        }

        Ok(OpinionDraft {
            base_confidence: 0.85,
            recommendations,
            findings,
            consumed: results,
            missing_readings: w_missing,
        })
    }
}
