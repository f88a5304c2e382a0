//! 洪水专家：降水 / 河道水位 / 水库蓄量综合风险，结合 LISFLOOD 预报

use serde_json::{json, Value};

use crate::experts::{ensure_finite, round2, Capability, ExpertContext, ExpertError, OpinionDraft};

const FORECAST_DAYS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloodExpert;

/// 综合洪水风险：降水 40%、水位 40%、库容 20%
fn flood_risk(precipitation: f64, river_level: f64, dam_capacity: f64) -> f64 {
    (precipitation / 50.0) * 0.4 + (river_level / 10.0) * 0.4 + (dam_capacity / 100.0) * 0.2
}

fn evacuation_zones(precipitation: f64, river_level: f64) -> Vec<&'static str> {
    let mut zones = Vec::new();
    if river_level > 8.0 || precipitation > 40.0 {
        zones.push("Riverside District");
        zones.push("Downtown Low Areas");
    }
    if river_level > 6.0 || precipitation > 25.0 {
        zones.push("Floodplains");
    }
    zones
}

impl FloodExpert {
    pub(crate) async fn analyze(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let (precipitation, p_missing) = ctx.reading("precipitation", 0.0);
        let (river_level, r_missing) = ctx.reading("river_level", 0.0);
        let (dam_capacity, _) = ctx.reading("dam_capacity", 50.0);

        let risk = flood_risk(precipitation, river_level, dam_capacity);
        ensure_finite(Capability::FloodRouting, &[("flood_risk", risk)])?;

        let forecast = ctx
            .gateway
            .invoke(
                "lisflood",
                "forecast",
                json!({ "location": ctx.location(), "forecast_days": FORECAST_DAYS }),
                ctx.gateway.settings().request_timeout,
            )
            .await;

        let zones = evacuation_zones(precipitation, river_level);
        let boats = ((risk * 10.0) as u64).max(2);
        let release = dam_capacity > 90.0;

        let mut recommendations = Vec::new();
        if !zones.is_empty() {
            recommendations.push(format!("Evacuate flood zones: {}", zones.join(", ")));
        }
        if release {
            recommendations.push(format!(
                "Coordinate controlled dam release (reservoir at {}% capacity)",
                round2(dam_capacity)
            ));
        }
        recommendations.push(format!("Deploy {boats} rescue boats to low-lying areas"));
        recommendations.push("Set up sandbag barriers along vulnerable riverbanks".to_string());

        let mut findings = json!({
            "flood_risk": round2(risk),
            "evacuation_zones": zones,
            "dam_release_recommended": release,
            "rescue_boats": boats,
        });

        if let Some(payload) = forecast.payload() {
            let warnings = payload.get("warnings").cloned().unwrap_or(Value::Null);
            if warnings
                .get("evacuation_recommended")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                recommendations.push("Follow model-issued evacuation advisory".to_string());
            }
            if let Some(assets) = warnings.get("infrastructure_at_risk").and_then(Value::as_array) {
                let names: Vec<&str> = assets.iter().filter_map(Value::as_str).collect();
                if !names.is_empty() {
                    recommendations.push(format!("Inspect infrastructure at risk: {}", names.join(", ")));
                }
            }
            findings["forecast_warnings"] = warnings;
        }

        Ok(OpinionDraft {
            base_confidence: 0.8,
            recommendations,
            findings,
            consumed: vec![forecast],
            missing_readings: p_missing && r_missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flood_risk_weights() {
        // 60/50*0.4 + 9/10*0.4 + 95/100*0.2
        assert!((flood_risk(60.0, 9.0, 95.0) - 1.03).abs() < 1e-9);
        assert_eq!(flood_risk(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_evacuation_zones_by_level() {
        assert_eq!(
            evacuation_zones(45.0, 2.0),
            vec!["Riverside District", "Downtown Low Areas", "Floodplains"]
        );
        assert_eq!(evacuation_zones(10.0, 7.0), vec!["Floodplains"]);
        assert!(evacuation_zones(10.0, 3.0).is_empty());
    }
}
