//! 野火专家：火行为（NFDRS4 火险 + Cell2Fire 蔓延模拟）与扑救后勤（本地公式估算）

use serde_json::{json, Value};

use crate::experts::{ensure_finite, round2, Capability, ExpertContext, ExpertError, OpinionDraft};
use crate::gateway::ModelRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildfireFocus {
    FireBehavior,
    SuppressionLogistics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildfireExpert {
    focus: WildfireFocus,
}

/// 简化火天气指标
#[derive(Debug, Clone, Copy)]
struct FireWeather {
    temperature: f64,
    humidity: f64,
    wind_speed: f64,
    haines_index: f64,
    fire_weather_index: f64,
}

impl FireWeather {
    fn from_readings(temperature: f64, humidity: f64, wind_speed: f64) -> Self {
        Self {
            temperature,
            humidity,
            wind_speed,
            haines_index: (temperature - 10.0) / 5.0 + (100.0 - humidity) / 20.0,
            fire_weather_index: temperature * wind_speed / (humidity + 10.0),
        }
    }

    fn danger_rating(&self) -> f64 {
        (self.haines_index * self.fire_weather_index / 10.0).min(10.0)
    }

    fn spread_probability(&self) -> f64 {
        (self.wind_speed * (100.0 - self.humidity) / 1000.0).clamp(0.0, 1.0)
    }
}

impl WildfireExpert {
    pub fn new(focus: WildfireFocus) -> Self {
        Self { focus }
    }

    pub fn capability(&self) -> Capability {
        match self.focus {
            WildfireFocus::FireBehavior => Capability::FireBehavior,
            WildfireFocus::SuppressionLogistics => Capability::SuppressionLogistics,
        }
    }

    pub(crate) async fn analyze(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let (temperature, t_missing) = ctx.reading("temperature", 20.0);
        let (humidity, h_missing) = ctx.reading("humidity", 50.0);
        let (wind_speed, w_missing) = ctx.reading("wind_speed", 10.0);
        let weather = FireWeather::from_readings(temperature, humidity, wind_speed);
        ensure_finite(
            self.capability(),
            &[
                ("haines_index", weather.haines_index),
                ("fire_weather_index", weather.fire_weather_index),
            ],
        )?;

        let mut draft = match self.focus {
            WildfireFocus::FireBehavior => self.fire_behavior(ctx, &weather).await,
            WildfireFocus::SuppressionLogistics => suppression_logistics(&weather),
        };
        draft.missing_readings = t_missing || h_missing || w_missing;
        Ok(draft)
    }

    async fn fire_behavior(&self, ctx: &ExpertContext<'_>, weather: &FireWeather) -> OpinionDraft {
        let loc = ctx.observation.location();
        let (lat, lng) = (loc.latitude, loc.longitude);
        let wind_direction = ctx.observation.reading("wind_direction").unwrap_or(0.0);
        let results = ctx
            .gateway
            .invoke_many(vec![
                ModelRequest::new(
                    "nfdrs4",
                    "fire_danger",
                    json!({
                        "weather_data": {
                            "temperature": weather.temperature,
                            "humidity": weather.humidity,
                            "wind_speed": weather.wind_speed,
                        },
                        "fuel_model": "G",
                    }),
                ),
                ModelRequest::new(
                    "cell2fire",
                    "simulate",
                    json!({
                        "ignition_points": [{ "x": lng, "y": lat, "ignition_time": 0 }],
                        "weather_scenario": {
                            "wind_speed": weather.wind_speed,
                            "wind_direction": wind_direction,
                            "temperature": weather.temperature,
                            "humidity": weather.humidity,
                        },
                        "simulation_time": 1440,
                    }),
                ),
            ])
            .await;

        let fwi = weather.fire_weather_index;
        let mut recommendations = Vec::new();
        if fwi > 20.0 {
            recommendations.push("Issue immediate evacuation orders downwind of the fire front".to_string());
        } else {
            recommendations.push("Prepare planned evacuation routes for threatened communities".to_string());
        }
        recommendations.push("Establish perimeter control lines around the active fire".to_string());

        let mut findings = json!({
            "haines_index": round2(weather.haines_index),
            "fire_weather_index": round2(fwi),
            "fire_danger_rating": round2(weather.danger_rating()),
            "spread_probability": round2(weather.spread_probability()),
            "evacuation_urgency": if fwi > 20.0 { "immediate" } else { "planned" },
        });

        if let Some(danger) = results[0].payload() {
            findings["danger_class"] = danger.get("danger_class").cloned().unwrap_or(Value::Null);
            if let Some(recs) = danger.get("recommendations").and_then(Value::as_array) {
                recommendations.extend(recs.iter().filter_map(Value::as_str).map(String::from));
            }
        }
        if let Some(spread) = results[1].payload() {
            findings["burned_area_ha"] = spread.get("burned_area").cloned().unwrap_or(Value::Null);
            findings["max_spread_rate_kmh"] =
                spread.get("max_spread_rate").cloned().unwrap_or(Value::Null);
            let zones: Vec<&str> = spread
                .get("evacuation_zones")
                .and_then(Value::as_array)
                .map(|z| z.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if !zones.is_empty() {
                recommendations.push(format!("Evacuate projected spread zones: {}", zones.join(", ")));
            }
        }

        OpinionDraft {
            base_confidence: 0.85,
            recommendations,
            findings,
            consumed: results,
            missing_readings: false,
        }
    }
}

fn suppression_logistics(weather: &FireWeather) -> OpinionDraft {
    let fwi = weather.fire_weather_index;
    let crew_size = ((fwi * 2.0) as u64).max(10);
    let air_support = weather.wind_speed > 30.0;

    let mut recommendations = vec![format!(
        "Deploy ground crews totalling {crew_size} firefighters to the fire perimeter"
    )];
    if air_support {
        recommendations.push(format!(
            "Request air support for suppression (wind {} km/h)",
            round2(weather.wind_speed)
        ));
    }
    recommendations.push("Pre-position water tenders along fuel breaks".to_string());

    OpinionDraft {
        base_confidence: 0.8,
        recommendations,
        findings: json!({
            "priority": if fwi > 25.0 { "critical" } else { "high" },
            "ground_crew_size": crew_size,
            "air_support_needed": air_support,
            "suppression_difficulty": round2((weather.wind_speed / 50.0).max(0.1)),
        }),
        consumed: Vec::new(),
        missing_readings: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_weather_indices() {
        let w = FireWeather::from_readings(42.0, 15.0, 35.0);
        // (42-10)/5 + 85/20 = 6.4 + 4.25
        assert!((w.haines_index - 10.65).abs() < 1e-9);
        // 42*35/25
        assert!((w.fire_weather_index - 58.8).abs() < 1e-9);
        assert_eq!(w.danger_rating(), 10.0);
        assert!((w.spread_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_suppression_crew_sizing() {
        let draft = suppression_logistics(&FireWeather::from_readings(42.0, 15.0, 35.0));
        assert_eq!(draft.findings["ground_crew_size"], 117);
        assert_eq!(draft.findings["air_support_needed"], true);
        assert_eq!(draft.findings["priority"], "critical");
        assert!(draft.consumed.is_empty());

        let calm = suppression_logistics(&FireWeather::from_readings(20.0, 50.0, 10.0));
        assert_eq!(calm.findings["ground_crew_size"], 10);
        assert_eq!(calm.recommendations.len(), 2);
    }
}
