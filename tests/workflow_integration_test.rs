//! 工作流集成测试

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use haven::config::GatewaySection;
    use haven::coordinator::Coordinator;
    use haven::core::{LogLevel, ValidationError};
    use haven::experts::{route, Capability, ExpertRegistry};
    use haven::gateway::{build_gateway, GatewaySettings, ModelGateway, ScriptedBackend, ScriptedReply};
    use haven::incident::{DisasterType, EmergencyObservation, ObservationInput, SeverityLevel};
    use haven::workflow::summary::Summarizer;
    use haven::workflow::{DamageAssessment, WorkflowEngine};
    use serde_json::{json, Value};

    fn engine_with(gateway: ModelGateway) -> WorkflowEngine {
        let coordinator = Coordinator::new(
            Arc::new(ExpertRegistry::standard()),
            Arc::new(gateway),
            Duration::from_secs(60),
        );
        WorkflowEngine::new(coordinator, Summarizer::template_only(), Duration::from_secs(120))
    }

    fn simulated_engine() -> WorkflowEngine {
        engine_with(build_gateway(&GatewaySection::default()).unwrap())
    }

    fn wildfire_observation() -> EmergencyObservation {
        ObservationInput {
            modality: "sensor".into(),
            content: json!({ "temperature": 42, "humidity": 15, "wind_speed": 35 }),
            latitude: Some(34.05),
            longitude: Some(-118.25),
            region: "Test County".into(),
            captured_at: Some("2024-07-01T12:00:00Z".into()),
            source: Some("station-7".into()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn strip_timestamps(value: &mut Value) {
        match value {
            Value::Object(map) => {
                map.remove("timestamp");
                map.values_mut().for_each(strip_timestamps);
            }
            Value::Array(items) => items.iter_mut().for_each(strip_timestamps),
            _ => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wildfire_sensor_event() {
        let report = simulated_engine().process(wildfire_observation()).await.unwrap();

        assert_eq!(report.threat_assessment.disaster_type, DisasterType::Wildfire);
        assert!(report.threat_assessment.severity >= SeverityLevel::High);
        assert!(!report.alerts.is_empty());
        assert!(report.alerts.iter().all(|a| !a.instructions.is_empty()));
        assert!(report
            .coordination_results
            .responding_experts
            .contains(&Capability::FireBehavior));
        assert!(!report.recommendations.is_empty());
        assert!(report.damage_assessment.is_available());
        assert_eq!(report.report_id, "rpt-station-7-20240701T120000Z");

        let phases: Vec<&str> = report.processing_log.iter().map(|e| e.phase.as_str()).collect();
        for name in WorkflowEngine::phase_names() {
            assert!(phases.contains(&name), "missing log entry for {name}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_observation_same_report() {
        let engine = simulated_engine();
        let first = engine.process(wildfire_observation()).await.unwrap();
        let second = engine.process(wildfire_observation()).await.unwrap();

        let mut a = serde_json::to_value(&first).unwrap();
        let mut b = serde_json::to_value(&second).unwrap();
        strip_timestamps(&mut a);
        strip_timestamps(&mut b);
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_damage_model_degrades_report() {
        let settings = GatewaySettings {
            request_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let gateway = ModelGateway::new(settings)
            .with_backend(Arc::new(
                ScriptedBackend::new("climada", &["impact_assessment"]).otherwise(ScriptedReply::ok(
                    json!({ "economic_damage": 750000.0, "affected_people": 7500, "confidence": 0.8 }),
                )),
            ))
            .with_backend(Arc::new(
                ScriptedBackend::new("lisflood", &["forecast", "simulation"])
                    .on("forecast", ScriptedReply::ok(json!({ "flood_probability": 0.6, "confidence": 0.8 })))
                    .on(
                        "simulation",
                        ScriptedReply::ok(json!({})).after(Duration::from_secs(10)),
                    ),
            ));

        let observation = ObservationInput {
            modality: "text".into(),
            content: json!("flood water rising over the river dam"),
            latitude: Some(51.9),
            longitude: Some(6.1),
            region: "Lower Rhine".into(),
            ..Default::default()
        }
        .validate()
        .unwrap();

        let report = engine_with(gateway).process(observation).await.unwrap();
        assert_eq!(report.threat_assessment.disaster_type, DisasterType::Flood);
        match &report.damage_assessment {
            DamageAssessment::Available {
                sources,
                failed_sources,
                ..
            } => {
                assert_eq!(sources, &vec!["climada/impact_assessment".to_string()]);
                assert_eq!(failed_sources, &vec!["lisflood/simulation".to_string()]);
            }
            other => panic!("expected available assessment, got {other:?}"),
        }
        assert!(report.is_degraded());
        assert!(report
            .processing_log
            .iter()
            .any(|e| e.phase == "damage_assessment" && e.level == LogLevel::Degraded));
    }

    #[test]
    fn test_garbled_modality_is_rejected() {
        let err = ObservationInput {
            modality: "hologram".into(),
            content: json!("???"),
            latitude: Some(0.0),
            longitude: Some(0.0),
            region: "Nowhere".into(),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedModality("hologram".into()));
    }

    #[test]
    fn test_routing_sets() {
        assert_eq!(
            route(DisasterType::Wildfire),
            &[Capability::FireBehavior, Capability::SuppressionLogistics]
        );
        assert_eq!(
            route(DisasterType::Flood),
            &[Capability::FloodRouting, Capability::StructuralIntegrity]
        );
        assert_eq!(
            route(DisasterType::Earthquake),
            &[Capability::SeismicImpact, Capability::StructuralIntegrity]
        );
        assert_eq!(
            route(DisasterType::Hurricane),
            &[Capability::StormTracking, Capability::FloodRouting]
        );
        assert_eq!(route(DisasterType::Other), &[Capability::General]);
    }
}
