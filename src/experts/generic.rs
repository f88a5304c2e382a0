//! 通用专家：无法归类的事件只给出保守建议，不调用外部模型

use serde_json::json;

use crate::experts::{ExpertContext, ExpertError, OpinionDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericExpert;

impl GenericExpert {
    pub(crate) async fn analyze(&self, ctx: &ExpertContext<'_>) -> Result<OpinionDraft, ExpertError> {
        let region = ctx.observation.region();
        Ok(OpinionDraft {
            base_confidence: 0.5,
            recommendations: vec![
                "Stay alert".to_string(),
                "Follow official guidance".to_string(),
                "Monitor conditions".to_string(),
                format!("Dispatch assessment team to {region}"),
            ],
            findings: json!({
                "classified_as": ctx.threat.disaster_type.as_str(),
                "severity": ctx.threat.severity.as_str(),
            }),
            consumed: Vec::new(),
            missing_readings: false,
        })
    }
}
