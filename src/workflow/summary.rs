//! 报告摘要：确定性模板摘要，可选由语言模型润色
//!
//! 模型未配置时直接使用模板；模型失败、超时或返回空文本时回退模板并记降级日志。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::core::{LogNote, RunState};
use crate::llm::{LlmClient, Message};
use crate::workflow::{DamageAssessment, ResponseStatus};

const SYSTEM_PROMPT: &str = "You are an emergency operations officer. Rewrite the situation \
summary below as a concise briefing for responders. Keep every number, place name and \
instruction. Do not add facts. Reply with the briefing text only.";

/// 由运行状态生成模板摘要（同一状态总是得到同一文本）
pub fn template_summary(state: &RunState) -> String {
    let region = state.observation().region();
    let mut parts = Vec::new();

    match state.threat() {
        Some(threat) => parts.push(format!(
            "{} {} threat detected in {} (confidence {:.0}%).",
            capitalize(threat.severity.as_str()),
            threat.disaster_type.as_str(),
            region,
            threat.confidence * 100.0
        )),
        None => parts.push(format!("Threat classification unavailable for {region}.")),
    }

    if let Some(alert) = state.alerts().first() {
        parts.push(format!(
            "Alert issued: {} ({} channel(s)).",
            alert.title,
            alert.channels.len()
        ));
    }

    if let Some(plan) = state.plan() {
        parts.push(format!(
            "{} of {} expert(s) responded with aggregate confidence {:.0}%.",
            plan.opinions.len(),
            plan.activated_experts.len(),
            plan.aggregate_confidence * 100.0
        ));
        if let Some(first) = plan.recommendations.first() {
            parts.push(format!("Priority action: {}.", first.trim_end_matches('.')));
        }
    }

    match state.damage() {
        Some(DamageAssessment::Available {
            economic_damage,
            affected_people,
            risk_level,
            ..
        }) => parts.push(format!(
            "Estimated economic damage ${economic_damage:.0} affecting {affected_people} people (risk: {}).",
            risk_level.as_str()
        )),
        _ => parts.push("Damage assessment unavailable.".to_string()),
    }

    if let Some(response) = state.response() {
        parts.push(format!(
            "Response status: {}, estimated completion {}.",
            match response.status {
                ResponseStatus::InProgress => "in progress",
                ResponseStatus::NotStarted => "not started",
            },
            response.estimated_completion
        ));
    }

    parts.join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 摘要生成器；llm 为 None 时只用模板
#[derive(Clone)]
pub struct Summarizer {
    llm: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl Summarizer {
    pub fn template_only() -> Self {
        Self {
            llm: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            llm: Some(llm),
            timeout,
        }
    }

    /// 返回摘要与可选日志说明
    pub async fn summarize(&self, template: String) -> (String, Option<LogNote>) {
        let Some(llm) = &self.llm else {
            return (template, None);
        };
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(template.clone())];
        let reason = match timeout(self.timeout, llm.complete(&messages)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return (
                    text.trim().to_string(),
                    Some(LogNote::info("Summary refined by language model")),
                );
            }
            Ok(Ok(_)) => "empty response".to_string(),
            Ok(Err(e)) => e,
            Err(_) => format!("timed out after {}s", self.timeout.as_secs()),
        };
        tracing::warn!(reason = %reason, "Summary model failed, using template");
        (
            template,
            Some(LogNote::degraded(format!(
                "Language model summary unavailable ({reason}); template summary used"
            ))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_template_only() {
        let (text, note) = Summarizer::template_only().summarize("base".into()).await;
        assert_eq!(text, "base");
        assert!(note.is_none());
    }

    #[tokio::test]
    async fn test_llm_rewrite_and_fallback() {
        let ok = Summarizer::with_llm(
            Arc::new(MockLlmClient::replying(" Briefing ")),
            Duration::from_secs(5),
        );
        let (text, note) = ok.summarize("base".into()).await;
        assert_eq!(text, "Briefing");
        assert_eq!(note.map(|n| n.level), Some(LogLevel::Info));

        let failing = Summarizer::with_llm(
            Arc::new(MockLlmClient::failing("401 unauthorized")),
            Duration::from_secs(5),
        );
        let (text, note) = failing.summarize("base".into()).await;
        assert_eq!(text, "base");
        let note = note.unwrap();
        assert_eq!(note.level, LogLevel::Degraded);
        assert!(note.message.contains("401 unauthorized"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("critical"), "Critical");
        assert_eq!(capitalize(""), "");
    }
}
