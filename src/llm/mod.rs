//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{LlmClient, Message, Role};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// 按 [llm] 段创建客户端；provider = none（或未知）时返回 None
pub fn create_client(section: &LlmSection) -> Option<Arc<dyn LlmClient>> {
    match section.provider.trim().to_ascii_lowercase().as_str() {
        "deepseek" => Some(Arc::new(create_deepseek_client(
            section.model.as_deref(),
            section.base_url.as_deref(),
        ))),
        "openai" => Some(Arc::new(OpenAiClient::new(
            section.base_url.as_deref(),
            section.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
            None,
        ))),
        "none" | "" => None,
        other => {
            tracing::warn!(provider = other, "Unknown LLM provider, summaries use the template only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_selection() {
        let mut section = LlmSection::default();
        assert!(create_client(&section).is_none());
        section.provider = "DeepSeek".into();
        assert!(create_client(&section).is_some());
        section.provider = "bard".into();
        assert!(create_client(&section).is_none());
    }
}
