//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 默认回显最后一条 User 消息；可预设固定回复或固定错误。

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    reply: Option<Result<String, String>>,
}

impl MockLlmClient {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Some(Ok(text.into())),
        }
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            reply: Some(Err(error.into())),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(reply) = &self.reply {
            return reply.clone();
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {last_user}"))
    }
}
