//! Haven - Rust 应急响应编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 运行状态、阶段、错误类型与恢复策略
//! - **incident**: 观测校验、信号提取、威胁分类与预警
//! - **gateway**: 科学模型网关（重试、超时、并发限制、健康检查）
//! - **experts**: 领域专家策略与注册表
//! - **coordinator**: 专家路由、并发调度与建议合并
//! - **workflow**: 七阶段工作流引擎与最终报告
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），用于报告摘要
//! - **observability**: 日志初始化
//! - **api**: HTTP 接口（feature `web`）

#[cfg(feature = "web")]
pub mod api;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod experts;
pub mod gateway;
pub mod incident;
pub mod llm;
pub mod observability;
pub mod workflow;

pub use workflow::{FinalReport, WorkflowEngine};
