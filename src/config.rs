//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HAVEN__*` 覆盖（双下划线表示嵌套，如 `HAVEN__GATEWAY__MAX_ATTEMPTS=5`）。
//! 所有段均有默认值，空配置即可运行。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::gateway::{GatewaySettings, RetryPolicy};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub log: LogSection,
    pub llm: LlmSection,
    pub gateway: GatewaySection,
    pub coordinator: CoordinatorSection,
    pub workflow: WorkflowSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    "haven".to_string()
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:2024".to_string()
}

/// [log] 段：默认日志级别（RUST_LOG 优先）
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// [llm] 段：摘要润色所用的语言模型；provider = none 时只用模板摘要
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// deepseek / openai / none
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 单次请求超时（秒）
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "none".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// [gateway] 段：超时、重试、并发与各后端 endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_per_backend: usize,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    /// [gateway.backends.<id>]
    #[serde(default)]
    pub backends: BTreeMap<String, BackendSection>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_concurrent_per_backend: default_max_concurrent(),
            health_timeout_ms: default_health_timeout_ms(),
            backends: BTreeMap::new(),
        }
    }
}

impl GatewaySection {
    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay_ms: self.base_delay_ms,
                max_delay_ms: self.max_delay_ms,
            },
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            max_concurrent_per_backend: self.max_concurrent_per_backend,
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_health_timeout_ms() -> u64 {
    2_000
}

/// [gateway.backends.<id>] 段：未设置 endpoint 时使用进程内模拟后端
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub endpoint: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 目录之外的后端需声明支持的操作
    #[serde(default)]
    pub operations: Vec<String>,
    pub description: Option<String>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            enabled: default_enabled(),
            operations: Vec::new(),
            description: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// [coordinator] 段
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSection {
    #[serde(default = "default_expert_timeout_secs")]
    pub expert_timeout_secs: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            expert_timeout_secs: default_expert_timeout_secs(),
        }
    }
}

fn default_expert_timeout_secs() -> u64 {
    60
}

/// [workflow] 段
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_phase_timeout_secs")]
    pub phase_timeout_secs: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            phase_timeout_secs: default_phase_timeout_secs(),
        }
    }
}

fn default_phase_timeout_secs() -> u64 {
    120
}

/// 从 config 目录加载配置，环境变量 HAVEN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HAVEN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HAVEN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:2024");
        assert_eq!(cfg.gateway.max_attempts, 3);
        assert_eq!(cfg.gateway.base_delay_ms, 500);
        assert_eq!(cfg.coordinator.expert_timeout_secs, 60);
        assert_eq!(cfg.llm.provider, "none");
        let settings = cfg.gateway.settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[log]
level = "debug"

[gateway]
max_attempts = 5
base_delay_ms = 100

[gateway.backends.climada]
endpoint = "http://localhost:8001"

[gateway.backends.pangu]
enabled = false

[workflow]
phase_timeout_secs = 30
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.log.level, "debug");
        assert_eq!(cfg.gateway.max_attempts, 5);
        assert_eq!(cfg.gateway.base_delay_ms, 100);
        assert_eq!(cfg.gateway.max_delay_ms, 8_000);
        assert_eq!(
            cfg.gateway.backends["climada"].endpoint.as_deref(),
            Some("http://localhost:8001")
        );
        assert!(cfg.gateway.backends["climada"].enabled);
        assert!(!cfg.gateway.backends["pangu"].enabled);
        assert_eq!(cfg.workflow.phase_timeout_secs, 30);
        assert_eq!(cfg.server.bind, "0.0.0.0:2024");
    }
}
