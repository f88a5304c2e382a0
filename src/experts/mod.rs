//! 专家层：按能力键索引的灾害分析策略
//!
//! - **Capability**：能力键（fire-behavior、flood-routing …），路由表的基本单位
//! - **ExpertStrategy**：封闭的策略枚举（Wildfire / Flood / Earthquake / Hurricane / Generic），
//!   新增灾害类型 = 新增变体 + 路由表条目
//! - **ExpertOpinion**：一次专家调用的结论，创建后不再修改
//!
//! 专家可调用 ModelGateway；模型失败只降低置信度，不使专家失败。

pub mod earthquake;
pub mod flood;
pub mod generic;
pub mod hurricane;
pub mod registry;
pub mod wildfire;

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::gateway::{ModelGateway, ModelInvocationResult};
use crate::incident::{EmergencyObservation, ThreatAssessment};

pub use earthquake::{EarthquakeExpert, SeismicFocus};
pub use flood::FloodExpert;
pub use generic::GenericExpert;
pub use hurricane::HurricaneExpert;
pub use registry::{route, ExpertRegistry};
pub use wildfire::{WildfireExpert, WildfireFocus};

/// 每次模型调用失败扣减的置信度
const FAILED_CALL_PENALTY: f64 = 0.15;
/// 缺少必要读数时扣减的置信度
const MISSING_READINGS_PENALTY: f64 = 0.1;
const CONFIDENCE_FLOOR: f64 = 0.2;

/// 专家能力键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Capability {
    #[serde(rename = "fire-behavior")]
    FireBehavior,
    #[serde(rename = "suppression-logistics")]
    SuppressionLogistics,
    #[serde(rename = "flood-routing")]
    FloodRouting,
    #[serde(rename = "structural-integrity")]
    StructuralIntegrity,
    #[serde(rename = "seismic-impact")]
    SeismicImpact,
    #[serde(rename = "storm-tracking")]
    StormTracking,
    #[serde(rename = "general")]
    General,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::FireBehavior,
        Capability::SuppressionLogistics,
        Capability::FloodRouting,
        Capability::StructuralIntegrity,
        Capability::SeismicImpact,
        Capability::StormTracking,
        Capability::General,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Capability::FireBehavior => "fire-behavior",
            Capability::SuppressionLogistics => "suppression-logistics",
            Capability::FloodRouting => "flood-routing",
            Capability::StructuralIntegrity => "structural-integrity",
            Capability::SeismicImpact => "seismic-impact",
            Capability::StormTracking => "storm-tracking",
            Capability::General => "general",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpertError {
    #[error("Expert {expert} timed out after {secs}s")]
    Timeout { expert: String, secs: u64 },

    #[error("Expert {expert} analysis failed: {reason}")]
    Analysis { expert: String, reason: String },
}

/// 专家结论
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpertOpinion {
    pub expert: Capability,
    pub strategy: &'static str,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub findings: Value,
    /// 该专家消费的模型调用结果
    pub consumed: Vec<ModelInvocationResult>,
}

/// 封闭策略集
#[derive(Debug, Clone, PartialEq)]
pub enum ExpertStrategy {
    Wildfire(WildfireExpert),
    Flood(FloodExpert),
    Earthquake(EarthquakeExpert),
    Hurricane(HurricaneExpert),
    Generic(GenericExpert),
}

impl ExpertStrategy {
    /// 能力键对应的默认策略
    pub fn for_capability(capability: Capability) -> Self {
        match capability {
            Capability::FireBehavior => {
                ExpertStrategy::Wildfire(WildfireExpert::new(WildfireFocus::FireBehavior))
            }
            Capability::SuppressionLogistics => {
                ExpertStrategy::Wildfire(WildfireExpert::new(WildfireFocus::SuppressionLogistics))
            }
            Capability::FloodRouting => ExpertStrategy::Flood(FloodExpert),
            Capability::SeismicImpact => {
                ExpertStrategy::Earthquake(EarthquakeExpert::new(SeismicFocus::SeismicImpact))
            }
            Capability::StructuralIntegrity => {
                ExpertStrategy::Earthquake(EarthquakeExpert::new(SeismicFocus::StructuralIntegrity))
            }
            Capability::StormTracking => ExpertStrategy::Hurricane(HurricaneExpert),
            Capability::General => ExpertStrategy::Generic(GenericExpert),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExpertStrategy::Wildfire(_) => "wildfire",
            ExpertStrategy::Flood(_) => "flood",
            ExpertStrategy::Earthquake(_) => "earthquake",
            ExpertStrategy::Hurricane(_) => "hurricane",
            ExpertStrategy::Generic(_) => "generic",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ExpertStrategy::Wildfire(e) => e.capability(),
            ExpertStrategy::Flood(_) => Capability::FloodRouting,
            ExpertStrategy::Earthquake(e) => e.capability(),
            ExpertStrategy::Hurricane(_) => Capability::StormTracking,
            ExpertStrategy::Generic(_) => Capability::General,
        }
    }

    pub async fn analyze(
        &self,
        observation: &EmergencyObservation,
        threat: &ThreatAssessment,
        gateway: &ModelGateway,
    ) -> Result<ExpertOpinion, ExpertError> {
        let ctx = ExpertContext {
            observation,
            threat,
            gateway,
        };
        let draft = match self {
            ExpertStrategy::Wildfire(e) => e.analyze(&ctx).await?,
            ExpertStrategy::Flood(e) => e.analyze(&ctx).await?,
            ExpertStrategy::Earthquake(e) => e.analyze(&ctx).await?,
            ExpertStrategy::Hurricane(e) => e.analyze(&ctx).await?,
            ExpertStrategy::Generic(e) => e.analyze(&ctx).await?,
        };
        Ok(draft.finish(self.capability(), self.name()))
    }
}

/// 专家分析的只读输入
pub struct ExpertContext<'a> {
    pub observation: &'a EmergencyObservation,
    pub threat: &'a ThreatAssessment,
    pub gateway: &'a ModelGateway,
}

impl ExpertContext<'_> {
    /// 读数；缺失时返回默认值并记为缺失
    pub fn reading(&self, key: &str, default: f64) -> (f64, bool) {
        match self.observation.reading(key) {
            Some(v) => (v, false),
            None => (default, true),
        }
    }

    /// 网关调用通用的位置参数
    pub fn location(&self) -> Value {
        let loc = self.observation.location();
        json!({ "lat": loc.latitude, "lng": loc.longitude, "region": loc.region })
    }
}

/// 策略内部产出，经 `finish` 统一计算置信度
#[derive(Debug, Clone, Default)]
pub struct OpinionDraft {
    pub base_confidence: f64,
    pub recommendations: Vec<String>,
    pub findings: Value,
    pub consumed: Vec<ModelInvocationResult>,
    pub missing_readings: bool,
}

impl OpinionDraft {
    fn finish(self, expert: Capability, strategy: &'static str) -> ExpertOpinion {
        let failed = self.consumed.iter().filter(|r| !r.is_success()).count();
        ExpertOpinion {
            expert,
            strategy,
            recommendations: self.recommendations,
            confidence: adjusted_confidence(self.base_confidence, failed, self.missing_readings),
            findings: self.findings,
            consumed: self.consumed,
        }
    }
}

/// 基础置信度按失败调用与缺失读数扣减，下限 0.2
pub fn adjusted_confidence(base: f64, failed_calls: usize, missing_readings: bool) -> f64 {
    let mut confidence = base - FAILED_CALL_PENALTY * failed_calls as f64;
    if missing_readings {
        confidence -= MISSING_READINGS_PENALTY;
    }
    confidence.clamp(CONFIDENCE_FLOOR, 1.0)
}

/// 派生指标必须有限（例如湿度读数异常导致除零）
pub(crate) fn ensure_finite(
    expert: Capability,
    values: &[(&str, f64)],
) -> Result<(), ExpertError> {
    match values.iter().find(|(_, v)| !v.is_finite()) {
        Some((name, _)) => Err(ExpertError::Analysis {
            expert: expert.key().to_string(),
            reason: format!("derived value '{name}' is not finite"),
        }),
        None => Ok(()),
    }
}

/// 保留两位小数，便于报告阅读
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
