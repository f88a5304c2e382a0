//! 协调器：hub-and-spoke 编排
//!
//! 1. 按灾害类型查静态路由表选出能力键
//! 2. 并发派发所有专家（每个专家一个外层超时，涵盖其全部网关调用）
//! 3. 按路由顺序收集意见，超时或失败的专家记录为 failed，不重试
//! 4. 合成：建议去重合并、聚合置信度取最大值、资源按严重度与共识分配
//! 5. 零个专家成功时返回 NoExpertsAvailable

mod plan;
pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::core::CoordinationError;
use crate::experts::{route, Capability, ExpertError, ExpertOpinion, ExpertRegistry};
use crate::gateway::ModelGateway;
use crate::incident::{EmergencyObservation, ThreatAssessment};

pub use plan::{merge_recommendations, normalize_recommendation, CoordinationPlan, FailedExpert};

pub struct Coordinator {
    registry: Arc<ExpertRegistry>,
    gateway: Arc<ModelGateway>,
    expert_timeout: Duration,
}

impl Coordinator {
    pub fn new(registry: Arc<ExpertRegistry>, gateway: Arc<ModelGateway>, expert_timeout: Duration) -> Self {
        Self {
            registry,
            gateway,
            expert_timeout,
        }
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub async fn coordinate(
        &self,
        threat: &ThreatAssessment,
        observation: &EmergencyObservation,
    ) -> Result<CoordinationPlan, CoordinationError> {
        let capabilities = route(threat.disaster_type);
        tracing::info!(
            disaster_type = threat.disaster_type.as_str(),
            experts = ?capabilities.iter().map(Capability::key).collect::<Vec<_>>(),
            "Dispatching experts"
        );

        let outcomes = join_all(
            capabilities
                .iter()
                .map(|&capability| self.dispatch(capability, threat, observation)),
        )
        .await;

        let mut opinions: Vec<ExpertOpinion> = Vec::new();
        let mut failed = Vec::new();
        for (&capability, outcome) in capabilities.iter().zip(outcomes) {
            match outcome {
                Ok(opinion) => opinions.push(opinion),
                Err(e) => {
                    tracing::warn!(expert = capability.key(), error = %e, "Expert failed");
                    failed.push(FailedExpert {
                        expert: capability,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if opinions.is_empty() {
            return Err(CoordinationError::NoExpertsAvailable {
                attempted: capabilities.iter().map(|c| c.key().to_string()).collect(),
                failures: failed.into_iter().map(|f| f.reason).collect(),
            });
        }

        let recommendations =
            merge_recommendations(opinions.iter().map(|o| o.recommendations.as_slice()));
        let aggregate_confidence = opinions
            .iter()
            .map(|o| o.confidence)
            .fold(0.0_f64, f64::max);
        let concurring = opinions
            .iter()
            .filter(|o| o.confidence >= resources::CONCURRING_CONFIDENCE)
            .count();
        let resource_allocation = resources::allocate(threat.disaster_type, threat.severity, concurring);

        tracing::info!(
            succeeded = opinions.len(),
            failed = failed.len(),
            aggregate_confidence,
            "Coordination complete"
        );

        Ok(CoordinationPlan {
            disaster_type: threat.disaster_type,
            severity: threat.severity,
            activated_experts: capabilities.to_vec(),
            opinions,
            failed_experts: failed,
            recommendations,
            aggregate_confidence,
            resource_allocation,
        })
    }

    /// 单个专家：外层超时到期时丢弃其 future，连带取消其中所有在途网关调用
    async fn dispatch(
        &self,
        capability: Capability,
        threat: &ThreatAssessment,
        observation: &EmergencyObservation,
    ) -> Result<ExpertOpinion, ExpertError> {
        let strategy = self
            .registry
            .get_capability(capability)
            .ok_or_else(|| ExpertError::Analysis {
                expert: capability.key().to_string(),
                reason: "no strategy registered".to_string(),
            })?;
        tracing::debug!(expert = capability.key(), strategy = strategy.name(), "Expert started");
        match timeout(
            self.expert_timeout,
            strategy.analyze(observation, threat, &self.gateway),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExpertError::Timeout {
                expert: capability.key().to_string(),
                secs: self.expert_timeout.as_secs(),
            }),
        }
    }
}
