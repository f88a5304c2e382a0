//! 响应执行记录：由协调计划派生，不调用外部系统

use std::collections::BTreeMap;

use serde::Serialize;

use crate::coordinator::CoordinationPlan;
use crate::experts::Capability;
use crate::incident::SeverityLevel;

const SUCCESS_DISCOUNT: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    /// 阶段降级时的默认值
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseExecution {
    pub status: ResponseStatus,
    pub deployed_resources: BTreeMap<String, u32>,
    pub response_teams: Vec<Capability>,
    pub estimated_completion: &'static str,
    pub success_probability: f64,
}

impl ResponseExecution {
    pub fn from_plan(plan: &CoordinationPlan) -> Self {
        Self {
            status: ResponseStatus::InProgress,
            deployed_resources: plan.resource_allocation.clone(),
            response_teams: plan.responding_experts(),
            estimated_completion: estimated_completion(plan.severity),
            success_probability: plan.aggregate_confidence * SUCCESS_DISCOUNT,
        }
    }

    pub fn not_started() -> Self {
        Self {
            status: ResponseStatus::NotStarted,
            deployed_resources: BTreeMap::new(),
            response_teams: Vec::new(),
            estimated_completion: "unknown",
            success_probability: 0.0,
        }
    }
}

pub fn estimated_completion(severity: SeverityLevel) -> &'static str {
    match severity {
        SeverityLevel::Low => "12-24 hours",
        SeverityLevel::Medium => "6-12 hours",
        SeverityLevel::High => "4-6 hours",
        SeverityLevel::Critical => "2-4 hours",
    }
}
