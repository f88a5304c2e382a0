//! 协调计划：由 Coordinator 从专家意见集合合成，其它组件只读

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::experts::{Capability, ExpertOpinion};
use crate::incident::{DisasterType, SeverityLevel};

/// 失败的专家及原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedExpert {
    pub expert: Capability,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinationPlan {
    pub disaster_type: DisasterType,
    pub severity: SeverityLevel,
    /// 按路由优先级排列的被激活专家
    pub activated_experts: Vec<Capability>,
    /// 成功意见，顺序同路由优先级
    pub opinions: Vec<ExpertOpinion>,
    pub failed_experts: Vec<FailedExpert>,
    pub recommendations: Vec<String>,
    pub aggregate_confidence: f64,
    pub resource_allocation: BTreeMap<String, u32>,
}

impl CoordinationPlan {
    /// 成功给出意见的专家
    pub fn responding_experts(&self) -> Vec<Capability> {
        self.opinions.iter().map(|o| o.expert).collect()
    }
}

/// 文本归一化：小写、压缩空白、去掉结尾标点
pub fn normalize_recommendation(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['.', '!', ';', ',', ':'])
        .to_string()
}

/// 按意见顺序合并建议，归一化后相同者只保留首次出现
pub fn merge_recommendations<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for rec in list {
            let key = normalize_recommendation(rec);
            if key.is_empty() {
                continue;
            }
            if seen.insert(key) {
                merged.push(rec.trim().to_string());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_recommendation() {
        assert_eq!(
            normalize_recommendation("  Evacuate   Zone A now. "),
            "evacuate zone a now"
        );
    }

    #[test]
    fn test_merge_keeps_first_occurrence_in_order() {
        let a = vec!["Evacuate Zone A.".to_string(), "Open shelters".to_string()];
        let b = vec!["evacuate zone a".to_string(), "Close roads".to_string()];
        let merged = merge_recommendations([a.as_slice(), b.as_slice()]);
        assert_eq!(merged, vec!["Evacuate Zone A.", "Open shelters", "Close roads"]);
    }
}
