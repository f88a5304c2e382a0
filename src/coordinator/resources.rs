//! 资源分配：按灾害类型的基础编制 × 严重度系数 × 高置信专家共识，受资源池容量约束
//!
//! 资源池只作为上限，不跨运行扣减。

use std::collections::BTreeMap;

use crate::incident::{DisasterType, SeverityLevel};

/// 置信度不低于该值的成功意见计为共识
pub const CONCURRING_CONFIDENCE: f64 = 0.7;
const CONSENSUS_BONUS: f64 = 0.5;

fn base_units(disaster_type: DisasterType) -> &'static [(&'static str, f64)] {
    match disaster_type {
        DisasterType::Wildfire => &[("firefighters", 50.0), ("aircraft", 3.0), ("ground_vehicles", 10.0)],
        DisasterType::Flood => &[("emergency_responders", 30.0), ("boats", 8.0), ("shelters", 3.0)],
        DisasterType::Earthquake => &[
            ("search_rescue", 20.0),
            ("medical_teams", 10.0),
            ("structural_engineers", 6.0),
        ],
        DisasterType::Hurricane => &[
            ("emergency_responders", 40.0),
            ("shelters", 6.0),
            ("helicopters", 3.0),
        ],
        DisasterType::Other => &[("emergency_responders", 10.0)],
    }
}

/// 资源池容量（人员 / 装备 / 设施）
pub fn pool_capacity(resource: &str) -> Option<u32> {
    let capacity = match resource {
        "firefighters" => 200,
        "emergency_responders" => 150,
        "medical_teams" => 25,
        "search_rescue" => 50,
        "structural_engineers" => 12,
        "aircraft" => 8,
        "helicopters" => 6,
        "ground_vehicles" => 40,
        "boats" => 15,
        "shelters" => 12,
        _ => return None,
    };
    Some(capacity)
}

/// 计算资源分配；`concurring` 为置信度 ≥ 0.7 的成功意见数
pub fn allocate(
    disaster_type: DisasterType,
    severity: SeverityLevel,
    concurring: usize,
) -> BTreeMap<String, u32> {
    let multiplier = severity.factor() * (1.0 + CONSENSUS_BONUS * concurring as f64);
    base_units(disaster_type)
        .iter()
        .map(|(resource, base)| {
            let wanted = (base * multiplier).ceil() as u32;
            let granted = pool_capacity(resource).map_or(wanted, |cap| wanted.min(cap));
            (resource.to_string(), granted)
        })
        .collect()
}
