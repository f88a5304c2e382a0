//! 专家注册表：能力键 → 策略，及灾害类型 → 能力键的静态路由表
//!
//! 注册表在进程初始化时构建，之后只读，供多个运行并发共享，无需加锁。

use std::collections::BTreeMap;

use crate::experts::{Capability, ExpertStrategy};
use crate::incident::DisasterType;

const WILDFIRE_ROUTE: [Capability; 2] = [Capability::FireBehavior, Capability::SuppressionLogistics];
const FLOOD_ROUTE: [Capability; 2] = [Capability::FloodRouting, Capability::StructuralIntegrity];
const EARTHQUAKE_ROUTE: [Capability; 2] = [Capability::SeismicImpact, Capability::StructuralIntegrity];
const HURRICANE_ROUTE: [Capability; 2] = [Capability::StormTracking, Capability::FloodRouting];
const FALLBACK_ROUTE: [Capability; 1] = [Capability::General];

/// 灾害类型对应的能力键，按优先级排列，永不为空
pub fn route(disaster_type: DisasterType) -> &'static [Capability] {
    match disaster_type {
        DisasterType::Wildfire => &WILDFIRE_ROUTE,
        DisasterType::Flood => &FLOOD_ROUTE,
        DisasterType::Earthquake => &EARTHQUAKE_ROUTE,
        DisasterType::Hurricane => &HURRICANE_ROUTE,
        DisasterType::Other => &FALLBACK_ROUTE,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpertRegistry {
    strategies: BTreeMap<Capability, ExpertStrategy>,
}

impl ExpertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖全部能力键的标准注册表
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for capability in Capability::ALL {
            registry.register(capability, ExpertStrategy::for_capability(capability));
        }
        registry
    }

    pub fn register(&mut self, capability: Capability, strategy: ExpertStrategy) {
        self.strategies.insert(capability, strategy);
    }

    /// 按能力键字符串查找（如 "fire-behavior"）
    pub fn get(&self, key: &str) -> Option<&ExpertStrategy> {
        Capability::parse(key).and_then(|c| self.get_capability(c))
    }

    pub fn get_capability(&self, capability: Capability) -> Option<&ExpertStrategy> {
        self.strategies.get(&capability)
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.strategies.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_are_non_empty_and_resolvable() {
        let registry = ExpertRegistry::standard();
        for dt in DisasterType::ALL {
            let caps = route(dt);
            assert!(!caps.is_empty());
            for cap in caps {
                assert!(registry.get_capability(*cap).is_some());
            }
        }
    }

    #[test]
    fn test_routing_table() {
        assert_eq!(
            route(DisasterType::Wildfire),
            &[Capability::FireBehavior, Capability::SuppressionLogistics]
        );
        assert_eq!(
            route(DisasterType::Hurricane),
            &[Capability::StormTracking, Capability::FloodRouting]
        );
        assert_eq!(route(DisasterType::Other), &[Capability::General]);
    }

    #[test]
    fn test_get_by_key() {
        let registry = ExpertRegistry::standard();
        assert_eq!(registry.get("flood-routing").map(|s| s.name()), Some("flood"));
        assert!(registry.get("volcano").is_none());
        assert_eq!(registry.capabilities().len(), 7);
    }
}
