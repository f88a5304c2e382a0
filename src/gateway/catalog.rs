//! 已知科学模型后端及其支持的操作

/// 目录条目
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub description: &'static str,
    pub operations: &'static [&'static str],
}

pub const CLIMADA: &str = "climada";
pub const LISFLOOD: &str = "lisflood";
pub const CELL2FIRE: &str = "cell2fire";
pub const NFDRS4: &str = "nfdrs4";
pub const PANGU: &str = "pangu";
pub const AURORA: &str = "aurora";

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: CLIMADA,
        description: "Climate risk, hazard and economic impact modeling",
        operations: &["impact_assessment", "hazard_modeling", "cost_benefit"],
    },
    CatalogEntry {
        id: LISFLOOD,
        description: "Distributed hydrological flood simulation and forecasting",
        operations: &["simulation", "forecast", "calibration", "water_balance"],
    },
    CatalogEntry {
        id: CELL2FIRE,
        description: "Cell-based wildfire spread simulation",
        operations: &["simulate"],
    },
    CatalogEntry {
        id: NFDRS4,
        description: "National Fire Danger Rating System v4",
        operations: &["fire_danger"],
    },
    CatalogEntry {
        id: PANGU,
        description: "Pangu-Weather medium-range global forecast",
        operations: &["forecast"],
    },
    CatalogEntry {
        id: AURORA,
        description: "Aurora atmospheric foundation model forecast",
        operations: &["forecast"],
    },
];

pub fn catalog_entry(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id == id)
}
