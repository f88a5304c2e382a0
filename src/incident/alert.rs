//! 预警生成：按 (灾害类型 × 严重级别) 查表，不调用任何外部模型

use serde::Serialize;

use crate::incident::{DisasterType, SeverityLevel, ThreatAssessment};

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    Push,
    MobileAlert,
    SocialMedia,
    Sirens,
    Radio,
    Television,
}

/// 预警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub alert_id: String,
    pub level: SeverityLevel,
    pub disaster_type: DisasterType,
    pub title: String,
    /// 已绑定区域名
    pub message: String,
    pub instructions: Vec<String>,
    pub channels: Vec<Channel>,
    pub affected_areas: Vec<String>,
    pub expires_in_hours: u32,
    pub requires_immediate_response: bool,
}

struct Template {
    title: &'static str,
    message: &'static str,
    instructions: &'static [&'static str],
}

fn template(dt: DisasterType, level: SeverityLevel) -> Option<Template> {
    use DisasterType as D;
    use SeverityLevel as S;

    let t = match (dt, level) {
        (D::Wildfire, S::Low) => Template {
            title: "Fire Weather Warning",
            message: "Elevated fire danger conditions detected in {location}. Be prepared for potential fire activity.",
            instructions: &[
                "Monitor local conditions",
                "Prepare evacuation kit",
                "Clear defensible space around property",
                "Stay informed through official channels",
            ],
        },
        (D::Wildfire, S::Medium) => Template {
            title: "Wildfire Watch",
            message: "Wildfire activity detected near {location}. Conditions are favorable for fire spread.",
            instructions: &[
                "Be ready to evacuate if necessary",
                "Keep emergency kit accessible",
                "Monitor air quality",
                "Follow local evacuation routes",
            ],
        },
        (D::Wildfire, S::High) => Template {
            title: "Wildfire Warning",
            message: "Active wildfire threatening {location}. Immediate preparation for evacuation required.",
            instructions: &[
                "Prepare to evacuate immediately",
                "Gather essential items and documents",
                "Close all windows and doors",
                "Turn off gas utilities",
                "Follow evacuation orders",
            ],
        },
        (D::Wildfire, S::Critical) => Template {
            title: "EVACUATION ORDER - WILDFIRE",
            message: "IMMEDIATE EVACUATION REQUIRED for {location}. Life-threatening wildfire conditions.",
            instructions: &[
                "EVACUATE IMMEDIATELY",
                "Take only essential items",
                "Follow designated evacuation routes",
                "Do not return until all-clear is given",
                "Seek shelter at designated centers",
            ],
        },
        (D::Flood, S::Low) => Template {
            title: "Flood Watch",
            message: "Flooding possible in {location} due to heavy rainfall or rising water levels.",
            instructions: &[
                "Monitor weather conditions",
                "Avoid low-lying areas",
                "Prepare emergency supplies",
                "Stay away from storm drains",
            ],
        },
        (D::Flood, S::Medium) => Template {
            title: "Flood Advisory",
            message: "Minor flooding expected in {location}. Water levels rising.",
            instructions: &[
                "Avoid flooded roads",
                "Move to higher ground if necessary",
                "Secure loose outdoor items",
                "Monitor local water levels",
            ],
        },
        (D::Flood, S::High) => Template {
            title: "Flood Warning",
            message: "Significant flooding imminent in {location}. Take immediate protective action.",
            instructions: &[
                "Move to higher ground immediately",
                "Avoid walking or driving through flood water",
                "Prepare for possible evacuation",
                "Turn off utilities if instructed",
            ],
        },
        (D::Flood, S::Critical) => Template {
            title: "FLASH FLOOD EMERGENCY",
            message: "LIFE-THREATENING flooding occurring in {location}. Seek higher ground immediately.",
            instructions: &[
                "SEEK HIGHER GROUND IMMEDIATELY",
                "Do not drive or walk through flood water",
                "Call for help if trapped",
                "Stay away from downed power lines",
                "Follow evacuation orders",
            ],
        },
        (D::Earthquake, S::Low) => Template {
            title: "Earthquake Advisory",
            message: "Minor earthquake activity detected near {location}. No immediate danger expected.",
            instructions: &[
                "Review earthquake safety procedures",
                "Secure heavy objects",
                "Check emergency supplies",
                "Stay informed about aftershocks",
            ],
        },
        (D::Earthquake, S::Medium) => Template {
            title: "Earthquake Alert",
            message: "Moderate earthquake occurred near {location}. Aftershocks possible.",
            instructions: &[
                "Check for injuries and damage",
                "Be prepared for aftershocks",
                "Turn off gas if you smell leaks",
                "Stay away from damaged buildings",
            ],
        },
        (D::Earthquake, S::High) => Template {
            title: "Major Earthquake Warning",
            message: "Strong earthquake detected in {location}. Significant damage possible.",
            instructions: &[
                "Drop, Cover, and Hold On if shaking continues",
                "Check for injuries and hazards",
                "Exit damaged buildings carefully",
                "Expect aftershocks",
                "Use stairs, not elevators",
            ],
        },
        (D::Earthquake, S::Critical) => Template {
            title: "MAJOR EARTHQUAKE EMERGENCY",
            message: "Severe earthquake in {location}. Widespread damage expected.",
            instructions: &[
                "Seek immediate medical attention for injuries",
                "Stay in open areas away from buildings",
                "Do not use damaged roads or bridges",
                "Listen for emergency instructions",
                "Help others if you are able",
            ],
        },
        (D::Hurricane, S::Low) => Template {
            title: "Tropical Storm Watch",
            message: "Tropical storm conditions possible in {location} within 48 hours.",
            instructions: &[
                "Monitor storm progress",
                "Secure outdoor objects",
                "Review evacuation plans",
                "Stock emergency supplies",
            ],
        },
        (D::Hurricane, S::Medium) => Template {
            title: "Hurricane Watch",
            message: "Hurricane conditions possible in {location} within 48 hours.",
            instructions: &[
                "Complete storm preparations",
                "Fuel vehicles and generators",
                "Charge electronic devices",
                "Review family emergency plan",
            ],
        },
        (D::Hurricane, S::High) => Template {
            title: "Hurricane Warning",
            message: "Hurricane conditions expected in {location} within 36 hours.",
            instructions: &[
                "Complete all preparations immediately",
                "Board up windows if necessary",
                "Evacuate if in evacuation zone",
                "Stay indoors during the storm",
            ],
        },
        (D::Hurricane, S::Critical) => Template {
            title: "EXTREME HURRICANE WARNING",
            message: "Catastrophic hurricane impact imminent in {location}. Life-threatening conditions.",
            instructions: &[
                "SHELTER IN PLACE if evacuation not possible",
                "Go to interior room on lowest floor",
                "Stay away from windows",
                "Do not go outside during eye of storm",
                "Wait for all-clear from authorities",
            ],
        },
        (D::Other, _) => return None,
    };
    Some(t)
}

const FALLBACK_INSTRUCTIONS: &[&str] = &["Stay alert", "Follow official guidance", "Monitor conditions"];

pub fn channels_for(level: SeverityLevel) -> Vec<Channel> {
    use Channel::*;
    match level {
        SeverityLevel::Low => vec![Email, Push],
        SeverityLevel::Medium => vec![Email, Push, Sms],
        SeverityLevel::High => vec![Sms, Email, Push, MobileAlert, Radio],
        SeverityLevel::Critical => vec![
            Sms,
            Email,
            Push,
            MobileAlert,
            SocialMedia,
            Sirens,
            Radio,
            Television,
        ],
    }
}

impl Alert {
    /// 由威胁评估与区域名生成预警（确定性：相同输入得到相同预警）
    pub fn generate(threat: &ThreatAssessment, region: &str) -> Self {
        let level = threat.severity;
        let dt = threat.disaster_type;
        let (title, message, instructions) = match template(dt, level) {
            Some(t) => (
                t.title.to_string(),
                t.message.replace("{location}", region),
                t.instructions.iter().map(|s| s.to_string()).collect(),
            ),
            None => {
                let name = capitalize(dt.as_str());
                (
                    format!("{name} Alert"),
                    format!("{name} event detected in {region}"),
                    FALLBACK_INSTRUCTIONS.iter().map(|s| s.to_string()).collect(),
                )
            }
        };

        Self {
            alert_id: format!("alert-{}-{}", dt, level),
            level,
            disaster_type: dt,
            title,
            message,
            instructions,
            channels: channels_for(level),
            affected_areas: vec![region.to_string()],
            expires_in_hours: if level.is_urgent() { 12 } else { 24 },
            requires_immediate_response: level.is_urgent(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
