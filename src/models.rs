use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrowdError;
use crate::risk::RiskLabel;

macro_rules! text_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CrowdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(CrowdError::invalid(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Entry,
    Exit,
    #[default]
    Scan,
}

text_enum!(EventType, "event type", {
    Entry => "entry",
    Exit => "exit",
    Scan => "scan",
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub group: Option<String>,
}

impl VisitorInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.gender.is_none() && self.group.is_none()
    }
}

/// A single RFID checkpoint read. Never updated once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: Uuid,
    pub tag_id: String,
    pub checkpoint_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_name: Option<String>,
    pub zone: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_info: Option<VisitorInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCount {
    pub zone: String,
    pub count: i64,
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneStatus {
    pub zone: String,
    pub count: i64,
    pub label: RiskLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdSummary {
    pub total_visitors: i64,
    pub zone_count: usize,
    pub busiest_zone: String,
    pub busiest_count: i64,
    pub safest_zone: String,
    pub overall_status: RiskLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointStats {
    pub checkpoint_id: String,
    pub zone: String,
    pub scan_count: i64,
    pub last_scan: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenderCount {
    pub gender: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Critical,
    Warning,
    Info,
    Success,
}

text_enum!(AlertType, "alert type", {
    Critical => "critical",
    Warning => "warning",
    Info => "info",
    Success => "success",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    High,
    #[default]
    Medium,
    Low,
}

text_enum!(AlertPriority, "alert priority", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Scheduled,
}

text_enum!(AlertStatus, "alert status", {
    Active => "active",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
    Scheduled => "scheduled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub zone: Option<String>,
    pub priority: AlertPriority,
    pub status: AlertStatus,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub by_status: Vec<LabelCount>,
    pub by_priority: Vec<LabelCount>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Alert,
    #[default]
    Info,
    Success,
    Warning,
}

text_enum!(NotificationType, "notification type", {
    Alert => "alert",
    Info => "info",
    Success => "success",
    Warning => "warning",
});

/// A message addressed to one dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub read: bool,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_visitors: i64,
    pub active_zones: usize,
    pub alerts_active: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub kpis: DashboardKpis,
    pub recent_activity: Vec<ScanEvent>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_parse_their_own_display() {
        for event_type in [EventType::Entry, EventType::Exit, EventType::Scan] {
            assert_eq!(event_type.to_string().parse::<EventType>(), Ok(event_type));
        }
        assert_eq!("acknowledged".parse::<AlertStatus>(), Ok(AlertStatus::Acknowledged));
        assert!("urgent".parse::<AlertPriority>().is_err());
    }

    #[test]
    fn summary_serializes_with_dashboard_field_names() {
        let summary = CrowdSummary {
            total_visitors: 5400,
            zone_count: 3,
            busiest_zone: "B".to_string(),
            busiest_count: 4000,
            safest_zone: "C".to_string(),
            overall_status: RiskLabel::Moderate,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["totalVisitors"], 5400);
        assert_eq!(value["zoneCount"], 3);
        assert_eq!(value["busiestZone"], "B");
        assert_eq!(value["busiestCount"], 4000);
        assert_eq!(value["safestZone"], "C");
        assert_eq!(value["overallStatus"], "moderate");
    }

    #[test]
    fn alert_type_serializes_as_type() {
        let alert = Alert {
            id: Uuid::nil(),
            alert_type: AlertType::Critical,
            title: "High Crowd Density".to_string(),
            message: "Zone C is experiencing high crowd density".to_string(),
            location: None,
            zone: Some("Zone C".to_string()),
            priority: AlertPriority::High,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "critical");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["zone"], "Zone C");
    }

    #[test]
    fn notification_serializes_for_the_bell_menu() {
        let notification = Notification {
            id: Uuid::nil(),
            user_id: "officer-12".to_string(),
            notification_type: NotificationType::Warning,
            title: "Zone B filling up".to_string(),
            message: None,
            read: false,
            action_url: Some("/zones/b".to_string()),
            created_at: Utc::now(),
            read_at: None,
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "warning");
        assert_eq!(value["userId"], "officer-12");
        assert_eq!(value["actionUrl"], "/zones/b");
        assert_eq!(value["read"], false);
    }
}
