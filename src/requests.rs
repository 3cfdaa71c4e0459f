//! Request bodies accepted by the API and the CSV importer.
//!
//! Every body is checked by `validate` before it reaches the database, which
//! turns it into the stored model.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::CrowdError;
use crate::models::{
    Alert, AlertPriority, AlertStatus, AlertType, EventType, Notification, NotificationType,
    ScanEvent, VisitorInfo,
};

const MAX_VISITOR_AGE: i32 = 150;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScanEvent {
    pub tag_id: String,
    pub checkpoint_id: String,
    pub checkpoint_name: Option<String>,
    pub zone: String,
    #[serde(default)]
    pub event_type: EventType,
    pub timestamp: Option<DateTime<Utc>>,
    pub visitor_info: Option<VisitorInfo>,
}

impl NewScanEvent {
    pub fn validate(self) -> Result<ScanEvent, CrowdError> {
        let tag_id = required("tagId", self.tag_id)?;
        let checkpoint_id = required("checkpointId", self.checkpoint_id)?;
        let zone = required("zone", self.zone)?;

        let visitor_info = match self.visitor_info {
            Some(info) if info.is_empty() => None,
            Some(info) => {
                if let Some(age) = info.age {
                    if !(0..=MAX_VISITOR_AGE).contains(&age) {
                        return Err(CrowdError::invalid(format!(
                            "visitorInfo.age must be between 0 and {MAX_VISITOR_AGE}, got {age}"
                        )));
                    }
                }
                Some(info)
            }
            None => None,
        };

        Ok(ScanEvent {
            id: Uuid::new_v4(),
            tag_id,
            checkpoint_id,
            checkpoint_name: optional(self.checkpoint_name),
            zone,
            event_type: self.event_type,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            visitor_info,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub zone: Option<String>,
    #[serde(default)]
    pub priority: AlertPriority,
}

impl NewAlert {
    pub fn validate(self) -> Result<Alert, CrowdError> {
        Ok(Alert {
            id: Uuid::new_v4(),
            alert_type: self.alert_type,
            title: required("title", self.title)?,
            message: required("message", self.message)?,
            location: optional(self.location),
            zone: optional(self.zone),
            priority: self.priority,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeAlert {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type", default)]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub action_url: Option<String>,
}

impl NewNotification {
    pub fn validate(self) -> Result<Notification, CrowdError> {
        Ok(Notification {
            id: Uuid::new_v4(),
            user_id: required("userId", self.user_id)?,
            notification_type: self.notification_type,
            title: required("title", self.title)?,
            message: optional(self.message),
            read: false,
            action_url: optional(self.action_url),
            created_at: Utc::now(),
            read_at: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllRead {
    pub user_id: String,
}

impl MarkAllRead {
    pub fn validate(self) -> Result<String, CrowdError> {
        required("userId", self.user_id)
    }
}

fn required(field: &str, value: String) -> Result<String, CrowdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CrowdError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
