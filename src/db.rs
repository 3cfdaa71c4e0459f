use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::TimeWindow;
use crate::models::{
    Alert, AlertPriority, AlertStats, AlertStatus, AlertType, CheckpointStats, EventType,
    GenderCount, LabelCount, Notification, NotificationType, ScanEvent, VisitorInfo, ZoneCount,
};
use crate::requests::NewScanEvent;

const EVENT_COLUMNS: &str = "id, tag_id, checkpoint_id, checkpoint_name, zone, event_type, \
     occurred_at, visitor_name, visitor_age, visitor_gender, visitor_group";

const NOTIFICATION_COLUMNS: &str = "id, user_id, notification_type, title, message, read, \
     action_url, created_at, read_at";

const ALERT_COLUMNS: &str = "id, alert_type, title, message, location, zone, priority, status, \
     acknowledged_by, acknowledged_at, resolved_at, created_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let zones: [(&str, usize); 4] = [("Zone A", 120), ("Zone B", 400), ("Zone C", 20), ("Zone D", 75)];
    let checkpoints = [
        ("CP-1", "Checkpoint 1"),
        ("CP-2", "Checkpoint 2"),
        ("CP-3", "Checkpoint 3"),
        ("CP-4", "Checkpoint 4"),
        ("CP-5", "Checkpoint 5"),
    ];
    let now = Utc::now();

    for (zone_index, (zone, scans)) in zones.into_iter().enumerate() {
        for i in 0..scans {
            let (checkpoint_id, checkpoint_name) = checkpoints[(zone_index + i) % checkpoints.len()];
            let event = ScanEvent {
                id: Uuid::new_v4(),
                tag_id: format!("TAG-{zone_index}-{:05}", i / 2),
                checkpoint_id: checkpoint_id.to_string(),
                checkpoint_name: Some(checkpoint_name.to_string()),
                zone: zone.to_string(),
                event_type: EventType::Scan,
                timestamp: now - Duration::minutes((i % 180) as i64),
                visitor_info: Some(VisitorInfo {
                    name: Some(format!("Visitor {}", i + 1)),
                    age: Some(10 + (i % 80) as i32),
                    gender: Some(if i % 2 == 0 { "M" } else { "F" }.to_string()),
                    group: None,
                }),
            };

            let source_key = format!("seed-{zone_index}-{i}");
            insert_event(pool, &event, Some(source_key.as_str())).await?;
        }
    }

    let alerts = [
        (
            "seed-alert-001",
            AlertType::Critical,
            "High Crowd Density",
            "Zone C is experiencing high crowd density",
            "Zone C",
            AlertPriority::High,
            AlertStatus::Active,
        ),
        (
            "seed-alert-002",
            AlertType::Warning,
            "Capacity Warning",
            "Checkpoint 2 is at 85% capacity",
            "Zone B",
            AlertPriority::Medium,
            AlertStatus::Active,
        ),
        (
            "seed-alert-003",
            AlertType::Info,
            "Lost Person Report",
            "A person has been reported missing",
            "Zone A",
            AlertPriority::High,
            AlertStatus::Acknowledged,
        ),
        (
            "seed-alert-004",
            AlertType::Success,
            "System Status Update",
            "All systems operational",
            "Zone D",
            AlertPriority::Low,
            AlertStatus::Resolved,
        ),
    ];

    for (source_key, alert_type, title, message, zone, priority, status) in alerts {
        let alert = Alert {
            id: Uuid::new_v4(),
            alert_type,
            title: title.to_string(),
            message: message.to_string(),
            location: Some(zone.to_string()),
            zone: Some(zone.to_string()),
            priority,
            status,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            created_at: now,
        };

        insert_alert(pool, &alert, Some(source_key)).await?;
    }

    Ok(())
}

/// Stores one scan event. Returns `false` when `source_key` was already
/// imported.
pub async fn insert_event(
    pool: &PgPool,
    event: &ScanEvent,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let visitor = event.visitor_info.clone().unwrap_or_default();

    let result = sqlx::query(
        r#"
        INSERT INTO crowd_monitor.scan_events
        (id, tag_id, checkpoint_id, checkpoint_name, zone, event_type, occurred_at,
         visitor_name, visitor_age, visitor_gender, visitor_group, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(event.id)
    .bind(&event.tag_id)
    .bind(&event.checkpoint_id)
    .bind(&event.checkpoint_name)
    .bind(&event.zone)
    .bind(event.event_type.as_str())
    .bind(event.timestamp)
    .bind(visitor.name)
    .bind(visitor.age)
    .bind(visitor.gender)
    .bind(visitor.group)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        tag_id: String,
        checkpoint_id: String,
        checkpoint_name: Option<String>,
        zone: String,
        event_type: Option<String>,
        timestamp: DateTime<Utc>,
        visitor_name: Option<String>,
        visitor_age: Option<i32>,
        visitor_gender: Option<String>,
        visitor_group: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let event_type = match row.event_type.as_deref().map(str::trim) {
            None | Some("") => EventType::default(),
            Some(value) => value
                .parse()
                .with_context(|| format!("row {}", line + 1))?,
        };

        let event = NewScanEvent {
            tag_id: row.tag_id,
            checkpoint_id: row.checkpoint_id,
            checkpoint_name: row.checkpoint_name,
            zone: row.zone,
            event_type,
            timestamp: Some(row.timestamp),
            visitor_info: Some(VisitorInfo {
                name: row.visitor_name,
                age: row.visitor_age,
                gender: row.visitor_gender,
                group: row.visitor_group,
            }),
        }
        .validate()
        .with_context(|| format!("row {}", line + 1))?;

        if insert_event(pool, &event, row.source_key.as_deref()).await? {
            inserted += 1;
        } else {
            debug!("Skipping already imported row {}", line + 1);
        }
    }

    info!("Imported {inserted} scan events from {}", csv_path.display());
    Ok(inserted)
}

pub async fn fetch_events_in_window(
    pool: &PgPool,
    window: &TimeWindow,
) -> anyhow::Result<Vec<ScanEvent>> {
    let query = format!(
        "SELECT {EVENT_COLUMNS} FROM crowd_monitor.scan_events \
         WHERE occurred_at >= $1 AND occurred_at < $2"
    );

    let rows = sqlx::query(&query)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await?;

    debug!(
        "Fetched {} scan events between {} and {}",
        rows.len(),
        window.start,
        window.end
    );
    rows.iter().map(event_from_row).collect()
}

/// Per-zone counts for `window`, grouped by the database. Ordered like
/// [`crate::aggregate::count_by_zone`]: busiest first, ties by zone name.
pub async fn fetch_zone_counts(
    pool: &PgPool,
    window: &TimeWindow,
) -> anyhow::Result<Vec<ZoneCount>> {
    let rows = sqlx::query(
        r#"
        SELECT zone, COUNT(*) AS count, COUNT(DISTINCT tag_id) AS unique_visitors
        FROM crowd_monitor.scan_events
        WHERE occurred_at >= $1 AND occurred_at < $2
        GROUP BY zone
        ORDER BY count DESC, zone COLLATE "C"
        "#,
    )
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ZoneCount {
                zone: row.try_get("zone")?,
                count: row.try_get("count")?,
                unique_visitors: row.try_get("unique_visitors")?,
            })
        })
        .collect()
}

pub async fn fetch_recent_events(
    pool: &PgPool,
    zone: Option<&str>,
    checkpoint: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<ScanEvent>> {
    let query = format!(
        "SELECT {EVENT_COLUMNS} FROM crowd_monitor.scan_events \
         WHERE ($1::text IS NULL OR zone = $1) \
         AND ($2::text IS NULL OR checkpoint_id = $2) \
         ORDER BY occurred_at DESC LIMIT $3"
    );

    let rows = sqlx::query(&query)
        .bind(zone)
        .bind(checkpoint)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(event_from_row).collect()
}

pub async fn fetch_journey(pool: &PgPool, tag_id: &str) -> anyhow::Result<Vec<ScanEvent>> {
    let query = format!(
        "SELECT {EVENT_COLUMNS} FROM crowd_monitor.scan_events \
         WHERE tag_id = $1 ORDER BY occurred_at ASC"
    );

    let rows = sqlx::query(&query).bind(tag_id).fetch_all(pool).await?;
    rows.iter().map(event_from_row).collect()
}

pub async fn fetch_checkpoint_stats(pool: &PgPool) -> anyhow::Result<Vec<CheckpointStats>> {
    let rows = sqlx::query(
        r#"
        SELECT checkpoint_id, zone, COUNT(*) AS scan_count, MAX(occurred_at) AS last_scan
        FROM crowd_monitor.scan_events
        GROUP BY checkpoint_id, zone
        ORDER BY checkpoint_id, zone
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CheckpointStats {
                checkpoint_id: row.try_get("checkpoint_id")?,
                zone: row.try_get("zone")?,
                scan_count: row.try_get("scan_count")?,
                last_scan: row.try_get("last_scan")?,
            })
        })
        .collect()
}

pub async fn fetch_demographics(pool: &PgPool) -> anyhow::Result<Vec<GenderCount>> {
    let rows = sqlx::query(
        r#"
        SELECT visitor_gender, COUNT(*) AS count
        FROM crowd_monitor.scan_events
        WHERE visitor_gender IS NOT NULL
        GROUP BY visitor_gender
        ORDER BY count DESC, visitor_gender
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(GenderCount {
                gender: row.try_get("visitor_gender")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

fn event_from_row(row: &PgRow) -> anyhow::Result<ScanEvent> {
    let event_type: String = row.try_get("event_type")?;
    let visitor_info = VisitorInfo {
        name: row.try_get("visitor_name")?,
        age: row.try_get("visitor_age")?,
        gender: row.try_get("visitor_gender")?,
        group: row.try_get("visitor_group")?,
    };

    Ok(ScanEvent {
        id: row.try_get("id")?,
        tag_id: row.try_get("tag_id")?,
        checkpoint_id: row.try_get("checkpoint_id")?,
        checkpoint_name: row.try_get("checkpoint_name")?,
        zone: row.try_get("zone")?,
        event_type: event_type.parse()?,
        timestamp: row.try_get("occurred_at")?,
        visitor_info: (!visitor_info.is_empty()).then_some(visitor_info),
    })
}

pub async fn insert_alert(
    pool: &PgPool,
    alert: &Alert,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO crowd_monitor.alerts
        (id, alert_type, title, message, location, zone, priority, status, created_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(alert.id)
    .bind(alert.alert_type.as_str())
    .bind(&alert.title)
    .bind(&alert.message)
    .bind(&alert.location)
    .bind(&alert.zone)
    .bind(alert.priority.as_str())
    .bind(alert.status.as_str())
    .bind(alert.created_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Default)]
pub struct AlertFilter {
    pub alert_type: Option<AlertType>,
    pub status: Option<AlertStatus>,
    pub priority: Option<AlertPriority>,
    pub limit: i64,
}

/// Alerts matching `filter`, highest priority first and newest first within
/// a priority.
pub async fn fetch_alerts(pool: &PgPool, filter: &AlertFilter) -> anyhow::Result<Vec<Alert>> {
    let query = format!(
        "SELECT {ALERT_COLUMNS} FROM crowd_monitor.alerts \
         WHERE ($1::text IS NULL OR alert_type = $1) \
         AND ($2::text IS NULL OR status = $2) \
         AND ($3::text IS NULL OR priority = $3) \
         ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
         created_at DESC LIMIT $4"
    );

    let rows = sqlx::query(&query)
        .bind(filter.alert_type.map(AlertType::as_str))
        .bind(filter.status.map(AlertStatus::as_str))
        .bind(filter.priority.map(AlertPriority::as_str))
        .bind(filter.limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(alert_from_row).collect()
}

pub async fn count_active_alerts(pool: &PgPool) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM crowd_monitor.alerts WHERE status = 'active'",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn fetch_active_alerts(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<Alert>> {
    let query = format!(
        "SELECT {ALERT_COLUMNS} FROM crowd_monitor.alerts \
         WHERE status = 'active' ORDER BY created_at DESC LIMIT $1"
    );

    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
    rows.iter().map(alert_from_row).collect()
}

/// Moves an alert to `acknowledged`, recording who did it. `None` if the id
/// is unknown.
pub async fn acknowledge_alert(
    pool: &PgPool,
    id: Uuid,
    acknowledged_by: Option<&str>,
) -> anyhow::Result<Option<Alert>> {
    let query = format!(
        "UPDATE crowd_monitor.alerts \
         SET status = 'acknowledged', acknowledged_by = $2, acknowledged_at = now() \
         WHERE id = $1 RETURNING {ALERT_COLUMNS}"
    );

    let row = sqlx::query(&query)
        .bind(id)
        .bind(acknowledged_by)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(alert_from_row).transpose()
}

pub async fn resolve_alert(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Alert>> {
    let query = format!(
        "UPDATE crowd_monitor.alerts \
         SET status = 'resolved', resolved_at = now() \
         WHERE id = $1 RETURNING {ALERT_COLUMNS}"
    );

    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(alert_from_row).transpose()
}

pub async fn fetch_alert_stats(pool: &PgPool) -> anyhow::Result<AlertStats> {
    let by_status = sqlx::query(
        r#"
        SELECT status AS label, COUNT(*) AS count
        FROM crowd_monitor.alerts
        GROUP BY status
        ORDER BY status
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_priority = sqlx::query(
        r#"
        SELECT priority AS label, COUNT(*) AS count
        FROM crowd_monitor.alerts
        WHERE status = 'active'
        GROUP BY priority
        ORDER BY priority
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(AlertStats {
        by_status: by_status
            .iter()
            .map(label_count_from_row)
            .collect::<anyhow::Result<_>>()?,
        by_priority: by_priority
            .iter()
            .map(label_count_from_row)
            .collect::<anyhow::Result<_>>()?,
    })
}

fn label_count_from_row(row: &PgRow) -> anyhow::Result<LabelCount> {
    Ok(LabelCount {
        label: row.try_get("label")?,
        count: row.try_get("count")?,
    })
}

fn alert_from_row(row: &PgRow) -> anyhow::Result<Alert> {
    let alert_type: String = row.try_get("alert_type")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;

    Ok(Alert {
        id: row.try_get("id")?,
        alert_type: alert_type.parse()?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        location: row.try_get("location")?,
        zone: row.try_get("zone")?,
        priority: priority.parse()?,
        status: status.parse()?,
        acknowledged_by: row.try_get("acknowledged_by")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_notification(
    pool: &PgPool,
    notification: &Notification,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO crowd_monitor.notifications
        (id, user_id, notification_type, title, message, read, action_url, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(notification.id)
    .bind(&notification.user_id)
    .bind(notification.notification_type.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.read)
    .bind(&notification.action_url)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest notifications first, optionally narrowed to one user and one read
/// state.
pub async fn fetch_notifications(
    pool: &PgPool,
    user_id: Option<&str>,
    read: Option<bool>,
    limit: i64,
) -> anyhow::Result<Vec<Notification>> {
    let query = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM crowd_monitor.notifications \
         WHERE ($1::text IS NULL OR user_id = $1) \
         AND ($2::boolean IS NULL OR read = $2) \
         ORDER BY created_at DESC LIMIT $3"
    );

    let rows = sqlx::query(&query)
        .bind(user_id)
        .bind(read)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(notification_from_row).collect()
}

pub async fn count_unread_notifications(
    pool: &PgPool,
    user_id: Option<&str>,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM crowd_monitor.notifications \
         WHERE NOT read AND ($1::text IS NULL OR user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn mark_notification_read(
    pool: &PgPool,
    id: Uuid,
) -> anyhow::Result<Option<Notification>> {
    let query = format!(
        "UPDATE crowd_monitor.notifications \
         SET read = TRUE, read_at = COALESCE(read_at, now()) \
         WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
    );

    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(notification_from_row).transpose()
}

/// Marks every unread notification of `user_id` as read and returns how many
/// changed.
pub async fn mark_all_notifications_read(pool: &PgPool, user_id: &str) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "UPDATE crowd_monitor.notifications \
         SET read = TRUE, read_at = now() \
         WHERE user_id = $1 AND NOT read",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_notification(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM crowd_monitor.notifications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn notification_from_row(row: &PgRow) -> anyhow::Result<Notification> {
    let notification_type: String = row.try_get("notification_type")?;

    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        notification_type: notification_type.parse::<NotificationType>()?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        read: row.try_get("read")?,
        action_url: row.try_get("action_url")?,
        created_at: row.try_get("created_at")?,
        read_at: row.try_get("read_at")?,
    })
}
