use std::fmt::Write;

use chrono::Local;

use crate::aggregate::TimeWindow;
use crate::models::{Alert, CrowdSummary, HourlyCount, ZoneCount, ZoneStatus};

pub fn build_report(
    window: &TimeWindow,
    summary: &CrowdSummary,
    statuses: &[ZoneStatus],
    zones: &[ZoneCount],
    hourly: &[HourlyCount],
    alerts: &[Alert],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Crowd Status Report");
    let _ = writeln!(
        output,
        "Scans from {} to {}",
        window.start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        window.end.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Overall status: **{}**", summary.overall_status);
    let _ = writeln!(output, "- Total scans: {}", summary.total_visitors);
    let _ = writeln!(output, "- Zones reporting: {}", summary.zone_count);
    let _ = writeln!(
        output,
        "- Busiest zone: {} ({} scans)",
        summary.busiest_zone, summary.busiest_count
    );
    let _ = writeln!(output, "- Quietest zone: {}", summary.safest_zone);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Zones");

    if statuses.is_empty() {
        let _ = writeln!(output, "No scans recorded for this window.");
    } else {
        let _ = writeln!(output, "| Zone | Scans | Unique tags | Status |");
        let _ = writeln!(output, "|---|---|---|---|");
        for status in statuses {
            let unique = zones
                .iter()
                .find(|zone| zone.zone == status.zone)
                .map_or(0, |zone| zone.unique_visitors);
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                status.zone, status.count, unique, status.label
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hourly Flow");

    if hourly.is_empty() {
        let _ = writeln!(output, "No scans recorded for this window.");
    } else {
        for bucket in hourly {
            let _ = writeln!(output, "- {:02}:00 {} scans", bucket.hour, bucket.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Alerts");

    if alerts.is_empty() {
        let _ = writeln!(output, "No active alerts.");
    } else {
        for alert in alerts {
            let _ = writeln!(
                output,
                "- [{}] {} ({}): {}",
                alert.priority,
                alert.title,
                alert.zone.as_deref().unwrap_or("site-wide"),
                alert.message
            );
        }
    }

    output
}
