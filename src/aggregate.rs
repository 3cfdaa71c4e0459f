use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};

use crate::error::CrowdError;
use crate::models::{CrowdSummary, DashboardKpis, HourlyCount, ScanEvent, ZoneCount};
use crate::risk::{classify, ThresholdTable};

pub const NO_ZONE: &str = "N/A";

/// Half-open `[start, end)` range of event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CrowdError> {
        if start > end {
            return Err(CrowdError::invalid(format!(
                "window start {start} is after end {end}"
            )));
        }

        Ok(Self { start, end })
    }

    /// Missing bounds default to local midnight today and now.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, CrowdError> {
        let now = Utc::now();
        let start = match start {
            Some(start) => start,
            None => local_midnight(now.with_timezone(&Local))?,
        };

        Self::new(start, end.unwrap_or(now))
    }

    pub fn today() -> Result<Self, CrowdError> {
        Self::resolve(None, None)
    }

    pub fn last_hours(hours: u32) -> Result<Self, CrowdError> {
        let end = Utc::now();
        let start = end
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .ok_or_else(|| {
                CrowdError::invalid(format!("{hours} hours back is out of the calendar range"))
            })?;
        Self::new(start, end)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

fn local_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> Result<DateTime<Utc>, CrowdError> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CrowdError::invalid("unable to compute midnight"))?;

    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .ok_or_else(|| CrowdError::invalid("local midnight does not exist today"))
}

/// Groups the events inside `window` by zone.
///
/// Results are sorted busiest first, ties by zone name, so they can be handed
/// straight to [`compose_summary`].
pub fn count_by_zone(events: &[ScanEvent], window: &TimeWindow) -> Vec<ZoneCount> {
    let mut zones: HashMap<&str, (i64, HashSet<&str>)> = HashMap::new();

    for event in events.iter().filter(|event| window.contains(event.timestamp)) {
        let entry = zones.entry(event.zone.as_str()).or_default();
        entry.0 += 1;
        entry.1.insert(event.tag_id.as_str());
    }

    let mut counts: Vec<ZoneCount> = zones
        .into_iter()
        .map(|(zone, (count, tags))| ZoneCount {
            zone: zone.to_string(),
            count,
            unique_visitors: tags.len() as i64,
        })
        .collect();

    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.zone.cmp(&b.zone)));
    counts
}

pub fn compose_summary(
    zones: &[ZoneCount],
    table: &ThresholdTable,
) -> Result<CrowdSummary, CrowdError> {
    let total_visitors: i64 = zones.iter().map(|zone| zone.count).sum();

    // Strict comparisons keep the first of several tied zones.
    let mut busiest: Option<&ZoneCount> = None;
    let mut safest: Option<&ZoneCount> = None;
    for zone in zones {
        if busiest.map_or(true, |current| zone.count > current.count) {
            busiest = Some(zone);
        }
        if safest.map_or(true, |current| zone.count < current.count) {
            safest = Some(zone);
        }
    }

    Ok(CrowdSummary {
        total_visitors,
        zone_count: zones.len(),
        busiest_zone: busiest.map_or_else(|| NO_ZONE.to_string(), |zone| zone.zone.clone()),
        busiest_count: busiest.map_or(0, |zone| zone.count),
        safest_zone: safest.map_or_else(|| NO_ZONE.to_string(), |zone| zone.zone.clone()),
        overall_status: if zones.is_empty() {
            table.safest()
        } else {
            classify(total_visitors, table)?
        },
    })
}

/// Headline numbers for the operations dashboard. Every zone passed in saw at
/// least one scan, so all of them count as active.
pub fn dashboard_kpis(zones: &[ZoneCount], alerts_active: i64) -> DashboardKpis {
    DashboardKpis {
        total_visitors: zones.iter().map(|zone| zone.count).sum(),
        active_zones: zones.len(),
        alerts_active,
    }
}

/// Counts events in `window` per hour of day as seen in `tz`, earliest hour
/// first. Hours with no events are omitted.
pub fn hourly_distribution<Tz: TimeZone>(
    events: &[ScanEvent],
    window: &TimeWindow,
    tz: &Tz,
) -> Vec<HourlyCount> {
    let mut hours: BTreeMap<u32, i64> = BTreeMap::new();

    for event in events.iter().filter(|event| window.contains(event.timestamp)) {
        *hours
            .entry(event.timestamp.with_timezone(tz).hour())
            .or_insert(0) += 1;
    }

    hours
        .into_iter()
        .map(|(hour, count)| HourlyCount { hour, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use crate::risk::RiskLabel;
    use chrono::FixedOffset;
    use uuid::Uuid;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 14, hour, minute, 0).unwrap()
    }

    fn scan(tag: &str, zone: &str, timestamp: DateTime<Utc>) -> ScanEvent {
        ScanEvent {
            id: Uuid::new_v4(),
            tag_id: tag.to_string(),
            checkpoint_id: "CP-1".to_string(),
            checkpoint_name: None,
            zone: zone.to_string(),
            event_type: EventType::Scan,
            timestamp,
            visitor_info: None,
        }
    }

    fn zone(name: &str, count: i64) -> ZoneCount {
        ZoneCount {
            zone: name.to_string(),
            count,
            unique_visitors: count,
        }
    }

    fn day_window() -> TimeWindow {
        TimeWindow::new(at(0, 0), at(23, 59)).unwrap()
    }

    #[test]
    fn counts_events_and_distinct_tags_per_zone() {
        let events = vec![
            scan("TAG-1", "Zone A", at(8, 0)),
            scan("TAG-1", "Zone A", at(8, 30)),
            scan("TAG-2", "Zone A", at(9, 0)),
            scan("TAG-3", "Zone B", at(9, 15)),
        ];

        let counts = count_by_zone(&events, &day_window());
        assert_eq!(
            counts,
            vec![
                ZoneCount {
                    zone: "Zone A".to_string(),
                    count: 3,
                    unique_visitors: 2,
                },
                ZoneCount {
                    zone: "Zone B".to_string(),
                    count: 1,
                    unique_visitors: 1,
                },
            ]
        );
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::new(at(8, 0), at(9, 0)).unwrap();
        let events = vec![
            scan("TAG-1", "Zone A", at(7, 59)),
            scan("TAG-2", "Zone A", at(8, 0)),
            scan("TAG-3", "Zone A", at(9, 0)),
            scan("TAG-4", "Zone B", at(10, 0)),
        ];

        let counts = count_by_zone(&events, &window);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].zone, "Zone A");
        assert_eq!(counts[0].count, 1);
    }

    #[test]
    fn zone_names_are_not_canonicalized() {
        let events = vec![
            scan("TAG-1", "Zone A", at(8, 0)),
            scan("TAG-2", "zone a", at(8, 0)),
        ];

        let counts = count_by_zone(&events, &day_window());
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].zone, "Zone A");
        assert_eq!(counts[1].zone, "zone a");
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = TimeWindow::new(at(9, 0), at(8, 0)).unwrap_err();
        assert!(matches!(err, CrowdError::InvalidArgument(_)));
        assert!(TimeWindow::new(at(9, 0), at(9, 0)).is_ok());
    }

    #[test]
    fn default_window_starts_at_local_midnight() {
        let window = TimeWindow::today().unwrap();
        let start = window.start.with_timezone(&Local);
        assert!(window.start <= window.end);
        assert_eq!(start.date_naive(), Local::now().date_naive());
        assert_eq!((start.hour(), start.minute(), start.second()), (0, 0, 0));
    }

    #[test]
    fn last_hours_spans_requested_duration() {
        let window = TimeWindow::last_hours(6).unwrap();
        assert_eq!(window.end - window.start, Duration::hours(6));
    }

    #[test]
    fn last_hours_out_of_range_is_rejected() {
        let err = TimeWindow::last_hours(u32::MAX).unwrap_err();
        assert!(matches!(err, CrowdError::InvalidArgument(_)));
    }

    #[test]
    fn summary_picks_busiest_and_safest() {
        let zones = vec![zone("A", 1200), zone("B", 4000), zone("C", 200)];
        let summary = compose_summary(&zones, &ThresholdTable::summary()).unwrap();

        assert_eq!(summary.busiest_zone, "B");
        assert_eq!(summary.busiest_count, 4000);
        assert_eq!(summary.safest_zone, "C");
        assert_eq!(summary.total_visitors, 5400);
        assert_eq!(summary.zone_count, 3);
        assert_eq!(summary.overall_status, RiskLabel::Moderate);
    }

    #[test]
    fn summary_ties_go_to_first_occurrence() {
        let zones = vec![zone("A", 50), zone("B", 50), zone("C", 10), zone("D", 10)];
        let summary = compose_summary(&zones, &ThresholdTable::summary()).unwrap();

        assert_eq!(summary.busiest_zone, "A");
        assert_eq!(summary.safest_zone, "C");
    }

    #[test]
    fn empty_summary_uses_placeholders() {
        let table = ThresholdTable::zone();
        let summary = compose_summary(&[], &table).unwrap();

        assert_eq!(summary.total_visitors, 0);
        assert_eq!(summary.zone_count, 0);
        assert_eq!(summary.busiest_zone, NO_ZONE);
        assert_eq!(summary.busiest_count, 0);
        assert_eq!(summary.safest_zone, NO_ZONE);
        assert_eq!(summary.overall_status, table.safest());
    }

    #[test]
    fn total_matches_sum_of_counts() {
        let zones: Vec<ZoneCount> = (0..25).map(|i| zone(&format!("Z{i}"), i * 37)).collect();
        let expected: i64 = zones.iter().map(|z| z.count).sum();
        let summary = compose_summary(&zones, &ThresholdTable::summary()).unwrap();
        assert_eq!(summary.total_visitors, expected);
    }

    #[test]
    fn composing_twice_gives_same_summary() {
        let zones = vec![zone("A", 1200), zone("B", 4000), zone("C", 200)];
        let table = ThresholdTable::summary();
        assert_eq!(
            compose_summary(&zones, &table).unwrap(),
            compose_summary(&zones, &table).unwrap()
        );
    }

    #[test]
    fn negative_zone_count_is_rejected() {
        let zones = vec![zone("A", -5)];
        assert!(compose_summary(&zones, &ThresholdTable::summary()).is_err());
    }

    #[test]
    fn dashboard_kpis_add_up_zone_counts() {
        let zones = vec![zone("A", 1200), zone("B", 4000), zone("C", 200)];
        let kpis = dashboard_kpis(&zones, 2);

        assert_eq!(kpis.total_visitors, 5400);
        assert_eq!(kpis.active_zones, 3);
        assert_eq!(kpis.alerts_active, 2);

        let quiet = dashboard_kpis(&[], 0);
        assert_eq!((quiet.total_visitors, quiet.active_zones), (0, 0));
    }

    #[test]
    fn hourly_buckets_follow_timezone() {
        let events = vec![
            scan("TAG-1", "Zone A", at(8, 10)),
            scan("TAG-2", "Zone B", at(8, 50)),
            scan("TAG-3", "Zone A", at(13, 5)),
        ];

        let utc = hourly_distribution(&events, &day_window(), &Utc);
        assert_eq!(
            utc,
            vec![
                HourlyCount { hour: 8, count: 2 },
                HourlyCount { hour: 13, count: 1 },
            ]
        );

        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let shifted = hourly_distribution(&events, &day_window(), &ist);
        assert_eq!(shifted[0], HourlyCount { hour: 13, count: 1 });
        assert_eq!(shifted[1], HourlyCount { hour: 14, count: 1 });
        assert_eq!(shifted[2], HourlyCount { hour: 18, count: 1 });
    }
}
