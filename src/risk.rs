use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CrowdError;
use crate::models::{ZoneCount, ZoneStatus};

/// Crowd density label, ordered from safest to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    Safe,
    Moderate,
    Crowded,
    Emergency,
}

impl RiskLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::Safe => "safe",
            RiskLabel::Moderate => "moderate",
            RiskLabel::Crowded => "crowded",
            RiskLabel::Emergency => "emergency",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ascending `(upper_bound, label)` cut points plus the label used once every
/// bound has been reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable {
    steps: Vec<(i64, RiskLabel)>,
    otherwise: RiskLabel,
}

impl ThresholdTable {
    /// Builds a table, rejecting bounds that are not strictly ascending or
    /// labels that get safer as the count grows.
    pub fn new(steps: Vec<(i64, RiskLabel)>, otherwise: RiskLabel) -> Result<Self, CrowdError> {
        for pair in steps.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if lower.0 >= upper.0 {
                return Err(CrowdError::invalid(format!(
                    "threshold bounds must be strictly ascending ({} then {})",
                    lower.0, upper.0
                )));
            }
            if lower.1 > upper.1 {
                return Err(CrowdError::invalid(format!(
                    "threshold labels must not get safer ({} then {})",
                    lower.1, upper.1
                )));
            }
        }

        if let Some(&(_, last)) = steps.last() {
            if last > otherwise {
                return Err(CrowdError::invalid(format!(
                    "final label {otherwise} is safer than {last}"
                )));
            }
        }

        Ok(Self { steps, otherwise })
    }

    /// Per-zone scan counts: `<1000` safe, `<3000` moderate, `<5000` crowded,
    /// anything above is an emergency.
    pub fn zone() -> Self {
        Self {
            steps: vec![
                (1000, RiskLabel::Safe),
                (3000, RiskLabel::Moderate),
                (5000, RiskLabel::Crowded),
            ],
            otherwise: RiskLabel::Emergency,
        }
    }

    /// Site-wide totals: `<3000` safe, `<6000` moderate, otherwise crowded.
    pub fn summary() -> Self {
        Self {
            steps: vec![(3000, RiskLabel::Safe), (6000, RiskLabel::Moderate)],
            otherwise: RiskLabel::Crowded,
        }
    }

    pub fn safest(&self) -> RiskLabel {
        self.steps
            .first()
            .map(|&(_, label)| label)
            .unwrap_or(self.otherwise)
    }
}

/// Returns the label of the first step whose bound is strictly above `count`.
/// A count sitting exactly on a bound falls into the next bucket.
pub fn classify(count: i64, table: &ThresholdTable) -> Result<RiskLabel, CrowdError> {
    if count < 0 {
        return Err(CrowdError::invalid(format!(
            "count must not be negative, got {count}"
        )));
    }

    Ok(table
        .steps
        .iter()
        .find(|&&(upper, _)| count < upper)
        .map(|&(_, label)| label)
        .unwrap_or(table.otherwise))
}

pub fn zone_statuses(
    zones: &[ZoneCount],
    table: &ThresholdTable,
) -> Result<Vec<ZoneStatus>, CrowdError> {
    zones
        .iter()
        .map(|zone| {
            Ok(ZoneStatus {
                zone: zone.zone.clone(),
                count: zone.count,
                label: classify(zone.count, table)?,
            })
        })
        .collect()
}
