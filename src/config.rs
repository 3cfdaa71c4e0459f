use std::{env, fmt::Display, str::FromStr};

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::risk::{RiskLabel, ThresholdTable};

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub zone_table: ThresholdTable,
    pub summary_table: ThresholdTable,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            port: try_load("PORT", "5001")?,
            max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            zone_table: load_table(
                "ZONE_THRESHOLDS",
                &[RiskLabel::Safe, RiskLabel::Moderate, RiskLabel::Crowded],
                RiskLabel::Emergency,
            )?
            .unwrap_or_else(ThresholdTable::zone),
            summary_table: load_table(
                "SUMMARY_THRESHOLDS",
                &[RiskLabel::Safe, RiskLabel::Moderate],
                RiskLabel::Crowded,
            )?
            .unwrap_or_else(ThresholdTable::summary),
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value '{raw}': {e}"))
}

/// Reads a comma separated list of upper bounds, one per label in `labels`.
fn load_table(
    key: &str,
    labels: &[RiskLabel],
    otherwise: RiskLabel,
) -> anyhow::Result<Option<ThresholdTable>> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };

    let table = parse_table(&raw, labels, otherwise).with_context(|| format!("Invalid {key}"))?;
    warn!("Using custom {key}: {raw}");
    Ok(Some(table))
}

fn parse_table(
    raw: &str,
    labels: &[RiskLabel],
    otherwise: RiskLabel,
) -> anyhow::Result<ThresholdTable> {
    let bounds = raw
        .split(',')
        .map(|bound| bound.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()?;

    if bounds.len() != labels.len() {
        bail!(
            "expected {} bounds, got {}",
            labels.len(),
            bounds.len()
        );
    }

    let steps = bounds.into_iter().zip(labels.iter().copied()).collect();
    Ok(ThresholdTable::new(steps, otherwise)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::classify;

    const ZONE_LABELS: [RiskLabel; 3] = [RiskLabel::Safe, RiskLabel::Moderate, RiskLabel::Crowded];

    #[test]
    fn parses_bounds_in_label_order() {
        let table = parse_table("500, 1500,2500", &ZONE_LABELS, RiskLabel::Emergency).unwrap();
        assert_eq!(classify(499, &table), Ok(RiskLabel::Safe));
        assert_eq!(classify(1500, &table), Ok(RiskLabel::Crowded));
        assert_eq!(classify(2500, &table), Ok(RiskLabel::Emergency));
    }

    #[test]
    fn default_bounds_reproduce_builtin_table() {
        let table = parse_table("1000,3000,5000", &ZONE_LABELS, RiskLabel::Emergency).unwrap();
        assert_eq!(table, ThresholdTable::zone());
    }

    #[test]
    fn rejects_wrong_bound_count_and_garbage() {
        assert!(parse_table("1000,3000", &ZONE_LABELS, RiskLabel::Emergency).is_err());
        assert!(parse_table("1000,lots,5000", &ZONE_LABELS, RiskLabel::Emergency).is_err());
        assert!(parse_table("5000,3000,1000", &ZONE_LABELS, RiskLabel::Emergency).is_err());
    }
}
