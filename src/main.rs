use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod aggregate;
mod api;
mod config;
mod db;
mod error;
mod models;
mod report;
mod requests;
mod risk;

use aggregate::TimeWindow;
use config::Config;

#[derive(Parser)]
#[command(name = "crowd-monitor")]
#[command(about = "Crowd density monitoring for Kumbh Sava checkpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small set of zones, scans and alerts
    Seed,
    /// Import scan events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print zone statuses and the crowd summary
    Status {
        /// Look back this many hours instead of since local midnight
        #[arg(long)]
        since_hours: Option<u32>,
    },
    /// Generate a markdown crowd report
    Report {
        #[arg(long)]
        since_hours: Option<u32>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the dashboard API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn window_for(since_hours: Option<u32>) -> anyhow::Result<TimeWindow> {
    let window = match since_hours {
        Some(hours) => TimeWindow::last_hours(hours)?,
        None => TimeWindow::today()?,
    };
    Ok(window)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} scan events from {}.", csv.display());
        }
        Commands::Status { since_hours } => {
            let window = window_for(since_hours)?;
            let events = db::fetch_events_in_window(&pool, &window).await?;
            let zones = aggregate::count_by_zone(&events, &window);
            let statuses = risk::zone_statuses(&zones, &config.zone_table)?;
            let summary = aggregate::compose_summary(&zones, &config.summary_table)?;

            if statuses.is_empty() {
                println!("No scans found for this window.");
                return Ok(());
            }

            println!(
                "Overall {} with {} scans across {} zones:",
                summary.overall_status, summary.total_visitors, summary.zone_count
            );
            for (status, zone) in statuses.iter().zip(zones.iter()) {
                println!(
                    "- {} {} ({} scans, {} unique tags)",
                    status.zone, status.label, status.count, zone.unique_visitors
                );
            }
        }
        Commands::Report { since_hours, out } => {
            let window = window_for(since_hours)?;
            let events = db::fetch_events_in_window(&pool, &window).await?;
            let zones = aggregate::count_by_zone(&events, &window);
            let statuses = risk::zone_statuses(&zones, &config.zone_table)?;
            let summary = aggregate::compose_summary(&zones, &config.summary_table)?;
            let hourly = aggregate::hourly_distribution(&events, &window, &Local);
            let alerts = db::fetch_alerts(
                &pool,
                &db::AlertFilter {
                    status: Some(models::AlertStatus::Active),
                    limit: 20,
                    ..Default::default()
                },
            )
            .await?;

            let report =
                report::build_report(&window, &summary, &statuses, &zones, &hourly, &alerts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            info!("Starting crowd monitor API");

            let state = Arc::new(api::AppState {
                pool,
                zone_table: config.zone_table,
                summary_table: config.summary_table,
            });
            api::serve(state, port).await?;
        }
    }

    Ok(())
}
