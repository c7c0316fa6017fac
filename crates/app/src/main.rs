//! `vocab-srs`: command-line glue over the review scheduling services.
//!
//! ```text
//! vocab-srs seed --user 1
//! vocab-srs due --user 1 --list 101
//! vocab-srs review --user 1 --fact 10101 --success
//! vocab-srs summary --user 1 --period month --languages fra,deu
//! ```

mod cli;
mod config;
mod db;

use anyhow::{Context as _, Result};
use clap::Parser;
use services::{AppServices, Clock};
use storage::repository::Storage;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vocab_core::model::{FactId, UserId};
use vocab_core::progress::ProgressReport;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    let db_url = db::normalize_sqlite_url(cli.db.as_deref().unwrap_or(&cfg.database_url));
    db::prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("failed to open {db_url}"))?;

    let clock = Clock::default();
    let app = AppServices::new(&storage, clock, &cfg.scheduler())
        .context("invalid scheduler settings")?;

    match cli.command {
        Command::Seed { user, summaries } => {
            let report = storage::seed::seed_demo(&storage, UserId::new(user), summaries, clock.now())
                .await
                .context("seeding failed")?;
            println!(
                "seeded family {} for user {user}: {} lists, {} facts, {} sessions",
                report.family_id, report.lists, report.facts, report.summaries
            );
        }
        Command::Due { user, scope } => {
            let facts = app.due().select_due(Some(UserId::new(user)), &scope.scope()).await?;
            if facts.is_empty() {
                println!("nothing due");
            }
            for fact in facts {
                println!("{}\t{}\t{}", fact.id(), fact.term(), fact.definition());
            }
        }
        Command::Review { user, fact, outcome } => {
            let record = app
                .reviews()
                .record_review(Some(UserId::new(user)), FactId::new(fact), outcome.success)
                .await?;
            let verdict = if record.success { "success" } else { "failure" };
            println!(
                "recorded {verdict} for fact {}; next review at {}",
                record.fact_id,
                record.next_review_at.to_rfc3339()
            );
        }
        Command::Summary {
            user,
            period,
            languages,
        } => {
            let report = app
                .progress()
                .summarize_query(Some(UserId::new(user)), period.as_deref(), languages.as_deref())
                .await?;
            print_report(&report);
        }
    }

    Ok(())
}

fn print_report(report: &ProgressReport) {
    let from = report
        .window_start
        .map_or_else(|| "the beginning".to_owned(), |at| at.to_rfc3339());
    println!("{} ({from} to {})", report.period, report.window_end.to_rfc3339());
    println!(
        "sessions {}  minutes {}  seen {}  retained {}  written {}",
        report.session_count,
        report.total_duration_seconds / 60,
        report.words_seen,
        report.words_retained,
        report.words_written
    );
    println!("engagement {}", report.engagement_state.level());

    let languages: Vec<&str> = report
        .available_languages
        .iter()
        .map(|code| code.as_str())
        .collect();
    if !languages.is_empty() {
        println!("languages {}", languages.join(", "));
    }
    for (day, activity) in &report.daily_activity {
        println!(
            "  {day}  {} sessions  {} min",
            activity.count,
            activity.duration_seconds / 60
        );
    }
    if report.skipped_rows > 0 {
        println!("({} unreadable sessions skipped)", report.skipped_rows);
    }
}
