//! Transient reporter (tnsbot-reporter) - Main entry point
//!
//! Single pass: list sources saved to the given survey groups since the last
//! run, report the ones the registry does not know yet, record the run.
//! Intended to be re-run periodically by an external scheduler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tnsbot_common::config::{RegistryCredentials, ReportingSettings};
use tnsbot_common::time;
use tnsbot_reporter::config::{
    lookup_delay, parse_list, plan_selection, resolve_window, CheckStrategy,
};
use tnsbot_reporter::services::{KnownSourceCheck, RegistryClient, RegistryTarget, SurveyClient};
use tnsbot_reporter::{
    CandidateSelection, ReconcileSettings, Reconciler, ReportLedger, RunLog, RunLogEntry,
};

/// Command-line arguments for tnsbot-reporter
#[derive(Parser, Debug)]
#[command(name = "tnsbot-reporter")]
#[command(about = "Report newly saved survey sources to the transient registry")]
#[command(version)]
struct Args {
    /// Survey group ids, separated by commas
    #[arg(default_value = "43")]
    groups: String,

    /// Run log table; the next window starts at its latest end time. Cannot be
    /// combined with --start-time, so seed a new log with a header and one row
    /// whose query_end_time is the first start
    #[arg(long, env = "TNSBOT_RUN_LOG", conflicts_with = "start_time")]
    run_log: Option<PathBuf>,

    /// Window start (ISO-8601)
    #[arg(long)]
    start_time: Option<String>,

    /// Window end (ISO-8601), defaults to now
    #[arg(long)]
    end_time: Option<String>,

    /// Seconds to wait between existence lookups
    #[arg(long, default_value_t = 2.0)]
    delay_seconds: f64,

    /// Build and write the report without submitting it
    #[arg(long)]
    dry_run: bool,

    /// Use the registry sandbox host
    #[arg(long)]
    sandbox: bool,

    /// How to decide whether a source is already known
    #[arg(long, value_enum, default_value = "registry")]
    check: CheckStrategy,

    /// Ledger of sources already reported
    #[arg(long, env = "TNSBOT_LEDGER", default_value = "data/tns_reported_log.csv")]
    ledger: PathBuf,

    /// Explicit source names to report, separated by commas
    #[arg(long)]
    sources: Option<String>,

    /// Where the bulk report payload is written before submission
    #[arg(long, default_value = "bulkreport.json")]
    report_file: PathBuf,

    /// List candidates for the groups and window, then exit
    #[arg(long)]
    list_candidates: bool,

    /// TOML settings file
    #[arg(long, env = "TNSBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tnsbot_reporter=info,tnsbot_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let run_id = Uuid::new_v4();

    run(args)
        .instrument(tracing::info_span!("run", %run_id))
        .await
}

async fn run(args: Args) -> Result<()> {
    let settings =
        ReportingSettings::load(args.config.as_deref()).context("Failed to load settings")?;
    let credentials =
        RegistryCredentials::from_env().context("Registry credentials are required")?;

    let run_log = args.run_log.as_ref().map(RunLog::new);
    let window = resolve_window(
        args.start_time.as_deref(),
        args.end_time.as_deref(),
        run_log.as_ref(),
        time::now(),
    )
    .context("Invalid query window")?;
    let group_ids = parse_list(&args.groups);
    let source_names = args.sources.as_deref().map(parse_list).unwrap_or_default();
    let delay = lookup_delay(args.delay_seconds)?;

    let survey = SurveyClient::new(settings.endpoints.survey_url.as_str())?;

    if args.list_candidates {
        let window = window.context("Please provide a start time, or a run log")?;
        for group_id in &group_ids {
            for candidate in survey.list_candidates(group_id, &window).await? {
                println!("{}\t{}", group_id, candidate.id);
            }
        }
        return Ok(());
    }

    let selection = plan_selection(group_ids, source_names, window)?;

    let target = if args.sandbox {
        RegistryTarget::Sandbox
    } else {
        RegistryTarget::Production
    };
    let registry = RegistryClient::new(credentials, &settings.endpoints, target)?;
    info!(registry = %registry.base_url(), dry_run = args.dry_run, "Starting reconciliation");

    let mut ledger = ReportLedger::open(&args.ledger)
        .with_context(|| format!("Failed to open ledger {}", args.ledger.display()))?;
    let ledger_check;
    let check: &dyn KnownSourceCheck = match args.check {
        CheckStrategy::Registry => &registry,
        CheckStrategy::Ledger => {
            ledger_check = ledger.snapshot();
            &ledger_check
        }
    };

    let reconcile_settings = ReconcileSettings {
        lookup_delay: delay,
        dry_run: args.dry_run,
        record_in_ledger: target == RegistryTarget::Production,
        report_path: Some(args.report_file.clone()),
        reporter: settings.reporter.clone(),
        tables: settings.tables.clone(),
    };

    let summary = Reconciler::new(&survey, check, &registry, &mut ledger, reconcile_settings)
        .run(&selection)
        .await
        .context("Reconciliation aborted")?;

    if let (Some(log), CandidateSelection::Groups { group_ids, window }) = (&run_log, &selection) {
        log.append(&RunLogEntry::from_summary(group_ids, window, &summary))
            .context("Failed to append run log")?;
    }

    info!(
        total = summary.total_sources,
        already_known = summary.already_known,
        reported = summary.reported,
        "Run finished"
    );
    Ok(())
}
