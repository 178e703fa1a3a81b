use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use affect_core::{
    alert_feed, AlertStatus, PipelineConfig, RecordStore, ResultsView, SessionOrchestrator,
    SqliteStore, SystemAlert,
};

mod replay;

/// Affect CLI - multimodal affect analysis sessions
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration file (TOML or JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding sessions and alerts
    #[arg(long, value_name = "FILE", default_value = "affect.db", global = true)]
    db: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session from a replay file of recorded analyzer output
    Run {
        /// Replay file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Override the case reference
        #[arg(long)]
        case: Option<String>,

        /// Override the subject reference
        #[arg(long)]
        subject: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the results of a session
    Results {
        #[arg(short, long)]
        session: Uuid,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the newest alerts
    Alerts {
        /// Only alerts of this session
        #[arg(short, long)]
        session: Option<Uuid>,

        /// Maximum number of alerts (default from config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Re-raise alerts from a session's latest assessment
    RefreshAlerts {
        #[arg(short, long)]
        session: Uuid,
    },

    /// Acknowledge an active alert
    Ack { id: Uuid },

    /// Resolve an alert
    Resolve { id: Uuid },

    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            input,
            case,
            subject,
            json,
        } => {
            let (mut request, analyzers) = replay::ReplayFile::load(&input)?.into_parts();
            if case.is_some() {
                request.case_ref = case;
            }
            if subject.is_some() {
                request.subject_ref = subject;
            }
            if request.input.is_empty() {
                warn!(input = %input.display(), "Replay file contains no units");
            }

            let store = open_store(&cli.db)?;
            let orchestrator = SessionOrchestrator::new(analyzers, store, config);
            let outcome = orchestrator.run(request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!("SESSION: {}", outcome.session.id);
            println!("STATUS: {}", outcome.session.status);
            for batch in &outcome.analysis {
                match &batch.error {
                    Some(e) => println!("  {}: left out ({})", batch.modality, e),
                    None => println!(
                        "  {}: {} events, {} skipped",
                        batch.modality,
                        batch.events,
                        batch.skipped.len()
                    ),
                }
            }
            println!("FUSED STATES: {}", outcome.fused_states.len());
            if let Some(latest) = outcome.assessments.last() {
                println!("RISK LEVEL: {}", latest.risk_level);
                println!("INTENSITY: {:.1}", latest.overall_intensity);
            }
            print_alerts(&outcome.alerts);

            let results = ResultsView::load(orchestrator.store().as_ref(), outcome.session.id).await?;
            println!("AVERAGE INTENSITY: {:.1}", results.average_intensity);
        }
        Commands::Results { session, json } => {
            let store = open_store(&cli.db)?;
            let results = ResultsView::load(store.as_ref(), session).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("SESSION: {}", results.session_id);
                println!("STATUS: {} ({}%)", results.status, results.progress);
                if let Some(message) = &results.error_message {
                    println!("ERROR: {}", message);
                }
                println!(
                    "INTENSITY: current {:.1}, average {:.1}, peak {:.1}",
                    results.current_intensity, results.average_intensity, results.peak_intensity
                );
                println!("RISK LEVEL: {}", results.risk_level);
                if let Some(expression) = &results.latest_expression {
                    println!("LATEST EXPRESSION: {}", expression);
                }
                if let Some(emotion) = &results.latest_speech_emotion {
                    println!("LATEST SPEECH EMOTION: {}", emotion);
                }
                if let Some(affect) = &results.current_affect {
                    println!(
                        "AFFECT: activation {:.2}, valence {:.2}",
                        affect.activation, affect.valence
                    );
                }
                if let Some(radar) = &results.radar {
                    for point in radar {
                        println!("  {:<14} {:>5.1}", point.label, point.value);
                    }
                }
                for risk in &results.risks {
                    println!("RISK [{}] {}: {}", risk.severity, risk.risk_type, risk.evidence);
                }
                for suggestion in &results.suggestions {
                    println!("  - {}", suggestion);
                }
            }
        }
        Commands::Alerts {
            session,
            limit,
            json,
        } => {
            let store = open_store(&cli.db)?;
            let limit = limit.unwrap_or(config.alerts.feed_limit);
            let alerts = alert_feed(store.as_ref(), session, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
            } else {
                print_alerts(&alerts);
            }
        }
        Commands::RefreshAlerts { session } => {
            // no new units are analyzed, so the replay analyzers stay empty
            let (_, analyzers) = replay::ReplayFile::default().into_parts();
            let orchestrator = SessionOrchestrator::new(analyzers, open_store(&cli.db)?, config);
            let alerts = orchestrator.refresh_alerts(session).await?;
            print_alerts(&alerts);
        }
        Commands::Ack { id } => {
            let store = open_store(&cli.db)?;
            let alert = store
                .set_alert_status(id, AlertStatus::Acknowledged, Utc::now())
                .await?;
            println!("Alert {} acknowledged", alert.id);
        }
        Commands::Resolve { id } => {
            let store = open_store(&cli.db)?;
            let alert = store
                .set_alert_status(id, AlertStatus::Resolved, Utc::now())
                .await?;
            println!("Alert {} resolved", alert.id);
        }
        Commands::InitConfig { path } => {
            PipelineConfig::default()
                .to_file(&path)
                .with_context(|| format!("Writing configuration to {}", path.display()))?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_file(path)
                .with_context(|| format!("Loading configuration from {}", path.display()))?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn open_store(path: &Path) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store = SqliteStore::open(path)
        .with_context(|| format!("Opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn print_alerts(alerts: &[SystemAlert]) {
    if alerts.is_empty() {
        println!("No alerts");
        return;
    }
    for alert in alerts {
        println!(
            "{} [{}] {} ({}) {}",
            alert.created_at.format("%Y-%m-%d %H:%M:%S"),
            alert.severity,
            alert.title,
            alert.status,
            alert.id
        );
    }
}
