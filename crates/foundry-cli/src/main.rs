//! foundry-agent - lifecycle agent for a self-hosted Foundry VTT unit
//!
//! Usage:
//!   foundry-agent install            # Install from the uploaded resource
//!   foundry-agent config-changed     # Apply configuration, migrate data
//!   foundry-agent start              # Enable and start the service
//!   foundry-agent upgrade            # Ensure the service is enabled
//!   foundry-agent proxy-connected    # Publish the reverse-proxy record
//!   foundry-agent status             # Show unit status

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foundry_core::context::AgentContext;
use foundry_core::lifecycle::{DispatchReport, SignalOutcome};
use foundry_core::status::{StatusReport, collect_status};
use foundry_core::types::{Signal, UnitStatus};

#[derive(Parser)]
#[command(name = "foundry-agent")]
#[command(about = "Foundry VTT lifecycle agent", long_about = None)]
struct Cli {
    /// Path to foundry-agent.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted unit state
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Directory holding uploaded resources (foundryvtt.zip)
    #[arg(long, global = true)]
    resource_dir: Option<PathBuf>,

    /// Stage every system path under this directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// File the reverse-proxy record is published to
    #[arg(long, global = true)]
    relation_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the application from the uploaded resource
    Install,

    /// Apply the current configuration
    ///
    /// Moves application data when the configured data path changed.
    ConfigChanged,

    /// Enable and start the service
    Start,

    /// Make sure the service is enabled
    Upgrade,

    /// Publish the reverse-proxy advertisement
    ProxyConnected,

    /// Show unit status
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

impl Commands {
    fn signal(&self) -> Option<Signal> {
        match self {
            Commands::Install => Some(Signal::Install),
            Commands::ConfigChanged => Some(Signal::ConfigChanged),
            Commands::Start => Some(Signal::Start),
            Commands::Upgrade => Some(Signal::Upgrade),
            Commands::ProxyConnected => Some(Signal::ProxyConnected),
            Commands::Status { .. } => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foundry_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let context = build_context(&cli)?;

    if let Commands::Status { format } = cli.command {
        return run_status(&context, format);
    }
    if let Some(signal) = cli.command.signal() {
        run_signal(&context, signal)?;
    }
    Ok(())
}

fn build_context(cli: &Cli) -> Result<AgentContext> {
    let mut context = match &cli.root {
        Some(root) => AgentContext::under_root(root),
        None => AgentContext::with_defaults()?,
    };
    if let Some(path) = &cli.config {
        context = context.with_config_path(path.clone());
    }
    if let Some(dir) = &cli.state_dir {
        context = context.with_state_dir(dir.clone());
    }
    if let Some(dir) = &cli.resource_dir {
        context = context.with_resource_dir(dir.clone());
    }
    if let Some(path) = &cli.relation_file {
        context = context.with_relation_file(path.clone());
    }
    Ok(context)
}

fn run_signal(context: &AgentContext, signal: Signal) -> Result<()> {
    let config = context.config_store().load()?;
    debug!(
        config = %context.config_path().display(),
        state = %context.state_dir().display(),
        "loaded configuration"
    );
    let controller = context.controller();

    let report = controller.dispatch(signal, &config)?;
    print_dispatch(&report);

    let state = controller.load_state()?;
    print_unit_status(state.status());
    Ok(())
}

fn print_dispatch(report: &DispatchReport) {
    print_outcome(report.signal, &report.outcome, false);
    for (signal, outcome) in &report.replayed {
        print_outcome(*signal, outcome, true);
    }
}

fn print_outcome(signal: Signal, outcome: &SignalOutcome, replayed: bool) {
    let prefix = if replayed { "↻ " } else { "" };
    let label = match outcome {
        SignalOutcome::Completed => style(outcome.label()).green(),
        SignalOutcome::Skipped => style(outcome.label()).dim(),
        SignalOutcome::Deferred(_) => style(outcome.label()).yellow(),
        SignalOutcome::Dropped(_) | SignalOutcome::Blocked(_) => style(outcome.label()).red(),
    };
    match outcome.error() {
        Some(err) => println!("{}{}: {} ({})", prefix, style(signal).bold(), label, err),
        None => println!("{}{}: {}", prefix, style(signal).bold(), label),
    }
}

fn print_unit_status(status: &UnitStatus) {
    let styled = match status {
        UnitStatus::Active(_) => style(status.kind()).green(),
        UnitStatus::Blocked(_) => style(status.kind()).red(),
        UnitStatus::Maintenance(_) => style(status.kind()).yellow(),
        UnitStatus::Unknown => style(status.kind()).dim(),
    };
    println!("Status: {} {}", styled, status.message());
}

fn run_status(context: &AgentContext, format: OutputFormat) -> Result<()> {
    let config = context.config_store().load()?;
    let store = context.state_store();
    let report = collect_status(&store, &config, context.layout())?;

    match format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn print_table(report: &StatusReport) {
    print_unit_status(&report.status);
    if let Some(at) = report.updated_at {
        println!("Updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();

    println!("  {:<14} {}", "Stage", report.stage());
    println!(
        "  {:<14} {}",
        "Flags",
        [
            ("installed", report.installed),
            ("configured", report.configured),
            ("started", report.started),
            ("enabled", report.enabled),
        ]
        .iter()
        .map(|(name, set)| if *set {
            style(*name).green().to_string()
        } else {
            style(*name).dim().to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
    );
    println!("  {:<14} {}", "Install path", report.install_path.display());
    println!("  {:<14} {}", "Data path", report.data_path.display());
    println!("  {:<14} {}", "Service unit", report.service_file.display());
    if let Some(digest) = &report.artifact_digest {
        println!("  {:<14} {}", "Artifact", &digest[..digest.len().min(16)]);
    }
    if let Some(target) = &report.pending_migration {
        println!(
            "  {:<14} {} (run 'foundry-agent config-changed' to apply)",
            "Pending move",
            style(target.display()).yellow()
        );
    }
    if !report.deferred.is_empty() {
        let names = report
            .deferred
            .iter()
            .map(Signal::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {:<14} {}", "Deferred", style(names).yellow());
    }

    if report.has_issues() {
        println!();
        println!(
            "{}",
            style("Unit needs attention: resolve the status above, then re-run the signal").yellow()
        );
    }
}

fn print_json(report: &StatusReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
