//! nmcrun: collect RunAI cluster diagnostics into support archives

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::bail;
use nmcrun_core::{
    CheckStatus, CollectError, Collector, CollectorConfig, DiagnosticReport, TargetReport,
    TargetStatus, canonical_type,
};
use runai_kube::{CredentialResolver, CredentialSources, KubeClusterApi};
use std::fs::File;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, prelude::*};

/// nmcrun: RunAI log and diagnostics collector
#[derive(Parser, Debug)]
#[command(name = "nmcrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to kubeconfig file (in-cluster service account credentials take precedence)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Collector configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for archives (default: current directory)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Number of log fetches in flight (default: 1)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Collect pod logs and RunAI configuration from the RunAI namespaces
    Logs,

    /// Collect manifests and logs for a single workload
    Workload {
        /// Project the workload belongs to
        project: String,

        /// Workload type: tw, iw, infw, dw, dinfw, ew (or the full plural name)
        #[arg(value_name = "TYPE")]
        workload_type: String,

        /// Workload name
        name: String,
    },

    /// Dump scheduler projects, queues, node pools and departments
    Scheduler,

    /// Check cluster access and the RunAI installation
    Test,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize error handling
    color_eyre::install()?;

    init_tracing(cli.debug, cli.log_file.as_deref())?;

    // kube's rustls transport needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = build_config(&cli)?;
    tracing::info!("Starting nmcrun {}", env!("CARGO_PKG_VERSION"));

    // Reject bad input before touching the cluster
    if let Command::Workload { workload_type, .. } = &cli.command {
        if canonical_type(workload_type).is_none() {
            return Err(CollectError::InvalidInput(workload_type.clone()).into());
        }
    }

    let sources = CredentialSources::from_env().with_kubeconfig(config.kubeconfig.clone());
    let session = CredentialResolver::standard(&sources).resolve().await?;
    tracing::debug!("API server: {}", session.endpoint);

    let api = KubeClusterApi::new(session.client.clone());
    let collector = Collector::new(&api, config).with_context(session.context.clone());

    match cli.command {
        Command::Logs => {
            let reports = collector.collect_namespaces().await;
            for report in &reports {
                print_report(report);
            }
            namespaces_outcome(&reports)?;
        }
        Command::Workload {
            project,
            workload_type,
            name,
        } => {
            let report = collector
                .collect_workload(&project, &workload_type, &name)
                .await?;
            print_report(&report);
        }
        Command::Scheduler => {
            let report = collector.collect_scheduler_dump().await?;
            print_report(&report);
        }
        Command::Test => {
            let report = collector.run_diagnostic_checks().await;
            print_diagnostics(&report);
            if let Some(e) = report.aborted {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

fn init_tracing(debug: bool, log_file: Option<&str>) -> Result<()> {
    // Build filter: set base level, but quiet down noisy HTTP/TLS libraries
    let filter = if debug {
        EnvFilter::from_default_env()
            .add_directive(Level::DEBUG.into())
            .add_directive("h2=info".parse()?)
            .add_directive("hyper=info".parse()?)
            .add_directive("hyper_util=info".parse()?)
            .add_directive("tower=info".parse()?)
            .add_directive("rustls=info".parse()?)
            .add_directive("kube_client=info".parse()?)
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let (writer, ansi) = match log_file {
        Some(path) => (BoxMakeWriter::new(File::create(path)?), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .with(filter)
        .init();
    Ok(())
}

/// Config file values, overridden by any flags given on the command line
fn build_config(cli: &Cli) -> Result<CollectorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Using config: {}", path.display());
            CollectorConfig::load(path)?
        }
        None => CollectorConfig::default(),
    };

    if let Some(kubeconfig) = &cli.kubeconfig {
        config.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(n) = cli.concurrency {
        config.log_concurrency = n.max(1);
    }
    Ok(config)
}

/// Non-zero exit when nothing was archived or any namespace failed outright
fn namespaces_outcome(reports: &[TargetReport]) -> Result<()> {
    if reports.iter().all(|r| r.archive().is_none()) {
        bail!("no namespace was collected");
    }
    if reports
        .iter()
        .any(|r| matches!(r.status, TargetStatus::Failed(_)))
    {
        bail!("one or more namespaces failed");
    }
    Ok(())
}

fn print_report(report: &TargetReport) {
    let summary = &report.summary;
    match &report.status {
        TargetStatus::Archived(path) => {
            println!("{}: archive created: {}", report.target, path.display());
            println!(
                "  {} file(s) collected, {} step(s) failed",
                summary.succeeded(),
                summary.failed()
            );
        }
        TargetStatus::Skipped(reason) => println!("{}: skipped ({})", report.target, reason),
        TargetStatus::Failed(reason) => println!("{}: failed: {}", report.target, reason),
    }

    for (name, cause) in summary.failures() {
        println!("  failed: {}: {}", name, cause);
    }
    for warning in summary.warnings() {
        println!("  warning: {}", warning);
    }
    for note in &summary.skipped {
        println!("  note: {}", note);
    }
}

fn print_diagnostics(report: &DiagnosticReport) {
    for check in &report.checks {
        println!("[{}] {}: {}", check.status.label(), check.name, check.message);
        if let Some(details) = &check.details {
            for line in details.lines() {
                println!("       {}", line);
            }
        }
        if check.status == CheckStatus::Fail {
            if let Some(hint) = &check.hint {
                println!("       hint: {}", hint);
            }
        }
    }
}
