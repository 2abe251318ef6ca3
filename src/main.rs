use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use k2_bench::config::Config;
use k2_bench::output::OutputWriter;
use k2_bench::plan::TestPlan;
use k2_bench::report::{RenderFormat, Report};
use k2_bench::runner::mock::MockRunner;
use k2_bench::runner::{ProcessRunner, SystemRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "k2-bench")]
#[command(about = "Load-testing harness for K2 search command-line clients")]
struct Cli {
    /// Log level (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every test plan in a configuration file
    Run {
        /// TOML test-plan configuration
        #[arg(long)]
        config: PathBuf,

        /// Sort field (date|elapsed_time|hits|documents_searched|query|source_query)
        #[arg(long, default_value = "date")]
        sort: String,

        /// Render rows as CSV instead of fixed-width text
        #[arg(long, default_value = "false")]
        csv: bool,

        /// Write rows to this file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Save a binary report snapshot here
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print latency/hit summary after the rows
        #[arg(long, default_value = "false")]
        summary: bool,

        /// Do not launch tools; every command succeeds with empty output
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Display a saved report snapshot
    Show {
        /// Snapshot produced by `run --snapshot`
        #[arg(long)]
        snapshot: PathBuf,

        /// Sort field; defaults to the one stored in the snapshot
        #[arg(long)]
        sort: Option<String>,

        /// Render rows as CSV instead of fixed-width text
        #[arg(long, default_value = "false")]
        csv: bool,

        /// Write rows to this file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print latency/hit summary after the rows
        #[arg(long, default_value = "false")]
        summary: bool,
    },
}

fn output_writer(out: Option<&PathBuf>, csv: bool) -> Result<OutputWriter> {
    let format = if csv {
        RenderFormat::Csv
    } else {
        RenderFormat::Text
    };
    Ok(match out {
        Some(path) => OutputWriter::new_file(path, format)
            .with_context(|| format!("create {}", path.display()))?,
        None => OutputWriter::new_stdout(format),
    })
}

fn display(report: &Report, out: Option<&PathBuf>, csv: bool, summary: bool) -> Result<()> {
    let mut output = output_writer(out, csv)?;
    output.write_report(report)?;
    if summary {
        output.write_summary(&report.summary()?)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    k2_bench::logging::init(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            sort,
            csv,
            out,
            snapshot,
            summary,
            dry_run,
        } => {
            let mut report = Report::new();
            // Reject a bad sort field before spending time on the runs
            report.set_sort_field(&sort)?;

            let config = Config::from_path(&config)?;
            let runner: Arc<dyn ProcessRunner> = if dry_run {
                Arc::new(MockRunner::canned(""))
            } else {
                Arc::new(SystemRunner)
            };

            let mut plans = Vec::new();
            for plan in config.test_plans() {
                match plan {
                    Ok(plan) => plans.push(TestPlan::new(plan)),
                    Err(e) => error!(error = %e, "Skipping test plan"),
                }
            }
            info!(plans = plans.len(), dry_run, "Configuration loaded");

            for plan in &plans {
                report.extend_outcomes(plan.run(Arc::clone(&runner))?);
            }
            report.sort();

            if let Some(path) = &snapshot {
                report.save_to_path(path)?;
            }
            display(&report, out.as_ref(), csv, summary)?;
            Ok(())
        }
        Commands::Show {
            snapshot,
            sort,
            csv,
            out,
            summary,
        } => {
            let mut report = Report::load_from_path(&snapshot)?;
            if let Some(sort) = sort {
                report.set_sort_field(&sort)?;
            }
            report.sort();
            display(&report, out.as_ref(), csv, summary)?;
            Ok(())
        }
    }
}
