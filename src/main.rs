//! Neighbor discovery experiment analysis CLI.
//!
//! Parses Cooja and testbed experiment logs, prints per-node and energest
//! summaries, and writes reports plus the comparison series consumed by the
//! external plotting tool.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};

use nd_analyzer::analysis::{self, report};
use nd_analyzer::config::AnalysisConfig;

#[derive(Parser)]
#[command(name = "nd-analyzer")]
#[command(about = "Neighbor discovery experiment analysis for Cooja and testbed logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output directory for reports and exports
    #[arg(short, long, default_value = "analysis_output")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// First epoch (inclusive) of the analysis window
    #[arg(long, default_value = "0")]
    epoch_low: usize,

    /// Last epoch (exclusive) of the analysis window
    #[arg(long, default_value = "100")]
    epoch_high: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Full analysis of each experiment log, with JSON and text reports
    Analyze {
        /// Experiment log files to analyze
        logs: Vec<PathBuf>,

        /// Save a copy of each raw log under its derived name
        #[arg(long)]
        save_log_copy: bool,

        /// Keep the per-node epoch series in the JSON report
        #[arg(long)]
        detailed: bool,
    },

    /// Parse several experiment logs and export comparison series for plotting
    Compare {
        /// Experiment log files to compare
        logs: Vec<PathBuf>,
    },

    /// Show quick statistics for one log without writing reports
    Summary {
        /// Experiment log file
        log: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    // Set thread pool size
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = AnalysisConfig {
        epoch_low: cli.epoch_low,
        epoch_high: cli.epoch_high,
        ..AnalysisConfig::default()
    };
    config.validate()?;

    match cli.command {
        Commands::Analyze {
            logs,
            save_log_copy,
            detailed,
        } => {
            fs::create_dir_all(&cli.output).with_context(|| {
                format!("Failed to create output directory: {}", cli.output.display())
            })?;

            for log_path in &logs {
                let experiment = analysis::parse_log_file(log_path, &config)?;

                report::print_node_summary(&experiment);
                report::print_energest_summary(&experiment);

                if save_log_copy {
                    report::save_log_copy(&experiment, log_path, &cli.output)?;
                }

                let name = experiment.derived_name();
                let mut exp_report = report::ExperimentReport::new(experiment, log_path, &config);
                if !detailed {
                    exp_report.strip_per_node_series();
                }

                analysis::generate_json_report(
                    &exp_report,
                    &cli.output.join(format!("{}_report.json", name)),
                )?;
                analysis::generate_text_report(
                    &exp_report,
                    &cli.output.join(format!("{}_report.txt", name)),
                )?;
            }
        }
        Commands::Compare { logs } => {
            fs::create_dir_all(&cli.output).with_context(|| {
                format!("Failed to create output directory: {}", cli.output.display())
            })?;

            let experiments = analysis::parse_all_logs(&logs, &config)?;

            println!("\nExperiments considered:");
            for experiment in &experiments {
                let dc_mean = experiment
                    .duty_cycle_stats
                    .map(|s| s.mean)
                    .unwrap_or_default();
                println!("  {}: avg duty cycle {:.3}%", experiment.derived_name(), dc_mean);
                if let Some(ref aggregates) = experiment.aggregates {
                    println!(
                        "      overall discovery fraction {:.3}",
                        aggregates.overall_discovery_fraction
                    );
                }
            }
            println!();

            analysis::export_comparison_series(
                &experiments,
                &cli.output.join("comparison_series.json"),
            )?;
        }
        Commands::Summary { log } => {
            let experiment = analysis::parse_log_file(&log, &config)?;

            println!("\n=== EXPERIMENT SUMMARY ===\n");
            println!("Name: {}", experiment.derived_name());
            println!("Source: {}", experiment.source);
            if let Some(ref settings) = experiment.settings {
                println!("Kind: {}", settings.kind);
            }
            println!("Nodes: {}", experiment.nodes.len());
            println!("Max node id: {}", experiment.max_node_id);
            println!("Max epoch: {}", experiment.max_epoch);
            println!("Energest nodes: {}", experiment.energest.len());
            if let Some(stats) = experiment.duty_cycle_stats {
                println!("Avg duty cycle: {:.3}%", stats.mean);
            }
            println!();
        }
    }

    Ok(())
}
