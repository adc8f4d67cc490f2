//! Report generation and collaborator-facing exports.
//!
//! Produces JSON and human-readable text reports for single experiments,
//! console summaries, the comparison series consumed by the external
//! plotting tool, and the raw-log copy saved under a derived filename.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::config::AnalysisConfig;

use super::types::Experiment;

/// Report metadata block
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub analyzed_at: String,
    pub source_file: String,
    pub epoch_low: usize,
    pub epoch_high: usize,
}

/// Complete single-experiment report
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub metadata: ReportMetadata,
    pub experiment: Experiment,
}

impl ExperimentReport {
    pub fn new(experiment: Experiment, source_file: &Path, config: &AnalysisConfig) -> Self {
        Self {
            metadata: ReportMetadata {
                analyzed_at: chrono::Utc::now().to_rfc3339(),
                source_file: source_file.display().to_string(),
                epoch_low: config.epoch_low,
                epoch_high: config.epoch_high,
            },
            experiment,
        }
    }

    /// Drop the bulky per-node series from the JSON output
    pub fn strip_per_node_series(&mut self) {
        for node in self.experiment.nodes.values_mut() {
            node.discovered_per_epoch.clear();
            node.new_discovered_per_epoch.clear();
        }
    }
}

/// Generate JSON report
pub fn generate_json_report(report: &ExperimentReport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Generate human-readable text report
pub fn generate_text_report(report: &ExperimentReport, output_path: &Path) -> Result<()> {
    let experiment = &report.experiment;
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(72));
    lines.push(format!(
        "            NEIGHBOR DISCOVERY ANALYSIS: {}",
        experiment.derived_name()
    ));
    lines.push("=".repeat(72));
    lines.push(String::new());

    lines.push(format!("Analysis Date: {}", report.metadata.analyzed_at));
    lines.push(format!("Source Log: {}", report.metadata.source_file));
    lines.push(format!("Log Source: {}", experiment.source));
    lines.push(format!(
        "Epoch Window: [{}, {})",
        report.metadata.epoch_low, report.metadata.epoch_high
    ));
    lines.push(String::new());

    if let Some(ref settings) = experiment.settings {
        lines.push(format!("Experiment Kind: {}", settings.kind));
        lines.push(format!(
            "Windows: {} tx / {} rx, durations {} / {}",
            settings.tx_window_count,
            settings.rx_window_count,
            settings.tx_window_duration,
            settings.rx_window_duration
        ));
        lines.push(format!(
            "Transmissions: {} per window, durations {} / {}",
            settings.tx_per_window, settings.tx_duration, settings.rx_duration
        ));
        lines.push(String::new());
    }

    lines.push(format!("Nodes Observed: {}", experiment.nodes.len()));
    lines.push(format!("Max Node Id: {}", experiment.max_node_id));
    lines.push(format!("Max Epoch: {}", experiment.max_epoch));
    lines.push(String::new());

    lines.push("Per-Node Discovery:".to_string());
    let denominator = experiment.max_node_id.saturating_sub(1);
    for node in experiment.nodes.values() {
        lines.push(format!(
            "  node {:>3}: {:>3}/{} neighbours, duty cycle {:.3}%",
            node.id, node.neighbour_count, denominator, node.duty_cycle
        ));
    }
    lines.push(String::new());

    if let Some(ref stats) = experiment.duty_cycle_stats {
        lines.push("Duty Cycle Statistics:".to_string());
        lines.push(format!("  Average: {:.3}%", stats.mean));
        lines.push(format!("  Std Dev: {:.3}", stats.std_dev));
        lines.push(format!("  Minimum: {:.3}%", stats.min));
        lines.push(format!("  Maximum: {:.3}%", stats.max));
        lines.push(String::new());
    }

    if let Some(ref aggregates) = experiment.aggregates {
        lines.push("Discovery Aggregates:".to_string());
        lines.push(format!(
            "  Overall mean discovered: {:.3}",
            aggregates.overall_mean_discovered
        ));
        lines.push(format!(
            "  Overall discovery fraction: {:.3}",
            aggregates.overall_discovery_fraction
        ));
        lines.push(String::new());
    }

    lines.push("=".repeat(72));

    let content = lines.join("\n");
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print per-node discovery counts and fractions to stdout
pub fn print_node_summary(experiment: &Experiment) {
    let denominator = experiment.max_node_id.saturating_sub(1);

    println!("\n=== NODE DISCOVERY ({}) ===\n", experiment.derived_name());
    let mut fraction_sum = 0.0;
    for node in experiment.nodes.values() {
        let fraction = if denominator > 0 {
            node.neighbour_count as f64 / denominator as f64
        } else {
            0.0
        };
        fraction_sum += fraction;
        println!(
            "node {:>3}: {:>3}/{} neighbours discovered ({:>5.1}%)  {:?}",
            node.id,
            node.neighbour_count,
            denominator,
            fraction * 100.0,
            node.neighbours
        );
    }
    if !experiment.nodes.is_empty() {
        println!(
            "\naverage discovery: {:.1}%",
            100.0 * fraction_sum / experiment.nodes.len() as f64
        );
    }
}

/// Print per-node duty cycles and the population statistics to stdout
pub fn print_energest_summary(experiment: &Experiment) {
    println!("\n----- Duty Cycle -----\n");
    for (node_id, totals) in &experiment.energest {
        if let Ok(dc) = totals.duty_cycle() {
            println!("Node {}:  Duty Cycle: {:.3}%", node_id, dc);
        }
    }

    if let Some(ref stats) = experiment.duty_cycle_stats {
        println!("\n----- Duty Cycle Overall Statistics -----\n");
        println!(
            "Average Duty Cycle: {:.3}%\nStandard Deviation: {:.3}\nMinimum: {:.3}%\nMaximum: {:.3}%\n",
            stats.mean, stats.std_dev, stats.min, stats.max
        );
    }
}

/// One experiment's aggregated series, clipped for cross-experiment plots
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSeries {
    pub name: String,
    pub duty_cycle_mean: f64,
    pub overall_discovery_fraction: f64,
    pub epochs: Vec<usize>,
    pub avg_discovered_per_epoch_norm: Vec<f64>,
    pub avg_new_discovered_per_epoch_norm: Vec<f64>,
}

/// Shortest aggregated window across the experiments
fn common_window(experiments: &[Experiment]) -> usize {
    experiments
        .iter()
        .filter_map(|e| e.aggregates.as_ref())
        .map(|a| a.epochs.len())
        .min()
        .unwrap_or(0)
}

/// Assemble the comparison series for a set of experiments, each clipped to
/// the shortest common epoch window so the plots line up.
pub fn comparison_series(experiments: &[Experiment]) -> Vec<ComparisonSeries> {
    let window = common_window(experiments);

    experiments
        .iter()
        .filter_map(|experiment| {
            let aggregates = experiment.aggregates.as_ref()?;
            Some(ComparisonSeries {
                name: aggregates.name.clone(),
                duty_cycle_mean: experiment
                    .duty_cycle_stats
                    .map(|s| s.mean)
                    .unwrap_or_default(),
                overall_discovery_fraction: aggregates.overall_discovery_fraction,
                epochs: aggregates.epochs.iter().take(window).copied().collect(),
                avg_discovered_per_epoch_norm: aggregates
                    .avg_discovered_per_epoch_norm
                    .iter()
                    .take(window)
                    .copied()
                    .collect(),
                avg_new_discovered_per_epoch_norm: aggregates
                    .avg_new_discovered_per_epoch_norm
                    .iter()
                    .take(window)
                    .copied()
                    .collect(),
            })
        })
        .collect()
}

/// Export the comparison series as JSON for the external plotting tool
pub fn export_comparison_series(experiments: &[Experiment], output_path: &Path) -> Result<()> {
    let series = comparison_series(experiments);
    let json = serde_json::to_string_pretty(&series)
        .context("Failed to serialize comparison series to JSON")?;

    fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write comparison series to {}",
            output_path.display()
        )
    })?;

    log::info!(
        "Comparison series for {} experiments written to {}",
        series.len(),
        output_path.display()
    );
    Ok(())
}

/// Save a copy of the raw input log under the experiment's derived name
pub fn save_log_copy(
    experiment: &Experiment,
    input_path: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dest = output_dir.join(format!("{}.log", experiment.derived_name()));
    fs::copy(input_path, &dest).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            input_path.display(),
            dest.display()
        )
    })?;

    log::info!("Saved log copy to {}", dest.display());
    Ok(dest)
}
