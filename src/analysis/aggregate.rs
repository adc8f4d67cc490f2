//! Experiment-level statistics over the compacted node population.

use color_eyre::eyre::{ensure, Result};

use crate::config::AnalysisConfig;

use super::types::{Experiment, ExperimentAggregates};

/// Compute the derived aggregates for a compacted experiment.
///
/// Per-epoch means are taken across nodes; normalized variants divide by
/// `max_node_id - 1`, the maximum possible neighbor count for a fully
/// connected population (a population-size proxy, not a per-node exact
/// value). Runs on the compacted record, so every per-epoch series has
/// exactly the window length.
pub fn aggregate(experiment: &Experiment, config: &AnalysisConfig) -> Result<ExperimentAggregates> {
    ensure!(!experiment.nodes.is_empty(), "no nodes observed in the log");

    let window = config.window_len();
    let node_count = experiment.nodes.len() as f64;
    let norm_denominator = experiment.max_node_id as f64 - 1.0;

    let mut avg_discovered = vec![0.0; window];
    let mut avg_new = vec![0.0; window];
    for node in experiment.nodes.values() {
        for (slot, value) in avg_discovered.iter_mut().zip(&node.discovered_per_epoch) {
            *slot += *value as f64;
        }
        for (slot, value) in avg_new.iter_mut().zip(&node.new_discovered_per_epoch) {
            *slot += *value as f64;
        }
    }
    for slot in &mut avg_discovered {
        *slot /= node_count;
    }
    for slot in &mut avg_new {
        *slot /= node_count;
    }

    // Mean of the flattened (node, epoch) values; nodes all carry the same
    // window length, so this equals the mean of the per-epoch means.
    let overall_mean = avg_discovered.iter().sum::<f64>() / window as f64;

    Ok(ExperimentAggregates {
        name: experiment.derived_name(),
        epochs: (config.epoch_low..config.epoch_high).collect(),
        avg_discovered_per_epoch_norm: avg_discovered
            .iter()
            .map(|v| v / norm_denominator)
            .collect(),
        avg_new_discovered_per_epoch_norm: avg_new.iter().map(|v| v / norm_denominator).collect(),
        overall_mean_discovered: overall_mean,
        overall_discovery_fraction: overall_mean / norm_denominator,
        avg_discovered_per_epoch: avg_discovered,
        avg_new_discovered_per_epoch: avg_new,
    })
}
