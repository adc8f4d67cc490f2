//! Core data types for neighbor discovery experiment analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;

use super::energest::EnergestTotals;

/// Testbed wall-clock timestamp in seconds since the Unix epoch
pub type SimTime = f64;

/// Protocol participant identifier, 1-based and sparse
pub type NodeId = u32;

/// Where a log file originated from.
///
/// Decided once from the first line of the file and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSource {
    /// Cooja network simulator run
    Simulator,
    /// Physical firefly testbed run, with the job id reported by the
    /// testbed harness
    Testbed { job_id: u64 },
}

impl LogSource {
    /// Short prefix used in derived names and output filenames
    pub fn prefix(&self) -> &'static str {
        match self {
            LogSource::Simulator => "cooja",
            LogSource::Testbed { .. } => "testbed",
        }
    }
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::Simulator => write!(f, "cooja"),
            LogSource::Testbed { job_id } => write!(f, "testbed (job {})", job_id),
        }
    }
}

/// Protocol timing configuration from the one-time settings line.
///
/// Captured from the first settings line encountered; later settings lines
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSettings {
    /// Experiment kind, e.g. "BURST" or "SCATTER"
    pub kind: String,
    pub tx_window_count: u32,
    pub rx_window_count: u32,
    pub tx_window_duration: u32,
    pub rx_window_duration: u32,
    pub tx_per_window: u32,
    pub tx_duration: u32,
    pub rx_duration: u32,
}

/// One protocol participant and its per-epoch discovery record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Distinct neighbor ids in order of first discovery
    pub neighbours: Vec<NodeId>,
    /// Cumulative new-neighbor total from epoch-end summaries; recomputed
    /// from the neighbour set during compaction
    pub neighbour_count: u32,
    /// Radio duty cycle percentage, written by the energest reducer
    pub duty_cycle: f64,
    /// Total distinct neighbors known at the end of each epoch, as reported
    /// by the protocol's own epoch-end summary
    pub discovered_per_epoch: Vec<u32>,
    /// Brand-new neighbors reported in each epoch
    pub new_discovered_per_epoch: Vec<u32>,
}

impl Node {
    pub fn new(id: NodeId, epoch_capacity: usize) -> Self {
        Self {
            id,
            neighbours: Vec::new(),
            neighbour_count: 0,
            duty_cycle: 0.0,
            discovered_per_epoch: vec![0; epoch_capacity],
            new_discovered_per_epoch: vec![0; epoch_capacity],
        }
    }

    /// Record a newly discovered neighbor. Re-adding a known neighbor is a
    /// no-op.
    pub fn record_discovery(&mut self, neighbour: NodeId) {
        if !self.neighbours.contains(&neighbour) {
            self.neighbours.push(neighbour);
        }
    }

    fn clip_to_window(series: &mut Vec<u32>, low: usize, high: usize) {
        let window = high.saturating_sub(low);
        if low < series.len() {
            series.drain(..low);
        } else {
            series.clear();
        }
        series.truncate(window);
        // Epochs that were never observed stay zero
        series.resize(window, 0);
    }

    /// Truncate both per-epoch series to the analysis window `[low, high)`
    pub fn truncate_window(&mut self, low: usize, high: usize) {
        Self::clip_to_window(&mut self.discovered_per_epoch, low, high);
        Self::clip_to_window(&mut self.new_discovered_per_epoch, low, high);
    }
}

/// Derived experiment-level statistics, computed once after compaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentAggregates {
    /// Legend key: `<source>_<kind>_<max_node_id>`
    pub name: String,
    /// Epoch indices of the analysis window
    pub epochs: Vec<usize>,
    /// Mean discovery count across nodes, per epoch
    pub avg_discovered_per_epoch: Vec<f64>,
    /// Same, divided by the maximum possible neighbor count
    pub avg_discovered_per_epoch_norm: Vec<f64>,
    /// Mean new-discovery count across nodes, per epoch
    pub avg_new_discovered_per_epoch: Vec<f64>,
    pub avg_new_discovered_per_epoch_norm: Vec<f64>,
    /// Mean of all (node, epoch) discovery values flattened
    pub overall_mean_discovered: f64,
    /// Overall mean as a fraction of the maximum possible neighbor count
    pub overall_discovery_fraction: f64,
}

/// Duty cycle statistics across the sampled node population
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DutyCycleStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Everything reconstructed from one experiment log file.
///
/// Created empty, populated by exactly one pass over one file, compacted,
/// energest-reduced and aggregated, in that order. Re-parsing requires a
/// fresh instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub source: LogSource,
    pub settings: Option<ExperimentSettings>,
    /// Largest node id seen in a new-neighbor event
    pub max_node_id: NodeId,
    /// Largest epoch index seen in any discovery event, including epochs
    /// beyond the per-epoch capacity
    pub max_epoch: usize,
    /// Observed nodes, keyed and iterated in id order
    pub nodes: BTreeMap<NodeId, Node>,
    /// Accumulated energest counters per node id
    pub energest: BTreeMap<NodeId, EnergestTotals>,
    /// Written by the energest reducer
    pub duty_cycle_stats: Option<DutyCycleStats>,
    /// Written by the aggregator
    pub aggregates: Option<ExperimentAggregates>,
    epoch_capacity: usize,
}

impl Experiment {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            source: LogSource::Simulator,
            settings: None,
            max_node_id: 0,
            max_epoch: 0,
            nodes: BTreeMap::new(),
            energest: BTreeMap::new(),
            duty_cycle_stats: None,
            aggregates: None,
            epoch_capacity: config.epoch_capacity,
        }
    }

    fn node_entry(&mut self, id: NodeId) -> &mut Node {
        let capacity = self.epoch_capacity;
        self.nodes
            .entry(id)
            .or_insert_with(|| Node::new(id, capacity))
    }

    /// Apply a new-neighbor event for `node`
    pub fn record_new_neighbour(&mut self, node: NodeId, epoch: usize, neighbour: NodeId) {
        if node > self.max_node_id {
            self.max_node_id = node;
        }
        self.node_entry(node).record_discovery(neighbour);
        self.max_epoch = self.max_epoch.max(epoch);
    }

    /// Apply an epoch-end summary for `node`.
    ///
    /// A later summary for the same (node, epoch) pair overwrites the
    /// earlier one. Epoch indices at or beyond the per-epoch capacity only
    /// feed max-epoch tracking.
    pub fn record_epoch_end(&mut self, node: NodeId, epoch: usize, total: u32, new: u32) {
        self.max_epoch = self.max_epoch.max(epoch);
        if epoch >= self.epoch_capacity {
            log::debug!(
                "node {}: epoch {} beyond capacity {}, per-epoch write dropped",
                node,
                epoch,
                self.epoch_capacity
            );
            return;
        }
        let entry = self.node_entry(node);
        entry.neighbour_count += new;
        entry.discovered_per_epoch[epoch] = total;
        entry.new_discovered_per_epoch[epoch] = new;
    }

    /// Apply an energest sample for `node`
    pub fn record_energest_sample(
        &mut self,
        node: NodeId,
        counter: u32,
        cpu: u64,
        lpm: u64,
        tx: u64,
        rx: u64,
    ) {
        self.energest
            .entry(node)
            .or_default()
            .record(counter, cpu, lpm, tx, rx);
    }

    /// Post-parse compaction: recompute each node's neighbour count from
    /// its neighbour set and truncate every per-epoch series to the
    /// analysis window.
    pub fn compact(&mut self, config: &AnalysisConfig) {
        for node in self.nodes.values_mut() {
            node.neighbour_count = node.neighbours.len() as u32;
            node.truncate_window(config.epoch_low, config.epoch_high);
        }
    }

    /// Legend key derived from source, kind and population size
    pub fn derived_name(&self) -> String {
        let kind = self
            .settings
            .as_ref()
            .map(|s| s.kind.as_str())
            .unwrap_or("UNKNOWN");
        format!("{}_{}_{}", self.source.prefix(), kind, self.max_node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            epoch_low: 0,
            epoch_high: 10,
            epoch_capacity: 20,
        }
    }

    #[test]
    fn test_record_discovery_is_idempotent() {
        let mut node = Node::new(1, 20);
        node.record_discovery(4);
        node.record_discovery(7);
        node.record_discovery(4);
        assert_eq!(node.neighbours, vec![4, 7]);
    }

    #[test]
    fn test_epoch_end_last_write_wins() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.record_epoch_end(3, 2, 5, 2);
        exp.record_epoch_end(3, 2, 6, 3);
        let node = &exp.nodes[&3];
        assert_eq!(node.discovered_per_epoch[2], 6);
        assert_eq!(node.new_discovered_per_epoch[2], 3);
        // The cumulative tally keeps both contributions
        assert_eq!(node.neighbour_count, 5);
    }

    #[test]
    fn test_epoch_beyond_capacity_is_dropped_but_tracked() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.record_epoch_end(1, 50, 9, 9);
        assert_eq!(exp.max_epoch, 50);
        // The dropped write never creates a node record either
        assert!(!exp.nodes.contains_key(&1));

        exp.record_epoch_end(1, 3, 2, 2);
        let node = &exp.nodes[&1];
        assert_eq!(node.discovered_per_epoch[3], 2);
        assert_eq!(node.neighbour_count, 2);
    }

    #[test]
    fn test_max_node_id_follows_new_neighbour_events() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.record_new_neighbour(5, 0, 2);
        exp.record_new_neighbour(2, 0, 5);
        // Epoch-end summaries do not move the maximum
        exp.record_epoch_end(9, 0, 1, 1);
        assert_eq!(exp.max_node_id, 5);
    }

    #[test]
    fn test_compact_enforces_window_length() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.record_new_neighbour(1, 0, 2);
        exp.record_epoch_end(1, 0, 1, 1);
        exp.compact(&config);
        let node = &exp.nodes[&1];
        assert_eq!(node.discovered_per_epoch.len(), config.window_len());
        assert_eq!(node.new_discovered_per_epoch.len(), config.window_len());
    }

    #[test]
    fn test_compact_recomputes_neighbour_count() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.record_new_neighbour(1, 0, 2);
        exp.record_new_neighbour(1, 1, 2);
        // Duplicate new-neighbour reports inflate the cumulative tally
        exp.record_epoch_end(1, 0, 1, 1);
        exp.record_epoch_end(1, 1, 1, 1);
        assert_eq!(exp.nodes[&1].neighbour_count, 2);
        exp.compact(&config);
        assert_eq!(exp.nodes[&1].neighbour_count, 1);
    }

    #[test]
    fn test_window_offset_truncation() {
        let config = AnalysisConfig {
            epoch_low: 2,
            epoch_high: 5,
            epoch_capacity: 20,
        };
        let mut exp = Experiment::new(&config);
        exp.record_epoch_end(1, 2, 7, 1);
        exp.record_epoch_end(1, 4, 9, 1);
        exp.compact(&config);
        let node = &exp.nodes[&1];
        assert_eq!(node.discovered_per_epoch, vec![7, 0, 9]);
    }

    #[test]
    fn test_derived_name() {
        let config = test_config();
        let mut exp = Experiment::new(&config);
        exp.source = LogSource::Testbed { job_id: 8123 };
        exp.settings = Some(ExperimentSettings {
            kind: "BURST".to_string(),
            tx_window_count: 2,
            rx_window_count: 2,
            tx_window_duration: 10,
            rx_window_duration: 10,
            tx_per_window: 3,
            tx_duration: 5,
            rx_duration: 5,
        });
        exp.max_node_id = 7;
        assert_eq!(exp.derived_name(), "testbed_BURST_7");
    }
}
