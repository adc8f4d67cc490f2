//! Log ingestion for neighbor discovery experiment runs.
//!
//! Detects whether a log came from the Cooja simulator or the firefly
//! testbed, then streams it once through a tagged-event decoder that feeds
//! a single mutable experiment record.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;
use regex::{Captures, Regex};

use crate::config::AnalysisConfig;

use super::aggregate;
use super::energest;
use super::types::*;

/// How the timestamp field of energest lines is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimestampFormat {
    /// Simulator logs carry an opaque tick/ordinal field
    Opaque,
    /// Testbed logs carry a bracketed wall-clock timestamp
    WallClock,
}

/// Compiled regex patterns for one log grammar
pub struct LogPatterns {
    /// Match: "<ts> ID:<id> START: <kind>, <w1>, ..., <w7>"
    pub settings: Regex,
    /// Match: "<ts> ID:<id> App: Epoch <e> New NBR <nid>"
    pub new_neighbour: Regex,
    /// Match: "<ts> ID:<id> App: Epoch <e> finished Num NBR <a> Num new NBR <b>"
    pub epoch_end: Regex,
    /// Match: "<ts> ID:<id> Energest: <cnt> <cpu> <lpm> <tx> <rx>"
    pub energest: Regex,
    timestamp_format: TimestampFormat,
}

impl LogPatterns {
    /// Pattern set for Cooja simulator logs
    pub fn simulator() -> Self {
        Self {
            settings: Regex::new(
                r"\d+\s+ID:(\d+)\s+START:\s+(\w+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+)",
            )
            .expect("Invalid simulator settings regex"),
            new_neighbour: Regex::new(r"\d+\s+ID:(\d+)\s+App:\s+Epoch\s+(\d+)\s+New\s+NBR\s+(\d+)")
                .expect("Invalid simulator new_neighbour regex"),
            epoch_end: Regex::new(
                r"\d+\s+ID:(\d+)\s+App:\s+Epoch\s+(\d+)\s+finished\s+Num\s+NBR\s+(\d+)\s+Num\s+new\s+NBR\s+(\d+)",
            )
            .expect("Invalid simulator epoch_end regex"),
            energest: Regex::new(
                r"(?P<time>[\w:.]+)\s+ID:(?P<id>\d+)\s+Energest:\s+(?P<cnt>\d+)\s+(?P<cpu>\d+)\s+(?P<lpm>\d+)\s+(?P<tx>\d+)\s+(?P<rx>\d+)",
            )
            .expect("Invalid simulator energest regex"),
            timestamp_format: TimestampFormat::Opaque,
        }
    }

    /// Pattern set for firefly testbed logs
    pub fn testbed() -> Self {
        Self {
            settings: Regex::new(
                r"INFO:firefly\.(\d+):\s+\d+\.firefly\s+<\s+b'START:\s+(\w+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+),\s+(\d+)",
            )
            .expect("Invalid testbed settings regex"),
            new_neighbour: Regex::new(
                r"INFO:firefly\.(\d+):\s+\d+\.firefly\s+<\s+b'App:\s+Epoch\s+(\d+)\s+New\s+NBR\s+(\d+)",
            )
            .expect("Invalid testbed new_neighbour regex"),
            epoch_end: Regex::new(
                r"INFO:firefly\.(\d+):\s+\d+\.firefly\s+<\s+b'App:\s+Epoch\s+(\d+)\s+finished\s+Num\s+NBR\s+(\d+)\s+Num\s+new\s+NBR\s+(\d+)",
            )
            .expect("Invalid testbed epoch_end regex"),
            energest: Regex::new(
                r"\[(?P<time>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d+)\]\s+INFO:firefly\.(?P<id>\d+):\s+\d+\.firefly\s+<\s+b'Energest:\s+(?P<cnt>\d+)\s+(?P<cpu>\d+)\s+(?P<lpm>\d+)\s+(?P<tx>\d+)\s+(?P<rx>\d+)'",
            )
            .expect("Invalid testbed energest regex"),
            timestamp_format: TimestampFormat::WallClock,
        }
    }
}

/// Global pattern set instances
pub static SIMULATOR_PATTERNS: LazyLock<LogPatterns> = LazyLock::new(LogPatterns::simulator);
pub static TESTBED_PATTERNS: LazyLock<LogPatterns> = LazyLock::new(LogPatterns::testbed);

/// Match: "INFO:testbed-run: Start test <job_id>"
static TESTBED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO:testbed-run:\s+Start\s+test\s+(\d+)").expect("Invalid testbed marker regex")
});

/// Timestamp attached to an energest sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleTime {
    /// Opaque simulator tick/ordinal field, kept verbatim
    Raw(String),
    /// Testbed wall clock converted to seconds since the Unix epoch
    Wall(SimTime),
}

/// One log line classified into a protocol event.
///
/// Classification is first-match-wins in the order settings, new-neighbor,
/// epoch-end, energest; anything else is unrecognized and ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Settings(ExperimentSettings),
    NewNeighbour {
        node: NodeId,
        epoch: usize,
        neighbour: NodeId,
    },
    EpochEnd {
        node: NodeId,
        epoch: usize,
        total: u32,
        new: u32,
    },
    EnergySample {
        node: NodeId,
        timestamp: SampleTime,
        counter: u32,
        cpu: u64,
        lpm: u64,
        tx: u64,
        rx: u64,
    },
    Unrecognized,
}

fn capture<T: std::str::FromStr + Default>(caps: &Captures<'_>, index: usize) -> T {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_default()
}

fn named<T: std::str::FromStr + Default>(caps: &Captures<'_>, name: &str) -> T {
    caps.name(name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_default()
}

/// Parse a testbed wall-clock timestamp into epoch seconds.
/// Format: "2024-03-08 14:22:05,123" (comma-separated subsecond digits)
pub fn parse_wall_timestamp(s: &str) -> Option<SimTime> {
    let (datetime, fraction) = s.split_once(',')?;
    let dt = chrono::NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S").ok()?;
    let subsec: f64 = fraction.parse::<u64>().ok()? as f64 / 10f64.powi(fraction.len() as i32);
    Some(dt.and_utc().timestamp() as f64 + subsec)
}

/// Classify a single log line against the active pattern set
pub fn decode_line(patterns: &LogPatterns, line: &str) -> LogEvent {
    if let Some(caps) = patterns.settings.captures(line) {
        return LogEvent::Settings(ExperimentSettings {
            kind: caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            tx_window_count: capture(&caps, 3),
            rx_window_count: capture(&caps, 4),
            tx_window_duration: capture(&caps, 5),
            rx_window_duration: capture(&caps, 6),
            tx_per_window: capture(&caps, 7),
            tx_duration: capture(&caps, 8),
            rx_duration: capture(&caps, 9),
        });
    }

    if let Some(caps) = patterns.new_neighbour.captures(line) {
        return LogEvent::NewNeighbour {
            node: capture(&caps, 1),
            epoch: capture(&caps, 2),
            neighbour: capture(&caps, 3),
        };
    }

    if let Some(caps) = patterns.epoch_end.captures(line) {
        return LogEvent::EpochEnd {
            node: capture(&caps, 1),
            epoch: capture(&caps, 2),
            total: capture(&caps, 3),
            new: capture(&caps, 4),
        };
    }

    if let Some(caps) = patterns.energest.captures(line) {
        let raw_time = caps.name("time").map(|m| m.as_str()).unwrap_or("");
        let timestamp = match patterns.timestamp_format {
            TimestampFormat::Opaque => SampleTime::Raw(raw_time.to_string()),
            TimestampFormat::WallClock => parse_wall_timestamp(raw_time)
                .map(SampleTime::Wall)
                .unwrap_or_else(|| SampleTime::Raw(raw_time.to_string())),
        };
        return LogEvent::EnergySample {
            node: named(&caps, "id"),
            timestamp,
            counter: named(&caps, "cnt"),
            cpu: named(&caps, "cpu"),
            lpm: named(&caps, "lpm"),
            tx: named(&caps, "tx"),
            rx: named(&caps, "rx"),
        };
    }

    LogEvent::Unrecognized
}

/// Parse one experiment log file through the full pipeline: stream the
/// lines into an experiment record, compact it to the analysis window,
/// reduce energest counters and compute the derived aggregates.
pub fn parse_log_file(path: &Path, config: &AnalysisConfig) -> Result<Experiment> {
    config.validate()?;

    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    let mut experiment = Experiment::new(config);
    let mut patterns: &LogPatterns = &SIMULATOR_PATTERNS;
    let mut first_line = true;

    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(_) => continue, // Skip unreadable lines
        };

        // The source decision is made on the first line only and is
        // irreversible for the rest of the file.
        if first_line {
            first_line = false;
            if let Some(caps) = TESTBED_MARKER.captures(&line) {
                let job_id: u64 = capture(&caps, 1);
                experiment.source = LogSource::Testbed { job_id };
                patterns = &TESTBED_PATTERNS;
                log::debug!("testbed marker found, job id {}", job_id);
                continue;
            }
        }

        match decode_line(patterns, &line) {
            LogEvent::Settings(settings) => {
                // Only the first settings line counts
                if experiment.settings.is_none() {
                    experiment.settings = Some(settings);
                }
            }
            LogEvent::NewNeighbour {
                node,
                epoch,
                neighbour,
            } => {
                experiment.record_new_neighbour(node, epoch, neighbour);
            }
            LogEvent::EpochEnd {
                node,
                epoch,
                total,
                new,
            } => {
                experiment.record_epoch_end(node, epoch, total, new);
            }
            LogEvent::EnergySample {
                node,
                timestamp,
                counter,
                cpu,
                lpm,
                tx,
                rx,
            } => {
                log::trace!("node {} energest sample {} at {:?}", node, counter, timestamp);
                experiment.record_energest_sample(node, counter, cpu, lpm, tx, rx);
            }
            LogEvent::Unrecognized => {}
        }
    }

    experiment.compact(config);

    let stats = energest::reduce(&mut experiment)
        .with_context(|| format!("Energest reduction failed for {}", path.display()))?;
    experiment.duty_cycle_stats = Some(stats);

    let aggregates = aggregate::aggregate(&experiment, config)
        .with_context(|| format!("Aggregation failed for {}", path.display()))?;
    experiment.aggregates = Some(aggregates);

    log::info!(
        "Parsed {}: {} nodes, max epoch {}, source {}",
        path.display(),
        experiment.nodes.len(),
        experiment.max_epoch,
        experiment.source
    );

    Ok(experiment)
}

/// Parse several experiment logs in parallel.
///
/// Experiments own disjoint state, so files are processed independently; a
/// failure in any file fails the whole batch.
pub fn parse_all_logs(paths: &[PathBuf], config: &AnalysisConfig) -> Result<Vec<Experiment>> {
    log::info!("Parsing {} experiment logs in parallel...", paths.len());
    paths
        .par_iter()
        .map(|path| parse_log_file(path, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_settings_regex() {
        let line = "2543 ID:1 START: BURST, 2, 2, 10, 10, 3, 5, 5";
        let caps = SIMULATOR_PATTERNS.settings.captures(line);
        assert!(caps.is_some());
        let caps = caps.unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "1");
        assert_eq!(caps.get(2).unwrap().as_str(), "BURST");
        assert_eq!(caps.get(9).unwrap().as_str(), "5");
    }

    #[test]
    fn test_simulator_new_neighbour_regex() {
        let line = "60213 ID:4 App: Epoch 12 New NBR 9";
        let caps = SIMULATOR_PATTERNS.new_neighbour.captures(line).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "4");
        assert_eq!(caps.get(2).unwrap().as_str(), "12");
        assert_eq!(caps.get(3).unwrap().as_str(), "9");
    }

    #[test]
    fn test_simulator_epoch_end_regex() {
        let line = "61000 ID:4 App: Epoch 12 finished Num NBR 7 Num new NBR 2";
        let caps = SIMULATOR_PATTERNS.epoch_end.captures(line).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "4");
        assert_eq!(caps.get(2).unwrap().as_str(), "12");
        assert_eq!(caps.get(3).unwrap().as_str(), "7");
        assert_eq!(caps.get(4).unwrap().as_str(), "2");
    }

    #[test]
    fn test_simulator_energest_regex() {
        let line = "00:01.234 ID:3 Energest: 2 120 880 14 21";
        let caps = SIMULATOR_PATTERNS.energest.captures(line).unwrap();
        assert_eq!(caps.name("time").unwrap().as_str(), "00:01.234");
        assert_eq!(caps.name("id").unwrap().as_str(), "3");
        assert_eq!(caps.name("cnt").unwrap().as_str(), "2");
        assert_eq!(caps.name("rx").unwrap().as_str(), "21");
    }

    #[test]
    fn test_testbed_marker_regex() {
        let line = "INFO:testbed-run: Start test 8123";
        let caps = TESTBED_MARKER.captures(line).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "8123");
    }

    #[test]
    fn test_testbed_event_regexes() {
        let settings = "INFO:firefly.2: 2.firefly < b'START: SCATTER, 2, 2, 10, 10, 3, 5, 5'";
        assert!(TESTBED_PATTERNS.settings.is_match(settings));

        let new_nbr = "INFO:firefly.2: 2.firefly < b'App: Epoch 3 New NBR 6'";
        let caps = TESTBED_PATTERNS.new_neighbour.captures(new_nbr).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "2");
        assert_eq!(caps.get(2).unwrap().as_str(), "3");
        assert_eq!(caps.get(3).unwrap().as_str(), "6");

        let epoch_end = "INFO:firefly.2: 2.firefly < b'App: Epoch 3 finished Num NBR 4 Num new NBR 1'";
        assert!(TESTBED_PATTERNS.epoch_end.is_match(epoch_end));

        let energest = "[2024-03-08 14:22:05,123] INFO:firefly.2: 2.firefly < b'Energest: 4 120 880 14 21'";
        let caps = TESTBED_PATTERNS.energest.captures(energest).unwrap();
        assert_eq!(caps.name("time").unwrap().as_str(), "2024-03-08 14:22:05,123");
        assert_eq!(caps.name("id").unwrap().as_str(), "2");
        assert_eq!(caps.name("cpu").unwrap().as_str(), "120");
    }

    #[test]
    fn test_parse_wall_timestamp() {
        let ts = parse_wall_timestamp("2024-03-08 14:22:05,123").unwrap();
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 8)
            .unwrap()
            .and_hms_milli_opt(14, 22, 5, 123)
            .unwrap()
            .and_utc()
            .timestamp_millis() as f64
            / 1000.0;
        assert!((ts - expected).abs() < 1e-9);

        // Six subsecond digits are microseconds
        let ts = parse_wall_timestamp("2024-03-08 14:22:05,123456").unwrap();
        assert!((ts - (expected + 0.000456)).abs() < 1e-9);
    }

    #[test]
    fn test_decode_line_classification() {
        let patterns = &*SIMULATOR_PATTERNS;

        let event = decode_line(patterns, "100 ID:1 START: BURST, 2, 2, 10, 10, 3, 5, 5");
        match event {
            LogEvent::Settings(settings) => {
                assert_eq!(settings.kind, "BURST");
                assert_eq!(settings.tx_window_count, 2);
                assert_eq!(settings.rx_duration, 5);
            }
            other => panic!("expected settings event, got {:?}", other),
        }

        assert_eq!(
            decode_line(patterns, "200 ID:1 App: Epoch 0 New NBR 2"),
            LogEvent::NewNeighbour {
                node: 1,
                epoch: 0,
                neighbour: 2
            }
        );

        assert_eq!(
            decode_line(patterns, "300 ID:1 App: Epoch 0 finished Num NBR 1 Num new NBR 1"),
            LogEvent::EpochEnd {
                node: 1,
                epoch: 0,
                total: 1,
                new: 1
            }
        );

        assert_eq!(
            decode_line(patterns, "completely unrelated output"),
            LogEvent::Unrecognized
        );
    }

    #[test]
    fn test_testbed_patterns_reject_simulator_lines() {
        let patterns = &*TESTBED_PATTERNS;
        assert_eq!(
            decode_line(patterns, "200 ID:1 App: Epoch 0 New NBR 2"),
            LogEvent::Unrecognized
        );
    }
}
