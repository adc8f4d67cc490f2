//! # nd-analyzer - Neighbor discovery experiment log analysis
//!
//! This library reconstructs, from raw experiment logs, how a population of
//! wireless nodes discovered its neighbors over a sequence of discrete
//! epochs and how much radio energy each node spent doing so.
//!
//! ## Overview
//!
//! Experiment logs come from two sources: the Cooja network simulator and a
//! physical firefly testbed. The source is detected from the log's own
//! contents, after which a single streaming pass classifies each line into
//! a settings, new-neighbor, epoch-end or energest event and folds it into
//! one experiment record. The record is then compacted to the configured
//! epoch window, energest counters are reduced into duty cycles, and the
//! experiment-level aggregates are derived for comparison across
//! configurations ("BURST" vs "SCATTER", at varying node counts).
//!
//! ## Architecture
//!
//! - `config`: the analysis window and per-epoch capacity, passed
//!   explicitly into the parse entry points
//! - `analysis::log_parser`: format detection, pattern registry and the
//!   streaming parser
//! - `analysis::types`: experiment, node and settings records
//! - `analysis::energest`: energest accumulation and duty cycle reduction
//! - `analysis::aggregate`: per-epoch means and normalized statistics
//! - `analysis::report`: JSON/text reports, console summaries and the
//!   comparison series export for plotting
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nd_analyzer::analysis::parse_log_file;
//! use nd_analyzer::config::AnalysisConfig;
//!
//! let config = AnalysisConfig::default();
//! let experiment = parse_log_file("cooja_BURST_30.log".as_ref(), &config)?;
//! println!("{}", experiment.derived_name());
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Malformed or unrecognized log lines are skipped silently; missing files,
//! empty node populations and nodes without usable energest samples fail
//! the run. Public entry points return `Result<T, color_eyre::eyre::Error>`
//! with context attached at every I/O boundary.

pub mod analysis;
pub mod config;
