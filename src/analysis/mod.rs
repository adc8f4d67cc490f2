//! Neighbor discovery experiment analysis.
//!
//! This module reconstructs per-node discovery and energy state from raw
//! experiment logs and derives the experiment-level statistics used for
//! cross-configuration comparison.

pub mod aggregate;
pub mod energest;
pub mod log_parser;
pub mod report;
pub mod types;

pub use types::*;
pub use log_parser::{parse_all_logs, parse_log_file};
pub use energest::EnergestTotals;
pub use report::{export_comparison_series, generate_json_report, generate_text_report};
