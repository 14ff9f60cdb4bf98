//! Structured error types for configuration validation and step-time invariants.
//!
//! A plain enum implementing `Display` and `std::error::Error` by hand, no
//! `thiserror` macro. Construction-time failures are fatal and reported as
//! [`ConfigError`]; the rare "should be unreachable" invariant violations
//! surface as [`StepError`] instead of panicking so a caller embedding this
//! crate in a larger harness can handle them.

use std::fmt;

/// Fatal, construction-time validation failure.
///
/// Covers non-unique ids, adjacency matrix shape mismatch, bin/delay/window
/// bounds, MAC-specific dimension mismatches, and an unrecognized MAC name.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Ids within the comms set, or within the disruptor set, are not unique.
    DuplicateId { population: &'static str },
    /// `adj_matrix` is not square with side `expected`.
    AdjMatrixShapeMismatch {
        expected: usize,
        got_rows: usize,
        got_cols: usize,
    },
    /// `num_frequency_bins < 1`.
    InvalidFrequencyBins(usize),
    /// `disruptor_delay < 1`.
    InvalidDisruptorDelay(usize),
    /// `sliding_window < 0.0`.
    NegativeSlidingWindow(f64),
    /// TDMA requires exactly one frequency bin.
    TdmaRequiresSingleBin { num_bins: usize },
    /// FDMA requires at least as many bins as platforms.
    FdmaRequiresEnoughBins { num_bins: usize, num_platforms: usize },
    /// A MAC name did not resolve to `rr`, `tdma`, or `fdma`.
    UnknownMac(String),
    /// `steps_per_epoch < 1`.
    InvalidStepsPerEpoch(u64),
    /// A platform's tx/rx queue capacity was `< 1`.
    InvalidQueueCapacity(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateId { population } => {
                write!(f, "{population} platform ids are not unique")
            }
            ConfigError::AdjMatrixShapeMismatch { expected, got_rows, got_cols } => write!(
                f,
                "adjacency matrix must be {expected}x{expected}, got {got_rows}x{got_cols}"
            ),
            ConfigError::InvalidFrequencyBins(n) => {
                write!(f, "num_frequency_bins must be >= 1, got {n}")
            }
            ConfigError::InvalidDisruptorDelay(n) => {
                write!(f, "disruptor_delay must be >= 1, got {n}")
            }
            ConfigError::NegativeSlidingWindow(w) => {
                write!(f, "sliding_window must be >= 0.0, got {w}")
            }
            ConfigError::TdmaRequiresSingleBin { num_bins } => {
                write!(f, "TDMA requires exactly 1 frequency bin, got {num_bins}")
            }
            ConfigError::FdmaRequiresEnoughBins { num_bins, num_platforms } => write!(
                f,
                "FDMA requires num_frequency_bins ({num_bins}) >= num_platforms ({num_platforms})"
            ),
            ConfigError::UnknownMac(name) => write!(f, "unrecognized medium access method: {name}"),
            ConfigError::InvalidStepsPerEpoch(n) => {
                write!(f, "steps_per_epoch must be >= 1, got {n}")
            }
            ConfigError::InvalidQueueCapacity(n) => {
                write!(f, "queue capacity must be >= 1, got {n}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A runtime condition that should be unreachable if the engine is correct:
/// the delay queue not full after enqueue, or more tokens requested than
/// remaining. Call sites also assert these with `debug_assert!` so a debug
/// build panics immediately at the point of the bug rather than here.
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    InvariantViolation(String),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for StepError {}
