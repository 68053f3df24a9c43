use std::path::PathBuf;

use cogex_core::Color;
use thiserror::Error;

/// Fatal configuration problems, reported before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("low accuracy threshold {low} exceeds high threshold {high}")]
    ThresholdsInverted { low: f64, high: f64 },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: u64,
        value: u64,
    },

    #[error("duration floor {floor_ms} ms exceeds ceiling {ceiling_ms} ms")]
    DurationBoundsInverted { floor_ms: u64, ceiling_ms: u64 },

    #[error("level table must list levels 1..=5 in order, found {found:?}")]
    LevelTable { found: Vec<u8> },

    #[error("level {level} uses {colors} colors, expected 2..={max}")]
    LevelColors { level: u8, colors: usize, max: usize },

    #[error("initial level {0} is outside 1..=5")]
    InitialLevel(u8),

    #[error("practice difficulty level {0} is outside 1..=5")]
    PracticeLevel(u8),

    #[error("word {word} is not among the {colors} colors every level can answer")]
    WordOutsideColorSet { word: Color, colors: usize },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("recall match and no-match keys must differ, both are {0:?}")]
    DuplicateKeys(char),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
