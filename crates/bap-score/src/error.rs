use chrono::{DateTime, Utc};

/// Errors raised by the scoring engine.
///
/// Everything is detected eagerly, before any image is touched. A failed run
/// never leaves a partially scored collection behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("invalid month/day {month:02}-{day:02}{}", year_suffix(.year))]
    InvalidDate {
        year: Option<i32>,
        month: u32,
        day: u32,
    },

    #[error("malformed month/day \"{input}\", expected MM-DD")]
    MalformedMonthDay { input: String },

    #[error("unsupported distribution \"{name}\" (expected linear or gaussian)")]
    UnsupportedDistribution { name: String },

    #[error("gaussian stretch must be finite and > 0, got {stretch}")]
    InvalidStretch { stretch: f64 },

    #[error("per-year ratio must be finite and >= 0, got {ratio}")]
    InvalidRatio { ratio: f64 },

    #[error("output range must be finite with min < max, got [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    #[error("season starting {month_day} has an empty window in some years")]
    EmptySeason { month_day: String },

    #[error("image {index} has no \"{property}\" property")]
    MissingProperty { index: usize, property: String },

    #[error("image {index} property \"{property}\" is not a whole year: {value}")]
    InvalidProperty {
        index: usize,
        property: String,
        value: String,
    },

    #[error("image {index} acquired at {timestamp} falls outside every season window")]
    OutsideSeason {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("no images to score")]
    EmptyInput,

    #[error("scoring cancelled after {scored} of {total} images")]
    Cancelled { scored: usize, total: usize },
}

fn year_suffix(year: &Option<i32>) -> String {
    match year {
        Some(y) => format!(" in year {y}"),
        None => String::new(),
    }
}

/// Coarse classification of [`ScoreError`] for callers that surface
/// structured failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDate,
    UnsupportedDistribution,
    InvalidParameter,
    MissingProperty,
    OutsideSeason,
    EmptyInput,
    Cancelled,
}

impl ScoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::InvalidDate { .. }
            | ScoreError::MalformedMonthDay { .. }
            | ScoreError::EmptySeason { .. } => ErrorKind::InvalidDate,
            ScoreError::UnsupportedDistribution { .. } | ScoreError::InvalidStretch { .. } => {
                ErrorKind::UnsupportedDistribution
            }
            ScoreError::InvalidRatio { .. } | ScoreError::InvalidRange { .. } => {
                ErrorKind::InvalidParameter
            }
            ScoreError::MissingProperty { .. } | ScoreError::InvalidProperty { .. } => {
                ErrorKind::MissingProperty
            }
            ScoreError::OutsideSeason { .. } => ErrorKind::OutsideSeason,
            ScoreError::EmptyInput => ErrorKind::EmptyInput,
            ScoreError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Recoverable errors end a run early with the collection left unscored.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::EmptyInput
    }
}

pub type Result<T> = std::result::Result<T, ScoreError>;
