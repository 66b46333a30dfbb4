//! Distance → score transfer functions.
//!
//! Both variants map a non-negative temporal distance, normalised by a
//! positive scale `max_distance`, to a score in `[0, 1]`:
//!
//! ```text
//! linear:            s = max(0, 1 - d / m)
//! gaussian(stretch): s = exp(-ln2 · (stretch · d / m)²)
//! ```
//!
//! The gaussian is calibrated so that `s = 0.5` exactly at `d == m` with
//! `stretch == 1`; larger stretches narrow the peak.

use std::f64::consts::LN_2;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoreError};

pub const DEFAULT_STRETCH: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", try_from = "RawTransfer")]
pub enum TransferFunction {
    Linear,
    Gaussian { stretch: f64 },
}

/// Unvalidated wire form of [`TransferFunction`].
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawTransfer {
    Linear,
    #[serde(alias = "gauss", alias = "normal")]
    Gaussian {
        #[serde(default = "default_stretch")]
        stretch: f64,
    },
}

fn default_stretch() -> f64 {
    DEFAULT_STRETCH
}

impl TryFrom<RawTransfer> for TransferFunction {
    type Error = ScoreError;

    fn try_from(raw: RawTransfer) -> Result<Self> {
        match raw {
            RawTransfer::Linear => Ok(TransferFunction::Linear),
            RawTransfer::Gaussian { stretch } => TransferFunction::gaussian(stretch),
        }
    }
}

impl Default for TransferFunction {
    fn default() -> Self {
        TransferFunction::Gaussian { stretch: DEFAULT_STRETCH }
    }
}

impl TransferFunction {
    /// Gaussian with a validated stretch (finite, > 0).
    pub fn gaussian(stretch: f64) -> Result<Self> {
        if !(stretch.is_finite() && stretch > 0.0) {
            return Err(ScoreError::InvalidStretch { stretch });
        }
        Ok(TransferFunction::Gaussian { stretch })
    }

    /// Resolve a distribution name plus optional stretch.
    ///
    /// `stretch` only applies to the gaussian and is ignored for `linear`.
    pub fn from_name(name: &str, stretch: Option<f64>) -> Result<Self> {
        match name.parse()? {
            TransferFunction::Gaussian { .. } => {
                TransferFunction::gaussian(stretch.unwrap_or(DEFAULT_STRETCH))
            }
            linear => Ok(linear),
        }
    }

    /// Score a raw `distance` against the normalisation scale `max_distance`.
    ///
    /// A non-positive scale means every candidate is equally close to the
    /// anchor, so the score is 1.
    pub fn score(&self, distance: f64, max_distance: f64) -> f64 {
        if !(max_distance > 0.0) {
            return 1.0;
        }
        let d = distance.abs();
        match *self {
            TransferFunction::Linear => (1.0 - d / max_distance).clamp(0.0, 1.0),
            TransferFunction::Gaussian { stretch } => {
                let x = stretch * d / max_distance;
                // Keep the tail strictly positive where exp() would underflow.
                (-LN_2 * x * x).exp().max(f64::MIN_POSITIVE)
            }
        }
    }
}

impl FromStr for TransferFunction {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(TransferFunction::Linear),
            "gaussian" | "gauss" | "normal" => Ok(TransferFunction::default()),
            _ => Err(ScoreError::UnsupportedDistribution { name: s.to_string() }),
        }
    }
}

impl fmt::Display for TransferFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFunction::Linear => write!(f, "linear"),
            TransferFunction::Gaussian { stretch } => write!(f, "gaussian(stretch={stretch})"),
        }
    }
}

// ── Output range ─────────────────────────────────────────────────────────────

/// Linear rescale of a `[0, 1]` score into `[min, max]`, written `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct ScoreRange {
    min: f64,
    max: f64,
}

impl ScoreRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ScoreError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn adjust(&self, score: f64) -> f64 {
        self.min + score * (self.max - self.min)
    }
}

impl TryFrom<(f64, f64)> for ScoreRange {
    type Error = ScoreError;

    fn try_from((min, max): (f64, f64)) -> Result<Self> {
        ScoreRange::new(min, max)
    }
}

impl From<ScoreRange> for (f64, f64) {
    fn from(r: ScoreRange) -> Self {
        (r.min, r.max)
    }
}

/// Apply an optional output range.
pub(crate) fn rescale(score: f64, range: Option<&ScoreRange>) -> f64 {
    range.map_or(score, |r| r.adjust(score))
}
