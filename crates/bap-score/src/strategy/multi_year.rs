//! Multi-year score: prefer images whose season-year is close to a target
//! year.
//!
//! ```text
//! d     = |year(image) - target_year|
//! d_max = max |year - target_year| over the collection
//! score = transfer(d, d_max)         (1 for every image when d_max == 0)
//! ```
//!
//! With a per-year `year_ratio` the span is ignored and every year away from
//! the target costs a fixed amount: `score = max(0, 1 - d · ratio)`.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ScoreStrategy;
use crate::error::{Result, ScoreError};
use crate::image::{season_year_of, year_property, DatedImage};
use crate::season::Season;
use crate::transfer::{rescale, ScoreRange, TransferFunction};

/// Band written by [`MultiYearScore`]'s own configuration.
pub const MULTI_YEAR_BAND: &str = "score-multi";
/// Default band for per-call parameters.
pub const YEAR_SCORE_BAND: &str = "year_score";

/// Where an image's season-year comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearSource {
    /// A metadata property set by an upstream tagging step.
    Property(String),
    /// Derived from the acquisition timestamp through the season.
    Season,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiYearParams {
    pub target_year: i32,
    #[serde(default = "default_year_source")]
    pub year_source: YearSource,
    #[serde(default)]
    pub transfer: TransferFunction,
    #[serde(default = "default_band")]
    pub band_name: String,
    /// Fixed score lost per year of distance, replacing `transfer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_ratio: Option<f64>,
    /// Rescale the `[0, 1]` score into this range before writing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_out: Option<ScoreRange>,
}

fn default_year_source() -> YearSource {
    YearSource::Season
}

fn default_band() -> String {
    YEAR_SCORE_BAND.to_string()
}

impl MultiYearParams {
    /// Read years from `year_property`, writing to `year_score`.
    pub fn new(target_year: i32, year_property: &str, transfer: TransferFunction) -> Self {
        Self {
            target_year,
            year_source: YearSource::Property(year_property.to_string()),
            transfer,
            band_name: default_band(),
            year_ratio: None,
            range_out: None,
        }
    }

    pub fn with_band_name(mut self, band_name: &str) -> Self {
        self.band_name = band_name.to_string();
        self
    }

    /// Score `1 - d · ratio` per year of distance, clamped at 0.
    pub fn with_year_ratio(mut self, ratio: f64) -> Result<Self> {
        self.year_ratio = Some(validate_ratio(ratio)?);
        Ok(self)
    }

    pub fn with_range_out(mut self, range: ScoreRange) -> Self {
        self.range_out = Some(range);
        self
    }
}

fn validate_ratio(ratio: f64) -> Result<f64> {
    if !(ratio.is_finite() && ratio >= 0.0) {
        return Err(ScoreError::InvalidRatio { ratio });
    }
    Ok(ratio)
}

/// Year span reduction over the collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearPlan {
    pub min_year: i32,
    pub max_year: i32,
    pub max_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiYearScore {
    season: Season,
    params: MultiYearParams,
}

impl MultiYearScore {
    /// Season-derived years, gaussian transfer, `score-multi` band.
    pub fn new(season: Season, target_year: i32) -> Self {
        Self {
            season,
            params: MultiYearParams {
                target_year,
                year_source: YearSource::Season,
                transfer: TransferFunction::default(),
                band_name: MULTI_YEAR_BAND.to_string(),
                year_ratio: None,
                range_out: None,
            },
        }
    }

    pub fn with_params(season: Season, params: MultiYearParams) -> Self {
        Self { season, params }
    }

    pub fn season(&self) -> &Season {
        &self.season
    }

    pub fn params(&self) -> &MultiYearParams {
        &self.params
    }

    /// Score with per-call parameters. `self` is left unchanged.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn apply<I: DatedImage + Sync>(&self, images: Vec<I>, params: &MultiYearParams) -> Result<Vec<I>> {
        Self::with_params(self.season, params.clone()).map(images)
    }

    fn year_of<I: DatedImage>(&self, image: &I, index: usize) -> Result<i32> {
        match &self.params.year_source {
            YearSource::Property(name) => year_property(image, index, name),
            YearSource::Season => season_year_of(&self.season, image, index),
        }
    }

    fn distance(&self, year: i32) -> f64 {
        (i64::from(year) - i64::from(self.params.target_year)).abs() as f64
    }
}

impl ScoreStrategy for MultiYearScore {
    type Plan = YearPlan;

    fn band_name(&self) -> &str {
        &self.params.band_name
    }

    fn plan<I: DatedImage>(&self, images: &[I]) -> Result<YearPlan> {
        if let Some(ratio) = self.params.year_ratio {
            validate_ratio(ratio)?;
        }
        let mut span: Option<(i32, i32)> = None;
        for (i, image) in images.iter().enumerate() {
            let year = self.year_of(image, i)?;
            span = Some(match span {
                None => (year, year),
                Some((lo, hi)) => (lo.min(year), hi.max(year)),
            });
        }
        let (min_year, max_year) = span.ok_or(ScoreError::EmptyInput)?;
        let max_distance = self.distance(min_year).max(self.distance(max_year));
        debug!(
            target_year = self.params.target_year,
            min_year, max_year, max_distance, "year span"
        );
        Ok(YearPlan { min_year, max_year, max_distance })
    }

    fn score<I: DatedImage>(&self, plan: &YearPlan, image: &I, index: usize) -> Result<f64> {
        let d = self.distance(self.year_of(image, index)?);
        let score = match self.params.year_ratio {
            Some(ratio) => (1.0 - d * ratio).max(0.0),
            None => self.params.transfer.score(d, plan.max_distance),
        };
        Ok(rescale(score, self.params.range_out.as_ref()))
    }
}
