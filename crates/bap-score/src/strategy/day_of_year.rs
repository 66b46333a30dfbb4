//! Day-of-year score: prefer images acquired close to a target date.
//!
//! Distances are whole calendar days between the UTC acquisition date and
//! the target date, measured in absolute time. Comparing absolute dates
//! instead of day-of-year numbers keeps images on either side of New Year
//! correctly close to a target inside a wrapping season. The normalisation
//! scale is half the length of the season window holding the target.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ScoreStrategy;
use crate::error::Result;
use crate::image::{season_year_of, DatedImage};
use crate::season::{midnight, Season};
use crate::transfer::{rescale, ScoreRange, TransferFunction};

/// Band written by [`DayOfYearScore`]'s own configuration.
pub const DOY_BAND: &str = "score-doy";
/// Default band for per-call parameters.
pub const DOY_SCORE_BAND: &str = "doy_score";

/// What each image is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoyAnchor {
    /// One fixed date for the whole collection.
    Date(NaiveDate),
    /// The season's target day in each image's own season-year.
    Season,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfYearParams {
    pub anchor: DoyAnchor,
    #[serde(default)]
    pub transfer: TransferFunction,
    #[serde(default = "default_band")]
    pub band_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_out: Option<ScoreRange>,
}

fn default_band() -> String {
    DOY_SCORE_BAND.to_string()
}

impl DayOfYearParams {
    /// Fixed target date, writing to `doy_score`.
    pub fn new(target_date: NaiveDate, transfer: TransferFunction) -> Self {
        Self {
            anchor: DoyAnchor::Date(target_date),
            transfer,
            band_name: default_band(),
            range_out: None,
        }
    }

    pub fn with_band_name(mut self, band_name: &str) -> Self {
        self.band_name = band_name.to_string();
        self
    }

    pub fn with_range_out(mut self, range: ScoreRange) -> Self {
        self.range_out = Some(range);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoyPlan {
    Fixed { target: NaiveDate, max_distance: f64 },
    PerSeasonYear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfYearScore {
    season: Season,
    params: DayOfYearParams,
}

impl DayOfYearScore {
    /// Per-image season targets, gaussian transfer, `score-doy` band.
    pub fn new(season: Season) -> Self {
        Self {
            season,
            params: DayOfYearParams {
                anchor: DoyAnchor::Season,
                transfer: TransferFunction::default(),
                band_name: DOY_BAND.to_string(),
                range_out: None,
            },
        }
    }

    pub fn with_params(season: Season, params: DayOfYearParams) -> Self {
        Self { season, params }
    }

    pub fn season(&self) -> &Season {
        &self.season
    }

    pub fn params(&self) -> &DayOfYearParams {
        &self.params
    }

    /// Score with per-call parameters. `self` is left unchanged.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn apply<I: DatedImage + Sync>(&self, images: Vec<I>, params: &DayOfYearParams) -> Result<Vec<I>> {
        Self::with_params(self.season, params.clone()).map(images)
    }

    /// Half the length, in days, of the `season_year` window.
    pub fn max_distance(&self, season_year: i32) -> Result<f64> {
        Ok(self.season.resolve(season_year)?.length_days() as f64 / 2.0)
    }

    /// Season-year used to normalise a fixed target date. Targets outside
    /// every window fall back to the window ending in their calendar year.
    fn season_year_for(&self, date: NaiveDate) -> i32 {
        self.season.season_year(midnight(date)).unwrap_or(date.year())
    }
}

fn day_distance(ts: DateTime<Utc>, target: NaiveDate) -> f64 {
    (ts.date_naive() - target).num_days().abs() as f64
}

impl ScoreStrategy for DayOfYearScore {
    type Plan = DoyPlan;

    fn band_name(&self) -> &str {
        &self.params.band_name
    }

    fn plan<I: DatedImage>(&self, _images: &[I]) -> Result<DoyPlan> {
        match self.params.anchor {
            DoyAnchor::Date(target) => {
                let season_year = self.season_year_for(target);
                let max_distance = self.max_distance(season_year)?;
                debug!(anchor = %target, season_year, max_distance, "fixed day-of-year anchor");
                Ok(DoyPlan::Fixed { target, max_distance })
            }
            DoyAnchor::Season => Ok(DoyPlan::PerSeasonYear),
        }
    }

    fn score<I: DatedImage>(&self, plan: &DoyPlan, image: &I, index: usize) -> Result<f64> {
        let (target, max_distance) = match *plan {
            DoyPlan::Fixed { target, max_distance } => (target, max_distance),
            DoyPlan::PerSeasonYear => {
                let season_year = season_year_of(&self.season, image, index)?;
                (self.season.target_date(season_year)?, self.max_distance(season_year)?)
            }
        };
        let score = self.params.transfer.score(day_distance(image.timestamp(), target), max_distance);
        Ok(rescale(score, self.params.range_out.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use crate::image::SceneImage;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shot(id: &str, y: i32, m: u32, d: u32, hour: u32) -> SceneImage {
        SceneImage::new(id, Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap())
    }

    fn south() -> DayOfYearScore {
        DayOfYearScore::new(Season::parse("11-15", "02-15").unwrap())
    }

    #[test]
    fn fixed_target_plan_uses_half_the_season() {
        let s = DayOfYearScore::with_params(
            Season::parse("11-15", "02-15").unwrap(),
            DayOfYearParams::new(date(2018, 1, 15), TransferFunction::Linear),
        );
        let plan = s.plan::<SceneImage>(&[]).unwrap();
        assert_eq!(plan, DoyPlan::Fixed { target: date(2018, 1, 15), max_distance: 46.0 });
    }

    #[test]
    fn linear_scores_across_new_year() {
        let params = DayOfYearParams::new(date(2018, 1, 15), TransferFunction::Linear);
        let images = vec![
            shot("target", 2018, 1, 15, 10),
            shot("early", 2017, 11, 19, 10),
            shot("late", 2018, 2, 14, 10),
            shot("new-year", 2017, 12, 31, 10),
        ];
        let out = south().apply(images, &params).unwrap();
        let score = |i: usize| out[i].band(DOY_SCORE_BAND).unwrap();
        assert_eq!(score(0), 1.0);
        assert_eq!(score(1), 0.0);
        assert_abs_diff_eq!(score(2), 1.0 - 30.0 / 46.0, epsilon = 1e-12);
        assert_abs_diff_eq!(score(3), 1.0 - 15.0 / 46.0, epsilon = 1e-12);
    }

    #[test]
    fn same_day_captures_tie() {
        let params = DayOfYearParams::new(date(2018, 1, 15), TransferFunction::default());
        let out = south()
            .apply(vec![shot("am", 2018, 1, 20, 1), shot("pm", 2018, 1, 20, 23)], &params)
            .unwrap();
        assert_eq!(out[0].band(DOY_SCORE_BAND), out[1].band(DOY_SCORE_BAND));
    }

    #[test]
    fn map_targets_each_season_year() {
        let s = DayOfYearScore::new(Season::growing_south());
        let out = s
            .map(vec![shot("a", 2018, 1, 15, 12), shot("b", 2017, 1, 15, 12), shot("c", 2016, 12, 15, 12)])
            .unwrap();
        assert_eq!(out[0].band(DOY_BAND), Some(1.0));
        assert_eq!(out[1].band(DOY_BAND), Some(1.0));
        // 31 days before the 2017-01-15 target, season length 92.
        let expected = (-std::f64::consts::LN_2 * (31.0f64 / 46.0).powi(2)).exp();
        assert_abs_diff_eq!(out[2].band(DOY_BAND).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn map_rejects_out_of_season_images() {
        let err = DayOfYearScore::new(Season::growing_south())
            .map(vec![shot("a", 2018, 1, 15, 12), shot("winter", 2018, 7, 1, 12)])
            .unwrap_err();
        assert!(matches!(err, ScoreError::OutsideSeason { index: 1, .. }));
    }

    #[test]
    fn target_outside_season_still_normalises() {
        let s = south();
        assert_eq!(s.season_year_for(date(2018, 6, 1)), 2018);
        assert_eq!(s.season_year_for(date(2017, 12, 1)), 2018);
    }

    #[test]
    fn range_out_rescales_day_scores() {
        let params = DayOfYearParams::new(date(2018, 1, 15), TransferFunction::Linear)
            .with_range_out(ScoreRange::new(-1.0, 1.0).unwrap());
        let out = south()
            .apply(vec![shot("target", 2018, 1, 15, 10), shot("early", 2017, 11, 19, 10)], &params)
            .unwrap();
        assert_eq!(out[0].band(DOY_SCORE_BAND), Some(1.0));
        assert_eq!(out[1].band(DOY_SCORE_BAND), Some(-1.0));

        let p: DayOfYearParams =
            serde_json::from_str(r#"{"anchor":"season","range_out":[0,100]}"#).unwrap();
        assert_eq!(p.range_out, Some(ScoreRange::new(0.0, 100.0).unwrap()));
        assert!(serde_json::from_str::<DayOfYearParams>(r#"{"anchor":"season","range_out":[1,0]}"#).is_err());
    }

    #[test]
    fn params_deserialize() {
        let p: DayOfYearParams =
            serde_json::from_str(r#"{"anchor":{"date":"2018-01-15"},"transfer":{"kind":"linear"}}"#).unwrap();
        assert_eq!(p, DayOfYearParams::new(date(2018, 1, 15), TransferFunction::Linear));
        let p: DayOfYearParams = serde_json::from_str(r#"{"anchor":"season"}"#).unwrap();
        assert_eq!(p.anchor, DoyAnchor::Season);
        assert_eq!(p.band_name, DOY_SCORE_BAND);
    }
}
