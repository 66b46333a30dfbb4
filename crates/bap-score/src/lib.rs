//! Temporal scoring engine for dated image collections.
//!
//! Each image receives one scene-constant score in `[0, 1]` expressing how
//! desirable its acquisition date is relative to a target year or a target
//! day of the season. Scores are attached as scalar bands and combined with
//! other quality scores further down a compositing pipeline.
//!
//! Pipeline:
//!   [`Season`] → [`ScoreStrategy::plan`] (one reduction) →
//!   [`ScoreStrategy::score`] per image → band written on every image.

pub mod error;
pub mod image;
pub mod season;
pub mod strategy;
pub mod transfer;

pub use error::{ErrorKind, Result, ScoreError};
pub use image::{tag_season_year, DatedImage, ImageSource, PropertyValue, SceneImage};
pub use season::{MonthDay, Season, SeasonWindow};
pub use strategy::{
    run, CancelToken, DayOfYearParams, DayOfYearScore, DoyAnchor, MultiYearParams,
    MultiYearScore, RunOptions, ScoreStrategy, YearSource,
};
pub use transfer::{ScoreRange, TransferFunction};
