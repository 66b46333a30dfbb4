//! Score strategies and the driver that runs them over a collection.
//!
//! Every strategy is evaluated in two passes:
//!   1. `plan`: one reduction over the full collection (e.g. the year span).
//!   2. `score`: an independent, pure per-image map, batched so a caller's
//!      cancellation is observed between batches.
//!
//! Scores are only written once every image has been scored, so an error
//! or a cancellation never leaves a partially scored collection.

pub mod day_of_year;
pub mod multi_year;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::{Result, ScoreError};
use crate::image::DatedImage;

pub use day_of_year::{DayOfYearParams, DayOfYearScore, DoyAnchor};
pub use multi_year::{MultiYearParams, MultiYearScore, YearSource};

pub const DEFAULT_BATCH_SIZE: usize = 512;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Shared flag a caller flips to stop a run between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Images scored between two cancellation checks. Zero is treated as one.
    pub batch_size: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, cancel: None }
    }
}

impl RunOptions {
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel: Some(cancel), ..Self::default() }
    }
}

// ── Strategy contract ─────────────────────────────────────────────────────────

/// A temporal scoring rule producing one scalar per image.
pub trait ScoreStrategy: Sync {
    /// Aggregate computed once from the whole collection.
    type Plan: Sync;

    /// Band the score is written to.
    fn band_name(&self) -> &str;

    /// Reduction pass. `EmptyInput` is treated as an empty result.
    fn plan<I: DatedImage>(&self, images: &[I]) -> Result<Self::Plan>;

    /// Score of the `index`-th image.
    fn score<I: DatedImage>(&self, plan: &Self::Plan, image: &I, index: usize) -> Result<f64>;

    /// Score every image with default run options.
    fn map<I: DatedImage + Sync>(&self, images: Vec<I>) -> Result<Vec<I>>
    where
        Self: Sized,
    {
        run(self, images, &RunOptions::default())
    }

    fn map_with<I: DatedImage + Sync>(&self, images: Vec<I>, options: &RunOptions) -> Result<Vec<I>>
    where
        Self: Sized,
    {
        run(self, images, options)
    }
}

/// Run `strategy` over `images`, returning them with the score band attached.
#[instrument(skip_all, fields(band = %strategy.band_name(), images = images.len()))]
pub fn run<S, I>(strategy: &S, mut images: Vec<I>, options: &RunOptions) -> Result<Vec<I>>
where
    S: ScoreStrategy,
    I: DatedImage + Sync,
{
    if images.is_empty() {
        debug!("empty collection, nothing to score");
        return Ok(images);
    }

    let plan = match strategy.plan(&images) {
        Ok(plan) => plan,
        Err(e) if e.is_recoverable() => {
            debug!(error = %e, "nothing to score, collection returned as is");
            return Ok(images);
        }
        Err(e) => return Err(e),
    };

    let total = images.len();
    let batch_size = options.batch_size.max(1);
    let mut scores = Vec::with_capacity(total);
    for (b, chunk) in images.chunks(batch_size).enumerate() {
        if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            warn!(scored = scores.len(), total, "scoring cancelled");
            return Err(ScoreError::Cancelled { scored: scores.len(), total });
        }
        scores.extend(score_batch(strategy, &plan, chunk, b * batch_size)?);
    }

    let band = strategy.band_name();
    for (image, score) in images.iter_mut().zip(scores) {
        image.set_band(band, score);
    }
    debug!(total, "scores written");
    Ok(images)
}

#[cfg(feature = "threading")]
fn score_batch<S, I>(strategy: &S, plan: &S::Plan, batch: &[I], offset: usize) -> Result<Vec<f64>>
where
    S: ScoreStrategy,
    I: DatedImage + Sync,
{
    use rayon::prelude::*;
    batch
        .par_iter()
        .enumerate()
        .map(|(i, image)| strategy.score(plan, image, offset + i))
        .collect()
}

#[cfg(not(feature = "threading"))]
fn score_batch<S, I>(strategy: &S, plan: &S::Plan, batch: &[I], offset: usize) -> Result<Vec<f64>>
where
    S: ScoreStrategy,
    I: DatedImage + Sync,
{
    batch
        .iter()
        .enumerate()
        .map(|(i, image)| strategy.score(plan, image, offset + i))
        .collect()
}
