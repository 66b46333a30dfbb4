//! End-to-end scoring scenarios over small in-memory collections.

use approx::assert_abs_diff_eq;
use bap_score::strategy::day_of_year::DOY_SCORE_BAND;
use bap_score::strategy::multi_year::YEAR_SCORE_BAND;
use bap_score::{
    tag_season_year, CancelToken, DatedImage, DayOfYearParams, DayOfYearScore, MultiYearParams,
    MultiYearScore, RunOptions, SceneImage, ScoreError, ScoreStrategy, Season, TransferFunction,
};
use chrono::{NaiveDate, TimeZone, Utc};

fn shot(id: &str, y: i32, m: u32, d: u32) -> SceneImage {
    SceneImage::new(id, Utc.with_ymd_and_hms(y, m, d, 14, 20, 0).unwrap())
}

fn band(images: &[SceneImage], id: &str, band: &str) -> f64 {
    images
        .iter()
        .find(|i| i.id == id)
        .and_then(|i| i.band(band))
        .unwrap_or_else(|| panic!("{id} has no {band} band"))
}

#[test]
fn multi_year_linear_over_four_seasons() {
    let season = Season::parse("11-15", "02-15").unwrap();
    let mut images = vec![
        shot("s2016", 2016, 1, 10),
        shot("s2017", 2016, 12, 1),
        shot("s2018", 2018, 2, 1),
        shot("s2019", 2018, 11, 20),
    ];
    tag_season_year(&mut images, &season, "season_year").unwrap();

    let strategy = MultiYearScore::new(season, 2018);
    let params = MultiYearParams::new(2018, "season_year", TransferFunction::Linear);
    let out = strategy.apply(images, &params).unwrap();

    assert_abs_diff_eq!(band(&out, "s2018", YEAR_SCORE_BAND), 1.0);
    assert_abs_diff_eq!(band(&out, "s2016", YEAR_SCORE_BAND), 0.0);
    assert_abs_diff_eq!(band(&out, "s2017", YEAR_SCORE_BAND), 0.5);
    assert_abs_diff_eq!(band(&out, "s2019", YEAR_SCORE_BAND), 0.5);
}

#[test]
fn day_of_year_linear_around_new_year() {
    let season = Season::parse("11-15", "02-15").unwrap();
    let target = NaiveDate::from_ymd_opt(2018, 1, 15).unwrap();
    let params = DayOfYearParams::new(target, TransferFunction::Linear);
    let out = DayOfYearScore::new(season)
        .apply(
            vec![shot("on", 2018, 1, 15), shot("early", 2017, 11, 19), shot("late", 2018, 2, 14)],
            &params,
        )
        .unwrap();

    assert_eq!(band(&out, "on", DOY_SCORE_BAND), 1.0);
    assert_eq!(band(&out, "early", DOY_SCORE_BAND), 0.0);
    assert_abs_diff_eq!(band(&out, "late", DOY_SCORE_BAND), 0.348, epsilon = 1e-3);
}

#[test]
fn both_scores_stack_on_the_same_images() {
    let season = Season::growing_south();
    let images = vec![shot("a", 2018, 1, 15), shot("b", 2017, 1, 30), shot("c", 2016, 12, 1)];

    let images = MultiYearScore::new(season, 2018).map(images).unwrap();
    let images = DayOfYearScore::new(season).map(images).unwrap();

    for img in &images {
        assert_eq!(img.bands.len(), 2, "{} should carry both bands", img.id);
        for (name, v) in &img.bands {
            assert!((0.0..=1.0).contains(v), "{}: {name} = {v}", img.id);
        }
    }
    assert_eq!(band(&images, "a", "score-multi"), 1.0);
    assert_eq!(band(&images, "a", "score-doy"), 1.0);
}

#[test]
fn empty_collection_scores_nothing() {
    let season = Season::growing_north();
    let params = MultiYearParams::new(2018, "year", TransferFunction::Linear);
    assert!(MultiYearScore::new(season, 2018)
        .apply(Vec::<SceneImage>::new(), &params)
        .unwrap()
        .is_empty());
    assert!(DayOfYearScore::new(season).map(Vec::<SceneImage>::new()).unwrap().is_empty());
}

#[test]
fn cancellation_is_reported_not_partial() {
    let token = CancelToken::new();
    token.cancel();
    let images: Vec<SceneImage> = (1..=20).map(|d| shot(&format!("d{d}"), 2018, 1, d)).collect();
    let err = DayOfYearScore::new(Season::growing_south())
        .map_with(images, &RunOptions::with_cancel(token))
        .unwrap_err();
    assert!(matches!(err, ScoreError::Cancelled { scored: 0, total: 20 }));
}

#[test]
fn custom_band_names_are_honoured() {
    let params = MultiYearParams::new(2018, "year", TransferFunction::Linear).with_band_name("pref_year");
    let out = MultiYearScore::new(Season::growing_south(), 2018)
        .apply(vec![shot("a", 2018, 1, 1).with_property("year", 2018)], &params)
        .unwrap();
    assert_eq!(out[0].band("pref_year"), Some(1.0));
    assert_eq!(out[0].band(YEAR_SCORE_BAND), None);
}
