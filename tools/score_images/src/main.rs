/// Score a JSON image manifest with one temporal strategy and write the
/// manifest back with the score band attached.
///
/// Manifest: `[{"id": "...", "timestamp": "2018-01-15T14:30:00Z", "properties": {...}}]`
/// Config:   `{"season": {"start": "11-15", "end": "02-15"},
///             "tag_property": "season_year",
///             "strategy": "multi_year", "target_year": 2018, ...}`
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bap_score::{
    tag_season_year, DatedImage, DayOfYearParams, DayOfYearScore, ImageSource, MultiYearParams,
    MultiYearScore, RunOptions, SceneImage, ScoreStrategy, Season,
};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "score_images", about = "Attach temporal desirability scores to an image manifest")]
struct Args {
    /// JSON array of images (id, timestamp, properties, bands)
    #[arg(short, long)]
    manifest: PathBuf,

    /// JSON run configuration (season + strategy parameters)
    #[arg(short, long)]
    config: PathBuf,

    /// Output file for the scored manifest (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Images scored between cancellation checks
    #[arg(long, default_value = "512")]
    batch_size: usize,
}

// ── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RunConfig {
    season: Season,
    /// When set, images are tagged with their season-year under this
    /// property before scoring.
    #[serde(default)]
    tag_property: Option<String>,
    #[serde(flatten)]
    strategy: StrategyConfig,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
enum StrategyConfig {
    MultiYear(MultiYearParams),
    DayOfYear(DayOfYearParams),
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing run config {}", path.display()))
}

// ── Image source ─────────────────────────────────────────────────────────────

/// Images read from a JSON manifest on disk.
struct ManifestSource {
    path: PathBuf,
}

impl ImageSource for ManifestSource {
    type Image = SceneImage;
    type Error = anyhow::Error;

    fn load(&self) -> Result<Vec<SceneImage>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing manifest {}", self.path.display()))
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

fn score_manifest<S: ImageSource<Image = SceneImage, Error = anyhow::Error>>(
    source: &S,
    config: &RunConfig,
    options: &RunOptions,
) -> Result<(Vec<SceneImage>, String)> {
    let mut images = source.load()?;
    info!(images = images.len(), season = %config.season, "manifest loaded");

    if let Some(property) = &config.tag_property {
        tag_season_year(&mut images, &config.season, property)
            .with_context(|| format!("tagging season-year into \"{property}\""))?;
    }

    let (scored, band) = match &config.strategy {
        StrategyConfig::MultiYear(params) => {
            let strategy = MultiYearScore::with_params(config.season, params.clone());
            (strategy.map_with(images, options)?, params.band_name.clone())
        }
        StrategyConfig::DayOfYear(params) => {
            let strategy = DayOfYearScore::with_params(config.season, params.clone());
            (strategy.map_with(images, options)?, params.band_name.clone())
        }
    };
    Ok((scored, band))
}

fn write_manifest(images: &[SceneImage], output: Option<&Path>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, images).context("writing scored manifest")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let source = ManifestSource { path: args.manifest.clone() };
    let options = RunOptions { batch_size: args.batch_size, ..RunOptions::default() };

    let (images, band) = score_manifest(&source, &config, &options)?;
    if images.is_empty() {
        warn!("manifest is empty, nothing scored");
    }
    for img in &images {
        info!(id = %img.id, timestamp = %img.timestamp(), score = img.band(&band), "scored");
    }

    write_manifest(&images, args.output.as_deref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[
        {"id": "a", "timestamp": "2018-01-15T14:30:00Z", "properties": {"year": 2018}},
        {"id": "b", "timestamp": "2016-12-20T14:30:00Z", "properties": {"year": 2017}},
        {"id": "c", "timestamp": "2016-01-02T14:30:00Z", "properties": {"year": 2016}}
    ]"#;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn multi_year_config_scores_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_tmp(&dir, "manifest.json", MANIFEST);
        let config = write_tmp(
            &dir,
            "config.json",
            r#"{"season": {"start": "11-15", "end": "02-15"},
                "strategy": "multi_year", "target_year": 2018,
                "year_source": {"property": "year"},
                "transfer": {"kind": "linear"}}"#,
        );
        let config = load_config(&config).unwrap();
        let (images, band) =
            score_manifest(&ManifestSource { path: manifest }, &config, &RunOptions::default()).unwrap();
        assert_eq!(band, "year_score");
        let scores: Vec<f64> = images.iter().map(|i| i.band(&band).unwrap()).collect();
        assert_eq!(scores, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn day_of_year_config_with_tagging() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_tmp(&dir, "manifest.json", MANIFEST);
        let config = write_tmp(
            &dir,
            "config.json",
            r#"{"season": {"start": "11-15", "end": "02-15", "target": "01-15"},
                "tag_property": "season_year",
                "strategy": "day_of_year", "anchor": "season", "band_name": "doy"}"#,
        );
        let config = load_config(&config).unwrap();
        let (images, band) =
            score_manifest(&ManifestSource { path: manifest }, &config, &RunOptions::default()).unwrap();
        assert_eq!(band, "doy");
        assert_eq!(images[0].band("doy"), Some(1.0));
        assert!(images[1].property("season_year").is_some());
        for img in &images {
            let s = img.band("doy").unwrap();
            assert!((0.0..=1.0).contains(&s), "{}: {s}", img.id);
        }
    }

    #[test]
    fn year_ratio_and_output_range_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_tmp(&dir, "manifest.json", MANIFEST);
        let config = write_tmp(
            &dir,
            "config.json",
            r#"{"season": {"start": "11-15", "end": "02-15"},
                "strategy": "multi_year", "target_year": 2018,
                "year_source": {"property": "year"},
                "year_ratio": 0.25, "range_out": [0, 100]}"#,
        );
        let config = load_config(&config).unwrap();
        let (images, band) =
            score_manifest(&ManifestSource { path: manifest }, &config, &RunOptions::default()).unwrap();
        let scores: Vec<f64> = images.iter().map(|i| i.band(&band).unwrap()).collect();
        assert_eq!(scores, vec![100.0, 75.0, 50.0]);
    }

    #[test]
    fn unknown_distribution_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_tmp(
            &dir,
            "config.json",
            r#"{"season": {"start": "11-15", "end": "02-15"},
                "strategy": "multi_year", "target_year": 2018,
                "transfer": {"kind": "cubic"}}"#,
        );
        assert!(load_config(&config).is_err());
    }

    #[test]
    fn writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("scored.json");
        let mut img = SceneImage::new("a", "2018-01-15T00:00:00Z".parse().unwrap());
        img.set_band("score-doy", 1.0);
        write_manifest(&[img.clone()], Some(&out)).unwrap();
        let back: Vec<SceneImage> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back, vec![img]);
    }
}
