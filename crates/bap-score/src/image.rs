//! Contracts with the external image collection.
//!
//! The engine never creates or drops images. It reads an acquisition
//! timestamp and metadata properties, and writes one scalar band per image.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoreError};
use crate::season::Season;

/// A metadata property value: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Interpret as a whole calendar year. Fractional numbers are rejected.
    pub fn as_year(&self) -> Option<i32> {
        match self {
            PropertyValue::Number(n) => {
                let in_range = *n >= i32::MIN as f64 && *n <= i32::MAX as f64;
                (n.fract() == 0.0 && in_range).then(|| *n as i32)
            }
            PropertyValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Number(v as f64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// One acquisition handed to the engine by an image source.
pub trait DatedImage {
    fn timestamp(&self) -> DateTime<Utc>;

    fn property(&self, name: &str) -> Option<&PropertyValue>;

    fn set_property(&mut self, name: &str, value: PropertyValue);

    fn band(&self, name: &str) -> Option<f64>;

    /// Attach a scene-constant band, replacing any band of the same name.
    fn set_band(&mut self, name: &str, value: f64);
}

/// Supplier of a finite image collection.
///
/// Any session or connection state lives in the implementor, never in the
/// engine.
pub trait ImageSource {
    type Image: DatedImage;
    type Error;

    fn load(&self) -> std::result::Result<Vec<Self::Image>, Self::Error>;
}

// ── In-memory image ───────────────────────────────────────────────────────────

/// Plain in-memory image record: timestamp, properties and scalar bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneImage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub bands: BTreeMap<String, f64>,
}

impl SceneImage {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            properties: BTreeMap::new(),
            bands: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }
}

impl DatedImage for SceneImage {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) {
        self.properties.insert(name.to_string(), value);
    }

    fn band(&self, name: &str) -> Option<f64> {
        self.bands.get(name).copied()
    }

    fn set_band(&mut self, name: &str, value: f64) {
        self.bands.insert(name.to_string(), value);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Read the whole-year property of the `index`-th image.
pub(crate) fn year_property<I: DatedImage>(image: &I, index: usize, property: &str) -> Result<i32> {
    let value = image.property(property).ok_or_else(|| ScoreError::MissingProperty {
        index,
        property: property.to_string(),
    })?;
    value.as_year().ok_or_else(|| ScoreError::InvalidProperty {
        index,
        property: property.to_string(),
        value: value.to_string(),
    })
}

/// Season-year of the `index`-th image, derived from its timestamp.
pub(crate) fn season_year_of<I: DatedImage>(season: &Season, image: &I, index: usize) -> Result<i32> {
    let timestamp = image.timestamp();
    season
        .season_year(timestamp)
        .ok_or(ScoreError::OutsideSeason { index, timestamp })
}

/// Tag every image with the season-year its acquisition falls into.
///
/// All years are resolved before any image is written, so an image outside
/// every season window leaves the whole collection untouched.
pub fn tag_season_year<I: DatedImage>(images: &mut [I], season: &Season, property: &str) -> Result<()> {
    let years = images
        .iter()
        .enumerate()
        .map(|(i, img)| season_year_of(season, img, i))
        .collect::<Result<Vec<_>>>()?;
    for (img, year) in images.iter_mut().zip(years) {
        img.set_property(property, PropertyValue::from(year));
    }
    Ok(())
}
