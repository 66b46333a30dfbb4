//! Recurring annual date windows.
//!
//! A [`Season`] is a month/day range with no year attached. Resolving it for a
//! season-year yields a concrete half-open `[start, end)` window. Seasons whose
//! end falls earlier in the calendar than their start wrap over New Year; the
//! window for season-year `Y` then starts in `Y - 1` and ends in `Y`, so a
//! season is always identified by the year of its end date.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoreError};

// ── MonthDay ──────────────────────────────────────────────────────────────────

/// A calendar day without a year, written `MM-DD`.
///
/// Field order gives the lexicographic (month, day) ordering used to detect
/// wrapping seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Validated against a leap year, so `02-29` is accepted.
    pub fn new(month: u32, day: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(2000, month, day)
            .map(|_| Self { month, day })
            .ok_or(ScoreError::InvalidDate { year: None, month, day })
    }

    /// Month/day of a concrete date.
    pub fn of(date: NaiveDate) -> Self {
        Self { month: date.month(), day: date.day() }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Place this day in `year`. Feb 29 falls back to Feb 28 outside leap years.
    pub fn in_year(&self, year: i32) -> Result<NaiveDate> {
        let day = if self.month == 2 && self.day == 29 && !is_leap_year(year) {
            28
        } else {
            self.day
        };
        NaiveDate::from_ymd_opt(year, self.month, day).ok_or(ScoreError::InvalidDate {
            year: Some(year),
            month: self.month,
            day: self.day,
        })
    }
}

/// Any non-leap year; used to check Feb 29 fallbacks.
const COMMON_YEAR: i32 = 2001;

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || ScoreError::MalformedMonthDay { input: s.to_string() };
        let (m, d) = s.trim().split_once('-').ok_or_else(malformed)?;
        let short_digits = |p: &str| !p.is_empty() && p.len() <= 2 && p.bytes().all(|b| b.is_ascii_digit());
        if !short_digits(m) || !short_digits(d) {
            return Err(malformed());
        }
        let month = m.parse().map_err(|_| malformed())?;
        let day = d.parse().map_err(|_| malformed())?;
        Self::new(month, day)
    }
}

impl TryFrom<String> for MonthDay {
    type Error = ScoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MonthDay> for String {
    fn from(md: MonthDay) -> Self {
        md.to_string()
    }
}

// ── SeasonWindow ──────────────────────────────────────────────────────────────

/// One concrete instance of a season: `[start, end)` at UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SeasonWindow {
    #[inline]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Window length in whole days.
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Start plus half the length, rounded down to a whole day.
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + Duration::days(self.length_days() / 2)
    }
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

// ── Season ────────────────────────────────────────────────────────────────────

/// A recurring annual date window, e.g. `11-15 → 02-15`.
///
/// `target` is the most representative day of the season. When absent, the
/// midpoint of each resolved window is used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SeasonSpec")]
pub struct Season {
    start: MonthDay,
    end: MonthDay,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<MonthDay>,
}

/// Unvalidated wire form of [`Season`].
#[derive(Deserialize)]
struct SeasonSpec {
    start: MonthDay,
    end: MonthDay,
    #[serde(default)]
    target: Option<MonthDay>,
}

impl TryFrom<SeasonSpec> for Season {
    type Error = ScoreError;

    fn try_from(spec: SeasonSpec) -> Result<Self> {
        let season = Season::new(spec.start, spec.end)?;
        match spec.target {
            Some(t) => season.with_target(t),
            None => Ok(season),
        }
    }
}

impl Season {
    /// Rejects seasons that are zero-length in any year: `start == end`, and
    /// `02-28 → 02-29`, which collapses once Feb 29 falls back in common years.
    pub fn new(start: MonthDay, end: MonthDay) -> Result<Self> {
        let collapses = start < end && start.in_year(COMMON_YEAR)? >= end.in_year(COMMON_YEAR)?;
        if start == end || collapses {
            return Err(ScoreError::EmptySeason { month_day: start.to_string() });
        }
        Ok(Self { start, end, target: None })
    }

    /// Build from two `MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(start.parse()?, end.parse()?)
    }

    /// Set the representative day. It must lie inside the season.
    pub fn with_target(self, target: MonthDay) -> Result<Self> {
        if !self.covers(target) {
            return Err(ScoreError::InvalidDate {
                year: None,
                month: target.month(),
                day: target.day(),
            });
        }
        Ok(Self { target: Some(target), ..self })
    }

    /// Southern-hemisphere growing season, 15 Nov to 15 Feb, peaking mid-January.
    pub fn growing_south() -> Self {
        Self {
            start: MonthDay { month: 11, day: 15 },
            end: MonthDay { month: 2, day: 15 },
            target: Some(MonthDay { month: 1, day: 15 }),
        }
    }

    /// Northern-hemisphere growing season, 15 May to 15 Aug, peaking 1 July.
    pub fn growing_north() -> Self {
        Self {
            start: MonthDay { month: 5, day: 15 },
            end: MonthDay { month: 8, day: 15 },
            target: Some(MonthDay { month: 7, day: 1 }),
        }
    }

    pub fn start(&self) -> MonthDay {
        self.start
    }

    pub fn end(&self) -> MonthDay {
        self.end
    }

    pub fn target(&self) -> Option<MonthDay> {
        self.target
    }

    /// True when the season crosses the calendar-year boundary.
    pub fn is_wrapping(&self) -> bool {
        self.start > self.end
    }

    /// Whether a month/day falls inside the (year-less) season.
    pub fn covers(&self, md: MonthDay) -> bool {
        if self.is_wrapping() {
            md >= self.start || md < self.end
        } else {
            self.start <= md && md < self.end
        }
    }

    /// The concrete window that ends in `season_year`.
    pub fn resolve(&self, season_year: i32) -> Result<SeasonWindow> {
        let start_year = if self.is_wrapping() { season_year - 1 } else { season_year };
        let window = SeasonWindow {
            start: midnight(self.start.in_year(start_year)?),
            end: midnight(self.end.in_year(season_year)?),
        };
        if window.start >= window.end {
            return Err(ScoreError::EmptySeason { month_day: self.start.to_string() });
        }
        Ok(window)
    }

    /// Season-year of the window containing `ts`, if any.
    pub fn season_year(&self, ts: DateTime<Utc>) -> Option<i32> {
        let year = ts.year();
        // A date late in the calendar year belongs to next year's wrapping window.
        [year, year + 1]
            .into_iter()
            .find(|&y| self.resolve(y).map(|w| w.contains(ts)).unwrap_or(false))
    }

    /// Representative date of the season instance ending in `season_year`.
    pub fn target_date(&self, season_year: i32) -> Result<NaiveDate> {
        match self.target {
            Some(t) => {
                let year = if self.is_wrapping() && t >= self.start {
                    season_year - 1
                } else {
                    season_year
                };
                t.in_year(year)
            }
            None => Ok(self.resolve(season_year)?.midpoint().date_naive()),
        }
    }

    /// Whole days from the start of the `season_year` window to `ts`.
    /// Negative when `ts` precedes the window.
    pub fn distance_to_start(&self, ts: DateTime<Utc>, season_year: i32) -> Result<i64> {
        let window = self.resolve(season_year)?;
        Ok((ts.date_naive() - window.start.date_naive()).num_days())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start, self.end)
    }
}
