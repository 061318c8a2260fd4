//! Calendar-aligned time buckets
//!
//! Readings are grouped by the UTC calendar hour or day they fall in. A
//! [`BucketKey`] is the identity of such a group.
//!
//! ## Hour numbering
//!
//! Hour keys are **1-based**: 00:00–00:59 UTC is hour `1`, 23:00–23:59 UTC is
//! hour `24`. Consumers compare keys in this form, so the numbering is part of
//! the key format. [`HOUR_KEY_OFFSET`] is the single place it is applied and
//! [`BucketKey::start`] removes it again.

use core::fmt::Display;
use core::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Added to the 0-based UTC hour-of-day to form [`BucketKey::hour`].
pub const HOUR_KEY_OFFSET: u32 = 1;

/// Aggregation granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// One bucket per UTC calendar hour
    Hour,
    /// One bucket per UTC calendar day
    Day,
}

impl Resolution {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Length of one bucket
    pub fn bucket_width(self) -> TimeDelta {
        match self {
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resolution {0:?} (expected \"hour\" or \"day\")")]
pub struct UnknownResolution(pub String);

impl FromStr for Resolution {
    type Err = UnknownResolution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            other => Err(UnknownResolution(other.to_owned())),
        }
    }
}

/// Identity of one aggregation bucket.
///
/// `hour` is present iff the key was built at [`Resolution::Hour`]. The
/// derived ordering is chronological for keys of the same resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub year: i32,
    /// 1–12
    pub month: u32,
    /// 1–31
    pub day: u32,
    /// 1–24, see [`HOUR_KEY_OFFSET`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

impl BucketKey {
    pub const fn resolution(&self) -> Resolution {
        match self.hour {
            Some(_) => Resolution::Hour,
            None => Resolution::Day,
        }
    }

    /// First instant covered by this bucket, or `None` if the components do
    /// not name a real calendar hour/day.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        let hour = match self.hour {
            Some(hour) => hour.checked_sub(HOUR_KEY_OFFSET)?,
            None => 0,
        };

        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(hour, 0, 0)
            .map(|naive| naive.and_utc())
    }

    /// Whether `instant` falls inside this bucket.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        bucket_key(instant, self.resolution()) == *self
    }
}

impl Display for BucketKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if let Some(hour) = self.hour {
            write!(f, " h{:02}", hour)?;
        }
        Ok(())
    }
}

/// Bucket containing `instant` at `resolution`.
pub fn bucket_key(instant: DateTime<Utc>, resolution: Resolution) -> BucketKey {
    BucketKey {
        year: instant.year(),
        month: instant.month(),
        day: instant.day(),
        hour: match resolution {
            Resolution::Hour => Some(instant.hour() + HOUR_KEY_OFFSET),
            Resolution::Day => None,
        },
    }
}
