//! Calendar-day keys for per-day view counters.

use std::fmt;
use std::str::FromStr;

use time::{Date, Month, OffsetDateTime};

use crate::error::AccessError;

/// A calendar day rendered as `YYYY-M-D` (month and day not zero-padded).
///
/// Counters written by earlier clients use this exact format, so the
/// unpadded form is kept for compatibility. Keys therefore do not sort
/// lexicographically; compare [`DateKey::date`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(Date);

impl DateKey {
    #[inline]
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    #[inline]
    pub fn date(&self) -> Date {
        self.0
    }

    /// Parse `YYYY-M-D`, accepting zero-padded components too.
    pub fn parse(s: &str) -> Result<Self, AccessError> {
        let invalid = || AccessError::InvalidArgument(format!("invalid date key: {s:?}"));

        let mut parts = s.trim().splitn(3, '-');
        let year: i32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let month: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let day: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        let month = Month::try_from(month).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;
        Ok(Self(date))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source of "today" for metering.
pub trait Clock: Send + Sync {
    /// The current local calendar day.
    fn today(&self) -> Date;

    #[inline]
    fn date_key(&self) -> DateKey {
        DateKey::from_date(self.today())
    }
}

/// Wall-clock time in the local offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        // The local offset can be indeterminate in multi-threaded processes
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date()
    }
}

/// A clock pinned to one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}
