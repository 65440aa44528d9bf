//! Temporal conversions between chrono values and raw q offsets.
//!
//! q counts every temporal type from 2000.01.01 00:00:00 at the resolution
//! of its tag. The codec itself never calls these; they sit in front of the
//! value model for callers that hold calendar values.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::value::Atom;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// q epoch, 2000-01-01 00:00:00.
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn epoch_date() -> NaiveDate {
    epoch().date()
}

// ==================== Dates ====================

/// Days since 2000.01.01.
pub fn date_to_raw(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch_date()).num_days() as i32
}

/// `None` for the null or an out-of-range day count.
pub fn raw_to_date(raw: i32) -> Option<NaiveDate> {
    if raw == i32::MIN {
        return None;
    }
    epoch_date().checked_add_signed(TimeDelta::try_days(i64::from(raw))?)
}

/// Months since 2000.01; the day of `date` is ignored.
pub fn month_to_raw(date: NaiveDate) -> i32 {
    (date.year() - 2000) * 12 + date.month0() as i32
}

/// First day of the month.
pub fn raw_to_month(raw: i32) -> Option<NaiveDate> {
    if raw == i32::MIN {
        return None;
    }
    let year = 2000 + raw.div_euclid(12);
    let month = raw.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Milliseconds since the epoch.
pub fn datetime_to_raw(datetime: NaiveDateTime) -> i64 {
    datetime.signed_duration_since(epoch()).num_milliseconds()
}

pub fn raw_to_datetime(raw: i64) -> Option<NaiveDateTime> {
    if raw == i64::MIN {
        return None;
    }
    epoch().checked_add_signed(TimeDelta::try_milliseconds(raw)?)
}

/// Nanoseconds since the epoch. `None` outside roughly 1707..2292.
pub fn timestamp_to_raw(timestamp: NaiveDateTime) -> Option<i64> {
    timestamp.signed_duration_since(epoch()).num_nanoseconds()
}

pub fn raw_to_timestamp(raw: i64) -> Option<NaiveDateTime> {
    if raw == i64::MIN {
        return None;
    }
    epoch().checked_add_signed(TimeDelta::nanoseconds(raw))
}

// ==================== Durations and times ====================

pub fn timespan_to_raw(span: TimeDelta) -> Option<i64> {
    span.num_nanoseconds()
}

pub fn raw_to_timespan(raw: i64) -> Option<TimeDelta> {
    if raw == i64::MIN {
        return None;
    }
    Some(TimeDelta::nanoseconds(raw))
}

/// Minutes since midnight.
pub fn minute_to_raw(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

pub fn raw_to_minute(raw: i32) -> Option<NaiveTime> {
    let raw = u32::try_from(raw).ok()?;
    NaiveTime::from_hms_opt(raw / 60, raw % 60, 0)
}

/// Seconds since midnight.
pub fn second_to_raw(time: NaiveTime) -> i32 {
    time.num_seconds_from_midnight() as i32
}

pub fn raw_to_second(raw: i32) -> Option<NaiveTime> {
    let raw = u32::try_from(raw).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(raw, 0)
}

/// Milliseconds since midnight.
pub fn time_to_raw(time: NaiveTime) -> i32 {
    (time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000) as i32
}

pub fn raw_to_time(raw: i32) -> Option<NaiveTime> {
    let raw = u32::try_from(raw).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(raw / 1000, (raw % 1000) * 1_000_000)
}

// ==================== Atom helpers ====================

impl Atom {
    pub fn date(date: NaiveDate) -> Self {
        Atom::Date(date_to_raw(date))
    }

    pub fn month(date: NaiveDate) -> Self {
        Atom::Month(month_to_raw(date))
    }

    pub fn datetime(datetime: NaiveDateTime) -> Self {
        Atom::Datetime(datetime_to_raw(datetime))
    }

    /// `None` when the instant does not fit in 64-bit nanoseconds.
    pub fn timestamp(timestamp: NaiveDateTime) -> Option<Self> {
        timestamp_to_raw(timestamp).map(Atom::Timestamp)
    }

    pub fn timespan(span: TimeDelta) -> Option<Self> {
        timespan_to_raw(span).map(Atom::Timespan)
    }

    pub fn minute(time: NaiveTime) -> Self {
        Atom::Minute(minute_to_raw(time))
    }

    pub fn second(time: NaiveTime) -> Self {
        Atom::Second(second_to_raw(time))
    }

    pub fn time(time: NaiveTime) -> Self {
        Atom::Time(time_to_raw(time))
    }

    /// Calendar instant of a point-in-time atom (date, month, datetime,
    /// timestamp). `None` for nulls and other tags.
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Atom::Date(raw) => raw_to_date(*raw).and_then(|d| d.and_hms_opt(0, 0, 0)),
            Atom::Month(raw) => raw_to_month(*raw).and_then(|d| d.and_hms_opt(0, 0, 0)),
            Atom::Datetime(raw) => raw_to_datetime(*raw),
            Atom::Timestamp(raw) => raw_to_timestamp(*raw),
            _ => None,
        }
    }

    /// Duration since midnight (or the span itself) of a time-like atom.
    pub fn to_time_delta(&self) -> Option<TimeDelta> {
        match self {
            Atom::Timespan(raw) => raw_to_timespan(*raw),
            Atom::Minute(raw) if *raw != i32::MIN => TimeDelta::try_minutes(i64::from(*raw)),
            Atom::Second(raw) if *raw != i32::MIN => TimeDelta::try_seconds(i64::from(*raw)),
            Atom::Time(raw) if *raw != i32::MIN => {
                Some(TimeDelta::nanoseconds(i64::from(*raw) * NANOS_PER_MILLI))
            }
            _ => None,
        }
    }
}
