use std::fmt::Display;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use thiserror::Error;

use crate::constants::{BORDER_INVALID, BORDER_VALID};
use crate::settings::Settings;

/// Format of the date-time inputs of the poll form (`2025-01-17T14:30:45`).
pub const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Format used to display poll dates (`17/01/2025 14:30:45`).
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Converts a form date string into a unix timestamp, in the local timezone.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DDTHH:MM:SS`. A missing time defaults
/// to midnight, missing seconds default to 0. Returns `None` on malformed input or when the
/// local time does not exist.
pub fn date_to_unix(date: &str) -> Option<u64> {
    date_to_unix_in(date, &Local)
}

pub fn date_to_unix_in<Tz: TimeZone>(date: &str, tz: &Tz) -> Option<u64> {
    let naive = parse_naive(date)?;
    let ts = tz.from_local_datetime(&naive).earliest()?.timestamp();
    u64::try_from(ts).ok()
}

fn parse_naive(date: &str) -> Option<NaiveDateTime> {
    let (date_chunk, time_chunk) = match date.trim().split_once('T') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (date.trim(), None),
    };
    let day = NaiveDate::parse_from_str(date_chunk, "%Y-%m-%d").ok()?;
    let time = match time_chunk {
        None | Some("") => NaiveTime::from_hms_opt(0, 0, 0)?,
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .ok()?,
    };
    Some(day.and_time(time))
}

/// Converts a unix timestamp into the form date string, in the local timezone.
pub fn unix_to_date(unix: u64) -> String {
    unix_to_date_in(unix, &Local)
}

pub fn unix_to_date_in<Tz: TimeZone>(unix: u64, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format_unix(unix, tz, INPUT_FORMAT)
}

/// Converts a unix timestamp into the `DD/MM/YYYY HH:mm:ss` display string.
pub fn unix_to_display_date(unix: u64) -> String {
    unix_to_display_date_in(unix, &Local)
}

pub fn unix_to_display_date_in<Tz: TimeZone>(unix: u64, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format_unix(unix, tz, DISPLAY_FORMAT)
}

fn format_unix<Tz: TimeZone>(unix: u64, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: Display,
{
    i64::try_from(unix)
        .ok()
        .and_then(|secs| tz.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Invalid dates! Start date must not be earlier than current date.")]
    StartInPast,
    #[error("Invalid dates! End date must not be earlier than current date.")]
    EndInPast,
    #[error("Invalid dates! Start date must be earlier than end date.")]
    StartAfterEnd,
    #[error("Invalid dates! End date must be at least {min_days} days later than start date.")]
    PeriodTooShort { min_days: u64 },
    #[error("Invalid dates! Voting period must not exceed a maximum of {max_days} days.")]
    PeriodTooLong { max_days: u64 },
}

/// Checks the poll dates, first failure wins.
pub fn validate_dates(start: u64, end: u64, now: u64, settings: &Settings) -> Result<(), DateError> {
    if settings.require_future_dates {
        if start < now {
            return Err(DateError::StartInPast);
        }
        if end <= now {
            return Err(DateError::EndInPast);
        }
    }
    if start > end {
        return Err(DateError::StartAfterEnd);
    }
    let period = end - start;
    if period < settings.min_voting_period {
        return Err(DateError::PeriodTooShort {
            min_days: settings.min_voting_days(),
        });
    }
    if period > settings.max_voting_period {
        return Err(DateError::PeriodTooLong {
            max_days: settings.max_voting_days(),
        });
    }
    Ok(())
}

#[inline]
pub fn str_byte_size(s: &str) -> usize {
    s.len()
}

pub fn validate_title(title: &str, settings: &Settings) -> Result<(), &'static str> {
    if str_byte_size(title) > settings.max_title_bytes {
        return Err("Invalid title! Title is too long.");
    }
    Ok(())
}

pub fn validate_choice(choice: &str, settings: &Settings) -> Result<(), &'static str> {
    if str_byte_size(choice) > settings.max_choice_bytes {
        return Err("Invalid choice! This choice is too long.");
    }
    Ok(())
}

fn border(valid: bool) -> &'static str {
    if valid {
        BORDER_VALID
    } else {
        BORDER_INVALID
    }
}

pub fn title_visual_aid(title: &str, settings: &Settings) -> &'static str {
    border(!title.is_empty() && validate_title(title, settings).is_ok())
}

pub fn choices_visual_aid(choices: &[String], settings: &Settings) -> Vec<&'static str> {
    choices
        .iter()
        .map(|c| border(!c.trim().is_empty() && validate_choice(c, settings).is_ok()))
        .collect()
}

pub fn dates_visual_aid(start: &str, end: &str, now: u64, settings: &Settings) -> &'static str {
    match (date_to_unix(start), date_to_unix(end)) {
        (Some(s), Some(e)) => border(validate_dates(s, e, now, settings).is_ok()),
        _ => BORDER_INVALID,
    }
}
