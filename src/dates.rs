// 📅 Date Utilities - eForms date/time pairs → RFC 3339 timestamps
//
// eForms splits a timestamp into `cbc:*Date` ("2019-10-24+01:00") and an
// optional `cbc:*Time` ("13:00:00+01:00"); either part may carry the offset.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Utc};

/// Time of day used when a date has no time and marks the start of a period
pub const START_OF_DAY: &str = "00:00:00";

/// Time of day used for period end dates without time
pub const END_OF_DAY: &str = "23:59:59";

/// Split "2019-10-24+01:00" into ("2019-10-24", "+01:00")
fn split_offset(value: &str, body_len: usize) -> (&str, &str) {
    let cut = value
        .char_indices()
        .skip(body_len)
        .find(|(_, c)| matches!(c, 'Z' | '+' | '-'))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    (&value[..cut], &value[cut..])
}

fn parse_offset(raw: &str) -> Result<Option<FixedOffset>> {
    match raw {
        "" => Ok(None),
        "Z" => Ok(Some(Utc.fix())),
        _ => {
            let sign = if raw.starts_with('-') { -1 } else { 1 };
            let (hours, minutes) = raw[1..]
                .split_once(':')
                .ok_or_else(|| anyhow!("Malformed offset: {}", raw))?;
            let hours: i32 = hours.parse().with_context(|| format!("Malformed offset: {}", raw))?;
            let minutes: i32 = minutes
                .parse()
                .with_context(|| format!("Malformed offset: {}", raw))?;
            if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
                return Err(anyhow!("Offset out of range: {}", raw));
            }
            let seconds = sign * (hours * 3600 + minutes * 60);
            FixedOffset::east_opt(seconds)
                .map(Some)
                .ok_or_else(|| anyhow!("Offset out of range: {}", raw))
        }
    }
}

/// Combine an eForms date and optional time into an RFC 3339 timestamp
///
/// Missing time → `default_time`; missing offset → UTC.
pub fn combine(date: &str, time: Option<&str>, default_time: &str) -> Result<String> {
    let date = date.trim();
    let (date_body, date_offset) = split_offset(date, 10);
    let day = NaiveDate::parse_from_str(date_body, "%Y-%m-%d")
        .with_context(|| format!("Malformed date: {}", date))?;

    let time = time.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(default_time);
    let (time_body, time_offset) = split_offset(time, 8);
    let clock = NaiveTime::parse_from_str(time_body, "%H:%M:%S%.f")
        .with_context(|| format!("Malformed time: {}", time))?;

    let offset = match parse_offset(time_offset)? {
        Some(offset) => offset,
        None => parse_offset(date_offset)?.unwrap_or_else(|| Utc.fix()),
    };

    let stamp: DateTime<FixedOffset> = day
        .and_time(clock)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| anyhow!("Ambiguous timestamp: {} {}", date, time))?;

    Ok(stamp.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ============================================================================
// TESTS
// ============================================================================
