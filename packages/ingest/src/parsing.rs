//! Shared cell parsing for crash exports.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Parses a crash date in the formats seen in state and city exports.
///
/// Accepts `2023-03-15`, `03/15/2023`, and ISO 8601 datetimes with or
/// without fractional seconds (the time part is dropped).
#[must_use]
pub fn parse_crash_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parses a year cell, falling back to the year of `date`.
///
/// Some exports write years as floats (`2023.0`), so integral floats are
/// accepted too.
#[must_use]
pub fn parse_year(cell: Option<&str>, date: Option<NaiveDate>) -> Option<i32> {
    let from_cell = cell.map(str::trim).filter(|s| !s.is_empty()).and_then(|s| {
        s.parse::<i32>().ok().or_else(|| {
            let value = s.parse::<f64>().ok()?;
            #[allow(clippy::cast_possible_truncation)]
            (value.fract() == 0.0 && value.abs() < 10_000.0).then_some(value as i32)
        })
    });
    from_cell.or_else(|| date.map(|d| d.year()))
}

/// Parses a latitude/longitude pair. Returns `None` if either side is
/// missing, unparseable, non-finite, or out of WGS84 range.
#[must_use]
pub fn parse_lat_lng(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}
