//! Crash export reader.
//!
//! Reads CSV crash exports into [`CrashRecord`]s. Header names vary between
//! publishers (`ArcGIS` exports use `CrashDate`/`CrashYear`/`Latitude`/
//! `Longitude`), so each logical column accepts a list of aliases matched
//! case-insensitively. Extra columns are ignored.

use std::io::Read;

use equity_audit_tract_models::CrashRecord;

use crate::IngestError;
use crate::parsing::{parse_crash_date, parse_lat_lng, parse_year};

const TABLE: &str = "crash records";

const DATE_ALIASES: &[&str] = &["CrashDate", "date", "crash_date"];
const YEAR_ALIASES: &[&str] = &["CrashYear", "year", "crash_year"];
const LAT_ALIASES: &[&str] = &["Latitude", "lat"];
const LNG_ALIASES: &[&str] = &["Longitude", "lon", "lng"];

/// Crash records read from a CSV export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrashCsv {
    /// Successfully parsed records, in file order.
    pub records: Vec<CrashRecord>,
    /// Rows skipped because coordinates or year could not be parsed.
    pub malformed_rows: usize,
}

/// Reads crash records from CSV.
///
/// Rows with unparseable coordinates or no derivable year are skipped and
/// counted in [`CrashCsv::malformed_rows`]; they do not fail the read.
///
/// # Errors
///
/// * [`IngestError::MissingColumn`] if the latitude or longitude column is
///   absent, or if neither a year nor a date column is present
/// * [`IngestError::Csv`] if the CSV itself is unreadable
pub fn read_crash_csv<R: Read>(reader: R) -> Result<CrashCsv, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();

    let date_idx = find_column(&headers, DATE_ALIASES);
    let year_idx = find_column(&headers, YEAR_ALIASES);
    let lat_idx = find_column(&headers, LAT_ALIASES).ok_or_else(|| missing("Latitude"))?;
    let lng_idx = find_column(&headers, LNG_ALIASES).ok_or_else(|| missing("Longitude"))?;

    if date_idx.is_none() && year_idx.is_none() {
        return Err(missing("CrashYear"));
    }

    let mut out = CrashCsv::default();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let date = date_idx.and_then(|i| record.get(i)).and_then(parse_crash_date);
        let year = parse_year(year_idx.and_then(|i| record.get(i)), date);
        let coords = parse_lat_lng(record.get(lat_idx), record.get(lng_idx));

        let (Some(year), Some((latitude, longitude))) = (year, coords) else {
            log::debug!("Skipping malformed crash row {}", row + 1);
            out.malformed_rows += 1;
            continue;
        };

        out.records.push(CrashRecord {
            date,
            year,
            latitude,
            longitude,
        });
    }

    if out.malformed_rows > 0 {
        log::warn!(
            "Skipped {} malformed crash rows ({} parsed)",
            out.malformed_rows,
            out.records.len()
        );
    }
    log::info!("Parsed {} crash records from CSV", out.records.len());

    Ok(out)
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|alias| h.eq_ignore_ascii_case(alias)))
}

fn missing(column: &str) -> IngestError {
    IngestError::MissingColumn {
        table: TABLE,
        column: column.to_string(),
    }
}
