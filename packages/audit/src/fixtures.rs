//! Shared test fixtures: five unit-square tracts stacked by latitude.
//!
//! Tract `00i` spans latitude `[i - 1, i]` and longitude `[0, 1]`, so the
//! point `(i - 0.5, 0.5)` always falls inside it. Income, population and
//! infrastructure quality all increase with the tract number.

use equity_audit_tract_models::{CensusTract, CrashRecord, InfrastructureRecord};
use geo::{LineString, MultiPolygon, Polygon};

const INCOMES: [f64; 5] = [25_000.0, 40_000.0, 55_000.0, 75_000.0, 110_000.0];
const POPULATIONS: [u64; 5] = [2_400, 3_100, 3_900, 4_600, 5_200];
const MINORITY: [f64; 5] = [78.0, 64.0, 45.0, 28.0, 12.0];

fn square(min_lon: f64, min_lat: f64) -> MultiPolygon<f64> {
    let exterior = LineString::from(vec![
        (min_lon, min_lat),
        (min_lon + 1.0, min_lat),
        (min_lon + 1.0, min_lat + 1.0),
        (min_lon, min_lat + 1.0),
        (min_lon, min_lat),
    ]);
    MultiPolygon(vec![Polygon::new(exterior, vec![])])
}

#[allow(clippy::cast_precision_loss)]
pub fn sample_tracts() -> Vec<CensusTract> {
    (0..5)
        .map(|i| CensusTract {
            tract_id: format!("{:03}", i + 1),
            geometry: square(0.0, i as f64),
            total_population: POPULATIONS[i],
            median_income: INCOMES[i],
            pct_minority: MINORITY[i],
        })
        .collect()
}

pub fn tract_with_income(tract_id: &str, median_income: f64) -> CensusTract {
    CensusTract {
        tract_id: tract_id.to_string(),
        geometry: square(0.0, 0.0),
        total_population: 1_000,
        median_income,
        pct_minority: 50.0,
    }
}

fn infrastructure(
    tract_id: &str,
    score: f64,
    [crossings, bike, signals, calming]: [f64; 4],
) -> InfrastructureRecord {
    InfrastructureRecord {
        tract_id: tract_id.to_string(),
        osm_infrastructure_score: score,
        crossings_density: crossings,
        bike_infra_density: bike,
        signals_density: signals,
        speed_calming_density: calming,
    }
}

pub fn sample_infrastructure() -> Vec<InfrastructureRecord> {
    vec![
        infrastructure("001", 0.15, [0.5, 0.0, 0.2, 0.0]),
        infrastructure("002", 0.30, [1.2, 0.4, 0.8, 0.3]),
        infrastructure("003", 0.45, [2.0, 1.1, 0.6, 0.9]),
        infrastructure("004", 0.60, [0.9, 2.2, 1.8, 1.0]),
        infrastructure("005", 0.85, [5.0, 3.0, 3.5, 1.5]),
    ]
}

/// Center point `(lat, lon)` of tract `00n` (1-based).
pub fn tract_center(n: usize) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let lat = n as f64 - 0.5;
    (lat, 0.5)
}

pub fn crash_at(year: i32, (latitude, longitude): (f64, f64)) -> CrashRecord {
    CrashRecord {
        date: None,
        year,
        latitude,
        longitude,
    }
}
