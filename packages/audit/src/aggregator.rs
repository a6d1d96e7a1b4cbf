//! Crash attribution and per-tract, per-year counting.

use std::collections::{BTreeMap, BTreeSet};

use equity_audit_models::CrashAggregate;
use equity_audit_tract_models::CrashRecord;

use crate::tracts::TractTable;

/// Per-tract crash counts produced by [`CrashAggregator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrashAggregateTable {
    /// One row per (tract, year), sorted by tract id then year.
    pub rows: Vec<CrashAggregate>,
    /// Years with at least one crash attributed to a tract.
    pub observed_years: BTreeSet<i32>,
    /// Records dropped because their year is not an analysis year.
    pub excluded_out_of_years: usize,
    /// Records dropped because no tract contains their location.
    pub excluded_unresolved: usize,
    /// Source rows that could not be parsed at all.
    pub malformed_rows: usize,
}

impl CrashAggregateTable {
    /// Crash count for a tract in a year, or `None` if the table has no
    /// such row.
    #[must_use]
    pub fn count(&self, tract_id: &str, year: i32) -> Option<u64> {
        self.rows
            .binary_search_by(|row| {
                (row.tract_id.as_str(), row.year).cmp(&(tract_id, Some(year)))
            })
            .ok()
            .map(|i| self.rows[i].crash_count)
    }

    /// Rows for a single year.
    pub fn rows_for_year(&self, year: i32) -> impl Iterator<Item = &CrashAggregate> {
        self.rows.iter().filter(move |row| row.year == Some(year))
    }

    /// Total crashes across all rows.
    #[must_use]
    pub fn total_crashes(&self) -> u64 {
        self.rows.iter().map(|row| row.crash_count).sum()
    }

    /// Collapses years into one row per tract with `year: None`.
    #[must_use]
    pub fn totals_by_tract(&self) -> Vec<CrashAggregate> {
        let mut totals: Vec<CrashAggregate> = Vec::new();

        for row in &self.rows {
            match totals.last_mut() {
                Some(last) if last.tract_id == row.tract_id => {
                    last.crash_count += row.crash_count;
                }
                _ => totals.push(CrashAggregate {
                    tract_id: row.tract_id.clone(),
                    year: None,
                    crash_count: row.crash_count,
                    income_quintile: row.income_quintile,
                }),
            }
        }

        totals
    }
}

/// Attributes crash points to tracts and counts them per analysis year.
pub struct CrashAggregator<'a> {
    tracts: &'a TractTable,
    analysis_years: BTreeSet<i32>,
}

impl<'a> CrashAggregator<'a> {
    /// Creates an aggregator over a tract table for the given years.
    #[must_use]
    pub fn new(tracts: &'a TractTable, analysis_years: &[i32]) -> Self {
        Self {
            tracts,
            analysis_years: analysis_years.iter().copied().collect(),
        }
    }

    /// Resolves and counts crash records.
    ///
    /// Records outside the analysis years or outside every tract polygon
    /// are excluded and counted on the returned table. Every tract in
    /// `base_tracts` gets a row for every analysis year, with a zero count
    /// where nothing was observed; tracts not listed there appear only if
    /// at least one crash resolved to them.
    #[must_use]
    pub fn aggregate(&self, records: &[CrashRecord], base_tracts: &[&str]) -> CrashAggregateTable {
        let mut counts: BTreeMap<(String, i32), u64> = BTreeMap::new();
        let mut table = CrashAggregateTable::default();

        for record in records {
            if !self.analysis_years.contains(&record.year) {
                table.excluded_out_of_years += 1;
                continue;
            }
            let Some(tract_id) = self.tracts.resolve(record.latitude, record.longitude) else {
                table.excluded_unresolved += 1;
                continue;
            };

            *counts.entry((tract_id.to_string(), record.year)).or_insert(0) += 1;
            table.observed_years.insert(record.year);
        }

        for tract_id in base_tracts {
            if self.tracts.get(tract_id).is_none() {
                log::warn!("Base tract {tract_id} is not in the tract table, skipping");
                continue;
            }
            for year in &self.analysis_years {
                counts.entry(((*tract_id).to_string(), *year)).or_insert(0);
            }
        }

        table.rows = counts
            .into_iter()
            .filter_map(|((tract_id, year), crash_count)| {
                let profile = self.tracts.get(&tract_id)?;
                Some(CrashAggregate {
                    tract_id,
                    year: Some(year),
                    crash_count,
                    income_quintile: profile.income_quintile,
                })
            })
            .collect();

        if table.excluded_unresolved > 0 {
            log::warn!(
                "Excluded {} crashes outside every tract polygon",
                table.excluded_unresolved
            );
        }
        if table.excluded_out_of_years > 0 {
            log::info!(
                "Excluded {} crashes outside the analysis years",
                table.excluded_out_of_years
            );
        }
        log::info!(
            "Aggregated {} crashes into {} tract-year rows",
            table.total_crashes(),
            table.rows.len()
        );

        table
    }
}
