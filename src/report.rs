// src/report.rs
//! Run report: one JSON document per run plus a console summary.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{ Deserialize, Serialize };

use crate::config::options::Mode;
use crate::error::Result;
use crate::pages::write_atomic;
use crate::reconcile::{ CityOutcome, Diagnostic, PageWrite, Plan };
use crate::runner::BatchReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CityStatus {
    Updated,
    Unchanged,
    /// Would change; dry run.
    Planned,
    Skipped,
    Warning,
    Error,
}

impl CityStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Updated | Self::Unchanged | Self::Planned)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityResult {
    pub city_key: String,
    pub status: CityStatus,
    pub message: String,
    pub facility_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub mode: String,
    pub source: String,
    pub cities_found: usize,
    pub cities_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub unresolved: usize,
    pub dropped_rows: usize,
    /// Seconds.
    pub elapsed_time: f64,
    pub city_results: Vec<CityResult>,
}

impl Report {
    /// Empty report stamped now; counters filled by `finalize`.
    pub fn new(mode: Mode, source: &str) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            mode: s!(mode.as_str()),
            source: s!(source),
            cities_found: 0,
            cities_processed: 0,
            success_count: 0,
            error_count: 0,
            applied: 0,
            skipped: 0,
            failed: 0,
            duplicates: 0,
            unresolved: 0,
            dropped_rows: 0,
            elapsed_time: 0.0,
            city_results: Vec::new(),
        }
    }

    /// Recompute the per-status counters from `city_results`.
    pub fn finalize(&mut self, elapsed: Duration) {
        self.cities_processed = self.city_results.len();
        self.success_count = self.city_results.iter().filter(|r| r.status.is_success()).count();
        self.error_count = self.city_results.iter().filter(|r| r.status == CityStatus::Error).count();
        self.elapsed_time = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
    }

    /// Assemble the report of an update or dry run.
    pub fn build(
        mode: Mode,
        source: &str,
        cities_found: usize,
        dropped_rows: usize,
        plan: &Plan,
        batch: &BatchReport,
        elapsed: Duration,
    ) -> Self {
        let mut results: IndexMap<String, CityResult> = IndexMap::new();

        for city in &plan.cities {
            let (status, message) = match city.outcome {
                CityOutcome::Changed => (CityStatus::Updated, s!("listing replaced")),
                CityOutcome::Unchanged => (CityStatus::Unchanged, s!()),
                CityOutcome::Unresolved => (CityStatus::Warning, s!("no city page")),
                CityOutcome::Unreadable => (CityStatus::Error, s!("city page unreadable")),
            };
            results.insert(
                city.key.to_string(),
                CityResult { city_key: city.key.to_string(), status, message, facility_count: city.facility_count },
            );
        }

        for d in &plan.diagnostics {
            if let Diagnostic::UnreadablePage { place, reason, .. } = d {
                if let Some(r) = results.get_mut(place) {
                    r.message = reason.clone();
                }
            }
        }

        // Regions-index writes only show up in the applied/skipped/failed totals.
        let mut touch = |write: &PageWrite, status: CityStatus, note: &str| {
            let key = write.city_key();
            let count = match write {
                PageWrite::ListingReplace { cards, .. } => cards.len(),
                PageWrite::SummaryUpdate { count, .. } => *count,
                PageWrite::RegionCountUpdate { .. } => return,
            };
            let entry = results.entry(key.clone()).or_insert_with(|| CityResult {
                city_key: key,
                status: CityStatus::Unchanged,
                message: s!(),
                facility_count: count,
            });
            if entry.status == CityStatus::Error {
                return;
            }
            let is_summary = matches!(write, PageWrite::SummaryUpdate { .. });
            match status {
                CityStatus::Error => {
                    entry.status = CityStatus::Error;
                    entry.message = s!(note);
                }
                CityStatus::Planned => {
                    entry.status = CityStatus::Planned;
                    append(&mut entry.message, &format!("would apply: {write}"));
                }
                CityStatus::Updated if is_summary => {
                    if entry.status == CityStatus::Unchanged {
                        entry.status = CityStatus::Updated;
                    }
                    append(&mut entry.message, "summary count updated");
                }
                _ => {}
            }
        };

        for w in &batch.applied {
            touch(w, CityStatus::Updated, "");
        }
        for (w, reason) in &batch.skipped {
            let status = if reason == "dry run" { CityStatus::Planned } else { CityStatus::Skipped };
            touch(w, status, reason);
        }
        for (w, reason) in &batch.failed {
            touch(w, CityStatus::Error, reason);
        }

        let mut report = Self::new(mode, source);
        report.cities_found = cities_found;
        report.applied = batch.applied.len();
        report.skipped = batch.skipped.len();
        report.failed = batch.failed.len();
        report.duplicates = plan.duplicate_count();
        report.unresolved = plan.unresolved_count();
        report.dropped_rows = dropped_rows;
        report.city_results = results.into_values().collect();
        report.finalize(elapsed);
        report
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report atomically, same as a page.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_json()?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::SyncError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Console summary printed at the end of every run.
    pub fn summary(&self, report_path: Option<&Path>) -> String {
        let mut out = String::new();
        out.push_str(&format!("Mode:       {}\n", self.mode));
        out.push_str(&format!("Processed:  {} cities ({} found on disk)\n", self.cities_processed, self.cities_found));
        out.push_str(&format!("Succeeded:  {}\n", self.success_count));
        out.push_str(&format!("Failed:     {}\n", self.error_count));
        out.push_str(&format!(
            "Writes:     {} applied, {} skipped, {} failed\n",
            self.applied, self.skipped, self.failed
        ));
        if self.duplicates + self.unresolved + self.dropped_rows > 0 {
            out.push_str(&format!(
                "Data:       {} duplicate(s), {} unresolved, {} dropped row(s)\n",
                self.duplicates, self.unresolved, self.dropped_rows
            ));
        }
        out.push_str(&format!("Time:       {:.2}s\n", self.elapsed_time));
        if let Some(p) = report_path {
            out.push_str(&format!("Report:     {}\n", p.display()));
        }
        out
    }
}

fn append(msg: &mut String, more: &str) {
    if !msg.is_empty() {
        msg.push_str("; ");
    }
    msg.push_str(more);
}
