// src/source.rs
//! Facility record store.
//!
//! The source table (CSV today) is the system of record; pages are a derived
//! cache. Loading is all-or-nothing: a table without the required columns
//! yields `SyncError::SourceFormat` and no records at all. Individual bad
//! rows are dropped and counted.

use std::path::PathBuf;

use indexmap::{ IndexMap, IndexSet };
use log::{ debug, info, warn };

use crate::config::options::Scope;
use crate::core::sanitize::clean_cell;
use crate::core::{ PlaceKey, PlaceSlug };
use crate::error::{ Result, SyncError };
use crate::model::FacilityRecord;

/// Raw tabular data: a header row plus data rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Pluggable tabular input. Implementations only read cells; column mapping
/// and validation happen in `load`.
pub trait RecordSource {
    /// Human-readable name for logs and the report.
    fn describe(&self) -> String;
    fn read_table(&self) -> Result<Table>;
}

/// A CSV file with a header row. BOM, ragged rows and padded cells are tolerated.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_table(&self) -> Result<Table> {
        let read_err = |e: &dyn std::fmt::Display| SyncError::SourceRead {
            source_name: self.describe(),
            message: e.to_string(),
        };

        let bytes = std::fs::read(&self.path).map_err(|e| read_err(&e))?;
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(&e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| read_err(&e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Table { headers, rows })
    }
}

/// An in-memory table, for tests and non-file front ends.
pub struct TableSource {
    name: String,
    table: Table,
}

impl TableSource {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self { name: name.into(), table }
    }

    /// Build from string literals: first row is the header.
    pub fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        let mut it = rows.iter().map(|r| r.iter().map(|c| s!(*c)).collect::<Vec<_>>());
        let headers = it.next().unwrap_or_default();
        Self::new(name, Table { headers, rows: it.collect() })
    }
}

impl RecordSource for TableSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn read_table(&self) -> Result<Table> {
        Ok(self.table.clone())
    }
}

/// Records for one city, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CityRecords {
    pub key: PlaceKey,
    /// First raw spellings seen, used for display.
    pub region_name: String,
    pub city_name: String,
    pub records: Vec<FacilityRecord>,
}

/// Counters for rows that did not make it into a bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    /// Missing name or address.
    pub dropped_incomplete: usize,
    /// Region or city normalized to nothing.
    pub dropped_unresolvable: usize,
}

impl LoadStats {
    pub fn dropped(&self) -> usize {
        self.dropped_incomplete + self.dropped_unresolvable
    }
}

/// Facility records grouped by `(region, city)`, both levels in source order.
#[derive(Clone, Debug, Default)]
pub struct RecordStore {
    pub source_name: String,
    pub cities: IndexMap<PlaceKey, CityRecords>,
    pub stats: LoadStats,
}

impl RecordStore {
    pub fn get(&self, key: &PlaceKey) -> Option<&CityRecords> {
        self.cities.get(key)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.cities.values().map(|c| c.records.len()).sum()
    }

    /// Regions present in the store, in first-seen order.
    pub fn regions(&self) -> Vec<PlaceSlug> {
        let set: IndexSet<&PlaceSlug> = self.cities.keys().map(|k| &k.region).collect();
        set.into_iter().cloned().collect()
    }

    /// Narrow to the cities a scope covers.
    pub fn scoped(&self, scope: &Scope) -> Self {
        Self {
            source_name: self.source_name.clone(),
            cities: self
                .cities
                .iter()
                .filter(|(k, _)| scope.includes(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            stats: self.stats,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Column {
    Region,
    City,
    Name,
    Address,
    Phone,
    Website,
    Description,
    Features,
}

impl Column {
    const ALL: [Column; 8] = [
        Column::Region,
        Column::City,
        Column::Name,
        Column::Address,
        Column::Phone,
        Column::Website,
        Column::Description,
        Column::Features,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Region => &["region"],
            Column::City => &["city", "town"],
            Column::Name => &["name", "facility name", "facility"],
            Column::Address => &["address"],
            Column::Phone => &["phone", "telephone"],
            Column::Website => &["website", "url"],
            Column::Description => &["description"],
            Column::Features => &["features"],
        }
    }

    fn required(self) -> bool {
        matches!(self, Column::Region | Column::City | Column::Name | Column::Address)
    }

    fn label(self) -> &'static str {
        self.aliases()[0]
    }
}

/// Column index per logical column.
struct ColumnMap([Option<usize>; 8]);

impl ColumnMap {
    fn resolve(headers: &[String]) -> (Self, Vec<String>) {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| clean_cell(h).to_ascii_lowercase())
            .collect();

        let mut idx = [None; 8];
        let mut missing = Vec::new();
        for (slot, col) in idx.iter_mut().zip(Column::ALL) {
            *slot = normalized
                .iter()
                .position(|h| col.aliases().contains(&h.as_str()));
            if slot.is_none() && col.required() {
                missing.push(s!(col.label()));
            }
        }
        (Self(idx), missing)
    }

    fn cell<'a>(&self, row: &'a [String], col: Column) -> &'a str {
        self.0[col as usize]
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Load and group all records from a source.
pub fn load(source: &dyn RecordSource) -> Result<RecordStore> {
    let source_name = source.describe();
    let table = source.read_table()?;

    let (cols, missing) = ColumnMap::resolve(&table.headers);
    if !missing.is_empty() {
        return Err(SyncError::SourceFormat { source_name, missing });
    }

    let mut stats = LoadStats::default();
    let mut cities: IndexMap<PlaceKey, CityRecords> = IndexMap::new();

    for (line, row) in table.rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        stats.rows_read += 1;
        // Header is line 1 in the file.
        let line = line + 2;

        let region_raw = clean_cell(cols.cell(row, Column::Region));
        let city_raw = clean_cell(cols.cell(row, Column::City));
        let name = clean_cell(cols.cell(row, Column::Name));
        let address = clean_cell(cols.cell(row, Column::Address));

        if name.is_empty() || address.is_empty() {
            stats.dropped_incomplete += 1;
            debug!("{source_name}:{line}: dropped row without name or address");
            continue;
        }

        let Some(key) = PlaceKey::from_raw(&region_raw, &city_raw) else {
            stats.dropped_unresolvable += 1;
            warn!("{source_name}:{line}: unresolvable place {region_raw:?}/{city_raw:?}, row skipped");
            continue;
        };

        let features: IndexSet<String> = cols
            .cell(row, Column::Features)
            .split(',')
            .map(clean_cell)
            .filter(|f| !f.is_empty())
            .collect();

        let record = FacilityRecord {
            name,
            address,
            phone: clean_cell(cols.cell(row, Column::Phone)),
            website: clean_cell(cols.cell(row, Column::Website)),
            description: clean_cell(cols.cell(row, Column::Description)),
            features,
        };

        cities
            .entry(key.clone())
            .or_insert_with(|| CityRecords {
                key,
                region_name: first_segment(&region_raw),
                city_name: first_segment(&city_raw),
                records: Vec::new(),
            })
            .records
            .push(record);
    }

    if stats.dropped() > 0 {
        warn!(
            "{source_name}: dropped {} row(s) ({} incomplete, {} unresolvable)",
            stats.dropped(),
            stats.dropped_incomplete,
            stats.dropped_unresolvable
        );
    }
    let store = RecordStore { source_name, cities, stats };
    info!(
        "Loaded {} facilities for {} cities from {}",
        store.record_count(),
        store.len(),
        store.source_name
    );
    Ok(store)
}

/// "Sandy, Bedfordshire" -> "Sandy"
fn first_segment(raw: &str) -> String {
    s!(raw.split(',').next().unwrap_or_default().trim())
}
