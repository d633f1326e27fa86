// src/reconcile.rs
//! Listing reconciler.
//!
//! Pure function from (records, page snapshot) to the page writes that make
//! the site match the records. No I/O. Running it again on the post-write
//! state yields no writes.
//!
//! Rules:
//! - A city's target listing is its records in source order, first
//!   occurrence winning when two rows share a normalized name.
//! - A listing is rewritten only when the `(name, address, phone, website)`
//!   sequence differs; the whole block is replaced, never patched.
//! - Each region page touched gets its summary counts recomputed for every
//!   child it can see: record-backed cities use their target count, other
//!   cities with a page on disk use that page's current card count.
//! - The all-regions index shows, per region, how many city pages exist on
//!   disk. Regions with none are left as they are.

use std::collections::HashSet;
use std::fmt;
use std::path::{ Path, PathBuf };

use indexmap::IndexMap;

use crate::config::consts::REGIONS_INDEX_SLUG;
use crate::core::sanitize::clean_cell;
use crate::core::{ slug, PlaceKey, PlaceSlug };
use crate::model::{ same_listing, FacilityCard, PageRef, PageSnapshot };
use crate::source::{ CityRecords, RecordStore };

/// One mutation of one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageWrite {
    ListingReplace {
        key: PlaceKey,
        path: PathBuf,
        cards: Vec<FacilityCard>,
        previous: usize,
    },
    SummaryUpdate {
        region: PlaceSlug,
        path: PathBuf,
        city: PlaceSlug,
        display_name: String,
        count: usize,
        /// `None` when the card is missing or its count unreadable.
        previous: Option<usize>,
    },
    /// A region's "N Cities" card on the all-regions index.
    RegionCountUpdate {
        region: PlaceSlug,
        path: PathBuf,
        count: usize,
        previous: Option<usize>,
    },
}

impl PageWrite {
    /// The file this write targets. Writes sharing a path must not overlap.
    pub fn path(&self) -> &Path {
        match self {
            PageWrite::ListingReplace { path, .. }
            | PageWrite::SummaryUpdate { path, .. }
            | PageWrite::RegionCountUpdate { path, .. } => path,
        }
    }

    pub fn page(&self) -> PageRef {
        match self {
            PageWrite::ListingReplace { key, .. } => PageRef::City(key.clone()),
            PageWrite::SummaryUpdate { region, .. } => PageRef::Region(region.clone()),
            PageWrite::RegionCountUpdate { .. } => PageRef::RegionsIndex,
        }
    }

    /// `region/city` the write is about; `regions/<region>` for index cards.
    pub fn city_key(&self) -> String {
        match self {
            PageWrite::ListingReplace { key, .. } => key.to_string(),
            PageWrite::SummaryUpdate { region, city, .. } => format!("{region}/{city}"),
            PageWrite::RegionCountUpdate { region, .. } => format!("{REGIONS_INDEX_SLUG}/{region}"),
        }
    }
}

impl fmt::Display for PageWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageWrite::ListingReplace { key, cards, previous, .. } => {
                write!(f, "{key}: listing {previous} -> {} facilities", cards.len())
            }
            PageWrite::SummaryUpdate { region, city, count, previous, .. } => match previous {
                Some(p) => write!(f, "{region}: {city} card {p} -> {count}"),
                None => write!(f, "{region}: {city} card set to {count}"),
            },
            PageWrite::RegionCountUpdate { region, count, previous, .. } => match previous {
                Some(p) => write!(f, "{REGIONS_INDEX_SLUG}: {region} card {p} -> {count} cities"),
                None => write!(f, "{REGIONS_INDEX_SLUG}: {region} card set to {count} cities"),
            },
        }
    }
}

/// Recovered conditions found while planning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// Records name a place with no page to hold them.
    UnresolvedPlace { place: String, reason: String },
    /// A later row collapsed onto an earlier one and was dropped.
    DuplicateRecord { key: PlaceKey, name: String },
    /// A page exists but could not be read.
    UnreadablePage { place: String, path: PathBuf, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedPlace { place, reason } => write!(f, "{place}: {reason}"),
            Diagnostic::DuplicateRecord { key, name } => write!(f, "{key}: duplicate record {name:?} dropped"),
            Diagnostic::UnreadablePage { place, path, reason } => {
                write!(f, "{place}: unreadable page {}: {reason}", path.display())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CityOutcome {
    /// Listing differs; a `ListingReplace` was planned.
    Changed,
    Unchanged,
    /// No city page on disk.
    Unresolved,
    /// City page exists but could not be parsed.
    Unreadable,
}

/// Planning result for one record-backed city.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CityPlan {
    pub key: PlaceKey,
    pub outcome: CityOutcome,
    /// Facilities the page will hold after the write.
    pub facility_count: usize,
    pub duplicates: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub writes: Vec<PageWrite>,
    pub diagnostics: Vec<Diagnostic>,
    /// One entry per city in the records, in source order.
    pub cities: Vec<CityPlan>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.count_diagnostics(|d| matches!(d, Diagnostic::DuplicateRecord { .. }))
    }

    pub fn unresolved_count(&self) -> usize {
        self.count_diagnostics(|d| matches!(d, Diagnostic::UnresolvedPlace { .. }))
    }

    fn count_diagnostics(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| pred(d)).count()
    }
}

/// Identity of a facility name within one city: case and punctuation fold
/// away, commas do not cut (branch suffixes like ", Sowton" are distinct).
pub fn facility_key(name: &str) -> String {
    let cleaned = clean_cell(name);
    let mut out = String::with_capacity(cleaned.len());
    let mut pending_sep = false;
    for ch in cleaned.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(' ');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() { cleaned.to_lowercase() } else { out }
}

/// Target cards for one city: source order, first occurrence wins.
pub fn target_cards(city: &CityRecords) -> (Vec<FacilityCard>, Vec<String>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut cards = Vec::with_capacity(city.records.len());
    let mut dropped = Vec::new();
    for r in &city.records {
        if seen.insert(facility_key(&r.name)) {
            cards.push(FacilityCard::from_record(r));
        } else {
            dropped.push(r.name.clone());
        }
    }
    (cards, dropped)
}

pub fn reconcile(records: &RecordStore, pages: &PageSnapshot) -> Plan {
    let mut plan = Plan::default();

    // Resolved cities grouped by region, source order kept at both levels.
    let mut by_region: IndexMap<PlaceSlug, Vec<(PlaceKey, usize, &str)>> = IndexMap::new();

    for (key, city) in &records.cities {
        let (cards, dropped) = target_cards(city);
        for name in &dropped {
            plan.diagnostics.push(Diagnostic::DuplicateRecord { key: key.clone(), name: name.clone() });
        }

        let city_ref = PageRef::City(key.clone());
        let Some(page) = pages.city(key) else {
            let outcome = match pages.unreadable(&city_ref) {
                Some(u) => {
                    plan.diagnostics.push(Diagnostic::UnreadablePage {
                        place: key.to_string(),
                        path: u.path.clone(),
                        reason: u.reason.clone(),
                    });
                    CityOutcome::Unreadable
                }
                None => {
                    plan.diagnostics.push(Diagnostic::UnresolvedPlace {
                        place: key.to_string(),
                        reason: s!("no city page"),
                    });
                    CityOutcome::Unresolved
                }
            };
            plan.cities.push(CityPlan { key: key.clone(), outcome, facility_count: 0, duplicates: dropped.len() });
            continue;
        };

        let count = cards.len();
        let outcome = if same_listing(&page.cards, &cards) {
            CityOutcome::Unchanged
        } else {
            plan.writes.push(PageWrite::ListingReplace {
                key: key.clone(),
                path: page.path.clone(),
                cards,
                previous: page.cards.len(),
            });
            CityOutcome::Changed
        };
        plan.cities.push(CityPlan { key: key.clone(), outcome, facility_count: count, duplicates: dropped.len() });

        by_region
            .entry(key.region.clone())
            .or_default()
            .push((key.clone(), count, city.city_name.as_str()));
    }

    for (region, children) in &by_region {
        let Some(page) = pages.region(region) else {
            let region_ref = PageRef::Region(region.clone());
            plan.diagnostics.push(match pages.unreadable(&region_ref) {
                Some(u) => Diagnostic::UnreadablePage {
                    place: region.to_string(),
                    path: u.path.clone(),
                    reason: u.reason.clone(),
                },
                None => Diagnostic::UnresolvedPlace { place: region.to_string(), reason: s!("no region page") },
            });
            continue;
        };

        let mut targets: IndexMap<&PlaceSlug, (usize, String)> = IndexMap::new();
        for (key, count, city_name) in children {
            let display = page
                .summary(&key.city)
                .map(|c| c.display_name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| display_or_slug(city_name, &key.city));
            targets.insert(&key.city, (*count, display));
        }
        // Siblings without records keep the count their own page shows.
        for card in &page.summaries {
            if targets.contains_key(&card.city) {
                continue;
            }
            let key = PlaceKey::new(region.clone(), card.city.clone());
            if let Some(child) = pages.city(&key) {
                targets.insert(&card.city, (child.cards.len(), card.display_name.clone()));
            }
        }

        for (city, (count, display_name)) in targets {
            let previous = page.summary(city).and_then(|c| c.count);
            if previous == Some(count) {
                continue;
            }
            plan.writes.push(PageWrite::SummaryUpdate {
                region: region.clone(),
                path: page.path.clone(),
                city: city.clone(),
                display_name,
                count,
                previous,
            });
        }
    }

    if let Some(index) = &pages.regions_index {
        for card in &index.summaries {
            let Some(&count) = pages.city_pages.get(&card.region) else { continue };
            if count == 0 || card.count == Some(count) {
                continue;
            }
            plan.writes.push(PageWrite::RegionCountUpdate {
                region: card.region.clone(),
                path: index.path.clone(),
                count,
                previous: card.count,
            });
        }
    } else if let Some(u) = pages.unreadable(&PageRef::RegionsIndex) {
        plan.diagnostics.push(Diagnostic::UnreadablePage {
            place: s!(REGIONS_INDEX_SLUG),
            path: u.path.clone(),
            reason: u.reason.clone(),
        });
    }

    plan
}

fn display_or_slug(raw: &str, slug_: &PlaceSlug) -> String {
    if raw.trim().is_empty() { slug::display_name(slug_.as_str()) } else { s!(raw.trim()) }
}
