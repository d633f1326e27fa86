// src/model.rs
//
// Typed value model of the site. Nothing here knows about HTML; the page
// repository parses into and renders out of these types.

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexSet;

use crate::core::{ PlaceKey, PlaceSlug };

/// One facility as it appears in the source table. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacilityRecord {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub description: String,
    pub features: IndexSet<String>,
}

/// A facility as rendered on a city page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacilityCard {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub description: String,
    pub features: Vec<String>,
}

impl FacilityCard {
    /// Display form of a record: phone regrouped, website given a scheme.
    pub fn from_record(r: &FacilityRecord) -> Self {
        Self {
            name: r.name.clone(),
            address: r.address.clone(),
            phone: format_phone(&r.phone),
            website: format_website(&r.website),
            description: r.description.clone(),
            features: r.features.iter().cloned().collect(),
        }
    }

    /// The fields a listing is compared on.
    pub fn identity(&self) -> (&str, &str, &str, &str) {
        (&self.name, &self.address, &self.phone, &self.website)
    }
}

/// True when both lists show the same facilities in the same order.
pub fn same_listing(a: &[FacilityCard], b: &[FacilityCard]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identity() == y.identity())
}

/// Keep digits only; 10 digits group 3-3-4, 11 digits group 4-3-4.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => format!("{} {} {}", &digits[..3], &digits[3..6], &digits[6..]),
        11 => format!("{} {} {}", &digits[..4], &digits[4..7], &digits[7..]),
        _ => digits,
    }
}

pub fn format_website(raw: &str) -> String {
    let w = raw.trim();
    if w.is_empty() || scheme_len(w).is_some() { s!(w) } else { format!("https://{w}") }
}

/// Link text shown for a website (scheme dropped).
pub fn website_label(url: &str) -> &str {
    scheme_len(url).map_or(url, |n| &url[n..])
}

/// Byte length of a leading `http://` or `https://`, any case.
fn scheme_len(url: &str) -> Option<usize> {
    ["https://", "http://"].iter().find_map(|scheme| {
        url.get(..scheme.len())
            .filter(|head| head.eq_ignore_ascii_case(scheme))
            .map(|_| scheme.len())
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CityPage {
    pub key: PlaceKey,
    pub path: PathBuf,
    /// The listing block, in page order.
    pub cards: Vec<FacilityCard>,
}

/// A region page's card for one child city.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitySummaryCard {
    pub city: PlaceSlug,
    pub display_name: String,
    /// `None` when the count text could not be read.
    pub count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionPage {
    pub region: PlaceSlug,
    pub path: PathBuf,
    pub summaries: Vec<CitySummaryCard>,
}

impl RegionPage {
    pub fn summary(&self, city: &PlaceSlug) -> Option<&CitySummaryCard> {
        self.summaries.iter().find(|c| &c.city == city)
    }
}

/// A region's card on the all-regions index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionCountCard {
    pub region: PlaceSlug,
    pub display_name: String,
    /// City count shown; `None` when the card shows something else.
    pub count: Option<usize>,
}

/// `<prefix>regions/index.html`: one card per region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionsIndexPage {
    pub path: PathBuf,
    pub summaries: Vec<RegionCountCard>,
}

/// A page that exists on disk, found by directory discovery.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageRef {
    Region(PlaceSlug),
    City(PlaceKey),
    RegionsIndex,
}

/// Read-only state of the page tree handed to the reconciler.
#[derive(Clone, Debug, Default)]
pub struct PageSnapshot {
    pub cities: HashMap<PlaceKey, CityPage>,
    pub regions: HashMap<PlaceSlug, RegionPage>,
    pub regions_index: Option<RegionsIndexPage>,
    /// City pages on disk per region directory, for regions in scope.
    pub city_pages: HashMap<PlaceSlug, usize>,
    /// Pages that exist but could not be read or parsed.
    pub unreadable: Vec<UnreadablePage>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnreadablePage {
    pub page: PageRef,
    pub path: PathBuf,
    pub reason: String,
}

impl PageSnapshot {
    pub fn city(&self, key: &PlaceKey) -> Option<&CityPage> {
        self.cities.get(key)
    }

    pub fn region(&self, region: &PlaceSlug) -> Option<&RegionPage> {
        self.regions.get(region)
    }

    pub fn unreadable(&self, page: &PageRef) -> Option<&UnreadablePage> {
        self.unreadable.iter().find(|u| &u.page == page)
    }
}
