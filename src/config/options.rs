// src/config/options.rs
use std::path::{ Path, PathBuf };

use super::consts::*;
use crate::core::{ PlaceKey, PlaceSlug };

/// Resolved configuration for one sync run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub layout: SiteLayout,
    pub source: PathBuf,
    pub scope: Scope,
    pub mode: Mode,
    pub threads: usize,
    pub report: PathBuf,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            layout: SiteLayout::default(),
            source: PathBuf::from(DEFAULT_SOURCE),
            scope: Scope::All,
            mode: Mode::Update,
            threads: WORKERS,
            report: PathBuf::from(DEFAULT_REPORT),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Reconcile and write pages.
    Update,
    /// Reconcile and report, touch nothing.
    DryRun,
    /// Read-only consistency check of what is on disk.
    Verify,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Update => "update",
            Mode::DryRun => "dry-run",
            Mode::Verify => "verify",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Region(PlaceSlug),
    City(PlaceKey),
}

impl Scope {
    pub fn includes_region(&self, region: &PlaceSlug) -> bool {
        match self {
            Scope::All => true,
            Scope::Region(r) => r == region,
            Scope::City(k) => &k.region == region,
        }
    }

    pub fn includes(&self, key: &PlaceKey) -> bool {
        match self {
            Scope::All => true,
            Scope::Region(r) => &key.region == r,
            Scope::City(k) => k == key,
        }
    }
}

/// Where pages live on disk:
///   `<root>/<prefix><region>/index.html`
///   `<root>/<prefix><region>/<prefix><city>/index.html`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteLayout {
    pub root: PathBuf,
    pub prefix: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self { root: PathBuf::from(DEFAULT_ROOT), prefix: s!(DIR_PREFIX) }
    }
}

impl SiteLayout {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { root: root.into(), prefix: prefix.into() }
    }

    pub fn dir_name(&self, slug: &PlaceSlug) -> String {
        format!("{}{}", self.prefix, slug)
    }

    /// Inverse of `dir_name`; `None` for directories outside the convention.
    pub fn slug_from_dir(&self, dir_name: &str) -> Option<PlaceSlug> {
        let rest = dir_name.strip_prefix(self.prefix.as_str())?;
        let slug = PlaceSlug::from_raw(rest)?;
        // Only accept names that are already canonical.
        (slug.as_str() == rest).then_some(slug)
    }

    pub fn region_dir(&self, region: &PlaceSlug) -> PathBuf {
        self.root.join(self.dir_name(region))
    }

    pub fn region_page(&self, region: &PlaceSlug) -> PathBuf {
        self.region_dir(region).join(INDEX_FILE)
    }

    pub fn city_page(&self, key: &PlaceKey) -> PathBuf {
        self.region_dir(&key.region)
            .join(self.dir_name(&key.city))
            .join(INDEX_FILE)
    }

    /// `<root>/<prefix>regions/index.html`
    pub fn regions_index_page(&self) -> PathBuf {
        self.root
            .join(format!("{}{REGIONS_INDEX_SLUG}", self.prefix))
            .join(INDEX_FILE)
    }

    /// Link from a region page to one of its city pages.
    pub fn city_href(&self, city: &PlaceSlug) -> String {
        format!("{}/{}", self.dir_name(city), INDEX_FILE)
    }

    /// Recover the linked slug from a card link such as
    /// `selfstorageexeter/index.html`, `./selfstorageexeter/`, an absolute
    /// `/selfstoragedevon/selfstorageexeter/index.html`, or the regions
    /// index's `../selfstoragedevon/index.html`.
    pub fn slug_from_href(&self, href: &str) -> Option<PlaceSlug> {
        let last = Path::new(href.trim())
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .filter(|p| *p != INDEX_FILE && *p != "." && *p != "..")
            .last()?;
        self.slug_from_dir(last)
    }
}
