// src/pages/mod.rs
//! # Page repository
//!
//! All reads and writes of the generated site go through `PageRepository`.
//! Callers see typed pages (`CityPage`, `RegionPage`, `RegionsIndexPage`);
//! the HTML is owned by `codec` and never inspected elsewhere.
//!
//! ## Write discipline
//! - Every mutation is read-modify-write of one whole file, committed by
//!   writing a temp file in the same directory and renaming it over the page.
//!   A failed write leaves the old page intact.
//! - Read-only page files are refused rather than replaced.
//! - The repository does not lock; the batch runner guarantees one writer
//!   per page by partitioning work.

pub mod codec;

use std::fs;
use std::io::{ self, Write };
use std::path::{ Path, PathBuf };

use log::{ debug, warn };

use crate::config::consts::{ REGIONS_INDEX_SLUG, RESERVED_SLUGS };
use crate::config::options::{ Scope, SiteLayout };
use crate::core::{ PlaceKey, PlaceSlug };
use crate::error::{ Result, SyncError };
use crate::model::{
    CityPage, FacilityCard, PageRef, PageSnapshot, RegionPage, RegionsIndexPage, UnreadablePage,
};
use crate::source::RecordStore;

pub trait PageRepository: Send + Sync {
    fn find_city_page(&self, key: &PlaceKey) -> Result<Option<CityPage>>;
    fn find_region_page(&self, region: &PlaceSlug) -> Result<Option<RegionPage>>;

    /// Replace the whole listing block of a city page. Atomic.
    fn replace_listing_block(&self, key: &PlaceKey, cards: &[FacilityCard]) -> Result<()>;

    /// Set one summary card's count on a region page. Returns `false`
    /// without writing when the card already shows `count`.
    fn update_summary_card(
        &self,
        region: &PlaceSlug,
        city: &PlaceSlug,
        display_name: &str,
        count: usize,
    ) -> Result<bool>;

    /// The all-regions index, if the site has one.
    fn find_regions_index(&self) -> Result<Option<RegionsIndexPage>>;

    /// Set a region's city count on the regions index. Returns `false`
    /// without writing when the card already shows `count`.
    fn update_region_count(&self, region: &PlaceSlug, count: usize) -> Result<bool>;

    /// Pages present on disk within `scope`, sorted.
    fn discover(&self, scope: &Scope) -> Result<Vec<PageRef>>;

    /// Placeholder phrases visible on a page.
    fn placeholder_hits(&self, page: &PageRef) -> Result<Vec<String>>;

    /// Whether a city page has a listing container on disk.
    fn has_listing_container(&self, key: &PlaceKey) -> Result<bool>;

    fn page_path(&self, page: &PageRef) -> PathBuf;
}

/// Page tree rooted at a directory, laid out per `SiteLayout`.
pub struct FsPageRepository {
    layout: SiteLayout,
}

impl FsPageRepository {
    pub fn new(layout: SiteLayout) -> Result<Self> {
        if !layout.root.is_dir() {
            return Err(SyncError::RootMissing(layout.root.clone()));
        }
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    fn read_existing(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }

    fn read_required(path: &Path) -> Result<String> {
        Self::read_existing(path)?.ok_or_else(|| {
            SyncError::io(path, io::Error::new(io::ErrorKind::NotFound, "page does not exist"))
        })
    }
}

impl PageRepository for FsPageRepository {
    fn find_city_page(&self, key: &PlaceKey) -> Result<Option<CityPage>> {
        let path = self.layout.city_page(key);
        let Some(doc) = Self::read_existing(&path)? else { return Ok(None) };
        let cards = codec::parse_listing(&doc, &path)?;
        Ok(Some(CityPage { key: key.clone(), path, cards }))
    }

    fn find_region_page(&self, region: &PlaceSlug) -> Result<Option<RegionPage>> {
        let path = self.layout.region_page(region);
        let Some(doc) = Self::read_existing(&path)? else { return Ok(None) };
        let summaries = codec::parse_summaries(&doc, &self.layout, &path)?;
        Ok(Some(RegionPage { region: region.clone(), path, summaries }))
    }

    fn replace_listing_block(&self, key: &PlaceKey, cards: &[FacilityCard]) -> Result<()> {
        let path = self.layout.city_page(key);
        let doc = Self::read_required(&path)?;
        let updated = codec::replace_listing(&doc, cards, &path)?;
        if updated == doc {
            return Ok(());
        }
        write_atomic(&path, &updated)?;
        debug!("{}: listing replaced ({} cards)", path.display(), cards.len());
        Ok(())
    }

    fn update_summary_card(
        &self,
        region: &PlaceSlug,
        city: &PlaceSlug,
        display_name: &str,
        count: usize,
    ) -> Result<bool> {
        let path = self.layout.region_page(region);
        let doc = Self::read_required(&path)?;
        match codec::update_summary(&doc, &self.layout, city, display_name, count, &path)? {
            Some(updated) => {
                write_atomic(&path, &updated)?;
                debug!("{}: {city} card set to {count}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_regions_index(&self) -> Result<Option<RegionsIndexPage>> {
        let path = self.layout.regions_index_page();
        let Some(doc) = Self::read_existing(&path)? else { return Ok(None) };
        let summaries = codec::parse_regions_index(&doc, &self.layout, &path)?;
        Ok(Some(RegionsIndexPage { path, summaries }))
    }

    fn update_region_count(&self, region: &PlaceSlug, count: usize) -> Result<bool> {
        let path = self.layout.regions_index_page();
        let doc = Self::read_required(&path)?;
        match codec::update_region_count(&doc, &self.layout, region, count, &path)? {
            Some(updated) => {
                write_atomic(&path, &updated)?;
                debug!("{}: {region} card set to {count} cities", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn discover(&self, scope: &Scope) -> Result<Vec<PageRef>> {
        let mut out = Vec::new();
        for (region, region_dir) in slug_dirs(&self.layout, &self.layout.root)? {
            if RESERVED_SLUGS.contains(&region.as_str()) || !scope.includes_region(&region) {
                continue;
            }
            if self.layout.region_page(&region).is_file() {
                out.push(PageRef::Region(region.clone()));
            }
            for (city, _) in slug_dirs(&self.layout, &region_dir)? {
                let key = PlaceKey::new(region.clone(), city);
                if scope.includes(&key) && self.layout.city_page(&key).is_file() {
                    out.push(PageRef::City(key));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn placeholder_hits(&self, page: &PageRef) -> Result<Vec<String>> {
        let doc = Self::read_required(&self.page_path(page))?;
        Ok(codec::placeholder_hits(&doc))
    }

    fn has_listing_container(&self, key: &PlaceKey) -> Result<bool> {
        let doc = Self::read_required(&self.layout.city_page(key))?;
        Ok(codec::has_listing(&doc))
    }

    fn page_path(&self, page: &PageRef) -> PathBuf {
        match page {
            PageRef::Region(r) => self.layout.region_page(r),
            PageRef::City(k) => self.layout.city_page(k),
            PageRef::RegionsIndex => self.layout.regions_index_page(),
        }
    }
}

/// Subdirectories of `dir` whose names follow `<prefix><slug>`.
fn slug_dirs(layout: &SiteLayout, dir: &Path) -> Result<Vec<(PlaceSlug, PathBuf)>> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if let Some(slug) = layout.slug_from_dir(name) {
            out.push((slug, path));
        }
    }
    Ok(out)
}

/// Replace `path` with `contents` via a sibling temp file and rename.
/// Keeps the original file's permissions; refuses read-only targets.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let existing = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(SyncError::io(path, e)),
    };
    if existing.as_ref().is_some_and(fs::Permissions::readonly) {
        return Err(SyncError::io(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "file is read-only"),
        ));
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SyncError::io(dir, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| SyncError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| SyncError::io(tmp.path(), e))?;
    if let Some(perms) = existing {
        fs::set_permissions(tmp.path(), perms).map_err(|e| SyncError::io(tmp.path(), e))?;
    }
    tmp.persist(path).map_err(|e| SyncError::io(path, e.error))?;
    Ok(())
}

/// Load every page the reconciler needs for `store`: the city pages it
/// names, their region pages, the sibling city pages those region pages
/// link to, and the regions index with the city-page count of each region
/// in `scope`. Unreadable pages are recorded, not fatal.
pub fn snapshot(repo: &dyn PageRepository, store: &RecordStore, scope: &Scope) -> PageSnapshot {
    let mut snap = PageSnapshot::default();

    let load_city = |snap: &mut PageSnapshot, key: &PlaceKey| {
        if snap.cities.contains_key(key) || snap.unreadable(&PageRef::City(key.clone())).is_some() {
            return;
        }
        match repo.find_city_page(key) {
            Ok(Some(page)) => {
                snap.cities.insert(key.clone(), page);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{key}: {e}");
                let page = PageRef::City(key.clone());
                let path = repo.page_path(&page);
                snap.unreadable.push(UnreadablePage { page, path, reason: e.to_string() });
            }
        }
    };

    for key in store.cities.keys() {
        load_city(&mut snap, key);
    }

    for region in store.regions() {
        match repo.find_region_page(&region) {
            Ok(Some(page)) => {
                for card in &page.summaries {
                    load_city(&mut snap, &PlaceKey::new(region.clone(), card.city.clone()));
                }
                snap.regions.insert(region, page);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{region}: {e}");
                let page = PageRef::Region(region);
                let path = repo.page_path(&page);
                snap.unreadable.push(UnreadablePage { page, path, reason: e.to_string() });
            }
        }
    }

    match repo.find_regions_index() {
        Ok(Some(index)) => {
            // Counted over whole regions, even when `scope` names one city.
            match repo.discover(&Scope::All) {
                Ok(tree) => {
                    for page in tree {
                        match page {
                            PageRef::Region(r) if scope.includes_region(&r) => {
                                snap.city_pages.entry(r).or_insert(0);
                            }
                            PageRef::City(k) if scope.includes_region(&k.region) => {
                                *snap.city_pages.entry(k.region).or_insert(0) += 1;
                            }
                            _ => {}
                        }
                    }
                    snap.regions_index = Some(index);
                }
                Err(e) => warn!("regions index skipped: {e}"),
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!("{REGIONS_INDEX_SLUG}: {e}");
            let page = PageRef::RegionsIndex;
            let path = repo.page_path(&page);
            snap.unreadable.push(UnreadablePage { page, path, reason: e.to_string() });
        }
    }
    snap
}
