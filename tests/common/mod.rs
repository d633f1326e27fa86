// tests/common/mod.rs
#![allow(dead_code)]

use std::fs;
use std::path::{ Path, PathBuf };

use tempfile::TempDir;

use storage_sync::config::options::{ Mode, SiteLayout, SyncOptions };
use storage_sync::core::{ PlaceKey, PlaceSlug };
use storage_sync::model::FacilityCard;
use storage_sync::pages::codec::{ count_label, render_card };
use storage_sync::pages::FsPageRepository;

pub const HEADER: &[&str] = &["Region", "City", "Name", "Address", "Phone", "Website", "Description", "Features"];

/// A throwaway site tree: `<tmp>/website/selfstorage<region>/...`.
pub struct Site {
    pub dir: TempDir,
    pub layout: SiteLayout,
}

impl Site {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("website");
        fs::create_dir_all(&root).unwrap();
        Self { layout: SiteLayout::new(root, "selfstorage"), dir }
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Region page with one summary card per `(slug, display, count text)`.
    pub fn region(&self, region: &str, cities: &[(&str, &str, &str)]) -> PathBuf {
        let mut grid = String::new();
        for (slug, display, count) in cities {
            grid.push_str(&format!(
                "    <div class=\"city-card\">\n        <h3>{display}</h3>\n        <p>{count}</p>\n        <a href=\"selfstorage{slug}/index.html\" class=\"btn\">View Storage Options</a>\n    </div>\n"
            ));
        }
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Storage in {region}</title></head>\n<body>\n<main>\n<h1>{region}</h1>\n<div class=\"city-grid\">\n{grid}</div>\n</main>\n</body>\n</html>\n"
        );
        let path = self.layout.region_page(&slug(region));
        write(&path, &html);
        path
    }

    /// The all-regions index, one card per `(slug, display, count text)`.
    pub fn regions_index(&self, regions: &[(&str, &str, &str)]) -> PathBuf {
        let mut grid = String::new();
        for (slug, display, count) in regions {
            grid.push_str(&format!(
                "    <div class=\"city-card\">\n        <h3>{display}</h3>\n        <p>{count}</p>\n        <a href=\"../selfstorage{slug}/index.html\" class=\"btn\">View Cities</a>\n    </div>\n"
            ));
        }
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<body>\n<main>\n<h1>All Regions</h1>\n<div class=\"city-grid\">\n{grid}</div>\n</main>\n</body>\n</html>\n"
        );
        let path = self.layout.regions_index_page();
        write(&path, &html);
        path
    }

    /// City page holding `cards` in its listing block.
    pub fn city(&self, region: &str, city: &str, cards: &[FacilityCard]) -> PathBuf {
        let listing: String = cards.iter().map(render_card).collect();
        self.city_raw(region, city, &format!("<div class=\"storage-list\">\n{listing}</div>\n"))
    }

    /// City page with `body` placed inside `<main>`.
    pub fn city_raw(&self, region: &str, city: &str, body: &str) -> PathBuf {
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Self Storage in {city}</title></head>\n<body>\n<header><nav>Home</nav></header>\n<main>\n<h1>Self Storage in {city}</h1>\n{body}</main>\n<footer>&copy; Storage Directory</footer>\n</body>\n</html>\n"
        );
        let path = self.layout.city_page(&key(region, city));
        write(&path, &html);
        path
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    pub fn city_path(&self, region: &str, city: &str) -> PathBuf {
        self.layout.city_page(&key(region, city))
    }

    pub fn region_path(&self, region: &str) -> PathBuf {
        self.layout.region_page(&slug(region))
    }

    pub fn repo(&self) -> FsPageRepository {
        FsPageRepository::new(self.layout.clone()).unwrap()
    }

    /// Write `rows` under the standard header as `facilities.csv`.
    pub fn csv(&self, rows: &[&[&str]]) -> PathBuf {
        let mut text = String::new();
        for row in std::iter::once(HEADER).chain(rows.iter().copied()) {
            let cells: Vec<String> = row.iter().map(|c| quote(c)).collect();
            text.push_str(&cells.join(","));
            text.push('\n');
        }
        let path = self.dir.path().join("facilities.csv");
        fs::write(&path, text).unwrap();
        path
    }

    pub fn options(&self, source: &Path, mode: Mode) -> SyncOptions {
        SyncOptions {
            layout: self.layout.clone(),
            source: source.to_path_buf(),
            mode,
            threads: 4,
            report: self.dir.path().join("report.json"),
            ..SyncOptions::default()
        }
    }
}

pub fn slug(raw: &str) -> PlaceSlug {
    PlaceSlug::from_raw(raw).unwrap()
}

pub fn key(region: &str, city: &str) -> PlaceKey {
    PlaceKey::from_raw(region, city).unwrap()
}

pub fn card(name: &str, address: &str) -> FacilityCard {
    FacilityCard {
        name: name.into(),
        address: address.into(),
        phone: String::new(),
        website: String::new(),
        description: String::new(),
        features: Vec::new(),
    }
}

/// The count text a summary card should show.
pub fn label(n: usize) -> String {
    count_label(n)
}

fn write(path: &Path, html: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, html).unwrap();
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
