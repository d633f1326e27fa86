// src/config/consts.rs

// Site layout
pub const DEFAULT_ROOT: &str = "website";
pub const DIR_PREFIX: &str = "selfstorage";
pub const INDEX_FILE: &str = "index.html";
// `<prefix>regions/` is the all-regions index, not a region
pub const REGIONS_INDEX_SLUG: &str = "regions";
pub const RESERVED_SLUGS: &[&str] = &[REGIONS_INDEX_SLUG];

// Source + report
pub const DEFAULT_SOURCE: &str = "master_storage_facilities.csv";
pub const DEFAULT_REPORT: &str = "update_report.json";

// Markup the pages are generated with
pub const LISTING_CLASS: &str = "storage-list";
pub const CARD_CLASS: &str = "storage-card";
pub const FEATURE_CLASS: &str = "feature-tag";
pub const SUMMARY_GRID_CLASS: &str = "city-grid";
pub const SUMMARY_CARD_CLASS: &str = "city-card";
// the regions index reuses the city-card markup for its region boxes

// Text that should never survive on a published page
pub const PLACEHOLDER_PATTERNS: &[&str] = &[
    "lorem ipsum",
    "placeholder",
    "example storage",
    "sample facility",
    "www.example.com",
];

// Concurrency
pub const WORKERS: usize = 8;
