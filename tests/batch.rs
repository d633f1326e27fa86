// tests/batch.rs
mod common;

use std::fs;

use common::*;

use storage_sync::config::options::Mode;
use storage_sync::pages::{ codec, write_atomic, PageRepository };
use storage_sync::progress::CountingProgress;
use storage_sync::reconcile::PageWrite;
use storage_sync::report::{ CityStatus, Report };
use storage_sync::runner::{ self, apply };
use storage_sync::SyncError;

const EXETER: &[&str] = &["Devon", "Exeter", "Acme Storage", "1 High St", "", "", "", ""];
const TOPSHAM: &[&str] = &["Devon", "Topsham", "River Store", "3 Ferry Rd", "", "", "", ""];

#[test]
fn read_only_page_fails_alone() {
    let site = Site::new();
    site.region("Devon", &[("exeter", "Exeter", "0 Storage Facilities"), ("topsham", "Topsham", "0 Storage Facilities")]);
    let exeter = site.city("Devon", "Exeter", &[]);
    let topsham = site.city("Devon", "Topsham", &[]);
    let exeter_before = site.read(&exeter);

    let mut perms = fs::metadata(&exeter).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&exeter, perms.clone()).unwrap();

    let csv = site.csv(&[EXETER, TOPSHAM]);
    let out = runner::run(&site.options(&csv, Mode::Update), None);

    perms.set_readonly(false);
    fs::set_permissions(&exeter, perms).unwrap();

    let out = out.unwrap();
    assert_eq!(out.batch.failed.len(), 1);
    assert!(matches!(&out.batch.failed[0].0, PageWrite::ListingReplace { key: k, .. } if *k == key("devon", "exeter")));
    assert_eq!(site.read(&exeter), exeter_before);
    assert!(site.read(&topsham).contains("River Store"));

    let statuses: Vec<(String, CityStatus)> =
        out.report.city_results.iter().map(|r| (r.city_key.clone(), r.status)).collect();
    assert!(statuses.contains(&("devon/exeter".into(), CityStatus::Error)));
    assert!(statuses.contains(&("devon/topsham".into(), CityStatus::Updated)));
    assert_eq!(out.report.error_count, 1);
}

#[test]
fn malformed_page_is_reported_and_siblings_continue() {
    let site = Site::new();
    site.region("Devon", &[("exeter", "Exeter", "0 Storage Facilities"), ("topsham", "Topsham", "0 Storage Facilities")]);
    // Listing container never closed.
    let exeter = site.city_raw(
        "Devon",
        "Exeter",
        "<div class=\"storage-list\">\n<div class=\"storage-card\"><h3>Old</h3></div>\n",
    );
    let topsham = site.city("Devon", "Topsham", &[]);
    let exeter_before = site.read(&exeter);
    let csv = site.csv(&[EXETER, TOPSHAM]);

    let out = runner::run(&site.options(&csv, Mode::Update), None).unwrap();

    assert_eq!(site.read(&exeter), exeter_before);
    assert!(site.read(&topsham).contains("River Store"));
    let exeter_result = out.report.city_results.iter().find(|r| r.city_key == "devon/exeter").unwrap();
    assert_eq!(exeter_result.status, CityStatus::Error);
    assert!(exeter_result.message.contains("unclosed"), "{}", exeter_result.message);
    // Region card for the broken page is left as it was.
    let region = site.repo().find_region_page(&slug("devon")).unwrap().unwrap();
    assert_eq!(region.summary(&slug("exeter")).unwrap().count, Some(0));
    assert_eq!(region.summary(&slug("topsham")).unwrap().count, Some(1));
}

#[test]
fn dry_run_touches_nothing() {
    let site = Site::new();
    let region = site.region("Devon", &[("exeter", "Exeter", "0 Storage Facilities")]);
    let exeter = site.city("Devon", "Exeter", &[]);
    let before = (site.read(&region), site.read(&exeter));
    let csv = site.csv(&[EXETER]);

    let out = runner::run(&site.options(&csv, Mode::DryRun), None).unwrap();

    assert_eq!((site.read(&region), site.read(&exeter)), before);
    assert_eq!(out.report.mode, "dry-run");
    assert_eq!(out.report.applied, 0);
    assert_eq!(out.report.skipped, out.plan.writes.len());
    assert!(out.batch.skipped.iter().all(|(_, why)| why == "dry run"));
    assert_eq!(out.report.city_results[0].status, CityStatus::Planned);
}

#[test]
fn missing_listing_container_is_created() {
    let site = Site::new();
    site.region("Devon", &[("exeter", "Exeter", "0 Storage Facilities")]);
    let exeter = site.city_raw("Devon", "Exeter", "<p>Intro text stays.</p>\n");
    let csv = site.csv(&[EXETER]);

    runner::run(&site.options(&csv, Mode::Update), None).unwrap();

    let html = site.read(&exeter);
    let intro = html.find("<p>Intro text stays.</p>").unwrap();
    let list = html.find("<div class=\"storage-list\">").unwrap();
    let main_end = html.find("</main>").unwrap();
    assert!(intro < list && list < main_end);
    assert!(html.contains("Acme Storage"));
    assert!(codec::has_listing(&html));
}

#[test]
fn page_without_main_or_body_is_malformed() {
    let doc = "<div>no container here</div>";
    let err = codec::replace_listing(doc, &[card("A", "B")], std::path::Path::new("x.html")).unwrap_err();
    assert!(matches!(err, SyncError::MalformedPage { .. }));
}

#[test]
fn many_writes_to_one_region_page_all_land() {
    let site = Site::new();
    let cities = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];
    site.region("Devon", &[]);
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (i, c) in cities.iter().enumerate() {
        site.city("Devon", c, &[]);
        for n in 0..=i {
            rows.push(vec!["Devon".into(), (*c).into(), format!("{c} Store {n}"), format!("{n} Road"), String::new(), String::new(), String::new(), String::new()]);
        }
    }
    let borrowed: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
    let refs: Vec<&[&str]> = borrowed.iter().map(Vec::as_slice).collect();
    let csv = site.csv(&refs);

    let mut opts = site.options(&csv, Mode::Update);
    opts.threads = 8;
    let out = runner::run(&opts, None).unwrap();
    assert!(out.batch.failed.is_empty());

    let region = site.repo().find_region_page(&slug("devon")).unwrap().unwrap();
    assert_eq!(region.summaries.len(), cities.len());
    for (i, c) in cities.iter().enumerate() {
        assert_eq!(region.summary(&slug(c)).unwrap().count, Some(i + 1), "{c}");
    }
}

#[test]
fn apply_reports_progress_per_write() {
    let site = Site::new();
    site.region("Devon", &[("exeter", "Exeter", "3 Storage Facilities")]);
    site.city("Devon", "Exeter", &[]);
    let repo = site.repo();

    let writes = vec![
        PageWrite::ListingReplace {
            key: key("devon", "exeter"),
            path: site.city_path("Devon", "Exeter"),
            cards: vec![card("A", "1 A St")],
            previous: 0,
        },
        PageWrite::SummaryUpdate {
            region: slug("devon"),
            path: site.region_path("Devon"),
            city: slug("exeter"),
            display_name: "Exeter".into(),
            count: 1,
            previous: Some(3),
        },
        // Nothing under that name on disk.
        PageWrite::ListingReplace {
            key: key("devon", "nowhere"),
            path: site.city_path("Devon", "Nowhere"),
            cards: vec![],
            previous: 0,
        },
    ];

    let mut progress = CountingProgress::default();
    let batch = apply(&repo, writes, false, 2, Some(&mut progress));

    assert_eq!(batch.applied.len(), 2);
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.done, 2);
    assert_eq!(progress.failed, 1);
    assert!(progress.finished);
    assert!(site.read(&site.region_path("Devon")).contains("<p>1 Storage Facility</p>"));
}

#[test]
fn report_json_shape() {
    let site = Site::new();
    site.region("Devon", &[("exeter", "Exeter", "0 Storage Facilities")]);
    site.city("Devon", "Exeter", &[]);
    let csv = site.csv(&[EXETER, &["", "", "", "", "", "", "", ""], &["Devon", "Exeter", "", "No name", "", "", "", ""]]);
    let opts = site.options(&csv, Mode::Update);

    let out = runner::run(&opts, None).unwrap();
    out.report.write(&opts.report).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&opts.report).unwrap()).unwrap();
    for field in [
        "timestamp", "mode", "source", "cities_found", "cities_processed", "success_count", "error_count",
        "applied", "skipped", "failed", "duplicates", "unresolved", "dropped_rows", "elapsed_time", "city_results",
    ] {
        assert!(raw.get(field).is_some(), "missing {field}");
    }
    assert_eq!(raw["mode"], "update");
    assert_eq!(raw["dropped_rows"], 1);
    assert_eq!(raw["city_results"][0]["status"], "updated");

    let back = Report::read(&opts.report).unwrap();
    assert_eq!(back, out.report);
}

#[test]
fn missing_root_is_fatal_and_writes_no_report() {
    let site = Site::new();
    let csv = site.csv(&[EXETER]);
    let mut opts = site.options(&csv, Mode::Update);
    opts.layout.root = site.dir.path().join("nope");

    let err = runner::run(&opts, None).unwrap_err();
    assert!(matches!(err, SyncError::RootMissing(_)));
    assert!(err.is_fatal());
    assert!(!opts.report.exists());
}

#[test]
fn atomic_write_keeps_old_contents_on_refusal() {
    let site = Site::new();
    let path = site.dir.path().join("page.html");
    fs::write(&path, "old").unwrap();
    write_atomic(&path, "new").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "new");

    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&path, perms.clone()).unwrap();
    assert!(write_atomic(&path, "newer").is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "new");

    perms.set_readonly(false);
    fs::set_permissions(&path, perms).unwrap();
}
