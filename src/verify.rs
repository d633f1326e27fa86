// src/verify.rs
//! Read-only consistency check of the page tree as it is on disk.
//!
//! Flags city pages with no listing container, no facilities, or leftover
//! placeholder text, and region summary cards whose count disagrees with the
//! child page. Never writes a page.

use std::time::Instant;

use indexmap::IndexMap;
use log::{ debug, info, warn };

use crate::config::options::{ Mode, SyncOptions };
use crate::core::PlaceKey;
use crate::error::Result;
use crate::model::PageRef;
use crate::pages::codec::count_label;
use crate::pages::PageRepository;
use crate::progress::Progress;
use crate::report::{ CityResult, CityStatus, Report };

pub fn verify(
    repo: &dyn PageRepository,
    opts: &SyncOptions,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Report> {
    let started = Instant::now();
    let found = repo.discover(&opts.scope)?;

    let city_keys: Vec<&PlaceKey> = found
        .iter()
        .filter_map(|p| match p {
            PageRef::City(k) => Some(k),
            PageRef::Region(_) | PageRef::RegionsIndex => None,
        })
        .collect();
    info!("Verifying {} city page(s)", city_keys.len());
    if let Some(p) = progress.as_deref_mut() {
        p.begin(city_keys.len());
    }

    let mut results: IndexMap<PlaceKey, (CityResult, Option<usize>)> = IndexMap::new();

    for key in &city_keys {
        let (result, count) = check_city(repo, key);
        if let Some(p) = progress.as_deref_mut() {
            match result.status {
                CityStatus::Error => p.item_failed(&result.city_key, &result.message),
                _ => p.item_done(&result.city_key),
            }
        }
        results.insert((*key).clone(), (result, count));
    }

    for page in &found {
        let PageRef::Region(region) = page else { continue };
        let region_page = match repo.find_region_page(region) {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(e) => {
                warn!("{region}: {e}");
                continue;
            }
        };

        for card in &region_page.summaries {
            let key = PlaceKey::new(region.clone(), card.city.clone());
            if !opts.scope.includes(&key) {
                continue;
            }
            match results.get_mut(&key) {
                Some((result, Some(actual))) => {
                    if card.count != Some(*actual) {
                        let shown = card.count.map_or_else(|| s!("no count"), count_label);
                        flag(result, &format!("region card shows {shown}, page has {actual}"));
                    }
                }
                // Page unreadable; already reported.
                Some(_) => {}
                None => {
                    warn!("{key}: region card links to a missing page");
                    let result = CityResult {
                        city_key: key.to_string(),
                        status: CityStatus::Warning,
                        message: s!("region card links to a missing page"),
                        facility_count: 0,
                    };
                    results.insert(key, (result, None));
                }
            }
        }

        for (key, (result, count)) in results.iter_mut() {
            if &key.region == region && count.is_some() && region_page.summary(&key.city).is_none() {
                flag(result, "missing from region page");
            }
        }
    }

    let mut report = Report::new(Mode::Verify, &opts.source.display().to_string());
    report.cities_found = city_keys.len();
    report.city_results = results.into_values().map(|(r, _)| r).collect();
    report.finalize(started.elapsed());

    if let Some(p) = progress.as_deref_mut() {
        p.finish();
    }
    Ok(report)
}

/// Check one city page. The count is `None` when the page could not be read.
fn check_city(repo: &dyn PageRepository, key: &PlaceKey) -> (CityResult, Option<usize>) {
    let mut result = CityResult {
        city_key: key.to_string(),
        status: CityStatus::Unchanged,
        message: s!(),
        facility_count: 0,
    };

    let page = match repo.find_city_page(key) {
        Ok(Some(page)) => page,
        Ok(None) => {
            result.status = CityStatus::Skipped;
            result.message = s!("page disappeared");
            return (result, None);
        }
        Err(e) => {
            warn!("{key}: {e}");
            result.status = CityStatus::Error;
            result.message = e.to_string();
            return (result, None);
        }
    };
    let count = page.cards.len();
    result.facility_count = count;

    match repo.has_listing_container(key) {
        Ok(false) => flag(&mut result, "no listing container"),
        Ok(true) if count == 0 => flag(&mut result, "no facilities"),
        Ok(true) => {}
        Err(e) => flag(&mut result, &e.to_string()),
    }
    match repo.placeholder_hits(&PageRef::City(key.clone())) {
        Ok(hits) if !hits.is_empty() => flag(&mut result, &format!("placeholder text: {}", hits.join(", "))),
        Ok(_) => {}
        Err(e) => flag(&mut result, &e.to_string()),
    }

    if result.status == CityStatus::Unchanged {
        debug!("{key}: ok ({count} facilities)");
    }
    (result, Some(count))
}

fn flag(result: &mut CityResult, issue: &str) {
    if result.status != CityStatus::Error {
        result.status = CityStatus::Warning;
    }
    if !result.message.is_empty() {
        result.message.push_str("; ");
    }
    result.message.push_str(issue);
}
