// benches/reconcile.rs
use std::path::PathBuf;

use criterion::{ criterion_group, criterion_main, Criterion, black_box };

use storage_sync::{
    core::PlaceKey,
    model::{ CityPage, CitySummaryCard, FacilityCard, PageSnapshot, RegionPage },
    pages::codec,
    reconcile,
    source::{ self, TableSource },
};

const REGIONS: usize = 40;
const CITIES: usize = 25;
const PER_CITY: usize = 12;

fn sample_rows() -> Vec<Vec<String>> {
    let mut rows = vec![
        ["Region", "City", "Name", "Address", "Phone", "Website"].map(String::from).to_vec(),
    ];
    for r in 0..REGIONS {
        for c in 0..CITIES {
            for f in 0..PER_CITY {
                rows.push(vec![
                    format!("Region {r}"),
                    format!("City {r}-{c}"),
                    format!("Facility {f}"),
                    format!("{f} Main Street"),
                    format!("0139200{f:04}"),
                    format!("facility{f}.example"),
                ]);
            }
        }
    }
    rows
}

/// Pages that match the records except every third city, which is stale.
fn sample_snapshot(store: &source::RecordStore) -> PageSnapshot {
    let mut snap = PageSnapshot::default();
    for (i, (key, city)) in store.cities.iter().enumerate() {
        let mut cards: Vec<FacilityCard> = city.records.iter().map(FacilityCard::from_record).collect();
        if i % 3 == 0 {
            cards.pop();
        }
        snap.cities.insert(key.clone(), CityPage { key: key.clone(), path: PathBuf::from(key.to_string()), cards });
    }
    for region in store.regions() {
        let summaries = store
            .cities
            .keys()
            .filter(|k| k.region == region)
            .map(|k: &PlaceKey| CitySummaryCard {
                city: k.city.clone(),
                display_name: k.city.to_string(),
                count: snap.cities.get(k).map(|p| p.cards.len()),
            })
            .collect();
        snap.regions.insert(region.clone(), RegionPage { region: region.clone(), path: PathBuf::from(region.to_string()), summaries });
    }
    snap
}

fn bench_reconcile(c: &mut Criterion) {
    let rows = sample_rows();
    let refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
    let slices: Vec<&[&str]> = refs.iter().map(Vec::as_slice).collect();
    let src = TableSource::from_rows("bench", &slices);
    let store = source::load(&src).expect("load");
    let snap = sample_snapshot(&store);

    c.bench_function("load_records", |b| {
        b.iter(|| {
            let store = source::load(black_box(&src)).expect("load");
            black_box(store.len())
        })
    });

    c.bench_function("reconcile_full_site", |b| {
        b.iter(|| {
            let plan = reconcile::reconcile(black_box(&store), black_box(&snap));
            black_box(plan.writes.len())
        })
    });

    let city = store.cities.values().next().expect("city");
    let cards: Vec<FacilityCard> = city.records.iter().map(FacilityCard::from_record).collect();
    let doc = format!(
        "<html><body><main><div class=\"storage-list\">\n{}</div></main></body></html>",
        cards.iter().map(codec::render_card).collect::<String>()
    );
    let path = PathBuf::from("bench.html");

    c.bench_function("parse_listing", |b| {
        b.iter(|| {
            let parsed = codec::parse_listing(black_box(&doc), &path).expect("parse");
            black_box(parsed.len())
        })
    });
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
