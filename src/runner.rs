// src/runner.rs
use std::{
    path::PathBuf, thread, time::Instant,
    sync::{ mpsc, atomic::{ AtomicUsize, Ordering }}
};

use indexmap::IndexMap;
use log::{ debug, error, info, warn };

use crate::{
    config::options::{ Mode, SyncOptions },
    pages::{ self, FsPageRepository, PageRepository },
    progress::Progress,
    reconcile::{ self, Plan, PageWrite },
    report::Report,
    source::{ self, CsvSource, RecordSource },
    error::Result,
    model::PageRef,
    verify,
};

/// What happened to each planned write.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub applied: Vec<PageWrite>,
    /// Not attempted, or found already current; with the reason.
    pub skipped: Vec<(PageWrite, String)>,
    pub failed: Vec<(PageWrite, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.failed.len()
    }
}

enum Applied {
    Written,
    Current,
}

fn apply_one(repo: &dyn PageRepository, write: &PageWrite) -> Result<Applied> {
    match write {
        PageWrite::ListingReplace { key, cards, .. } => {
            repo.replace_listing_block(key, cards)?;
            Ok(Applied::Written)
        }
        PageWrite::SummaryUpdate { region, city, display_name, count, .. } => {
            if repo.update_summary_card(region, city, display_name, *count)? {
                Ok(Applied::Written)
            } else {
                Ok(Applied::Current)
            }
        }
        PageWrite::RegionCountUpdate { region, count, .. } => {
            if repo.update_region_count(region, *count)? {
                Ok(Applied::Written)
            } else {
                Ok(Applied::Current)
            }
        }
    }
}

/// Apply `writes` with up to `threads` workers.
///
/// Writes are grouped by target file; each group runs on one worker in plan
/// order, so no page ever has two writers. A failing write is recorded and
/// its siblings carry on. With `dry_run` nothing is touched and every write
/// is reported as skipped.
pub fn apply(
    repo: &dyn PageRepository,
    writes: Vec<PageWrite>,
    dry_run: bool,
    threads: usize,
    mut progress: Option<&mut dyn Progress>,
) -> BatchReport {
    let mut report = BatchReport::default();

    if let Some(p) = progress.as_deref_mut() {
        p.begin(writes.len());
    }

    if dry_run {
        for w in writes {
            info!("[dry run] {w}");
            if let Some(p) = progress.as_deref_mut() {
                p.log(&format!("would apply {w}"));
            }
            report.skipped.push((w, s!("dry run")));
        }
        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        return report;
    }

    // Partition by page, keeping plan order inside and across partitions.
    let mut by_page: IndexMap<PathBuf, Vec<(usize, PageWrite)>> = IndexMap::new();
    for (i, w) in writes.into_iter().enumerate() {
        by_page.entry(w.path().to_path_buf()).or_default().push((i, w));
    }
    let partitions: Vec<Vec<(usize, PageWrite)>> = by_page.into_values().collect();

    type Outcome = (usize, PageWrite, std::result::Result<Applied, String>);

    let counter = AtomicUsize::new(0);
    let (res_tx, res_rx) = mpsc::channel::<Outcome>();
    let workers = threads.max(1).min(partitions.len().max(1));
    debug!("Applying {} page group(s) with {workers} worker(s)", partitions.len());

    let mut results: Vec<Outcome> = Vec::new();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = res_tx.clone();
            let parts = &partitions;
            let idx = &counter;
            scope.spawn(move || {
                loop {
                    let i = idx.fetch_add(1, Ordering::Relaxed);
                    if i >= parts.len() {
                        break;
                    }
                    for (seq, write) in &parts[i] {
                        let result = apply_one(repo, write).map_err(|e| e.to_string());
                        if tx.send((*seq, write.clone(), result)).is_err() {
                            return;
                        }
                    }
                }
            });
        }
        drop(res_tx); // main thread is sole receiver now

        for outcome in res_rx.iter() {
            let (_, write, result) = &outcome;
            match result {
                Ok(_) => {
                    debug!("{write}");
                    if let Some(p) = progress.as_deref_mut() {
                        p.item_done(&write.city_key());
                    }
                }
                Err(msg) => {
                    error!("{}: {msg}", write.path().display());
                    if let Some(p) = progress.as_deref_mut() {
                        p.item_failed(&write.city_key(), msg);
                    }
                }
            }
            results.push(outcome);
        }
    });

    results.sort_by_key(|(seq, _, _)| *seq);
    for (_, write, result) in results {
        match result {
            Ok(Applied::Written) => report.applied.push(write),
            Ok(Applied::Current) => report.skipped.push((write, s!("already current"))),
            Err(msg) => report.failed.push((write, msg)),
        }
    }

    if let Some(p) = progress.as_deref_mut() {
        p.finish();
    }
    report
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub plan: Plan,
    pub batch: BatchReport,
}

/// Top-level orchestration for one run.
///
/// Fatal conditions (missing root, unreadable or malformed source) return
/// `Err` before any page is touched; everything else ends up in the report.
/// The report itself is not written here.
pub fn run(opts: &SyncOptions, mut progress: Option<&mut dyn Progress>) -> Result<RunOutcome> {
    let started = Instant::now();
    let repo = FsPageRepository::new(opts.layout.clone())?;

    if opts.mode == Mode::Verify {
        let report = verify::verify(&repo, opts, progress)?;
        return Ok(RunOutcome { report, plan: Plan::default(), batch: BatchReport::default() });
    }

    let source = CsvSource::new(&opts.source);
    if let Some(p) = progress.as_deref_mut() {
        p.log(&format!("Loading {}", source.describe()));
    }
    let store = source::load(&source)?;
    let scoped = store.scoped(&opts.scope);
    if scoped.is_empty() {
        warn!("No records in scope {:?}", opts.scope);
    }

    let found = repo.discover(&opts.scope)?;
    let cities_found = found.iter().filter(|p| matches!(p, PageRef::City(_))).count();
    info!("Found {cities_found} city page(s) under {}", opts.layout.root.display());

    let snap = pages::snapshot(&repo, &scoped, &opts.scope);
    let plan = reconcile::reconcile(&scoped, &snap);
    for d in &plan.diagnostics {
        warn!("{d}");
    }
    info!(
        "Planned {} write(s) for {} cities ({} diagnostics)",
        plan.writes.len(),
        plan.cities.len(),
        plan.diagnostics.len()
    );

    let batch = apply(
        &repo,
        plan.writes.clone(),
        opts.mode == Mode::DryRun,
        opts.threads,
        progress,
    );

    let report = Report::build(
        opts.mode,
        &store.source_name,
        cities_found,
        store.stats.dropped(),
        &plan,
        &batch,
        started.elapsed(),
    );
    Ok(RunOutcome { report, plan, batch })
}
