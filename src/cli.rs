// src/cli.rs
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{ self, WrapErr };

use crate::config::consts::{ DEFAULT_REPORT, DEFAULT_ROOT, DEFAULT_SOURCE, DIR_PREFIX, WORKERS };
use crate::config::options::{ Mode, Scope, SiteLayout, SyncOptions };
use crate::core::{ PlaceKey, PlaceSlug };
use crate::progress::Progress;
use crate::runner;

#[derive(Parser, Debug)]
#[command(
    name = "storage_sync",
    about = "Sync region/city listing pages of a static self-storage site with the facility table",
    version
)]
pub struct Args {
    /// Site root holding the region directories
    #[arg(long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Facility table (CSV with a header row)
    #[arg(long, default_value = DEFAULT_SOURCE)]
    pub source: PathBuf,

    /// Only this region
    #[arg(long, value_parser = parse_region, conflicts_with = "city")]
    pub region: Option<PlaceSlug>,

    /// Only this city, as `region/city`
    #[arg(long, value_parser = parse_city)]
    pub city: Option<PlaceKey>,

    /// Plan and report, write nothing
    #[arg(long, conflicts_with = "verify")]
    pub dry_run: bool,

    /// Read-only check of the pages on disk
    #[arg(long)]
    pub verify: bool,

    /// Worker threads for page writes
    #[arg(long, default_value_t = WORKERS, value_parser = clap::value_parser!(usize))]
    pub threads: usize,

    /// Where the JSON report goes
    #[arg(long, default_value = DEFAULT_REPORT)]
    pub report: PathBuf,

    /// Directory name prefix for region and city folders
    #[arg(long, default_value = DIR_PREFIX)]
    pub prefix: String,

    /// Also write a debug log here
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Debug output on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_region(raw: &str) -> Result<PlaceSlug, String> {
    PlaceSlug::from_raw(raw).ok_or_else(|| format!("{raw:?} is not a usable region name"))
}

fn parse_city(raw: &str) -> Result<PlaceKey, String> {
    PlaceKey::parse_pair(raw).ok_or_else(|| format!("{raw:?} is not a `region/city` pair"))
}

impl Args {
    pub fn to_options(&self) -> SyncOptions {
        let scope = match (&self.region, &self.city) {
            (_, Some(key)) => Scope::City(key.clone()),
            (Some(region), None) => Scope::Region(region.clone()),
            (None, None) => Scope::All,
        };
        let mode = if self.verify {
            Mode::Verify
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Update
        };
        SyncOptions {
            layout: SiteLayout::new(&self.root, self.prefix.clone()),
            source: self.source.clone(),
            scope,
            mode,
            threads: self.threads.max(1),
            report: self.report.clone(),
        }
    }
}

/// Announces the batch and prints each failed write to stderr.
struct ConsoleProgress {
    total: usize,
    done: usize,
}

impl Progress for ConsoleProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        if total > 0 {
            eprintln!("Applying {total} page update(s)...");
        }
    }

    fn log(&mut self, msg: &str) {
        log::debug!("{msg}");
    }

    fn item_done(&mut self, _what: &str) {
        self.done += 1;
    }

    fn item_failed(&mut self, what: &str, reason: &str) {
        self.done += 1;
        eprintln!("  [{}/{}] FAILED {what}: {reason}", self.done, self.total);
    }
}

/// Parse arguments, run, write the report, print the summary.
/// Fatal errors come back as `Err`; per-page failures do not.
pub fn run() -> eyre::Result<()> {
    let args = Args::parse();
    crate::log::init(args.verbose, args.log_file.as_deref())
        .wrap_err("could not open log file")?;

    let opts = args.to_options();
    let mut progress = ConsoleProgress { total: 0, done: 0 };
    let outcome = runner::run(&opts, Some(&mut progress))?;

    let written = match outcome.report.write(&opts.report) {
        Ok(()) => Some(opts.report.as_path()),
        Err(e) => {
            log::error!("{e}");
            None
        }
    };
    println!("{}", outcome.report.summary(written));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_full_update() {
        let args = Args::try_parse_from(["storage_sync"]).expect("parse");
        let opts = args.to_options();
        assert_eq!(opts.mode, Mode::Update);
        assert_eq!(opts.scope, Scope::All);
        assert_eq!(opts.threads, WORKERS);
        assert_eq!(opts.layout, SiteLayout::default());
    }

    #[test]
    fn city_scope_is_normalized() {
        let args = Args::try_parse_from(["storage_sync", "--city", "Devon/Exeter", "--dry-run"]).expect("parse");
        let opts = args.to_options();
        assert_eq!(opts.mode, Mode::DryRun);
        assert_eq!(opts.scope, Scope::City(PlaceKey::parse_pair("devon/exeter").expect("key")));
    }

    #[test]
    fn region_and_city_conflict() {
        assert!(Args::try_parse_from(["storage_sync", "--region", "devon", "--city", "devon/exeter"]).is_err());
        assert!(Args::try_parse_from(["storage_sync", "--region", "!!"]).is_err());
    }

    #[test]
    fn zero_threads_becomes_one() {
        let args = Args::try_parse_from(["storage_sync", "--threads", "0", "--verify"]).expect("parse");
        let opts = args.to_options();
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.mode, Mode::Verify);
    }
}
