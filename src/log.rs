// src/log.rs
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use log::LevelFilter;

static START: OnceLock<Instant> = OnceLock::new();

fn start() -> Instant {
    *START.get_or_init(Instant::now)
}

fn fmt_elapsed(ms: u128) -> String {
    let total_ms = ms as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Install the global logger: `[hh:mm:ss.mmm][LEVEL] msg`, time measured
/// from the first call. Info (Debug when `verbose`) goes to stderr; with
/// `log_file` every Debug line is appended there too.
///
/// Calling this twice is harmless; the second dispatcher is ignored.
pub fn init(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    start();
    let console_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                fmt_elapsed(start().elapsed().as_millis()),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Debug)
        .chain(fern::Dispatch::new().level(console_level).chain(std::io::stderr()));

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::Dispatch::new().level(LevelFilter::Debug).chain(fern::log_file(path)?));
    }

    // Already installed (e.g. several tests in one process).
    let _ = dispatch.apply();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_zero_padded() {
        assert_eq!(fmt_elapsed(0), "00:00:00.000");
        assert_eq!(fmt_elapsed(3_723_004), "01:02:03.004");
    }
}
