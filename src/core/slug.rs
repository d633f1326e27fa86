// src/core/slug.rs
//! Place-name slugs.
//!
//! A slug is the only identity a region or city has inside the sync: two raw
//! names that normalize to the same slug are the same place. Directory names
//! and summary-card links are derived from slugs, never from raw names.

use std::fmt;

use super::sanitize::strip_format_controls;

pub const SEP: char = '-';

/// Canonicalize a free-text place name.
///
/// Lowercase, drop bidi/format controls, cut at the first comma (county
/// suffixes go), collapse every run of non-`[a-z0-9]` into one `-`, trim
/// `-` at both ends. Total and idempotent; an empty result means the name
/// is unresolvable.
pub fn normalize(raw: &str) -> String {
    let cleaned = strip_format_controls(raw);
    let head = cleaned.split(',').next().unwrap_or_default();

    let mut out = String::with_capacity(head.len());
    let mut pending_sep = false;
    for ch in head.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(SEP);
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Title-case a slug for display ("stoke-on-trent" -> "Stoke On Trent").
pub fn display_name(slug: &str) -> String {
    slug.split(SEP)
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + cs.as_str(),
                None => s!(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A normalized, non-empty region or city identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceSlug(String);

impl PlaceSlug {
    /// `None` when the raw name normalizes to nothing.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let slug = normalize(raw);
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `(region, city)` pair, displayed as `region/city`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceKey {
    pub region: PlaceSlug,
    pub city: PlaceSlug,
}

impl PlaceKey {
    pub fn new(region: PlaceSlug, city: PlaceSlug) -> Self {
        Self { region, city }
    }

    pub fn from_raw(region: &str, city: &str) -> Option<Self> {
        Some(Self::new(PlaceSlug::from_raw(region)?, PlaceSlug::from_raw(city)?))
    }

    /// Parse a `region/city` pair as typed on the command line.
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (region, city) = pair.split_once('/')?;
        Self::from_raw(region, city)
    }
}

impl fmt::Display for PlaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.city)
    }
}
