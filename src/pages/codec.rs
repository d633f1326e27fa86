// src/pages/codec.rs
//! HTML <-> model for the two page kinds.
//!
//! City pages carry one listing container:
//! ```html
//! <div class="storage-list">
//!   <div class="storage-card"> <h3>Name</h3> ... </div>
//! </div>
//! ```
//! Region pages carry one summary card per child city:
//! ```html
//! <div class="city-card">
//!   <h3>Exeter</h3>
//!   <p>3 Storage Facilities</p>
//!   <a href="selfstorageexeter/index.html">View Storage Options</a>
//! </div>
//! ```
//! The regions index reuses that card for each region, counting cities:
//! `<p>4 Cities</p>` and `<a href="../selfstoragedevon/index.html">`.
//! Everything else on a page is opaque and copied through byte-for-byte.

use std::path::Path;

use log::debug;

use crate::config::consts::{
    CARD_CLASS, FEATURE_CLASS, LISTING_CLASS, PLACEHOLDER_PATTERNS, SUMMARY_CARD_CLASS,
    SUMMARY_GRID_CLASS,
};
use crate::config::options::SiteLayout;
use crate::core::html::{ self, Element, Lookup };
use crate::core::sanitize::{ decode_entities, escape_html };
use crate::core::PlaceSlug;
use crate::error::{ Result, SyncError };
use crate::model::{ website_label, CitySummaryCard, FacilityCard, RegionCountCard };

/// "1 Storage Facility" / "N Storage Facilities"
pub fn count_label(n: usize) -> String {
    if n == 1 { format!("{n} Storage Facility") } else { format!("{n} Storage Facilities") }
}

/// Read a facility count back out of a summary card's text.
pub fn parse_count(text: &str) -> Option<usize> {
    if !html::to_lower(text).contains("storage") {
        return None;
    }
    leading_number(text)
}

/// "1 City" / "N Cities"
pub fn city_count_label(n: usize) -> String {
    if n == 1 { format!("{n} City") } else { format!("{n} Cities") }
}

/// Read a city count out of a regions-index card. Cards still showing a
/// facility count read as `None`.
pub fn parse_city_count(text: &str) -> Option<usize> {
    let lower = html::to_lower(text);
    if !lower.contains("city") && !lower.contains("cities") {
        return None;
    }
    leading_number(text)
}

fn leading_number(text: &str) -> Option<usize> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/* ---------------- Containers ---------------- */

/// Locate the element with `class`, inserting an empty one before `</main>`
/// (or `</body>`) when the page has none. Returns the possibly-updated
/// document and the container's position in it.
pub fn ensure_container(doc: &str, class: &str, path: &Path) -> Result<(String, Element)> {
    match html::find_by_class(doc, class, 0) {
        Lookup::Found(el) => Ok((s!(doc), el)),
        Lookup::Unclosed(at) => Err(SyncError::malformed(
            path,
            format!("unclosed .{class} element at byte {at}"),
        )),
        Lookup::Missing => {
            let at = html::find_closing(doc, "main")
                .or_else(|| html::find_closing(doc, "body"))
                .ok_or_else(|| SyncError::malformed(path, format!("no .{class} and no <main>/<body> to hold one")))?;
            debug!("{}: creating empty .{class} container", path.display());
            let fresh = format!("<div class=\"{class}\">\n</div>\n");
            let updated = html::splice(doc, at, at, &fresh);
            match html::find_by_class(&updated, class, at) {
                Lookup::Found(el) => Ok((updated, el)),
                _ => Err(SyncError::malformed(path, format!("could not place .{class} container"))),
            }
        }
    }
}

/* ---------------- City pages ---------------- */

/// Cards currently in the listing block. A page without a listing
/// container reads as an empty listing.
pub fn parse_listing(doc: &str, path: &Path) -> Result<Vec<FacilityCard>> {
    let list = match html::find_by_class(doc, LISTING_CLASS, 0) {
        Lookup::Found(el) => el,
        Lookup::Missing => return Ok(Vec::new()),
        Lookup::Unclosed(at) => {
            return Err(SyncError::malformed(path, format!("unclosed .{LISTING_CLASS} at byte {at}")));
        }
    };
    let inner = list.inner(doc);
    let cards = html::all_by_class(inner, CARD_CLASS)
        .map_err(|at| SyncError::malformed(path, format!("unclosed .{CARD_CLASS} inside listing at byte {at}")))?;
    Ok(cards.iter().map(|el| parse_card(el.outer(inner))).collect())
}

fn parse_card(card: &str) -> FacilityCard {
    let name = html::find_by_name(card, "h3", 0)
        .map(|h| html::text_of(h.inner(card)))
        .unwrap_or_default();

    let mut out = FacilityCard {
        name,
        address: s!(),
        phone: s!(),
        website: s!(),
        description: s!(),
        features: Vec::new(),
    };

    let mut pos = 0;
    while let Some(p) = html::find_by_name(card, "p", pos) {
        pos = p.end;
        let inner = p.inner(card);
        let text = html::text_of(inner);
        if let Some(v) = text.strip_prefix("Address:") {
            out.address = s!(v.trim());
        } else if let Some(v) = text.strip_prefix("Description:") {
            out.description = s!(v.trim());
        } else if let Some(v) = text.strip_prefix("Phone:") {
            out.phone = s!(v.trim());
        } else if let Some(v) = text.strip_prefix("Website:") {
            out.website = html::find_by_name(inner, "a", 0)
                .and_then(|a| html::attr_value(a.open_tag(inner), "href"))
                .map(|href| decode_entities(&href))
                .unwrap_or_else(|| s!(v.trim()));
        }
    }

    if let Ok(tags) = html::all_by_class(card, FEATURE_CLASS) {
        out.features = tags
            .iter()
            .map(|t| html::text_of(t.inner(card)))
            .filter(|f| !f.is_empty())
            .collect();
    }
    out
}

pub fn render_card(card: &FacilityCard) -> String {
    let mut h = String::with_capacity(512);
    h.push_str("    <div class=\"storage-card\">\n");
    h.push_str(&format!("        <h3>{}</h3>\n", escape_html(&card.name)));
    h.push_str("        <div class=\"storage-info\">\n");
    h.push_str(&format!("            <p><strong>Address: </strong>{}</p>\n", escape_html(&card.address)));
    if !card.description.is_empty() {
        h.push_str(&format!(
            "            <p><strong>Description: </strong>{}</p>\n",
            escape_html(&card.description)
        ));
    }
    if !card.features.is_empty() {
        h.push_str("            <div class=\"features-list\">\n");
        for f in &card.features {
            h.push_str(&format!("                <span class=\"{FEATURE_CLASS}\">{}</span>\n", escape_html(f)));
        }
        h.push_str("            </div>\n");
    }
    if !card.phone.is_empty() || !card.website.is_empty() {
        h.push_str("            <div class=\"contact-info\">\n");
        if !card.phone.is_empty() {
            let tel: String = card.phone.chars().filter(|c| !c.is_whitespace()).collect();
            h.push_str(&format!(
                "                <p><strong>Phone: </strong><a href=\"tel:{}\">{}</a></p>\n",
                escape_html(&tel),
                escape_html(&card.phone)
            ));
        }
        if !card.website.is_empty() {
            h.push_str(&format!(
                "                <p><strong>Website: </strong><a href=\"{}\" target=\"_blank\" rel=\"nofollow\">{}</a></p>\n",
                escape_html(&card.website),
                escape_html(website_label(&card.website))
            ));
        }
        h.push_str("            </div>\n");
    }
    h.push_str("        </div>\n");
    h.push_str("    </div>\n");
    h
}

/// Rewrite the listing block with `cards`, creating the container if needed.
/// Everything outside the container is preserved.
pub fn replace_listing(doc: &str, cards: &[FacilityCard], path: &Path) -> Result<String> {
    let (doc, list) = ensure_container(doc, LISTING_CLASS, path)?;
    let mut inner = s!("\n");
    for card in cards {
        inner.push_str(&render_card(card));
    }
    Ok(html::splice(&doc, list.open_end, list.close_start, &inner))
}

/* ---------------- Region pages ---------------- */

/// A `city-card` box and what it links to.
struct LinkedCard {
    el: Element,
    slug: PlaceSlug,
    display_name: String,
    count: Option<usize>,
}

fn linked_cards(
    doc: &str,
    layout: &SiteLayout,
    path: &Path,
    parse: fn(&str) -> Option<usize>,
) -> Result<Vec<LinkedCard>> {
    let els = html::all_by_class(doc, SUMMARY_CARD_CLASS)
        .map_err(|at| SyncError::malformed(path, format!("unclosed .{SUMMARY_CARD_CLASS} at byte {at}")))?;

    let mut out = Vec::with_capacity(els.len());
    for el in els {
        let block = el.outer(doc);
        let href = html::find_by_name(block, "a", 0)
            .and_then(|a| html::attr_value(a.open_tag(block), "href"));
        let Some(slug) = href.as_deref().and_then(|h| layout.slug_from_href(&decode_entities(h))) else {
            debug!("{}: skipping card without a resolvable link", path.display());
            continue;
        };
        let display_name = html::find_by_name(block, "h3", 0)
            .map(|h| html::text_of(h.inner(block)))
            .unwrap_or_else(|| crate::core::slug::display_name(slug.as_str()));
        let count = html::find_by_name(block, "p", 0).and_then(|p| parse(&html::text_of(p.inner(block))));
        out.push(LinkedCard { el, slug, display_name, count });
    }
    Ok(out)
}

/// Replace the card's count line with `label`, adding one after the heading
/// when the card has none. Returns the whole updated document.
fn set_count_line(doc: &str, card: &LinkedCard, label: &str) -> String {
    let outer = card.el.outer(doc);
    let new_block = match html::find_by_name(outer, "p", 0) {
        Some(p) => html::splice(outer, p.open_end, p.close_start, label),
        None => {
            let at = html::find_by_name(outer, "h3", 0)
                .map(|h| h.end)
                .unwrap_or(card.el.open_end - card.el.start);
            html::splice(outer, at, at, &format!("\n        <p>{label}</p>"))
        }
    };
    html::splice(doc, card.el.start, card.el.end, &new_block)
}

pub fn parse_summaries(doc: &str, layout: &SiteLayout, path: &Path) -> Result<Vec<CitySummaryCard>> {
    Ok(linked_cards(doc, layout, path, parse_count)?
        .into_iter()
        .map(|c| CitySummaryCard { city: c.slug, display_name: c.display_name, count: c.count })
        .collect())
}

pub fn render_summary_card(layout: &SiteLayout, city: &PlaceSlug, display_name: &str, count: usize) -> String {
    format!(
        "    <div class=\"{SUMMARY_CARD_CLASS}\">\n        <h3>{}</h3>\n        <p>{}</p>\n        <a href=\"{}\" class=\"btn\">View Storage Options</a>\n    </div>\n",
        escape_html(display_name),
        count_label(count),
        escape_html(&layout.city_href(city)),
    )
}

/// Set the count on the summary card for `city`, appending a new card to the
/// city grid when the region page has none. `Ok(None)` when the card already
/// shows `count`.
pub fn update_summary(
    doc: &str,
    layout: &SiteLayout,
    city: &PlaceSlug,
    display_name: &str,
    count: usize,
    path: &Path,
) -> Result<Option<String>> {
    let cards = linked_cards(doc, layout, path, parse_count)?;

    let Some(card) = cards.iter().find(|c| &c.slug == city) else {
        let (doc, grid) = ensure_container(doc, SUMMARY_GRID_CLASS, path)?;
        let card = render_summary_card(layout, city, display_name, count);
        return Ok(Some(html::splice(&doc, grid.close_start, grid.close_start, &card)));
    };

    if card.count == Some(count) {
        return Ok(None);
    }
    Ok(Some(set_count_line(doc, card, &count_label(count))))
}

/* ---------------- Regions index ---------------- */

pub fn parse_regions_index(doc: &str, layout: &SiteLayout, path: &Path) -> Result<Vec<RegionCountCard>> {
    Ok(linked_cards(doc, layout, path, parse_city_count)?
        .into_iter()
        .map(|c| RegionCountCard { region: c.slug, display_name: c.display_name, count: c.count })
        .collect())
}

/// Set the city count on `region`'s card. `Ok(None)` when it already shows
/// `count`. Region cards are never added here; a missing one is an error.
pub fn update_region_count(
    doc: &str,
    layout: &SiteLayout,
    region: &PlaceSlug,
    count: usize,
    path: &Path,
) -> Result<Option<String>> {
    let cards = linked_cards(doc, layout, path, parse_city_count)?;
    let card = cards
        .iter()
        .find(|c| &c.slug == region)
        .ok_or_else(|| SyncError::malformed(path, format!("no card for region {region}")))?;

    if card.count == Some(count) {
        return Ok(None);
    }
    Ok(Some(set_count_line(doc, card, &city_count_label(count))))
}

/* ---------------- Content checks ---------------- */

/// Placeholder phrases found in the visible text of a page.
pub fn placeholder_hits(doc: &str) -> Vec<String> {
    let body = html::find_by_name(doc, "body", 0).map_or(doc, |b| b.inner(doc));
    let text = html::to_lower(&html::text_of(body));
    PLACEHOLDER_PATTERNS
        .iter()
        .filter(|p| text.contains(*p))
        .map(|p| s!(*p))
        .collect()
}

/// Whether the page has a listing container at all.
pub fn has_listing(doc: &str) -> bool {
    matches!(html::find_by_class(doc, LISTING_CLASS, 0), Lookup::Found(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "<main><div class=\"city-grid\">\n\
        <div class=\"city-card\"><h3>Devon</h3><p>12 Storage Facilities</p><a href=\"../selfstoragedevon/index.html\">View</a></div>\n\
        <div class=\"city-card\"><h3>Rutland</h3><p>1 City</p><a href=\"../selfstoragerutland/index.html\">View</a></div>\n\
        </div></main>";

    fn layout() -> SiteLayout {
        SiteLayout::new("website", "selfstorage")
    }

    #[test]
    fn city_labels_singular_and_plural() {
        assert_eq!(city_count_label(1), "1 City");
        assert_eq!(city_count_label(0), "0 Cities");
        assert_eq!(city_count_label(4), "4 Cities");
        assert_eq!(parse_city_count("4 Cities"), Some(4));
        assert_eq!(parse_city_count("1 city"), Some(1));
        assert_eq!(parse_city_count("12 Storage Facilities"), None);
    }

    #[test]
    fn regions_index_cards_resolve_up_a_level() {
        let cards = parse_regions_index(INDEX, &layout(), Path::new("index.html")).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].region.as_str(), "devon");
        assert_eq!(cards[0].count, None);
        assert_eq!(cards[1].display_name, "Rutland");
        assert_eq!(cards[1].count, Some(1));
    }

    #[test]
    fn region_count_is_spliced_in_place() {
        let p = Path::new("index.html");
        let devon = PlaceSlug::from_raw("devon").unwrap();
        let out = update_region_count(INDEX, &layout(), &devon, 3, p).unwrap().unwrap();
        assert!(out.contains("<h3>Devon</h3><p>3 Cities</p>"));
        assert!(out.contains("<p>1 City</p>"));

        let rutland = PlaceSlug::from_raw("rutland").unwrap();
        assert_eq!(update_region_count(INDEX, &layout(), &rutland, 1, p).unwrap(), None);
        let kent = PlaceSlug::from_raw("kent").unwrap();
        assert!(update_region_count(INDEX, &layout(), &kent, 1, p).is_err());
    }
}
