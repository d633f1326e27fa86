// src/core/html.rs
// Low-level HTML scanning for the generated pages.
// Deliberately small: the site's markup is our own output, so we only need
// to find elements by class, match nested tags, and splice byte ranges.
// Tag and attribute names are matched case-insensitively.

use super::sanitize::{decode_entities, normalize_ws};

/// One tag as it appears in the source, `s[start..end]` is `<...>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub start: usize,
    pub end: usize,
    /// Lowercased tag name without the leading `/`.
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
}

/// Iterator over the tags of a document from a byte offset.
/// Skips comments, doctype, and the bodies of `<script>`/`<style>`.
pub struct Tags<'a> {
    s: &'a str,
    b: &'a [u8],
    i: usize,
}

impl<'a> Tags<'a> {
    pub fn new(s: &'a str, from: usize) -> Self {
        Self { s, b: s.as_bytes(), i: from.min(s.len()) }
    }

    /// Scan to the `>` that closes the tag opened at `self.i`, honoring quotes.
    fn tag_end(&self, open: usize) -> Option<usize> {
        let mut in_s = false;
        let mut in_d = false;
        let mut j = open + 1;
        while j < self.b.len() {
            match self.b[j] {
                b'\'' if !in_d => in_s = !in_s,
                b'"' if !in_s => in_d = !in_d,
                b'>' if !in_s && !in_d => return Some(j + 1),
                _ => {}
            }
            j += 1;
        }
        None
    }

    fn skip_raw_text(&mut self, name: &str) {
        let close = format!("</{name}");
        let lc = to_lower(&self.s[self.i..]);
        self.i = match lc.find(&close) {
            Some(rel) => self.i + rel,
            None => self.b.len(),
        };
    }
}

impl Iterator for Tags<'_> {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        loop {
            let rel = self.s.get(self.i..)?.find('<')?;
            let start = self.i + rel;
            let rest = &self.s[start..];

            if rest.starts_with("<!--") {
                self.i = match rest.find("-->") {
                    Some(e) => start + e + 3,
                    None => self.b.len(),
                };
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.i = self.tag_end(start).unwrap_or(self.b.len());
                continue;
            }

            let closing = rest.as_bytes().get(1) == Some(&b'/');
            let name_from = start + 1 + usize::from(closing);
            let name_len = self.b[name_from..]
                .iter()
                .take_while(|c| c.is_ascii_alphanumeric() || **c == b'-')
                .count();
            if name_len == 0 {
                // A bare '<' in text.
                self.i = start + 1;
                continue;
            }

            let end = self.tag_end(start)?;
            let name = self.s[name_from..name_from + name_len].to_ascii_lowercase();
            let self_closing = self.s[..end - 1].ends_with('/') || is_void(&name);
            self.i = end;

            if !closing && (name == "script" || name == "style") {
                self.skip_raw_text(&name);
            }
            return Some(Tag { start, end, name, closing, self_closing });
        }
    }
}

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

/// An element located in a document: `s[start..open_end]` is the opening
/// tag, `s[open_end..close_start]` the inner HTML, `s[close_start..end]` the
/// closing tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Element {
    pub start: usize,
    pub open_end: usize,
    pub close_start: usize,
    pub end: usize,
}

impl Element {
    pub fn outer<'a>(&self, s: &'a str) -> &'a str {
        &s[self.start..self.end]
    }
    pub fn inner<'a>(&self, s: &'a str) -> &'a str {
        &s[self.open_end..self.close_start]
    }
    pub fn open_tag<'a>(&self, s: &'a str) -> &'a str {
        &s[self.start..self.open_end]
    }
}

/// Match the closing tag for the opening tag `open`, counting nested
/// elements of the same name.
pub fn close_element(s: &str, open: &Tag) -> Option<Element> {
    if open.self_closing {
        return Some(Element { start: open.start, open_end: open.end, close_start: open.end, end: open.end });
    }
    let mut depth = 0usize;
    for tag in Tags::new(s, open.end) {
        if tag.name != open.name || tag.self_closing {
            continue;
        }
        if !tag.closing {
            depth += 1;
        } else if depth == 0 {
            return Some(Element { start: open.start, open_end: open.end, close_start: tag.start, end: tag.end });
        } else {
            depth -= 1;
        }
    }
    None
}

/// Outcome of looking up an element that should exist at most once.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(Element),
    Missing,
    /// Opening tag found but never closed.
    Unclosed(usize),
}

/// First element (from `from`) whose class list contains `class`.
pub fn find_by_class(s: &str, class: &str, from: usize) -> Lookup {
    for tag in Tags::new(s, from) {
        if tag.closing || !has_class(&s[tag.start..tag.end], class) {
            continue;
        }
        return match close_element(s, &tag) {
            Some(el) => Lookup::Found(el),
            None => Lookup::Unclosed(tag.start),
        };
    }
    Lookup::Missing
}

/// All elements with `class` inside `s`, in document order.
/// Nested matches inside a returned element are not reported separately.
pub fn all_by_class(s: &str, class: &str) -> Result<Vec<Element>, usize> {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        match find_by_class(s, class, pos) {
            Lookup::Found(el) => {
                pos = el.end;
                out.push(el);
            }
            Lookup::Missing => return Ok(out),
            Lookup::Unclosed(at) => return Err(at),
        }
    }
}

/// First element with the given tag name (from `from`).
pub fn find_by_name(s: &str, name: &str, from: usize) -> Option<Element> {
    let name = to_lower(name);
    let open = Tags::new(s, from).find(|t| !t.closing && t.name == name)?;
    close_element(s, &open)
}

/// Start offset of the first closing tag `</name>`.
pub fn find_closing(s: &str, name: &str) -> Option<usize> {
    let name = to_lower(name);
    Tags::new(s, 0)
        .find(|t| t.closing && t.name == name)
        .map(|t| t.start)
}

/// Read an attribute value from an opening tag. Handles double, single and
/// unquoted values; returns the raw (still entity-encoded) text.
pub fn attr_value(open_tag: &str, attr: &str) -> Option<String> {
    let lc = to_lower(open_tag);
    let needle = to_lower(attr);
    let bytes = lc.as_bytes();
    let mut from = 0;
    while let Some(rel) = lc[from..].find(&needle) {
        let at = from + rel;
        from = at + needle.len();
        let boundary = at == 0 || bytes[at - 1].is_ascii_whitespace();
        if !boundary {
            continue;
        }
        let after = lc[from..].trim_start();
        let Some(value) = after.strip_prefix('=') else { continue };
        let value_at = open_tag.len() - value.trim_start().len();
        let raw = &open_tag[value_at..];
        return Some(match raw.chars().next() {
            Some(q @ ('"' | '\'')) => raw[1..].split(q).next().unwrap_or_default().to_string(),
            _ => raw
                .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .next()
                .unwrap_or_default()
                .to_string(),
        });
    }
    None
}

pub fn has_class(open_tag: &str, class: &str) -> bool {
    attr_value(open_tag, "class")
        .is_some_and(|v| v.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
}

/// Visible text of an HTML fragment: tags removed, entities decoded,
/// whitespace collapsed.
pub fn text_of(fragment: &str) -> String {
    decode_entities(&strip_tags(fragment))
}

/// Remove all HTML tags `<...>` from the string, then collapse whitespace.
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&out)
}

/// ASCII-only lowercasing for tag/attribute matching; keeps byte offsets.
pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Replace `s[range]` with `with`.
pub fn splice(s: &str, start: usize, end: usize, with: &str) -> String {
    let mut out = String::with_capacity(s.len() - (end - start) + with.len());
    out.push_str(&s[..start]);
    out.push_str(with);
    out.push_str(&s[end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<!DOCTYPE html>
<html><body>
<!-- <div class="storage-list"> commented out -->
<main>
  <div class="container storage-list" id=list>
    <div class="storage-card"><div class="inner"><h3>A</h3></div></div>
    <div class='storage-card'><h3>B &amp; Co</h3><br></div>
  </div>
</main>
<script>if (a < b) { x = "<div class='storage-card'>"; }</script>
</body></html>"#;

    #[test]
    fn finds_nested_element_by_class() {
        let Lookup::Found(list) = find_by_class(DOC, "storage-list", 0) else {
            panic!("storage-list not found");
        };
        assert!(list.open_tag(DOC).contains("id=list"));
        let cards = all_by_class(list.inner(DOC), "storage-card").expect("balanced");
        assert_eq!(cards.len(), 2);
        assert!(cards[0].outer(list.inner(DOC)).ends_with("</div></div>"));
        assert_eq!(text_of(cards[1].inner(list.inner(DOC))), "B & Co");
    }

    #[test]
    fn script_bodies_and_comments_are_skipped() {
        let all = all_by_class(DOC, "storage-card").expect("balanced");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn unclosed_element_is_reported() {
        let doc = r#"<main><div class="storage-list"><div>x</div></main>"#;
        assert!(matches!(find_by_class(doc, "storage-list", 0), Lookup::Unclosed(6)));
    }

    #[test]
    fn attr_values_in_all_quote_styles() {
        assert_eq!(attr_value(r#"<a HREF="x/index.html">"#, "href").as_deref(), Some("x/index.html"));
        assert_eq!(attr_value("<a href='y'>", "href").as_deref(), Some("y"));
        assert_eq!(attr_value("<a href=z data-href=q>", "href").as_deref(), Some("z"));
        assert_eq!(attr_value(r#"<a data-href="q">"#, "href"), None);
    }

    #[test]
    fn splice_replaces_range() {
        assert_eq!(splice("abcdef", 2, 4, "XY"), "abXYef");
    }
}
