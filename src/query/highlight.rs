//! Marker insertion for highlighted excerpts.
//!
//! Works on the raw stored text with byte ranges, so nothing is escaped or
//! re-encoded on the way out.

use std::ops::Range;

/// Wrap each range of `fragment` in `open`/`close`.
///
/// Ranges may arrive unsorted or overlapping; they are merged first. Ranges
/// that fall outside the fragment or off a char boundary are ignored.
pub fn render_highlighted(fragment: &str, ranges: &[Range<usize>], open: &str, close: &str) -> String {
    let merged = merge_ranges(fragment, ranges);

    let mut out = String::with_capacity(fragment.len() + merged.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for range in merged {
        out.push_str(&fragment[cursor..range.start]);
        out.push_str(open);
        out.push_str(&fragment[range.clone()]);
        out.push_str(close);
        cursor = range.end;
    }
    out.push_str(&fragment[cursor..]);
    out
}

fn merge_ranges(fragment: &str, ranges: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut valid: Vec<Range<usize>> = ranges
        .iter()
        .filter(|r| {
            r.start < r.end
                && r.end <= fragment.len()
                && fragment.is_char_boundary(r.start)
                && fragment.is_char_boundary(r.end)
        })
        .cloned()
        .collect();
    valid.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(valid.len());
    for range in valid {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Strip highlight markers, giving back the plain excerpt
pub fn strip_markers(excerpt: &str, open: &str, close: &str) -> String {
    let mut plain = excerpt.to_string();
    for marker in [open, close] {
        if !marker.is_empty() {
            plain = plain.replace(marker, "");
        }
    }
    plain
}
