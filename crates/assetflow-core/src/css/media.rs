//! Media query consolidation.
//!
//! Every top-level `@media` block sharing the same query is folded into one
//! block, and the blocks are moved after the plain rules, mobile-first:
//! `min-width` ascending, then `max-width` descending, then everything else in
//! first-seen order.

use lightningcss::rules::{media::MediaRule, CssRule, CssRuleList};
use lightningcss::stylesheet::PrinterOptions;
use lightningcss::traits::ToCss;
use regex_lite::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Merge and sort the top-level media rules of `rules` in place.
pub fn consolidate_media_queries(rules: &mut CssRuleList<'_>) {
    let mut plain = Vec::with_capacity(rules.0.len());
    let mut groups: Vec<(String, MediaRule<'_>)> = Vec::new();

    for rule in std::mem::take(&mut rules.0) {
        match rule {
            CssRule::Media(media) => {
                let key = media
                    .query
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default();
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, existing)) => existing.rules.0.extend(media.rules.0),
                    None => groups.push((key, media)),
                }
            }
            other => plain.push(other),
        }
    }

    groups.sort_by(|(a, _), (b, _)| compare_queries(a, b));
    plain.extend(groups.into_iter().map(|(_, media)| CssRule::Media(media)));
    rules.0 = plain;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum QueryRank {
    MinWidth(f64),
    MaxWidth(f64),
    Other,
}

impl QueryRank {
    fn order(self) -> u8 {
        match self {
            Self::MinWidth(_) => 0,
            Self::MaxWidth(_) => 1,
            Self::Other => 2,
        }
    }
}

/// Mobile-first ordering of two media query texts.
#[must_use]
pub fn compare_queries(a: &str, b: &str) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    match (ra, rb) {
        (QueryRank::MinWidth(x), QueryRank::MinWidth(y)) => {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (QueryRank::MaxWidth(x), QueryRank::MaxWidth(y)) => {
            y.partial_cmp(&x).unwrap_or(Ordering::Equal)
        }
        _ => ra.order().cmp(&rb.order()),
    }
}

fn rank(query: &str) -> QueryRank {
    static MIN: OnceLock<Option<Regex>> = OnceLock::new();
    static MAX: OnceLock<Option<Regex>> = OnceLock::new();

    // Both the legacy `min-width:` form and the range form lightningcss may print.
    let min = MIN.get_or_init(|| {
        Regex::new(r"(?:min-width\s*:|width\s*>=?)\s*(-?[0-9]*\.?[0-9]+)(px|em|rem)?").ok()
    });
    let max = MAX.get_or_init(|| {
        Regex::new(r"(?:max-width\s*:|width\s*<=?)\s*(-?[0-9]*\.?[0-9]+)(px|em|rem)?").ok()
    });

    if let Some(px) = min.as_ref().and_then(|re| re.captures(query)).and_then(|c| to_px(&c)) {
        return QueryRank::MinWidth(px);
    }
    if let Some(px) = max.as_ref().and_then(|re| re.captures(query)).and_then(|c| to_px(&c)) {
        return QueryRank::MaxWidth(px);
    }
    QueryRank::Other
}

fn to_px(captures: &regex_lite::Captures<'_>) -> Option<f64> {
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    match captures.get(2).map(|m| m.as_str()) {
        Some("em" | "rem") => Some(value * 16.0),
        _ => Some(value),
    }
}
