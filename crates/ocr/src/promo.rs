//! Percent-off and purchase-limit metadata.

use crate::patterns;
use crate::types::{LimitScope, PurchaseLimit};

const SNIPPET_BEFORE: usize = 25;
const SNIPPET_AFTER: usize = 35;

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Percent off with a short snippet of surrounding text.
///
/// Common OCR glyph swaps are repaired first (`I9%` → `19%`, `1O%` → `10%`).
/// `%`, full-width `％` and `°` all count as a percent sign and the word
/// "off" is optional, since some flyers drop it.
pub fn extract_percent_off(text: &str) -> Option<(u8, String)> {
    let t = patterns::repair_ocr_digits(&single_line(text));
    let (pct, span) = patterns::percent_match(&t)?;

    let start = t[..span.start]
        .char_indices()
        .rev()
        .nth(SNIPPET_BEFORE - 1)
        .map_or(0, |(i, _)| i);
    let tail = &t[span.end..];
    let end = span.end + tail.char_indices().nth(SNIPPET_AFTER).map_or(tail.len(), |(i, _)| i);
    Some((pct, single_line(&t[start..end])))
}

fn word_number(word: &str) -> Option<u32> {
    let n = match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => return digits.parse().ok(),
    };
    Some(n)
}

fn limit_scope(trailer: &str) -> LimitScope {
    let has = |cues: &[&str]| cues.iter().any(|c| trailer.contains(c));
    if has(&["per day", "a day"]) {
        LimitScope::PerDay
    } else if has(&["per trip", "per transaction", "per visit"]) {
        LimitScope::PerTrip
    } else if has(&["per customer", "per household"]) {
        LimitScope::PerCustomer
    } else {
        LimitScope::Unknown
    }
}

/// `Limit 2`, `limit two per customer`, `Limit: 4 per household`.
pub fn extract_limit(text: &str) -> Option<PurchaseLimit> {
    let t = single_line(&text.to_lowercase());
    let (num, trailer) = patterns::limit_parts(&t)?;
    let qty = word_number(&num).filter(|q| *q > 0)?;
    Some(PurchaseLimit {
        qty,
        scope: limit_scope(&trailer),
        text: format!("limit {num}{trailer}").trim().to_string(),
    })
}
