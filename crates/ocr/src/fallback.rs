//! Character windows around price tokens.
//!
//! Some flyers (Aldi in particular) OCR into one long run of text with no
//! blank lines between offers. Each price token then gets a window of
//! surrounding text as its own candidate offer.

use crate::patterns;
use crate::profile::FallbackKnobs;

/// Windows whose starts fall within this many chars of the previous window's
/// end are merged.
const MERGE_GAP: usize = 30;
/// Shorter windows (after trimming) are discarded.
const MIN_WINDOW_CHARS: usize = 18;

/// Collapse horizontal whitespace and runs of three or more newlines.
fn tidy_raw(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    let mut pending_space = false;
    for c in text.chars() {
        match c {
            '\n' => {
                pending_space = false;
                newlines += 1;
                if newlines <= 2 {
                    out.push('\n');
                }
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && newlines == 0 && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                newlines = 0;
                out.push(c);
            }
        }
    }
    out
}

/// Candidate offer texts cut from `text` around every price token.
pub fn price_windows(text: &str, knobs: &FallbackKnobs) -> Vec<String> {
    let t = tidy_raw(text);
    // Byte offset of every char, plus the end, so windows can be counted in chars.
    let starts: Vec<usize> = t.char_indices().map(|(i, _)| i).chain([t.len()]).collect();
    let char_at = |byte: usize| starts.partition_point(|&b| b < byte);
    let total_chars = starts.len() - 1;

    let mut windows: Vec<(usize, usize)> = patterns::price_token_spans(&t)
        .into_iter()
        .map(|span| {
            let s = char_at(span.start).saturating_sub(knobs.before);
            let e = (char_at(span.end) + knobs.after).min(total_chars);
            (s, e)
        })
        .collect();
    windows.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (s, e) in windows {
        match merged.last_mut() {
            Some((_, pe)) if s <= *pe + MERGE_GAP => *pe = (*pe).max(e),
            _ => merged.push((s, e)),
        }
    }

    merged
        .into_iter()
        .map(|(s, e)| t[starts[s]..starts[e]].trim().to_string())
        .filter(|chunk| chunk.chars().count() >= MIN_WINDOW_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knobs(before: usize, after: usize) -> FallbackKnobs {
        FallbackKnobs { enabled: true, min_offers: 10, before, after }
    }

    #[test]
    fn no_tokens_no_windows() {
        assert!(price_windows("", &knobs(160, 260)).is_empty());
        assert!(price_windows("Fresh produce every day", &knobs(160, 260)).is_empty());
    }

    #[test]
    fn nearby_tokens_merge_into_one_window() {
        let text = "Whole Milk Gallon 2.99 Large Eggs Dozen 1.89";
        let windows = price_windows(text, &knobs(160, 260));
        assert_eq!(windows, vec![text.to_string()]);
    }

    #[test]
    fn distant_tokens_get_separate_windows() {
        let filler = "x".repeat(120);
        let text = format!("Whole Milk Gallon 2.99 {filler} Large Brown Eggs 1.89 dozen");
        let windows = price_windows(&text, &knobs(20, 10));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], "Whole Milk Gallon 2.99 xxxxxxxxx");
        assert!(windows[1].starts_with("xxx"));
        assert!(windows[1].ends_with("1.89 dozen"));
    }

    #[test]
    fn short_windows_dropped() {
        let windows = price_windows("Kale 1.99", &knobs(160, 260));
        assert!(windows.is_empty());
    }

    #[test]
    fn windows_count_chars_not_bytes() {
        let text = "Crème Brûlée Cups ¾ pint 4.99 each";
        let windows = price_windows(text, &knobs(10, 5));
        assert_eq!(windows, vec!["ups ¾ pint 4.99 each".to_string()]);
    }

    #[test]
    fn tidy_collapses_whitespace() {
        assert_eq!(tidy_raw("a \t\u{a0} b\n\n\n\nc"), "a b\n\nc");
    }
}
