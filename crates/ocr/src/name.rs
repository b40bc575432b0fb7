//! Item name selection.
//!
//! Every line near the price (and every adjacent pair of lines) is stripped of
//! prices, promo wording and numbers, then scored on how much it still looks
//! like a product name. Closer to the price is better.

use crate::patterns;

/// Lines either side of the price line that may hold the name.
const WINDOW: usize = 4;
const MAX_NAME_CHARS: usize = 90;
const MIN_BLOB_CHARS: usize = 5;
const EDGE_PUNCT: &[char] = &[
    ' ', '•', '*', '-', '–', '—', '|', ':', ';', '.', ',', '(', ')', '[', ']', '{', '}',
];

fn tidy(s: &str) -> String {
    patterns::collapse_spaces(s).trim_matches(EDGE_PUNCT).to_string()
}

/// What is left of a line once everything that is not a name is removed.
/// Empty when nothing useful remains.
fn name_part(line: &str) -> String {
    if patterns::is_validity_line(line) {
        return String::new();
    }
    let cleaned = tidy(&patterns::strip_non_name_tokens(&tidy(line)));
    if cleaned.chars().any(char::is_alphabetic) {
        cleaned
    } else {
        String::new()
    }
}

fn score_name(cleaned: &str) -> f32 {
    if cleaned.chars().filter(|c| c.is_alphabetic()).count() < 6 {
        return -999.0;
    }
    let words = cleaned.split_whitespace().count();
    if words < 2 {
        return -50.0;
    }
    let len = cleaned.chars().count();
    let mut s = (words as f32 * 5.0).min(24.0);
    if (10..=70).contains(&len) {
        s += 10.0;
    }
    if len > 110 {
        s -= 10.0;
    }
    s
}

/// Best product name in `blob`, looking within a few lines of `price_line`
/// when it is known and over the whole blob otherwise.
pub fn extract_item_name(blob: &str, price_line: Option<usize>) -> Option<String> {
    if blob.trim().chars().count() < MIN_BLOB_CHARS {
        return None;
    }
    let lines: Vec<&str> = blob.lines().map(str::trim).collect();
    if lines.is_empty() {
        return None;
    }
    let window = match price_line {
        Some(center) => center.saturating_sub(WINDOW)..=(center + WINDOW).min(lines.len() - 1),
        None => 0..=lines.len() - 1,
    };
    let distance = |i: usize| price_line.map(|center| i.abs_diff(center) as f32);

    let mut best: Option<(f32, String)> = None;
    let mut offer = |score: f32, name: String| {
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, name));
        }
    };

    for i in window {
        let Some(line) = lines.get(i) else { continue };
        let a = name_part(line);
        if a.is_empty() {
            continue;
        }
        let near = distance(i).map_or(0.0, |d| (14.0 - 4.0 * d).max(0.0));
        offer(score_name(&a) + near, a.clone());

        let b = lines.get(i + 1).map(|l| name_part(l)).unwrap_or_default();
        if !b.is_empty() {
            let combo = tidy(&format!("{a} {b}"));
            let near = distance(i).map_or(0.0, |d| (16.0 - 3.0 * d).max(0.0));
            offer(score_name(&combo) + near + 6.0, combo);
        }
    }

    let (score, name) = best?;
    if score < 0.0 {
        return None;
    }
    let name: String = tidy(&name).chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end().to_string();
    (!name.is_empty()).then_some(name)
}
