//! Duplicate offers within a page.
//!
//! Overlapping clusters and fallback windows often read the same tile twice,
//! sometimes with a one-letter OCR difference in the name.

use crate::types::ParsedOffer;

/// Names at least this similar (at the same price) are the same offer.
pub const NAME_SIMILARITY: f64 = 0.9;

/// Levenshtein edit distance over chars, two-row O(min(m,n)) space.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b) = if a.len() <= b.len() { (b, a) } else { (a, b) };
    let n = b.len();

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// `1 - distance / longer length`, in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn fold_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn is_duplicate(kept: &ParsedOffer, folded_kept: &str, offer: &ParsedOffer, folded: &str) -> bool {
    kept.sale_price == offer.sale_price
        && kept.percent_off == offer.percent_off
        && (folded_kept == folded || name_similarity(folded_kept, folded) >= NAME_SIMILARITY)
}

/// Drop offers that repeat an earlier one. When two collide the more
/// confident one survives, keeping the position of the first.
pub fn dedupe_offers(offers: Vec<ParsedOffer>) -> Vec<ParsedOffer> {
    let mut kept: Vec<(String, ParsedOffer)> = Vec::with_capacity(offers.len());
    for offer in offers {
        let folded = fold_name(&offer.item_name);
        match kept.iter_mut().find(|(fk, k)| is_duplicate(k, fk, &offer, &folded)) {
            Some((_, existing)) if offer.confidence > existing.confidence => *existing = offer,
            Some(_) => {}
            None => kept.push((folded, offer)),
        }
    }
    kept.into_iter().map(|(_, offer)| offer).collect()
}
