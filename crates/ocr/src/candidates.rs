//! Per-line price candidates and the sale-price pick.

use std::collections::HashSet;

use flyerscan_core::Price;
use rust_decimal::Decimal;

use crate::patterns::{self, LineToken};
use crate::types::{CandidateKind, PriceCandidate, PricePick, Unit};

/// Blobs shorter than this (trimmed) cannot carry a price.
const MIN_BLOB_CHARS: usize = 5;

struct LineContext {
    index: usize,
    per_lb: bool,
    each: bool,
    junk: bool,
}

impl LineContext {
    fn new(index: usize, line: &str) -> Self {
        let junk = patterns::has_junk_cue(line)
            || patterns::has_limit_word(line)
            || patterns::has_percent(line)
            || patterns::has_negative_number(line);
        Self {
            index,
            per_lb: patterns::has_per_lb(line),
            each: patterns::has_each(line),
            junk,
        }
    }

    fn candidate(&self, kind: CandidateKind, value: Price, raw: String, position: usize) -> PriceCandidate {
        PriceCandidate {
            kind,
            value,
            raw,
            line_index: self.index,
            position,
            per_lb: self.per_lb,
            each: self.each,
            junk_context: self.junk,
            multibuy_qty: None,
            multibuy_total: None,
        }
    }
}

fn dollar_in_range(value: Decimal) -> bool {
    value > Decimal::ZERO && value <= Decimal::from(500)
}

/// Every price-shaped token in `lines`, in line order. Within a line:
/// multi-buys, cents, dropped-decimal dollars, bare decimals, `$` amounts.
///
/// A dollar or cents token overlapping a multi-buy on the same line is part
/// of that multi-buy (`2/$5.00`) and is not offered separately.
pub fn extract_candidates(lines: &[&str]) -> Vec<PriceCandidate> {
    let mut out: Vec<PriceCandidate> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let ctx = LineContext::new(index, line);

        let multibuys = patterns::multi_buy_tokens(line);
        let inside_multibuy = |start: usize, end: usize| {
            multibuys.iter().any(|m| start < m.span.end && end > m.span.start)
        };

        for m in &multibuys {
            let total = Price::from_decimal(m.total);
            let Some(per_item) = Price::per_unit(total, m.qty) else { continue };
            let mut c = ctx.candidate(CandidateKind::MultiBuy, per_item, m.raw.clone(), m.span.start);
            c.multibuy_qty = Some(m.qty);
            c.multibuy_total = Some(total);
            out.push(c);
        }

        for (span, cents) in patterns::cents_tokens(line) {
            if !(1..=999).contains(&cents) || inside_multibuy(span.start, span.end) {
                continue;
            }
            let value = Price::from_cents(i64::from(cents));
            out.push(ctx.candidate(CandidateKind::Cents, value, format!("{cents}¢"), span.start));
        }

        let dollars = patterns::dropped_decimal_tokens(line)
            .into_iter()
            .chain(patterns::decimal_tokens(line))
            .chain(patterns::money_tokens(line));
        for LineToken { span, value, raw } in dollars {
            if !dollar_in_range(value) || inside_multibuy(span.start, span.end) {
                continue;
            }
            out.push(ctx.candidate(CandidateKind::Dollar, Price::from_decimal(value), raw, span.start));
        }
    }

    let mut seen = HashSet::new();
    out.retain(|c| seen.insert((c.kind, c.value.amount().round_dp(3), c.line_index, c.raw.clone())));
    out
}

fn score(c: &PriceCandidate, blob_per_lb: bool) -> f32 {
    let mut s = match c.kind {
        CandidateKind::Dollar => 40.0,
        CandidateKind::MultiBuy => 35.0,
        CandidateKind::Cents => 20.0,
    };

    if blob_per_lb {
        s += if c.per_lb { 15.0 } else { -6.0 };
    } else if c.kind == CandidateKind::Cents {
        s -= 6.0;
    }
    if c.each {
        s += 2.0;
    }
    if c.junk_context {
        s -= 35.0;
    }

    let value = c.value.amount();
    if value < Decimal::new(10, 2) {
        s -= 25.0;
    }
    if value > Decimal::from(100) {
        s -= 10.0;
    }

    // Prices usually sit below the headline.
    s + (c.line_index as f32 * 0.3).min(6.0)
}

/// Choose the most plausible sale price in a blob. The first candidate wins
/// ties. Unit is `lb` when the winner or any line shows per-pound pricing.
pub fn pick_best_sale_price(blob: &str) -> Option<PricePick> {
    if blob.trim().chars().count() < MIN_BLOB_CHARS {
        return None;
    }
    let lines: Vec<&str> = blob.lines().map(str::trim).collect();
    let candidates = extract_candidates(&lines);
    let blob_per_lb = lines.iter().any(|l| patterns::has_per_lb(l));

    let mut best: Option<(f32, &PriceCandidate)> = None;
    for c in &candidates {
        let s = score(c, blob_per_lb);
        if best.is_none_or(|(top, _)| s > top) {
            best = Some((s, c));
        }
    }
    let (_, winner) = best?;

    let unit = if winner.per_lb || blob_per_lb { Unit::Pound } else { Unit::Each };
    Some(PricePick {
        sale_price: winner.value.round_cents(),
        unit,
        candidate: winner.clone(),
    })
}

impl PricePick {
    pub fn is_multibuy(&self) -> bool {
        self.candidate.kind == CandidateKind::MultiBuy
    }

    pub fn multibuy_qty(&self) -> Option<u32> {
        self.candidate.multibuy_qty.filter(|_| self.is_multibuy())
    }

    pub fn multibuy_total(&self) -> Option<Price> {
        self.candidate.multibuy_total.filter(|_| self.is_multibuy())
    }

    pub fn raw_token(&self) -> &str {
        &self.candidate.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    #[test]
    fn per_pound_price_wins_over_limit_line() {
        let pick = pick_best_sale_price("Boneless Chicken Breast\n$2.99 /lb\nLimit 2 per customer").unwrap();
        assert_eq!(pick.sale_price, p("2.99"));
        assert_eq!(pick.unit, Unit::Pound);
        assert_eq!(pick.candidate.line_index, 1);
        assert!(!pick.is_multibuy());
    }

    #[test]
    fn multibuy_is_not_split_into_dollar_tokens() {
        let lines = ["2/$5.00", "Canned Soup"];
        let candidates = extract_candidates(&lines);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, CandidateKind::MultiBuy);

        let pick = pick_best_sale_price("2/$5.00\nCanned Soup").unwrap();
        assert_eq!(pick.sale_price, p("2.50"));
        assert_eq!(pick.unit, Unit::Each);
        assert_eq!(pick.multibuy_qty(), Some(2));
        assert_eq!(pick.multibuy_total(), Some(p("5.00")));
        assert_eq!(pick.raw_token(), "2/$5.00");
    }

    #[test]
    fn dropped_decimal_reads_as_cents() {
        let pick = pick_best_sale_price("Large Hass Avocados\n$399 bag").unwrap();
        assert_eq!(pick.sale_price, p("3.99"));
        assert_eq!(pick.raw_token(), "$3.99");
    }

    #[test]
    fn junk_context_loses_to_plain_price() {
        let pick = pick_best_sale_price("Greek Yogurt\n$4.49\nSave $1.00").unwrap();
        assert_eq!(pick.sale_price, p("4.49"));
    }

    #[test]
    fn cents_candidate_used_when_alone() {
        let pick = pick_best_sale_price("Bananas each\n49¢").unwrap();
        assert_eq!(pick.sale_price, p("0.49"));
        assert_eq!(pick.candidate.kind, CandidateKind::Cents);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let pick = pick_best_sale_price("Apples 1.99 Pears 2.49").unwrap();
        assert_eq!(pick.sale_price, p("1.99"));
    }

    #[test]
    fn later_lines_get_a_small_bias() {
        let pick = pick_best_sale_price("1.99\nOrganic Baby Carrots\n2.49").unwrap();
        assert_eq!(pick.sale_price, p("2.49"));
    }

    #[test]
    fn no_candidates_no_pick() {
        assert!(pick_best_sale_price("").is_none());
        assert!(pick_best_sale_price("abc").is_none());
        assert!(pick_best_sale_price("Fresh Atlantic Salmon").is_none());
        assert!(pick_best_sale_price("TV 899.99").is_none());
    }

    #[test]
    fn duplicate_tokens_collapse() {
        // `$4.49` yields both a decimal and a `$` token with different raw text.
        let candidates = extract_candidates(&["$4.49", "$4.49"]);
        assert_eq!(candidates.len(), 4);
        let same_line = extract_candidates(&["4.49 4.49"]);
        assert_eq!(same_line.len(), 1);
    }
}
