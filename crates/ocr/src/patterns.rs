//! Named lexical detectors over flyer OCR text.
//!
//! Everything regex-shaped lives here so the decision, naming and
//! segmentation code only ever asks questions like "does this line carry a
//! price token?" The `regex` crate has no look-around, so the digit-boundary
//! guards the patterns need are checked by hand after each match.

use std::ops::Range;
use std::str::FromStr;

use flyerscan_core::{parse_number, Price};
use regex::Captures;
use rust_decimal::Decimal;

use crate::types::Unit;

// ── Compiled regex cache ─────────────────────────────────────────────────────

// Segmentation-level price shapes. Tolerates OCR splitting "6.97" into
// "6 97" / "6 . 97", cents glyphs read as "c", and "/ib" for "/lb".
re!(re_price_token,
    r"(?i)\$?\s*\d+\s*\.\s*\d{2}|\$?\s*\d{1,3}\s+\d{2}\b|\b\d+\s*(?:¢|c\b)|\b\d+\s*/\s*\$?\s*\d+(?:\s*\.\s*\d{2}|\s+\d{2})?\b|/\s*(?:lb|ib)\b");
re!(re_digit, r"\d");
re!(re_dollar_s, r"(^|[\s(])[sS]\s?(\d{1,3}\.\d{2})\b");
re!(re_pct_or_prime, r"(?i)%\s*off|\bprime\b");
re!(re_valid_line, r"(?i)^\s*valid\s+\d{1,2}/\d{1,2}\s*-\s*\d{1,2}/\d{1,2}");

// Rule-level detectors; these run on folded (lower-case, single-line) text.
re!(re_rule_price, r"\$\s*(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)|(\d{1,3}\.\d{2})");
re!(re_rule_percent, r"(\d{1,2})\s*%\s*off\b");
re!(re_rule_multibuy,
    r"(\d+)\s*/\s*\$\s*(\d+(?:\.\d{2})?)|(\d+)\s*for\s*\$\s*(\d+(?:\.\d{2})?)");
re!(re_rule_range, r"\$\s*(\d+(?:\.\d{2})?)\s*-\s*\$\s*(\d+(?:\.\d{2})?)");
re!(re_rule_unit, r"\$\s*\d+(?:\.\d{2})?\s*/\s*(lbs|lb|oz|ct|each|ea|gal|qt|pt)\b");
re!(re_rule_regular_price, r"\b(?:reg\.?|regular|was|list)\s*\$?\s*(\d{1,3}(?:\.\d{2})?)\b");
re!(re_explicit_pay, r"\b(?:pay|now|your price|only)\b");
re!(re_regular_cue, r"\b(?:regular|reg|was|list)\b");
re!(re_sale_cue, r"\b(?:sale|now|only|price)\b");
re!(re_bogo, r"\b(?:bogo|buy\s*one\s*get\s*one|buy\s*1\s*get\s*1)\b");
re!(re_bogo_half, r"\b(?:buy\s*one\s*get\s*one\s*50\s*%|bogo\s*50\b)");

// Line-level candidate tokens, original casing.
re!(re_dollar_no_dot, r"\$(\d{1,2})(\d{2})\b");
re!(re_decimal, r"\d{1,3}\.\d{2}");
re!(re_cents, r"(?i)(\d{1,3})\s*(?:¢|c\b)");
re!(re_multibuy, r"(\d{1,2})\s*/\s*\$?\s*(\d{1,3}(?:\.\d{2})?)");
re!(re_money, r"\$\s*(\d{1,3}(?:\.\d{2})?)");
re!(re_percent, r"(?i)(\d{1,2})\s*[%％°](?:\s*off\b)?");
re!(re_per_lb, r"(?i)/\s*(?:lb|ib)s?\b|\bper\s*lbs?\b");
re!(re_each, r"(?i)\b(?:ea|each)\b");
re!(re_junk_cue,
    r"(?i)\b(?:save|savings|you\s*save|limit|must\s*buy|when\s*you\s*buy|mix\s*&\s*match|points|reward|deposit|reg|regular|was|compare\s*at|valid|with\s*prime)\b");
re!(re_limit_word, r"(?i)\blimit\b");
re!(re_negative, r"-\s*\d+(?:\.\d{2})?");

// Name cleaning.
re!(re_strip_decimal, r"\d+\s*\.\s*\d{2}");
re!(re_strip_cents, r"(?i)\d+\s*(?:¢|c\b)");
re!(re_strip_multibuy, r"\d+\s*/\s*\$?\s*\d+(?:\.\d{2})?");
re!(re_strip_money, r"\$\s*\d+(?:\.\d{2})?");
re!(re_strip_percent, r"(?i)\d+\s*[%％°](?:\s*off\b)?");
re!(re_bad_name_cue,
    r"(?i)\b(?:digital|coupon|for\s*u|sale\s*price|price|save|savings|limit|lbs?|per\s*lbs?|must\s*buy|mix\s*&\s*match|reg|regular|was|each|ea|valid|with\s*prime|off|per\s*(?:customer|household|transaction|trip|visit|day))\b");
re!(re_trailing_junk, r"(?i)\b(?:item|single\s*price|varieties|variety)\b.*$");
re!(re_numeric_range, r"\b\d{1,3}\s*-\s*\d{1,3}\b");
re!(re_bare_number, r"\b\d+\b");
re!(re_symbols, r"[$/¢%％°]");
re!(re_spaces, r"\s+");

// Percent text OCR repairs.
re!(re_ocr_one, r"\b[Il](\d)");
re!(re_ocr_zero, r"(\d)O(\d|[%％°])");

re!(re_limit,
    r"(?i)\blimit\b\s*[:\-]?\s*(\d+|one|two|three|four|five|six|seven|eight|nine|ten)\b([^.\n\r]{0,40})");

// Spatial-anchor token shapes (whole token).
re!(re_anchor_dollar, r"^\$?\d{1,3}\.\d{2}$");
re!(re_anchor_multibuy, r"^\d+/\$?\d{1,3}(?:\.\d{2})?$");
re!(re_anchor_cents, r"^\d{1,2}¢$");

// ── Boundary helpers ─────────────────────────────────────────────────────────

fn digit_before(text: &str, idx: usize) -> bool {
    text[..idx].chars().next_back().is_some_and(|c| c.is_ascii_digit())
}

fn digit_after(text: &str, idx: usize) -> bool {
    text[idx..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn cap_decimal(c: &Captures<'_>, i: usize) -> Option<Decimal> {
    c.get(i).and_then(|m| parse_number(m.as_str()))
}

// ── Normalization ────────────────────────────────────────────────────────────

/// `S 1.99` / `s1.99` → `$1.99`: a lone `S` glyph in front of a two-decimal
/// number is a misread dollar sign.
pub fn repair_dollar_s(line: &str) -> String {
    re_dollar_s().replace_all(line, "${1}$$${2}").into_owned()
}

// ── Segmentation detectors ───────────────────────────────────────────────────

/// Byte spans of every price-shaped token, in order.
pub fn price_token_spans(text: &str) -> Vec<Range<usize>> {
    re_price_token().find_iter(text).map(|m| m.range()).collect()
}

pub fn has_price_token(text: &str) -> bool {
    re_price_token().is_match(text.trim())
}

pub fn has_digits(text: &str) -> bool {
    re_digit().is_match(text)
}

pub fn has_percent_or_prime(text: &str) -> bool {
    re_pct_or_prime().is_match(text)
}

/// `Valid 12/28-01/03` style date lines.
pub fn is_validity_line(line: &str) -> bool {
    re_valid_line().is_match(line)
}

// ── Rule detectors (folded text) ─────────────────────────────────────────────

/// Distinct prices in reading order, bounded to `0..=10000`.
pub fn rule_prices(folded: &str) -> Vec<Price> {
    let mut out: Vec<Price> = Vec::new();
    for c in re_rule_price().captures_iter(folded) {
        let value = if let Some(m) = c.get(1) {
            parse_number(m.as_str())
        } else if let Some(m) = c.get(2) {
            if digit_before(folded, m.start()) {
                continue;
            }
            parse_number(m.as_str())
        } else {
            None
        };
        let Some(value) = value else { continue };
        if value < Decimal::ZERO || value > Decimal::from(10_000) {
            continue;
        }
        let price = Price::from_decimal(value);
        if !out.contains(&price) {
            out.push(price);
        }
    }
    out
}

/// Strict `NN% off`, accepted only in `1..=95`.
pub fn rule_percent_off(folded: &str) -> Option<u8> {
    let c = re_rule_percent()
        .captures_iter(folded)
        .find(|c| c.get(1).is_some_and(|m| !digit_before(folded, m.start())))?;
    let pct: u8 = c.get(1)?.as_str().parse().ok()?;
    (1..=95).contains(&pct).then_some(pct)
}

/// `2/$5`, `3 for $10` → (quantity, total).
pub fn rule_multi_buy(folded: &str) -> Option<(u32, Price)> {
    for c in re_rule_multibuy().captures_iter(folded) {
        let (qty, total) = match (c.get(1), c.get(3)) {
            (Some(q), _) => (q, c.get(2)),
            (None, Some(q)) => (q, c.get(4)),
            _ => continue,
        };
        if digit_before(folded, qty.start()) {
            continue;
        }
        let Ok(qty_n) = qty.as_str().parse::<u32>() else { continue };
        let Some(total) = total.and_then(|m| parse_number(m.as_str())) else { continue };
        if qty_n > 0 && total > Decimal::ZERO {
            return Some((qty_n, Price::from_decimal(total)));
        }
        return None;
    }
    None
}

/// `$5-$7` → (low, high), only when `0 < low <= high`.
pub fn rule_price_range(folded: &str) -> Option<(Price, Price)> {
    let c = re_rule_range().captures(folded)?;
    let lo = cap_decimal(&c, 1)?;
    let hi = cap_decimal(&c, 2)?;
    (lo > Decimal::ZERO && lo <= hi).then(|| (Price::from_decimal(lo), Price::from_decimal(hi)))
}

/// Unit suffix written directly after a price (`$2.99/lb`).
pub fn rule_unit(folded: &str) -> Option<Unit> {
    let c = re_rule_unit().captures(folded)?;
    Unit::from_str(c.get(1)?.as_str()).ok()
}

/// `reg $8.99`, `was 4.99`, `list $12`.
pub fn rule_regular_price(folded: &str) -> Option<Price> {
    let c = re_rule_regular_price().captures(folded)?;
    cap_decimal(&c, 1).map(Price::from_decimal)
}

pub fn has_explicit_pay_cue(folded: &str) -> bool {
    re_explicit_pay().is_match(folded)
}

pub fn has_regular_cue(folded: &str) -> bool {
    re_regular_cue().is_match(folded)
}

pub fn has_sale_cue(folded: &str) -> bool {
    re_sale_cue().is_match(folded)
}

pub fn has_bogo(folded: &str) -> bool {
    re_bogo().is_match(folded)
}

pub fn has_bogo_half(folded: &str) -> bool {
    re_bogo_half().is_match(folded)
}

// ── Line-level candidate tokens ──────────────────────────────────────────────

/// One price-shaped token found on a single line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineToken {
    pub span: Range<usize>,
    pub value: Decimal,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MultiBuyToken {
    pub span: Range<usize>,
    pub qty: u32,
    pub total: Decimal,
    pub raw: String,
}

pub(crate) fn multi_buy_tokens(line: &str) -> Vec<MultiBuyToken> {
    re_multibuy()
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            if digit_before(line, whole.start()) || digit_after(line, whole.end()) {
                return None;
            }
            let qty: u32 = c.get(1)?.as_str().parse().ok()?;
            let total = cap_decimal(&c, 2)?;
            Some(MultiBuyToken {
                span: whole.range(),
                qty,
                total,
                raw: whole.as_str().replace(' ', ""),
            })
        })
        .collect()
}

/// `97¢` / `97c`, value in whole cents.
pub(crate) fn cents_tokens(line: &str) -> Vec<(Range<usize>, u32)> {
    re_cents()
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            if digit_before(line, whole.start()) {
                return None;
            }
            let cents: u32 = c.get(1)?.as_str().parse().ok()?;
            Some((whole.range(), cents))
        })
        .collect()
}

/// `$399` read as `$3.99`.
pub(crate) fn dropped_decimal_tokens(line: &str) -> Vec<LineToken> {
    re_dollar_no_dot()
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let dollars = c.get(1)?.as_str();
            let cents = c.get(2)?.as_str();
            let value = parse_number(&format!("{dollars}.{cents}"))?;
            Some(LineToken {
                span: whole.range(),
                value,
                raw: format!("${dollars}.{cents}"),
            })
        })
        .collect()
}

/// Bare `1.97`, not glued to other digits.
pub(crate) fn decimal_tokens(line: &str) -> Vec<LineToken> {
    re_decimal()
        .find_iter(line)
        .filter(|m| !digit_before(line, m.start()) && !digit_after(line, m.end()))
        .filter_map(|m| {
            Some(LineToken {
                span: m.range(),
                value: parse_number(m.as_str())?,
                raw: m.as_str().to_string(),
            })
        })
        .collect()
}

/// Explicit `$` amounts.
pub(crate) fn money_tokens(line: &str) -> Vec<LineToken> {
    re_money()
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some(LineToken {
                span: whole.range(),
                value: cap_decimal(&c, 1)?,
                raw: whole.as_str().replace(' ', ""),
            })
        })
        .collect()
}

pub fn has_per_lb(line: &str) -> bool {
    re_per_lb().is_match(line)
}

pub fn has_each(line: &str) -> bool {
    re_each().is_match(line)
}

pub fn has_junk_cue(line: &str) -> bool {
    re_junk_cue().is_match(line)
}

pub fn has_limit_word(line: &str) -> bool {
    re_limit_word().is_match(line)
}

/// Savings shown as negatives (`-1.00`), not part of a date or range.
pub fn has_negative_number(line: &str) -> bool {
    re_negative()
        .find_iter(line)
        .any(|m| !digit_before(line, m.start()))
}

// ── Percent / limit ──────────────────────────────────────────────────────────

/// Loose percent match (`19% off`, `19 %`, `19％`, `19°`): value and span.
pub fn percent_match(text: &str) -> Option<(u8, Range<usize>)> {
    re_percent().captures_iter(text).find_map(|c| {
        let whole = c.get(0)?;
        if digit_before(text, whole.start()) {
            return None;
        }
        let pct: u8 = c.get(1)?.as_str().parse().ok()?;
        Some((pct, whole.range()))
    })
}

pub fn has_percent(line: &str) -> bool {
    percent_match(line).is_some()
}

/// Undo the usual OCR glyph swaps around digits: `I9` → `19`, `1O0` → `100`,
/// `1O%` → `10%`.
pub fn repair_ocr_digits(text: &str) -> String {
    let t = re_ocr_one().replace_all(text, "1${1}");
    // Two passes so overlapping `dOdOd` runs are both repaired.
    let t = re_ocr_zero().replace_all(&t, "${1}0${2}");
    re_ocr_zero().replace_all(&t, "${1}0${2}").into_owned()
}

/// `limit 2 per customer` → (`"2"`, `" per customer"`).
pub fn limit_parts(text: &str) -> Option<(String, String)> {
    let c = re_limit().captures(text)?;
    let num = c.get(1)?.as_str().to_lowercase();
    let trailer = c.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((num, trailer))
}

// ── Name cleaning ────────────────────────────────────────────────────────────

/// Remove prices, percents, junk cue words and bare numbers from a line,
/// leaving whatever might be a product name.
pub(crate) fn strip_non_name_tokens(line: &str) -> String {
    let s = re_trailing_junk().replace(line, "");
    let s = re_strip_multibuy().replace_all(&s, " ");
    let s = re_strip_money().replace_all(&s, " ");
    let s = re_strip_decimal().replace_all(&s, " ");
    let s = re_strip_cents().replace_all(&s, " ");
    let s = re_strip_percent().replace_all(&s, " ");
    let s = re_bad_name_cue().replace_all(&s, " ");
    let s = re_numeric_range().replace_all(&s, " ");
    let s = re_bare_number().replace_all(&s, " ");
    let s = re_symbols().replace_all(&s, " ");
    collapse_spaces(&s)
}

pub(crate) fn collapse_spaces(s: &str) -> String {
    re_spaces().replace_all(s.trim(), " ").into_owned()
}

// ── Spatial anchors ──────────────────────────────────────────────────────────

/// Whole-token price shapes used to seed spatial clusters: `$6.97`, `6.97`,
/// `2/$5`, `3/10.00`, `99¢`. A short token starting with `S` is read as `$`.
pub fn looks_like_price_token(token: &str) -> bool {
    let t: String = token.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if t.is_empty() {
        return false;
    }
    let t = if t.starts_with('S') && t.chars().count() <= 6 {
        t.replace('S', "$")
    } else {
        t
    };
    re_anchor_dollar().is_match(&t) || re_anchor_multibuy().is_match(&t) || re_anchor_cents().is_match(&t)
}
