//! Deal-signal scoring for raw OCR text.
//!
//! Used to pick between several OCR passes of one page and to flag pages that
//! deserve a manual look.

use serde::Serialize;
use std::fmt;

re!(re_decimal_price, r"\b\d+\.\d{2}\b");
re!(re_dollar_digit, r"\$\s*\d");

/// Passes scoring below this are retried with another preprocessing pass.
pub const RETRY_SIGNAL: u32 = 10;
/// Pages shorter than this (after trimming) are too short to trust.
pub const TOO_SHORT_CHARS: usize = 80;
/// Below this many chars a pass is always considered weak.
const WEAK_TEXT_CHARS: usize = 40;

/// Higher means the text more likely captured deal content.
pub fn deal_signal(text: &str) -> u32 {
    let t = text.trim();
    if t.is_empty() {
        return 0;
    }
    let mut score = 0;
    if re_dollar_digit().is_match(t) {
        score += 8;
    }
    score += 4 * re_decimal_price().find_iter(t).count() as u32;

    let digits = t.chars().filter(char::is_ascii_digit).count();
    score += (digits as u32 / 20).min(6);
    score += (t.chars().count() as u32 / 200).min(6);
    score
}

/// Whether an OCR pass is weak enough to try another one.
pub fn is_weak_text(text: &str) -> bool {
    text.trim().chars().count() < WEAK_TEXT_CHARS || deal_signal(text) < RETRY_SIGNAL
}

/// One OCR rendition of a page (raw, contrast-enhanced, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPass {
    pub name: String,
    pub text: String,
}

impl OcrPass {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Pass with the highest deal signal. Earlier passes win ties.
pub fn best_pass(passes: &[OcrPass]) -> Option<&OcrPass> {
    let mut best: Option<(&OcrPass, u32)> = None;
    for pass in passes {
        let score = deal_signal(&pass.text);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((pass, score));
        }
    }
    best.map(|(pass, _)| pass)
}

/// Why a page should be looked at by a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    OcrNoPrice,
    OcrTooShort,
    WeakPriceSignal,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewReason::OcrNoPrice => "ocr_no_price",
            ReviewReason::OcrTooShort => "ocr_too_short",
            ReviewReason::WeakPriceSignal => "weak_price_signal",
        };
        write!(f, "{s}")
    }
}

/// Review reason for a page's text, given whether any price was extracted
/// from it. Blank text has nothing to review.
pub fn review_reason(text: &str, found_price: bool) -> Option<ReviewReason> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if !found_price {
        return Some(ReviewReason::OcrNoPrice);
    }
    if t.chars().count() < TOO_SHORT_CHARS {
        return Some(ReviewReason::OcrTooShort);
    }
    if deal_signal(t) < RETRY_SIGNAL {
        return Some(ReviewReason::WeakPriceSignal);
    }
    None
}
