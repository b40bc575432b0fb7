use tracing::debug;

use crate::candidates::pick_best_sale_price;
use crate::decision::decide;
use crate::hash::offer_key;
use crate::name::extract_item_name;
use crate::profile::StoreProfile;
use crate::promo::{extract_limit, extract_percent_off};
use crate::scoring::score_offer;
use crate::types::{OfferOutcome, ParsedOffer, RejectReason, Rejection, ScoreFlag};

/// Shorter units (trimmed) are treated as empty.
const MIN_UNIT_CHARS: usize = 5;

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct OfferExtractor;

impl OfferExtractor {
    /// Turn one text unit (a block, cluster or fallback window) into an
    /// offer, or the reason it is not one.
    pub fn parse(text: &str, profile: &StoreProfile) -> OfferOutcome {
        if text.trim().chars().count() < MIN_UNIT_CHARS {
            return Err(Rejection::new(RejectReason::EmptyBlob));
        }
        let clean = Self::clean_text(text);

        let percent = extract_percent_off(&clean);
        let pick = pick_best_sale_price(text);
        let decision = decide(text);

        if pick.is_none() && percent.is_none() {
            return Err(Rejection {
                reason: RejectReason::NoPriceOrPercent,
                flags: vec![ScoreFlag::NoPriceOrPercent],
                confidence: None,
                decision: Some(decision),
            });
        }

        let price_line = pick.as_ref().map(|p| p.candidate.line_index);
        let Some(item_name) = extract_item_name(text, price_line) else {
            return Err(Rejection {
                decision: Some(decision),
                ..Rejection::new(RejectReason::NoItemName)
            });
        };

        let score = score_offer(pick.as_ref(), percent.as_ref().map(|(pct, _)| *pct), &item_name);
        if !score.accepted(profile.min_confidence) {
            return Err(Rejection {
                reason: RejectReason::LowConfidence,
                flags: score.flags,
                confidence: Some(score.confidence),
                decision: Some(decision),
            });
        }

        // The cascade may settle on a savings amount; it is reported in
        // `decision` but the price always comes from the line pick.
        let sale_price = pick.as_ref().map(|p| p.sale_price);
        let (percent_off, percent_text) = percent.unzip();

        let offer = ParsedOffer {
            offer_key: offer_key(&profile.name, &item_name, sale_price),
            item_name,
            sale_price,
            unit: pick.as_ref().map(|p| p.unit),
            multibuy_qty: pick.as_ref().and_then(|p| p.multibuy_qty()),
            multibuy_total: pick.as_ref().and_then(|p| p.multibuy_total()),
            percent_off,
            percent_text,
            limit: extract_limit(&clean),
            confidence: score.confidence,
            flags: score.flags,
            raw_token: pick.as_ref().map(|p| p.raw_token().to_string()),
            decision,
        };
        debug!(
            name = %offer.item_name,
            price = ?offer.sale_price,
            confidence = offer.confidence,
            "offer accepted"
        );
        Ok(offer)
    }

    /// Trimmed, non-empty lines.
    fn clean_text(text: &str) -> String {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
