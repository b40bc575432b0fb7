//! Offer confidence (0–100) and acceptance.

use crate::types::{PricePick, ScoreFlag};

/// Default acceptance threshold.
pub const MIN_CONFIDENCE: u8 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferScore {
    pub confidence: u8,
    pub flags: Vec<ScoreFlag>,
}

impl OfferScore {
    pub fn accepted(&self, threshold: u8) -> bool {
        self.confidence >= threshold
    }
}

/// Fuse the deal signal, name quality, unit and multi-buy completeness.
pub fn score_offer(pick: Option<&PricePick>, percent_off: Option<u8>, item_name: &str) -> OfferScore {
    let mut confidence: i32 = 0;
    let mut flags = Vec::new();

    if pick.is_some() || percent_off.is_some() {
        confidence += 35;
    } else {
        flags.push(ScoreFlag::NoPriceOrPercent);
    }

    if item_name.split_whitespace().count() >= 2 {
        confidence += 35;
    } else {
        confidence += 20;
        flags.push(ScoreFlag::ShortName);
    }

    if let Some(pick) = pick {
        // Every pick resolves to `lb` or `ea`.
        confidence += 10;
        if pick.is_multibuy() {
            if pick.multibuy_qty().is_some() && pick.multibuy_total().is_some() {
                confidence += 10;
            } else {
                flags.push(ScoreFlag::WeakMultibuy);
            }
        }
    }

    OfferScore {
        confidence: confidence.clamp(0, 100) as u8,
        flags,
    }
}
