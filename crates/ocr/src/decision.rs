//! Sale price and promotion decision for one block of text.
//!
//! The cascade is an ordered table of pure rules over [`Signals`]; the first
//! rule that returns a decision wins. A calibration pass then nudges the
//! confidence without touching the prices or the promotion it chose.

use flyerscan_core::Price;
use tracing::trace;

use crate::normalize::fold_for_rules;
use crate::patterns;
use crate::types::{ParseStatus, PriceDecision, PromoType, Unit};

/// Everything the rules look at, read once from the folded text.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub text: String,
    pub prices: Vec<Price>,
    pub percent: Option<u8>,
    pub multi_buy: Option<(u32, Price)>,
    pub range: Option<(Price, Price)>,
    pub unit: Option<Unit>,
}

impl Signals {
    pub fn read(folded: &str) -> Self {
        Self {
            text: folded.to_string(),
            prices: patterns::rule_prices(folded),
            percent: patterns::rule_percent_off(folded),
            multi_buy: patterns::rule_multi_buy(folded),
            range: patterns::rule_price_range(folded),
            unit: patterns::rule_unit(folded),
        }
    }

    fn has_explicit_pay(&self) -> bool {
        patterns::has_explicit_pay_cue(&self.text)
    }

    fn percent_promo(&self) -> (PromoType, Option<String>) {
        match self.percent {
            Some(pct) => (PromoType::PercentOff, Some(format!("{pct}% off"))),
            None => (PromoType::None, None),
        }
    }

    fn decision(&self, reason: &str, confidence: f32, status: ParseStatus) -> PriceDecision {
        PriceDecision {
            sale_price: None,
            regular_price: None,
            promo_type: PromoType::None,
            promo_text: None,
            unit_price: None,
            unit: self.unit,
            percent_off: self.percent,
            confidence,
            reason: reason.to_string(),
            status,
        }
    }
}

type Rule = fn(&Signals) -> Option<PriceDecision>;

/// Evaluated in order; the last rule always fires.
const RULES: &[(&str, Rule)] = &[
    ("bogo", bogo),
    ("multi_buy", multi_buy),
    ("range", range),
    ("percent_only", percent_only),
    ("explicit_pay", explicit_pay),
    ("two_prices", two_prices),
    ("single_price", single_price),
    ("nothing", nothing),
];

const LABELED_REASON: &str = "labeled_sale_vs_regular";

fn bogo(s: &Signals) -> Option<PriceDecision> {
    if !patterns::has_bogo(&s.text) {
        return None;
    }
    let promo_text = if patterns::has_bogo_half(&s.text) {
        "BOGO 50%"
    } else if s.text.contains("bogo") {
        "BOGO"
    } else {
        "Buy 1 Get 1"
    };
    let mut d = match s.prices.first() {
        Some(&first) if s.has_explicit_pay() => PriceDecision {
            sale_price: Some(first),
            ..s.decision("explicit_pay_price_with_bogo", 0.98, ParseStatus::Ok)
        },
        _ => s.decision("promo_only_bogo", 0.70, ParseStatus::PromoOnly),
    };
    d.promo_type = PromoType::Bogo;
    d.promo_text = Some(promo_text.to_string());
    Some(d)
}

fn multi_buy(s: &Signals) -> Option<PriceDecision> {
    let (qty, total) = s.multi_buy?;
    let each = Price::per_unit(total, qty)?;
    Some(PriceDecision {
        sale_price: Some(each),
        unit_price: Some(each),
        promo_type: PromoType::MultiBuy,
        promo_text: Some(format!("{qty}/${}", total.compact())),
        ..s.decision("multi_buy_unit_price_as_sale", 0.82, ParseStatus::Ok)
    })
}

fn range(s: &Signals) -> Option<PriceDecision> {
    let (lo, hi) = s.range?;
    Some(PriceDecision {
        promo_type: PromoType::Range,
        promo_text: Some(format!("{lo}-{hi}").replace(".00", "")),
        ..s.decision("promo_only_range", 0.55, ParseStatus::PromoOnly)
    })
}

fn percent_only(s: &Signals) -> Option<PriceDecision> {
    let pct = s.percent?;
    if !s.prices.is_empty() {
        return None;
    }
    Some(PriceDecision {
        promo_type: PromoType::PercentOff,
        promo_text: Some(format!("{pct}% off")),
        ..s.decision("promo_only_percent", 0.40, ParseStatus::PromoOnly)
    })
}

fn explicit_pay(s: &Signals) -> Option<PriceDecision> {
    let &first = s.prices.first()?;
    if !s.has_explicit_pay() {
        return None;
    }
    let regular = patterns::rule_regular_price(&s.text);
    let (sale, reason) = match regular {
        Some(reg) => {
            let low = s.prices.iter().copied().chain([first, reg]).min().unwrap_or(first);
            (low, "explicit_pay_price_with_regular")
        }
        None => (first, "explicit_pay_price"),
    };
    let (promo_type, promo_text) = match s.percent_promo() {
        (PromoType::None, _) => (PromoType::Plain, None),
        other => other,
    };
    Some(PriceDecision {
        sale_price: Some(sale),
        regular_price: regular,
        promo_type,
        promo_text,
        ..s.decision(reason, 0.98, ParseStatus::Ok)
    })
}

/// Lowest price is taken as the sale price. Without both a regular and a sale
/// cue this is a guess and scores accordingly.
fn two_prices(s: &Signals) -> Option<PriceDecision> {
    if s.prices.len() < 2 {
        return None;
    }
    let low = s.prices.iter().min().copied();
    let high = s.prices.iter().max().copied();
    let labeled = patterns::has_regular_cue(&s.text) && patterns::has_sale_cue(&s.text);
    let (reason, confidence) = if labeled {
        (LABELED_REASON, 0.92)
    } else {
        ("two_prices_guess_low_is_sale", 0.75)
    };
    let (promo_type, promo_text) = s.percent_promo();
    Some(PriceDecision {
        sale_price: low,
        regular_price: high,
        promo_type,
        promo_text,
        ..s.decision(reason, confidence, ParseStatus::Ok)
    })
}

fn single_price(s: &Signals) -> Option<PriceDecision> {
    let [only] = s.prices.as_slice() else { return None };
    let reason = if s.unit.is_some() { "single_price_with_unit" } else { "single_price" };
    let (promo_type, promo_text) = s.percent_promo();
    Some(PriceDecision {
        sale_price: Some(*only),
        promo_type,
        promo_text,
        ..s.decision(reason, 0.84, ParseStatus::Ok)
    })
}

fn nothing(s: &Signals) -> Option<PriceDecision> {
    Some(s.decision("no_price_no_promo", 0.15, ParseStatus::Failed))
}

/// Confidence post-pass. Notes are appended to the reason as `+cal(..)`.
fn calibrate(mut d: PriceDecision, s: &Signals) -> PriceDecision {
    let mut conf = d.confidence;
    let mut notes: Vec<&str> = Vec::new();
    let ok_with_sale = d.status == ParseStatus::Ok && d.sale_price.is_some();

    if s.text.chars().count() < 20 || s.text.split_whitespace().count() < 4 {
        conf -= 0.08;
        notes.push("short_text");
    }
    if ok_with_sale {
        conf += 0.03;
        notes.push("has_sale_price");
    }
    if ok_with_sale && s.percent.is_some() {
        conf += 0.04;
        notes.push("pct_plus_price");
    }
    if d.status == ParseStatus::Ok && s.unit.is_some() {
        conf += 0.02;
        notes.push("unit_present");
    }
    if s.prices.len() >= 4 && d.reason != LABELED_REASON {
        conf -= 0.06;
        notes.push("many_prices");
    }
    if d.status == ParseStatus::PromoOnly {
        conf = conf.min(0.85);
    }

    d.confidence = conf.clamp(0.0, 1.0);
    if !notes.is_empty() {
        d.reason = format!("{}+cal({})", d.reason, notes.join(","));
    }
    d
}

/// Run the cascade over one block's raw text.
pub fn decide(raw_text: &str) -> PriceDecision {
    let folded = fold_for_rules(raw_text);
    if folded.is_empty() {
        return PriceDecision::failed("empty_text", 0.0);
    }
    let signals = Signals::read(&folded);
    let (rule, decision) = RULES
        .iter()
        .find_map(|(name, rule)| rule(&signals).map(|d| (*name, d)))
        .unwrap_or_else(|| ("nothing", PriceDecision::failed("no_price_no_promo", 0.15)));
    trace!(rule, prices = signals.prices.len(), "price rule fired");
    calibrate(decision, &signals)
}
