use flyerscan_core::Price;
use serde::{Deserialize, Serialize, Serializer};

/// Pricing unit printed next to a sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "lb")]
    Pound,
    #[serde(rename = "oz")]
    Ounce,
    #[serde(rename = "ct")]
    Count,
    #[serde(rename = "ea")]
    Each,
    #[serde(rename = "gal")]
    Gallon,
    #[serde(rename = "qt")]
    Quart,
    #[serde(rename = "pt")]
    Pint,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Unit::Pound => "lb",
            Unit::Ounce => "oz",
            Unit::Count => "ct",
            Unit::Each => "ea",
            Unit::Gallon => "gal",
            Unit::Quart => "qt",
            Unit::Pint => "pt",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Unit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lb" | "lbs" => Ok(Unit::Pound),
            "oz" => Ok(Unit::Ounce),
            "ct" => Ok(Unit::Count),
            "ea" | "each" => Ok(Unit::Each),
            "gal" => Ok(Unit::Gallon),
            "qt" => Ok(Unit::Quart),
            "pt" => Ok(Unit::Pint),
            other => Err(format!("Unknown unit: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoType {
    None,
    MultiBuy,
    Bogo,
    PercentOff,
    Range,
    Plain,
}

impl std::fmt::Display for PromoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromoType::None => write!(f, "none"),
            PromoType::MultiBuy => write!(f, "multi_buy"),
            PromoType::Bogo => write!(f, "bogo"),
            PromoType::PercentOff => write!(f, "percent_off"),
            PromoType::Range => write!(f, "range"),
            PromoType::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Ok,
    PromoOnly,
    Failed,
}

impl std::fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseStatus::Ok => write!(f, "ok"),
            ParseStatus::PromoOnly => write!(f, "promo_only"),
            ParseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of the rule cascade for one block of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDecision {
    pub sale_price: Option<Price>,
    pub regular_price: Option<Price>,
    pub promo_type: PromoType,
    pub promo_text: Option<String>,
    /// Effective per-item price of a multi-buy.
    pub unit_price: Option<Price>,
    pub unit: Option<Unit>,
    pub percent_off: Option<u8>,
    /// 0.0–1.0 after calibration.
    pub confidence: f32,
    /// Rule tag, with calibration notes appended as `+cal(..)`.
    pub reason: String,
    pub status: ParseStatus,
}

impl PriceDecision {
    pub fn failed(reason: &str, confidence: f32) -> Self {
        Self {
            sale_price: None,
            regular_price: None,
            promo_type: PromoType::None,
            promo_text: None,
            unit_price: None,
            unit: None,
            percent_off: None,
            confidence,
            reason: reason.to_string(),
            status: ParseStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Dollar,
    Cents,
    MultiBuy,
}

/// A price-shaped token found on one line of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub kind: CandidateKind,
    /// Dollar value; for a multi-buy, the per-item price.
    pub value: Price,
    pub raw: String,
    pub line_index: usize,
    /// Byte offset of the token within its line.
    pub position: usize,
    pub per_lb: bool,
    pub each: bool,
    pub junk_context: bool,
    pub multibuy_qty: Option<u32>,
    pub multibuy_total: Option<Price>,
}

/// The winning candidate of a block, with the price rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePick {
    pub sale_price: Price,
    pub unit: Unit,
    pub candidate: PriceCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    PerDay,
    PerTrip,
    PerCustomer,
    Unknown,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitScope::PerDay => write!(f, "per_day"),
            LimitScope::PerTrip => write!(f, "per_trip"),
            LimitScope::PerCustomer => write!(f, "per_customer"),
            LimitScope::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLimit {
    pub qty: u32,
    pub scope: LimitScope,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFlag {
    NoPriceOrPercent,
    ShortName,
    WeakMultibuy,
}

impl std::fmt::Display for ScoreFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreFlag::NoPriceOrPercent => write!(f, "no_price_or_percent"),
            ScoreFlag::ShortName => write!(f, "short_name"),
            ScoreFlag::WeakMultibuy => write!(f, "weak_multibuy"),
        }
    }
}

/// An accepted promotional offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedOffer {
    pub item_name: String,
    pub sale_price: Option<Price>,
    pub unit: Option<Unit>,
    pub multibuy_qty: Option<u32>,
    pub multibuy_total: Option<Price>,
    pub percent_off: Option<u8>,
    pub percent_text: Option<String>,
    pub limit: Option<PurchaseLimit>,
    /// 0–100.
    pub confidence: u8,
    pub flags: Vec<ScoreFlag>,
    /// Token the sale price was read from.
    pub raw_token: Option<String>,
    pub decision: PriceDecision,
    pub offer_key: String,
}

impl ParsedOffer {
    pub fn promo_type(&self) -> PromoType {
        self.decision.promo_type
    }

    /// Score flags joined with `;`, or `None` when the offer scored clean.
    pub fn flag_summary(&self) -> Option<String> {
        if self.flags.is_empty() {
            return None;
        }
        Some(self.flags.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(";"))
    }
}

/// Why a text unit produced no offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyBlob,
    NoPriceOrPercent,
    NoItemName,
    LowConfidence,
    ReadError(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyBlob => write!(f, "empty_blob"),
            RejectReason::NoPriceOrPercent => write!(f, "no_price_or_percent"),
            RejectReason::NoItemName => write!(f, "no_item_name"),
            RejectReason::LowConfidence => write!(f, "low_confidence"),
            RejectReason::ReadError(detail) => write!(f, "read_error:{detail}"),
        }
    }
}

impl Serialize for RejectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub flags: Vec<ScoreFlag>,
    pub confidence: Option<u8>,
    pub decision: Option<PriceDecision>,
}

impl Rejection {
    pub fn new(reason: RejectReason) -> Self {
        Self { reason, flags: Vec::new(), confidence: None, decision: None }
    }
}

/// Either an accepted offer or the reason there is none.
pub type OfferOutcome = Result<ParsedOffer, Rejection>;

/// Status word for an outcome: `ok` or the rejection reason.
pub fn outcome_status(outcome: &OfferOutcome) -> String {
    match outcome {
        Ok(_) => "ok".to_string(),
        Err(rejection) => rejection.reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unit_parses_aliases() {
        assert_eq!(Unit::from_str("lbs").unwrap(), Unit::Pound);
        assert_eq!(Unit::from_str("EACH").unwrap(), Unit::Each);
        assert!(Unit::from_str("bag").is_err());
        assert_eq!(Unit::Pound.to_string(), "lb");
    }

    #[test]
    fn unit_serializes_short_form() {
        assert_eq!(serde_json::to_string(&Unit::Each).unwrap(), "\"ea\"");
    }

    #[test]
    fn promo_type_display_matches_serde() {
        for promo in [PromoType::MultiBuy, PromoType::PercentOff, PromoType::Plain] {
            let json = serde_json::to_string(&promo).unwrap();
            assert_eq!(json, format!("\"{promo}\""));
        }
    }

    #[test]
    fn reject_reason_vocabulary() {
        assert_eq!(RejectReason::EmptyBlob.to_string(), "empty_blob");
        assert_eq!(RejectReason::LowConfidence.to_string(), "low_confidence");
        assert_eq!(
            RejectReason::ReadError("not found".into()).to_string(),
            "read_error:not found"
        );
        let json = serde_json::to_string(&RejectReason::NoItemName).unwrap();
        assert_eq!(json, "\"no_item_name\"");
    }

    #[test]
    fn outcome_status_words() {
        let rejected: OfferOutcome = Err(Rejection::new(RejectReason::NoPriceOrPercent));
        assert_eq!(outcome_status(&rejected), "no_price_or_percent");
    }
}
