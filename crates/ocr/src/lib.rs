// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod candidates;
pub mod cluster;
pub mod dates;
pub mod decision;
pub mod dedupe;
pub mod extract;
pub mod fallback;
pub mod hash;
pub mod name;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod profile;
pub mod promo;
pub mod scoring;
pub mod segment;
pub mod signal;
pub mod types;

pub use cluster::{build_clusters, BBox, OcrWord, OfferCluster};
pub use decision::decide;
pub use extract::OfferExtractor;
pub use hash::{offer_key, unit_key};
pub use normalize::normalize;
pub use pipeline::{OfferPipeline, PageInput, PageMode, PageReport, PipelineError};
pub use profile::{ProfileError, ProfileRegistry, StoreProfile};
pub use segment::{segment, RawBlock};
pub use signal::{deal_signal, OcrPass, ReviewReason};
pub use types::{
    OfferOutcome, ParseStatus, ParsedOffer, PriceDecision, PromoType, RejectReason, Rejection,
    Unit,
};
