use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flyerscan_core::DateRange;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cluster::{build_clusters, OcrWord};
use crate::dates::parse_sale_window;
use crate::dedupe::dedupe_offers;
use crate::extract::OfferExtractor;
use crate::fallback::price_windows;
use crate::hash;
use crate::normalize::normalize;
use crate::profile::{ProfileRegistry, StoreProfile};
use crate::segment::segment;
use crate::signal::{best_pass, review_reason, OcrPass, ReviewReason};
use crate::types::{outcome_status, OfferOutcome, ParsedOffer, RejectReason, Rejection};

/// Default time a single page may take before it is abandoned.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One page as handed over by the OCR collaborator.
#[derive(Debug, Clone, Default)]
pub struct PageInput {
    pub page_index: usize,
    pub text: String,
    /// Positioned words, when the OCR engine reports them.
    pub words: Option<Vec<OcrWord>>,
    /// Name of the OCR pass the text came from.
    pub pass_name: Option<String>,
}

impl PageInput {
    pub fn text(page_index: usize, text: impl Into<String>) -> Self {
        Self { page_index, text: text.into(), ..Self::default() }
    }

    pub fn with_words(page_index: usize, text: impl Into<String>, words: Vec<OcrWord>) -> Self {
        Self { page_index, text: text.into(), words: Some(words), pass_name: None }
    }

    /// The pass with the strongest deal signal among several OCR renditions
    /// of the same page.
    pub fn from_passes(page_index: usize, passes: &[OcrPass]) -> Option<Self> {
        let best = best_pass(passes)?;
        Some(Self {
            page_index,
            text: best.text.clone(),
            words: None,
            pass_name: Some(best.name.clone()),
        })
    }
}

/// How a page was cut into text units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    Blocks,
    Clusters,
    Fallback,
}

impl fmt::Display for PageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PageMode::Blocks => "blocks",
            PageMode::Clusters => "clusters",
            PageMode::Fallback => "fallback",
        };
        write!(f, "{s}")
    }
}

/// Why a page produced no units at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFailure {
    ReadError(String),
    TimedOut,
    Panicked,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageFailure::ReadError(detail) => write!(f, "read_error:{detail}"),
            PageFailure::TimedOut => write!(f, "timed_out"),
            PageFailure::Panicked => write!(f, "panicked"),
        }
    }
}

impl Serialize for PageFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one text unit, as exported.
#[derive(Debug, Clone, Serialize)]
pub struct UnitRecord {
    pub page_index: usize,
    pub unit_index: usize,
    pub unit_key: String,
    /// `ok` or a rejection reason.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<ParsedOffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl UnitRecord {
    fn new(page_index: usize, unit_index: usize, text: &str, outcome: OfferOutcome) -> Self {
        let status = outcome_status(&outcome);
        let (offer, rejection) = match outcome {
            Ok(offer) => (Some(offer), None),
            Err(rejection) => (None, Some(rejection)),
        };
        Self {
            page_index,
            unit_index,
            unit_key: hash::unit_key(text),
            status,
            offer,
            rejection,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page_index: usize,
    pub mode: PageMode,
    pub pass_name: Option<String>,
    /// Every unit in page order, accepted or not.
    pub units: Vec<UnitRecord>,
    /// Accepted offers with duplicates removed.
    pub offers: Vec<ParsedOffer>,
    pub sale_window: Option<DateRange>,
    pub review: Option<ReviewReason>,
    pub failure: Option<PageFailure>,
}

impl PageReport {
    fn failed(page_index: usize, failure: PageFailure) -> Self {
        let units = match &failure {
            PageFailure::ReadError(detail) => vec![UnitRecord::new(
                page_index,
                0,
                "",
                Err(Rejection::new(RejectReason::ReadError(detail.clone()))),
            )],
            PageFailure::TimedOut | PageFailure::Panicked => Vec::new(),
        };
        Self {
            page_index,
            mode: PageMode::Blocks,
            pass_name: None,
            units,
            offers: Vec::new(),
            sale_window: None,
            review: None,
            failure: Some(failure),
        }
    }

    pub fn accepted(&self) -> usize {
        self.units.iter().filter(|u| u.offer.is_some()).count()
    }
}

/// A sale or a regular price counts as a price for page review.
fn has_price(offer: &ParsedOffer) -> bool {
    offer.sale_price.is_some() || offer.decision.regular_price.is_some()
}

/// Parses flyer pages for one store.
#[derive(Debug, Clone)]
pub struct OfferPipeline {
    profile: Arc<StoreProfile>,
    default_year: i32,
    page_timeout: Duration,
}

impl OfferPipeline {
    /// `default_year` dates sale windows that print no year.
    pub fn new(profile: Arc<StoreProfile>, default_year: i32) -> Self {
        Self { profile, default_year, page_timeout: PAGE_TIMEOUT }
    }

    /// Pipeline for a store key; unknown stores get the default profile.
    pub fn for_store(registry: &ProfileRegistry, store: &str, default_year: i32) -> Self {
        Self::new(registry.get(store), default_year)
    }

    pub fn with_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    pub fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    /// Cut a page into units, parse each and collect the page's offers.
    ///
    /// Positioned words are clustered when any cluster forms. Otherwise the
    /// text is segmented into blocks, falling back to price windows when the
    /// profile allows it and blocks come up short.
    pub fn parse_page(&self, page: &PageInput) -> PageReport {
        let (mode, units) = self.units_for(page);

        let mut records: Vec<UnitRecord> = units
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let outcome = OfferExtractor::parse(text, &self.profile);
                let record = UnitRecord::new(page.page_index, i, text, outcome);
                debug!(page = page.page_index, unit = i, status = %record.status, "unit parsed");
                record
            })
            .collect();
        if records.is_empty() {
            let reason = if page.text.trim().is_empty() {
                RejectReason::EmptyBlob
            } else {
                RejectReason::NoPriceOrPercent
            };
            debug!(page = page.page_index, %reason, "page produced no units");
            records.push(UnitRecord::new(page.page_index, 0, &page.text, Err(Rejection::new(reason))));
        }

        let offers = dedupe_offers(records.iter().filter_map(|r| r.offer.clone()).collect());
        let found_price = offers.iter().any(has_price);
        let page_text = if page.text.trim().is_empty() { units.join("\n") } else { page.text.clone() };

        let report = PageReport {
            page_index: page.page_index,
            mode,
            pass_name: page.pass_name.clone(),
            units: records,
            offers,
            sale_window: parse_sale_window(&page_text, self.default_year),
            review: review_reason(&page_text, found_price),
            failure: None,
        };
        info!(
            page = report.page_index,
            mode = %report.mode,
            units = report.units.len(),
            accepted = report.accepted(),
            offers = report.offers.len(),
            "page parsed"
        );
        report
    }

    fn units_for(&self, page: &PageInput) -> (PageMode, Vec<String>) {
        if let Some(words) = page.words.as_deref().filter(|w| !w.is_empty()) {
            let clusters = build_clusters(page.page_index, words, &self.profile);
            if !clusters.is_empty() {
                return (PageMode::Clusters, clusters.iter().map(|c| c.text_block()).collect());
            }
        }

        let blocks: Vec<String> = segment(&normalize(&page.text), &self.profile.segment)
            .iter()
            .map(|b| b.text())
            .collect();
        let fallback = &self.profile.fallback;
        if fallback.enabled && blocks.len() < fallback.min_offers {
            let windows = price_windows(&page.text, fallback);
            if !windows.is_empty() {
                return (PageMode::Fallback, windows);
            }
        }
        (PageMode::Blocks, blocks)
    }

    /// Parse pages on the blocking pool, each under the page timeout.
    /// Reports come back in page order; a page that times out or panics is
    /// reported as failed rather than dropped.
    pub async fn parse_pages(&self, pages: Vec<PageInput>) -> Vec<PageReport> {
        let mut tasks = JoinSet::new();
        for page in pages {
            let pipeline = self.clone();
            tasks.spawn(async move {
                let page_index = page.page_index;
                let limit = pipeline.page_timeout;
                let work = tokio::task::spawn_blocking(move || pipeline.parse_page(&page));
                match tokio::time::timeout(limit, work).await {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) => {
                        warn!(page = page_index, error = %e, "page task failed");
                        PageReport::failed(page_index, PageFailure::Panicked)
                    }
                    Err(_) => {
                        warn!(page = page_index, "page timed out");
                        PageReport::failed(page_index, PageFailure::TimedOut)
                    }
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "page supervisor failed"),
            }
        }
        reports.sort_by_key(|r| r.page_index);
        reports
    }

    /// Read a page of OCR text from disk and parse it. Read failures become a
    /// failed page whose single unit carries `read_error:<detail>`.
    pub async fn parse_file(&self, page_index: usize, path: &Path) -> PageReport {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let mut reports = self.parse_pages(vec![PageInput::text(page_index, text)]).await;
                reports.pop().unwrap_or_else(|| PageReport::failed(page_index, PageFailure::Panicked))
            }
            Err(e) => {
                warn!(page = page_index, path = %path.display(), error = %e, "failed to read page");
                PageReport::failed(page_index, PageFailure::ReadError(e.to_string()))
            }
        }
    }
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Write every unit of every report as one JSON object per line.
pub fn write_json_lines<W: Write>(reports: &[PageReport], out: &mut W) -> Result<(), PipelineError> {
    for unit in reports.iter().flat_map(|r| &r.units) {
        serde_json::to_writer(&mut *out, unit)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// [`write_json_lines`] into a file, replacing it.
pub async fn export_json_lines(reports: &[PageReport], path: &Path) -> Result<(), PipelineError> {
    let mut buf = Vec::new();
    write_json_lines(reports, &mut buf)?;
    tokio::fs::write(path, buf).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::BBox;
    use chrono::NaiveDate;

    const TWO_OFFERS: &str = "Boneless Chicken Breast\n$2.99 /lb\nLimit 2 per customer\n\n\
                              2/$5.00\nCanned Tomato Soup\n\nValid 12/28-01/03";

    fn pipeline(store: &str) -> OfferPipeline {
        OfferPipeline::for_store(&ProfileRegistry::builtin(), store, 2025)
    }

    fn word(text: &str, x0: i32, y0: i32) -> OcrWord {
        let width = 12 * text.chars().count() as i32;
        OcrWord::new(text, BBox::new(x0, y0, x0 + width, y0 + 20), 90)
    }

    fn chicken_words(x: i32, y: i32) -> Vec<OcrWord> {
        vec![
            word("Boneless", x, y),
            word("Chicken", x + 110, y),
            word("Breast", x + 200, y),
            word("$2.99", x, y + 40),
            word("/lb", x + 70, y + 40),
        ]
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn block_mode_page() {
        let report = pipeline("default").parse_page(&PageInput::text(0, TWO_OFFERS));
        assert_eq!(report.mode, PageMode::Blocks);
        assert!(report.failure.is_none());
        let names: Vec<&str> = report.offers.iter().map(|o| o.item_name.as_str()).collect();
        assert_eq!(names, vec!["Boneless Chicken Breast", "Canned Tomato Soup"]);
        assert_eq!(report.accepted(), 2);

        let window = report.sale_window.unwrap();
        assert_eq!((window.start, window.end), (d(2025, 12, 28), d(2026, 1, 3)));
        assert_eq!(report.review, None);
    }

    #[test]
    fn cluster_mode_dedupes_repeated_tiles() {
        let mut words = chicken_words(0, 0);
        words.extend(chicken_words(2000, 2000));
        let report = pipeline("default").parse_page(&PageInput::with_words(1, "", words));
        assert_eq!(report.mode, PageMode::Clusters);
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.accepted(), 2);
        assert_eq!(report.offers.len(), 1);
        assert_eq!(report.offers[0].item_name, "Boneless Chicken Breast");
        // No page text: the cluster text stands in and is short for a page.
        assert_eq!(report.review, Some(ReviewReason::OcrTooShort));
    }

    #[test]
    fn words_without_clusters_use_blocks() {
        let words = vec![word("Fresh", 0, 0), word("Salmon", 80, 0)];
        let report = pipeline("default").parse_page(&PageInput::with_words(0, TWO_OFFERS, words));
        assert_eq!(report.mode, PageMode::Blocks);
        assert_eq!(report.offers.len(), 2);
    }

    #[test]
    fn fallback_windows_for_run_on_text() {
        let text = "Weekly finds at low prices Organic Baby Spinach 5 oz 2.49 each while supplies last";
        let report = pipeline("aldi").parse_page(&PageInput::text(0, text));
        assert_eq!(report.mode, PageMode::Fallback);
        assert_eq!(report.units.len(), 1);

        // Fallback is opt-in per store.
        let report = pipeline("default").parse_page(&PageInput::text(0, text));
        assert_eq!(report.mode, PageMode::Blocks);
    }

    #[test]
    fn fallback_without_price_tokens_keeps_blocks() {
        let text = "Store hours are changing this week\nSee you soon, neighbors";
        let report = pipeline("aldi").parse_page(&PageInput::text(0, text));
        assert_eq!(report.mode, PageMode::Blocks);
        assert!(report.offers.is_empty());
    }

    #[test]
    fn empty_page() {
        let report = pipeline("default").parse_page(&PageInput::text(4, ""));
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].status, "empty_blob");
        assert_eq!(report.units[0].page_index, 4);
        assert!(report.offers.is_empty());
        assert_eq!(report.review, None);
        assert_eq!(report.sale_window, None);
        assert!(report.failure.is_none());
    }

    #[test]
    fn page_of_short_fragments_still_reports_a_unit() {
        let report = pipeline("default").parse_page(&PageInput::text(5, "ab\n\ncd"));
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].status, "no_price_or_percent");
        assert_eq!(report.accepted(), 0);
    }

    #[test]
    fn regular_price_counts_for_review() {
        let mut offer = OfferExtractor::parse("Fresh Cut Flower Bouquets\n20% off", &StoreProfile::default())
            .unwrap();
        assert!(!has_price(&offer));
        offer.decision.regular_price = Some(flyerscan_core::Price::from_cents(1299));
        assert!(has_price(&offer));
    }

    #[test]
    fn best_pass_feeds_the_page() {
        let passes = vec![
            OcrPass::new("raw", "Boneless Chicken Breast 2 99"),
            OcrPass::new("clahe", "Boneless Chicken Breast\n$2.99 /lb"),
        ];
        let page = PageInput::from_passes(2, &passes).unwrap();
        let report = pipeline("default").parse_page(&page);
        assert_eq!(report.pass_name.as_deref(), Some("clahe"));
        assert_eq!(report.offers.len(), 1);
    }

    #[tokio::test]
    async fn parse_pages_returns_page_order() {
        let pages = vec![
            PageInput::text(2, "2/$5.00\nCanned Tomato Soup"),
            PageInput::text(0, "Boneless Chicken Breast\n$2.99 /lb"),
            PageInput::text(1, ""),
        ];
        let reports = pipeline("default").parse_pages(pages).await;
        let indexes: Vec<usize> = reports.iter().map(|r| r.page_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(reports[0].offers.len(), 1);
        assert!(reports[1].offers.is_empty());
        assert!(reports.iter().all(|r| r.failure.is_none()));
    }

    #[tokio::test]
    async fn parse_file_reads_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-0.txt");
        tokio::fs::write(&path, TWO_OFFERS).await.unwrap();

        let report = pipeline("wegmans").parse_file(0, &path).await;
        assert!(report.failure.is_none());
        assert_eq!(report.offers.len(), 2);
    }

    #[tokio::test]
    async fn parse_file_maps_missing_file_to_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline("default").parse_file(5, &dir.path().join("missing.txt")).await;
        assert_eq!(report.page_index, 5);
        assert!(matches!(report.failure, Some(PageFailure::ReadError(_))));
        assert_eq!(report.units.len(), 1);
        assert!(report.units[0].status.starts_with("read_error:"));
        assert!(report.failure.unwrap().to_string().starts_with("read_error:"));
    }

    #[test]
    fn json_lines_one_object_per_unit() {
        let report = pipeline("default").parse_page(&PageInput::text(0, TWO_OFFERS));
        let mut buf = Vec::new();
        write_json_lines(std::slice::from_ref(&report), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), report.units.len());

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["status"], "ok");
        assert_eq!(first["offer"]["item_name"], "Boneless Chicken Breast");
        assert_eq!(first["offer"]["sale_price"], "2.99");
        assert_eq!(first["offer"]["unit"], "lb");
        assert!(first.get("rejection").is_none());
    }

    #[tokio::test]
    async fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offers.jsonl");
        let report = pipeline("default").parse_page(&PageInput::text(0, TWO_OFFERS));
        export_json_lines(std::slice::from_ref(&report), &path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written.lines().count(), report.units.len());
    }

    #[test]
    fn failure_labels() {
        assert_eq!(PageFailure::TimedOut.to_string(), "timed_out");
        assert_eq!(PageFailure::Panicked.to_string(), "panicked");
        let failed = PageReport::failed(3, PageFailure::TimedOut);
        assert!(failed.units.is_empty());
        assert_eq!(failed.accepted(), 0);
    }
}
