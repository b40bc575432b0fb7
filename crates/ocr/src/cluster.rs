//! Price-anchored clustering of positioned OCR words.
//!
//! Used when the OCR collaborator supplies word boxes. Every price-shaped
//! word seeds a cluster of its neighbours; clusters that overlap heavily are
//! the same offer and get merged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::patterns;
use crate::profile::StoreProfile;

/// Clusters overlapping at least this much are merged.
const MERGE_IOU: f32 = 0.35;

/// Axis-aligned box in page pixels, `x0,y0` top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn union(self, other: BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Degenerate sides count as one pixel.
    fn area(self) -> f64 {
        let w = (i64::from(self.x1) - i64::from(self.x0)).max(1);
        let h = (i64::from(self.y1) - i64::from(self.y0)).max(1);
        w as f64 * h as f64
    }

    pub fn iou(self, other: BBox) -> f32 {
        let iw = (i64::from(self.x1.min(other.x1)) - i64::from(self.x0.max(other.x0))).max(0);
        let ih = (i64::from(self.y1.min(other.y1)) - i64::from(self.y0.max(other.y0))).max(0);
        if iw == 0 || ih == 0 {
            return 0.0;
        }
        let inter = iw as f64 * ih as f64;
        (inter / (self.area() + other.area() - inter)) as f32
    }
}

/// One recognized word with its box and engine confidence (0–100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBox,
    pub conf: i32,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, bbox: BBox, conf: i32) -> Self {
        Self { text: text.into(), bbox, conf }
    }

    // Widened so extreme engine coordinates cannot overflow.
    fn center(&self) -> (f32, f32) {
        let b = self.bbox;
        (
            (i64::from(b.x0) + i64::from(b.x1)) as f32 / 2.0,
            (i64::from(b.y0) + i64::from(b.y1)) as f32 / 2.0,
        )
    }

    fn height(&self) -> i64 {
        i64::from(self.bbox.y1) - i64::from(self.bbox.y0)
    }

    fn distance(&self, other: &OcrWord) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }

    fn identity(&self) -> (BBox, &str) {
        (self.bbox, self.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferCluster {
    pub page_index: usize,
    pub bbox: BBox,
    pub anchor_text: String,
    /// Sorted top-to-bottom, then left-to-right.
    pub words: Vec<OcrWord>,
}

impl OfferCluster {
    /// Member words as reading-order text, one visual row per line.
    ///
    /// A word starts a new row when its vertical centre sits more than half
    /// the current row's height below the row's first word.
    pub fn text_block(&self) -> String {
        let mut words: Vec<&OcrWord> = self.words.iter().filter(|w| !w.text.trim().is_empty()).collect();
        words.sort_by_key(|w| (w.bbox.y0, w.bbox.x0));

        let mut rows: Vec<Vec<&OcrWord>> = Vec::new();
        for word in words {
            match rows.last_mut() {
                Some(row) if same_row(row[0], word) => row.push(word),
                _ => rows.push(vec![word]),
            }
        }
        rows.iter_mut()
            .map(|row| {
                row.sort_by_key(|w| w.bbox.x0);
                row.iter().map(|w| w.text.trim()).collect::<Vec<_>>().join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn same_row(first: &OcrWord, word: &OcrWord) -> bool {
    let half = (first.height().max(word.height()) as f32 / 2.0).max(1.0);
    (word.center().1 - first.center().1).abs() <= half
}

/// Group a page's words into offer-shaped clusters. Zero anchors means zero
/// clusters; bad input never errors.
pub fn build_clusters(page_index: usize, words: &[OcrWord], profile: &StoreProfile) -> Vec<OfferCluster> {
    let knobs = &profile.cluster;
    let usable: Vec<&OcrWord> = words
        .iter()
        .filter(|w| w.conf >= knobs.min_word_conf)
        .filter(|w| !w.text.trim().is_empty())
        .filter(|w| !profile.ignores_word(&w.text))
        .collect();

    let anchors = usable
        .iter()
        .filter(|w| w.conf >= knobs.anchor_conf && patterns::looks_like_price_token(&w.text));

    let mut clusters: Vec<OfferCluster> = Vec::new();
    for anchor in anchors {
        let members: Vec<OcrWord> = usable
            .iter()
            .filter(|w| anchor.distance(w) <= knobs.radius_px)
            .map(|w| (*w).clone())
            .collect();
        if members.len() < knobs.min_words_per_offer {
            continue;
        }
        let bbox = members.iter().fold(anchor.bbox, |acc, w| acc.union(w.bbox));
        clusters.push(OfferCluster {
            page_index,
            bbox,
            anchor_text: anchor.text.clone(),
            words: members,
        });
        if clusters.len() >= knobs.max_offers_per_page {
            break;
        }
    }

    let mut merged = merge_overlapping(clusters);
    for cluster in &mut merged {
        cluster.words.sort_by_key(|w| (w.bbox.y0, w.bbox.x0));
    }
    merged
}

fn merge_overlapping(mut clusters: Vec<OfferCluster>) -> Vec<OfferCluster> {
    clusters.sort_by_key(|c| (c.bbox.y0, c.bbox.x0));
    let mut merged: Vec<OfferCluster> = Vec::new();
    for cluster in clusters {
        let Some(target) = merged.iter_mut().find(|m| cluster.bbox.iou(m.bbox) >= MERGE_IOU) else {
            merged.push(cluster);
            continue;
        };
        target.bbox = target.bbox.union(cluster.bbox);
        let mut seen: HashSet<(BBox, String)> = target
            .words
            .iter()
            .map(|w| (w.bbox, w.text.clone()))
            .collect();
        for word in cluster.words {
            let (bbox, text) = word.identity();
            if seen.insert((bbox, text.to_string())) {
                target.words.push(word);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;

    fn word(text: &str, x0: i32, y0: i32, conf: i32) -> OcrWord {
        let width = 12 * text.chars().count() as i32;
        OcrWord::new(text, BBox::new(x0, y0, x0 + width, y0 + 20), conf)
    }

    fn chicken_offer(x: i32, y: i32) -> Vec<OcrWord> {
        vec![
            word("Boneless", x, y, 90),
            word("Chicken", x + 110, y, 90),
            word("Breast", x + 200, y, 90),
            word("$2.99", x, y + 40, 95),
            word("/lb", x + 70, y + 40, 90),
        ]
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BBox::new(0, 0, 10, 10);
        assert_eq!(a.iou(a), 1.0);
        assert_eq!(a.iou(BBox::new(20, 20, 30, 30)), 0.0);
        let half = a.iou(BBox::new(5, 0, 15, 10));
        assert!((half - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn single_anchor_builds_one_cluster() {
        let profile = ProfileRegistry::builtin().get("default");
        let clusters = build_clusters(3, &chicken_offer(100, 100), &profile);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.page_index, 3);
        assert_eq!(cluster.anchor_text, "$2.99");
        assert_eq!(cluster.words.len(), 5);
        assert_eq!(cluster.text_block(), "Boneless Chicken Breast\n$2.99 /lb");
    }

    #[test]
    fn no_anchor_no_cluster() {
        let profile = ProfileRegistry::builtin().get("default");
        let words = vec![word("Fresh", 0, 0, 90), word("Salmon", 80, 0, 90)];
        assert!(build_clusters(0, &words, &profile).is_empty());
        assert!(build_clusters(0, &[], &profile).is_empty());
    }

    #[test]
    fn low_confidence_anchor_ignored() {
        let profile = ProfileRegistry::builtin().get("default");
        let mut words = chicken_offer(0, 0);
        words[3].conf = 38; // usable but below anchor_conf 40
        assert!(build_clusters(0, &words, &profile).is_empty());
    }

    #[test]
    fn overlapping_anchors_merge_without_duplicate_words() {
        let profile = ProfileRegistry::builtin().get("default");
        let mut words = chicken_offer(0, 0);
        words.push(word("2/$5", 0, 80, 95));
        let clusters = build_clusters(0, &words, &profile);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].words.len(), 6);
    }

    #[test]
    fn distant_offers_stay_apart() {
        let profile = ProfileRegistry::builtin().get("default");
        let mut words = chicken_offer(0, 0);
        words.extend(chicken_offer(2000, 2000));
        let clusters = build_clusters(0, &words, &profile);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].bbox.y0 < clusters[1].bbox.y0);
    }

    #[test]
    fn ignore_pattern_and_min_words() {
        let profile = ProfileRegistry::builtin().get("wegmans");
        let words = vec![
            word("NG", 0, 0, 99),
            word("FP", 40, 0, 99),
            word("Bread", 80, 0, 90),
            word("$3.49", 0, 40, 95),
        ];
        // Badges are dropped, leaving two words under the minimum of four.
        assert!(build_clusters(0, &words, &profile).is_empty());
    }

    #[test]
    fn max_offers_caps_clusters() {
        let mut profile = (*ProfileRegistry::builtin().get("default")).clone();
        profile.cluster.max_offers_per_page = 1;
        let mut words = chicken_offer(0, 0);
        words.extend(chicken_offer(2000, 2000));
        assert_eq!(build_clusters(0, &words, &profile).len(), 1);
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let whole = BBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert!((whole.iou(whole) - 1.0).abs() < 1e-6);
        assert_eq!(whole.iou(BBox::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX)), 0.0);

        let corner = BBox::new(i32::MAX - 100, i32::MAX - 40, i32::MAX, i32::MAX);
        let mut words: Vec<OcrWord> = ["Boneless", "Chicken", "Breast", "$2.99", "/lb"]
            .into_iter()
            .map(|t| OcrWord::new(t, corner, 95))
            .collect();
        words.push(OcrWord::new("Sale", whole, 95));
        let profile = ProfileRegistry::builtin().get("default");
        let clusters = build_clusters(0, &words, &profile);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].text_block().contains("$2.99"));
    }
}
