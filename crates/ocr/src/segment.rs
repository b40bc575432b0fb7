//! Blank-line block segmentation with rescue merging.

use std::collections::HashSet;

use crate::patterns;
use crate::profile::SegmentKnobs;

/// Lines that never belong to an offer.
const JUNK_LINES: &[&str] = &["add to cart", "regular prices vary"];

/// One candidate offer: a run of lines. A rescue-merged block keeps an empty
/// line between the pieces it absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub lines: Vec<String>,
}

impl RawBlock {
    pub fn text(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }

    /// Non-empty lines joined with single spaces.
    fn joined(&self) -> String {
        join_lines(&self.lines)
    }
}

fn join_lines(lines: &[String]) -> String {
    lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Drop junk lines and collapse blank runs. Leading and trailing blanks go.
fn clean_lines(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if JUNK_LINES.contains(&line.to_lowercase().as_str()) {
            continue;
        }
        if line.is_empty() && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

fn split_blocks(lines: Vec<String>) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut cur: Vec<String> = Vec::new();
    for line in lines {
        if line.is_empty() {
            if !cur.is_empty() {
                blocks.push(RawBlock { lines: std::mem::take(&mut cur) });
            }
            continue;
        }
        cur.push(line);
    }
    if !cur.is_empty() {
        blocks.push(RawBlock { lines: cur });
    }
    blocks
}

fn should_keep(block: &RawBlock, min_len: usize) -> bool {
    let joined = block.joined();
    if block.lines.iter().all(|l| patterns::is_validity_line(l)) {
        return patterns::has_price_token(&joined);
    }
    joined.chars().count() >= min_len
}

fn is_merge_target(block: &RawBlock) -> bool {
    let joined = block.joined();
    !joined.is_empty() && (patterns::has_price_token(&joined) || patterns::has_digits(&joined))
}

fn needs_rescue(block: &RawBlock) -> bool {
    let joined = block.joined();
    !patterns::has_price_token(&joined) && patterns::has_percent_or_prime(&joined)
}

/// Split normalized text into offer-sized blocks.
///
/// A kept block with a `% off` / `prime` cue but no price token absorbs up to
/// `merge_lookahead` following blocks that carry digits, stopping as soon as
/// the merged text has a price. Absorbed blocks are never emitted on their
/// own.
pub fn segment(text: &str, knobs: &SegmentKnobs) -> Vec<RawBlock> {
    let blocks = split_blocks(clean_lines(text));
    let mut used: HashSet<usize> = HashSet::new();
    let mut out = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        if used.contains(&i) || !should_keep(block, knobs.min_block_len) {
            continue;
        }
        let mut merged = block.lines.clone();
        if needs_rescue(block) {
            for j in (i + 1)..=(i + knobs.merge_lookahead) {
                let Some(next) = blocks.get(j) else { break };
                if used.contains(&j) || !is_merge_target(next) {
                    continue;
                }
                merged.push(String::new());
                merged.extend(next.lines.iter().cloned());
                used.insert(j);
                if patterns::has_price_token(&join_lines(&merged)) {
                    break;
                }
            }
        }
        used.insert(i);
        let block = RawBlock { lines: merged };
        if !block.text().is_empty() {
            out.push(block);
        }
    }
    out
}
