// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;
use unicode_script::Script;

use crate::{NumberSubstitution, RunChain};

/// Receiver for analyzer results.
///
/// Each setter is called once per distinct value over a contiguous
/// range, in increasing position order. Ranges are relative to the
/// analyzed text. Violated ordering is an unchecked precondition.
pub trait AnalysisSink {
    fn set_script_analysis(&mut self, range: Range<usize>, script: Script);
    fn set_bidi_level(&mut self, range: Range<usize>, level: u8);
    fn set_number_substitution(&mut self, range: Range<usize>, method: NumberSubstitution);
}

/// Forwards sink calls to an inner sink with a position offset,
/// used when analyzing a sub-range of the session text.
pub struct OffsetSink<'a, S: AnalysisSink> {
    inner: &'a mut S,
    offset: usize,
}

impl<'a, S: AnalysisSink> OffsetSink<'a, S> {
    pub fn new(inner: &'a mut S, offset: usize) -> Self {
        Self { inner, offset }
    }
}

impl<S: AnalysisSink> AnalysisSink for OffsetSink<'_, S> {
    fn set_script_analysis(&mut self, range: Range<usize>, script: Script) {
        self.inner
            .set_script_analysis(range.start + self.offset..range.end + self.offset, script);
    }

    fn set_bidi_level(&mut self, range: Range<usize>, level: u8) {
        self.inner
            .set_bidi_level(range.start + self.offset..range.end + self.offset, level);
    }

    fn set_number_substitution(&mut self, range: Range<usize>, method: NumberSubstitution) {
        self.inner
            .set_number_substitution(range.start + self.offset..range.end + self.offset, method);
    }
}

fn push_interval<T>(list: &mut Vec<(Range<usize>, T)>, range: Range<usize>) -> &mut Vec<(Range<usize>, T)> {
    if let Some((last, _)) = list.last() {
        debug_assert!(range.start >= last.end, "analysis ranges out of order");
    }
    debug_assert!(range.start < range.end, "empty analysis range");
    list
}

/// Merges the three independently-reported interval annotations into
/// uniform ranges and re-splits the record chain to match.
#[derive(Debug, Default)]
pub struct Itemizer {
    scripts: Vec<(Range<usize>, Script)>,
    levels: Vec<(Range<usize>, u8)>,
    number_subs: Vec<(Range<usize>, NumberSubstitution)>,
}

impl AnalysisSink for Itemizer {
    fn set_script_analysis(&mut self, range: Range<usize>, script: Script) {
        push_interval(&mut self.scripts, range.clone()).push((range, script));
    }

    fn set_bidi_level(&mut self, range: Range<usize>, level: u8) {
        push_interval(&mut self.levels, range.clone()).push((range, level));
    }

    fn set_number_substitution(&mut self, range: Range<usize>, method: NumberSubstitution) {
        push_interval(&mut self.number_subs, range.clone()).push((range, method));
    }
}

impl Itemizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `chain` so every record carries a single script, bidi
    /// level, and substitution value, splitting records at merged
    /// interval boundaries. `origin` is the absolute position of
    /// relative offset zero; `base_level` is the paragraph base level
    /// applied to line and paragraph terminators.
    pub fn itemize(&self, chain: &mut RunChain, origin: usize, base_level: u8) {
        let total = chain.total_length();
        let mut si = 0;
        let mut li = 0;
        let mut ni = 0;
        let mut rec = 0;
        let mut pos = 0;
        while pos < total {
            // The next boundary is the minimum of the current ranges'
            // ends across every list still covering this position.
            let mut boundary = total;
            let mut covered = false;
            let script = match self.scripts.get(si) {
                Some((range, script)) if range.contains(&pos) => {
                    boundary = boundary.min(range.end);
                    covered = true;
                    *script
                }
                Some((range, _)) => {
                    boundary = boundary.min(range.start.max(pos + 1));
                    Script::Unknown
                }
                None => Script::Unknown,
            };
            let level = match self.levels.get(li) {
                Some((range, level)) if range.contains(&pos) => {
                    boundary = boundary.min(range.end);
                    covered = true;
                    *level
                }
                Some((range, _)) => {
                    boundary = boundary.min(range.start.max(pos + 1));
                    base_level
                }
                None => base_level,
            };
            let number_sub = match self.number_subs.get(ni) {
                Some((range, method)) if range.contains(&pos) => {
                    boundary = boundary.min(range.end);
                    Some(*method)
                }
                // A sparse list may start inside the current merged
                // range; stop the range where it begins.
                Some((range, _)) => {
                    boundary = boundary.min(range.start.max(pos + 1));
                    None
                }
                None => None,
            };
            debug_assert!(covered, "no analysis range covers position {}", pos);

            while pos < boundary {
                while chain
                    .get(rec)
                    .map(|r| r.range.end - origin <= pos || r.is_empty())
                    .unwrap_or(false)
                {
                    rec += 1;
                }
                let record = match chain.get(rec) {
                    Some(record) => record,
                    None => return,
                };
                let rec_start = record.range.start - origin;
                if record.range.end - origin > boundary {
                    chain.split_at(rec, boundary - rec_start);
                }
                let record = chain.get_mut(rec).unwrap();
                record.script = script;
                record.bidi_level = level;
                if record.props.number_substitution.is_some() {
                    record.number_substitution = number_sub;
                }
                pos = record.range.end - origin;
                rec += 1;
            }

            // Advance each list only when its own range ends here; a
            // value may extend past a record split if the other lists
            // end later.
            if self.scripts.get(si).is_some_and(|(r, _)| r.end == boundary) {
                si += 1;
            }
            if self.levels.get(li).is_some_and(|(r, _)| r.end == boundary) {
                li += 1;
            }
            if self.number_subs.get(ni).is_some_and(|(r, _)| r.end == boundary) {
                ni += 1;
            }
        }

        // The breaking engine requires paragraph-level bidi framing at
        // terminators regardless of the surrounding resolved levels.
        for record in chain.iter_mut() {
            if record.flags.is_terminator() {
                record.bidi_level = base_level;
            }
        }
    }
}
