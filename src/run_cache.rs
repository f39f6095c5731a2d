// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;

use crate::{BreakInfo, ObjectMetrics, SpanHandle};

/// Content carried by one fetchable run
#[derive(Clone, Debug)]
pub enum CachedRunKind {
    /// Visible characters with per-character advances, in pixels
    Text {
        text: String,
        advances: Vec<f32>,
        breaks: Option<Vec<BreakInfo>>,
        glyph_based: bool,
    },
    /// Embedded object occupying one character position
    Object(ObjectMetrics),
    /// Characters that occupy positions but never draw
    Hidden,
    /// Bidi control characters; zero advance, excluded from breaking
    Control,
    /// Explicit line break
    LineBreak,
    /// End of the paragraph
    ParagraphBreak,
    /// Synthetic zero-length marker entering a reversal span
    OpenReversal,
    /// Synthetic zero-length marker leaving a reversal span
    CloseReversal,
}

/// One entry of the fetchable-run log.
///
/// Real content runs cover a character range; synthetic reversal
/// markers are zero-length and several may share a start index.
#[derive(Clone, Debug)]
pub struct CachedRun {
    pub range: Range<usize>,
    /// Bidi level of the run content
    pub level: u8,
    /// Span this run lives in; for an open marker, the parent of the
    /// span being opened
    pub context: SpanHandle,
    /// For synthetic markers, the span opened or closed; equals
    /// `context` for content runs
    pub span: SpanHandle,
    pub ascent: f32,
    pub descent: f32,
    pub kind: CachedRunKind,
}

impl CachedRun {
    pub fn len(&self) -> usize {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    fn matches(&self, index: usize, token: Option<SpanHandle>) -> bool {
        if self.is_empty() {
            if self.range.start != index {
                return false;
            }
            match token {
                None => true,
                Some(context) => match self.kind {
                    // A close is fetched from inside the span it closes
                    CachedRunKind::CloseReversal => self.span == context,
                    _ => self.context == context,
                },
            }
        } else if !self.range.contains(&index) {
            false
        } else {
            // Interior positions are unambiguous; at a run start the
            // caller's context must agree
            index > self.range.start || token.is_none() || token == Some(self.context)
        }
    }
}

/// Append-only log of fetchable runs with a roaming recency cursor.
///
/// Replaces the doubly linked list of the original design with an
/// ordered vector and an index cursor; forward and backward scans are
/// index arithmetic. The cursor moves on every successful lookup, so
/// even reads are not safe for concurrent use.
#[derive(Debug, Default)]
pub struct RunCache {
    runs: Vec<CachedRun>,
    cursor: usize,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run, which must not start before the last appended run
    pub fn append(&mut self, run: CachedRun) -> usize {
        if let Some(last) = self.runs.last() {
            debug_assert!(
                run.range.start >= last.range.start,
                "runs must be appended in character-index order"
            );
        }
        self.runs.push(run);
        self.runs.len() - 1
    }

    /// Find the run at `index`, disambiguating stacked zero-length
    /// runs with the caller's span context. Without a token the first
    /// (oldest) run at the position wins.
    ///
    /// The scan starts at the most recently returned run; sequential
    /// access is O(1) amortized.
    pub fn get(&mut self, index: usize, token: Option<SpanHandle>) -> Option<usize> {
        if self.runs.is_empty() {
            return None;
        }
        let mut i = self.cursor.min(self.runs.len() - 1);
        while i > 0 && self.runs[i].range.start > index {
            i -= 1;
        }
        // Rewind to the head of a zero-length group sharing this start
        while i > 0 && self.runs[i - 1].range.start == index && self.runs[i].range.start == index {
            i -= 1;
        }
        while i < self.runs.len() && self.runs[i].range.start <= index {
            if self.runs[i].matches(index, token) {
                self.cursor = i;
                return Some(i);
            }
            i += 1;
        }
        None
    }

    pub fn run(&self, index: usize) -> &CachedRun {
        &self.runs[index]
    }

    pub fn runs(&self) -> &[CachedRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Destroy all runs, head to tail
    pub fn clear(&mut self) {
        self.runs.clear();
        self.cursor = 0;
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }
}
