// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    AnalysisSession, CachedRun, CachedRunKind, FontSource, FormatError, Result, RunCache, RunFlags,
    RunProvider, RunRecord, SpanHandle, SpanKind, SpanTree, TextAnalyzer, TextSource,
};

/// Explicit embedding depth beyond which formatting fails rather than
/// opening further reversal scopes
const MAX_REVERSAL_DEPTH: usize = 125;

/// Bridge between source analysis and the line-breaking engine.
///
/// Owns the span tree and the fetchable-run cache for one line attempt.
/// Runs are materialized lazily: a fetch past the cached coverage pulls
/// one analysis segment from the source, analyzes it, and appends its
/// records as fetchable runs, emitting synthetic open and close
/// reversal markers wherever the bidi level steps.
#[derive(Debug)]
pub struct TextStore {
    tree: SpanTree,
    cache: RunCache,
    /// Open span stack; the root is always at the bottom
    stack: Vec<SpanHandle>,
    origin: usize,
    /// Next character position to materialize
    fetched: usize,
    base_level: u8,
    complete: bool,
}

impl TextStore {
    pub fn new(origin: usize, base_level: u8) -> Self {
        let tree = SpanTree::new(origin, base_level);
        let root = tree.root();
        Self {
            tree,
            cache: RunCache::new(),
            stack: vec![root],
            origin,
            fetched: origin,
            base_level,
            complete: false,
        }
    }

    /// Make the store usable for a line attempt starting at `start`.
    /// Cached analysis is kept only when the attempt re-formats the
    /// same position, as the forced-break correction pass and collapse
    /// do; any other start discards it.
    pub fn prepare(&mut self, start: usize, base_level: u8) {
        if start != self.origin || base_level != self.base_level {
            *self = Self::new(start, base_level);
        }
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn root(&self) -> SpanHandle {
        self.tree.root()
    }

    pub fn tree(&self) -> &SpanTree {
        &self.tree
    }

    pub fn runs(&self) -> &[CachedRun] {
        self.cache.runs()
    }

    /// Release the span tree and the run cache
    pub fn clear(&mut self) {
        self.tree.clear();
        self.cache.clear();
        self.stack.clear();
        self.stack.push(self.tree.root());
        self.fetched = self.origin;
        self.complete = false;
    }

    /// Find or materialize the run at `index`, returning its cache
    /// slot. `token` is the engine's current span context, used to
    /// disambiguate stacked zero-length markers.
    pub fn fetch(
        &mut self,
        index: usize,
        token: Option<SpanHandle>,
        source: &dyn TextSource,
        analyzer: &dyn TextAnalyzer,
        fonts: &dyn FontSource,
        want_breaks: bool,
    ) -> Result<usize> {
        loop {
            if let Some(slot) = self.cache.get(index, token) {
                return Ok(slot);
            }
            if self.complete {
                return Err(FormatError::InvalidParameter("fetch past end of paragraph"));
            }
            if index < self.fetched {
                return Err(FormatError::Internal("no cached run matches the span context"));
            }
            self.materialize(source, analyzer, fonts, want_breaks)?;
        }
    }

    /// Analyze one segment starting at the materialization frontier and
    /// append its records to the cache
    fn materialize(
        &mut self,
        source: &dyn TextSource,
        analyzer: &dyn TextAnalyzer,
        fonts: &dyn FontSource,
        want_breaks: bool,
    ) -> Result<()> {
        let mut session = AnalysisSession::populate(self.fetched, source, self.base_level)?;
        session.analyze(analyzer, fonts, want_breaks)?;
        session.ensure_terminated()?;
        log::trace!(
            "materialize {}..{} ({} records)",
            self.fetched,
            self.fetched + session.length(),
            session.chain().len()
        );

        let count = session.chain().len();
        for i in 0..count {
            let record = session
                .chain()
                .get(i)
                .ok_or(FormatError::Internal("record chain shrank during append"))?
                .clone();
            self.append_record(&record, &session, fonts)?;
        }
        self.fetched += session.length();
        Ok(())
    }

    fn append_record(
        &mut self,
        record: &RunRecord,
        session: &AnalysisSession,
        fonts: &dyn FontSource,
    ) -> Result<()> {
        self.bridge_level(record.range.start, record.bidi_level)?;
        let context = *self
            .stack
            .last()
            .ok_or(FormatError::Internal("span stack underflow"))?;

        let (mut ascent, mut descent) = record_metrics(record, fonts);
        let kind = if record.flags.contains(RunFlags::OBJECT) {
            let metrics = record
                .object
                .ok_or(FormatError::Internal("object record without metrics"))?;
            ascent = metrics.baseline;
            descent = metrics.height - metrics.baseline;
            // Record the object scope in the tree; the run itself stays
            // in the enclosing span
            let span = self
                .tree
                .open_span(context, record.range.start, SpanKind::Object);
            self.tree.close_span(span, record.range.end);
            CachedRunKind::Object(metrics)
        } else if record.flags.contains(RunFlags::HIDDEN) {
            CachedRunKind::Hidden
        } else if record.flags.contains(RunFlags::DIRECTIONAL_CONTROL) {
            CachedRunKind::Control
        } else if record.flags.contains(RunFlags::END_OF_LINE) {
            CachedRunKind::LineBreak
        } else if record.flags.contains(RunFlags::END_OF_PARAGRAPH) {
            CachedRunKind::ParagraphBreak
        } else {
            CachedRunKind::Text {
                text: session.slice(record.range.clone()).to_string(),
                advances: text_advances(record, session, fonts),
                breaks: record.breakpoints.clone(),
                glyph_based: record.glyph_based,
            }
        };

        let end_of_paragraph = record.flags.contains(RunFlags::END_OF_PARAGRAPH);
        self.cache.append(CachedRun {
            range: record.range.clone(),
            level: record.bidi_level,
            context,
            span: context,
            ascent,
            descent,
            kind,
        });

        if end_of_paragraph {
            self.tree.close_span(self.tree.root(), record.range.end);
            self.complete = true;
        }
        Ok(())
    }

    /// Emit open or close markers until the open span stack sits at
    /// `target`, one marker per level step
    fn bridge_level(&mut self, at: usize, target: u8) -> Result<()> {
        let mut current = self.tree.get(*self.stack.last().unwrap_or(&self.tree.root())).level();
        while current < target {
            if self.stack.len() >= MAX_REVERSAL_DEPTH {
                return Err(FormatError::Formatting("reversal nesting too deep"));
            }
            let parent = *self
                .stack
                .last()
                .ok_or(FormatError::Internal("span stack underflow"))?;
            let span = self.tree.open_span(parent, at, SpanKind::Reversal(current + 1));
            self.cache.append(CachedRun {
                range: at..at,
                level: current + 1,
                context: parent,
                span,
                ascent: 0.0,
                descent: 0.0,
                kind: CachedRunKind::OpenReversal,
            });
            self.stack.push(span);
            current += 1;
        }
        while current > target {
            let span = self
                .stack
                .pop()
                .ok_or(FormatError::Internal("span stack underflow"))?;
            if self.stack.is_empty() {
                return Err(FormatError::Internal("closed the paragraph span early"));
            }
            self.tree.close_span(span, at);
            let parent = *self.stack.last().unwrap_or(&self.tree.root());
            let parent_level = self.tree.get(parent).level();
            self.cache.append(CachedRun {
                range: at..at,
                level: parent_level,
                context: parent,
                span,
                ascent: 0.0,
                descent: 0.0,
                kind: CachedRunKind::CloseReversal,
            });
            current = parent_level;
        }
        Ok(())
    }
}

/// Vertical metrics for a record; nominal proportions of the scale
/// stand in when no face mapped
fn record_metrics(record: &RunRecord, fonts: &dyn FontSource) -> (f32, f32) {
    match record.font {
        Some(face) => {
            let metrics = fonts.face_metrics(face, record.font_scale);
            (metrics.ascent, metrics.descent)
        }
        None => (
            record.props.font_scale * 0.75,
            record.props.font_scale * 0.25,
        ),
    }
}

/// Per-character advances with tracking and balanced spacing applied
fn text_advances(record: &RunRecord, session: &AnalysisSession, fonts: &dyn FontSource) -> Vec<f32> {
    let text = session.slice(record.range.clone());
    let spacing = record.props.char_spacing as f32;
    let len = record.len();
    let mut advances = Vec::with_capacity(len);
    for (k, ch) in text.chars().enumerate() {
        let mut advance = match record.font {
            Some(face) => fonts.char_advance(face, record.font_scale, ch),
            None => record.font_scale * 0.5,
        };
        if k + 1 < len || record.space_last_char {
            advance += spacing;
        }
        if k == 0 {
            advance += record.initial_spacing as f32;
        }
        advances.push(advance);
    }
    advances
}

/// One line attempt's view of a [`TextStore`] bundled with its
/// collaborators; this is what the engine formats against.
pub struct StoreSession<'a> {
    pub store: &'a mut TextStore,
    pub source: &'a dyn TextSource,
    pub analyzer: &'a dyn TextAnalyzer,
    pub fonts: &'a dyn FontSource,
    /// Break analysis is skipped entirely when the line never wraps
    pub want_breaks: bool,
}

impl RunProvider for StoreSession<'_> {
    fn fetch_run(&mut self, index: usize, context: SpanHandle) -> Result<CachedRun> {
        let slot = self.store.fetch(
            index,
            Some(context),
            self.source,
            self.analyzer,
            self.fonts,
            self.want_breaks,
        )?;
        Ok(self.store.cache.run(slot).clone())
    }

    fn root_span(&self) -> SpanHandle {
        self.store.root()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{FixedFonts, VecSource};
    use crate::{RunProps, SourceRun, UnicodeAnalyzer};

    fn fetch_all(store: &mut TextStore, source: &VecSource) -> Vec<CachedRun> {
        let analyzer = UnicodeAnalyzer::new();
        let fonts = FixedFonts::new();
        // Walk the line the way the engine does, tracking context
        let mut runs = Vec::new();
        let mut stack = vec![store.root()];
        let mut pos = store.origin();
        loop {
            let slot = store
                .fetch(pos, stack.last().copied(), source, &analyzer, &fonts, true)
                .unwrap();
            let run = store.cache.run(slot).clone();
            match run.kind {
                CachedRunKind::OpenReversal => stack.push(run.span),
                CachedRunKind::CloseReversal => {
                    stack.pop();
                }
                _ => pos = run.range.end,
            }
            let done = matches!(
                run.kind,
                CachedRunKind::LineBreak | CachedRunKind::ParagraphBreak
            );
            runs.push(run);
            if done {
                break;
            }
        }
        runs
    }

    #[test]
    fn embedding_emits_balanced_markers() {
        let source = VecSource::new(vec![SourceRun::text(
            "abc\u{202b}DEF\u{202c}ghi\n",
            RunProps::new(),
        )]);
        let mut store = TextStore::new(0, 0);
        let runs = fetch_all(&mut store, &source);

        let opens: Vec<&CachedRun> = runs
            .iter()
            .filter(|r| matches!(r.kind, CachedRunKind::OpenReversal))
            .collect();
        let closes: Vec<&CachedRun> = runs
            .iter()
            .filter(|r| matches!(r.kind, CachedRunKind::CloseReversal))
            .collect();
        // Level 0 to 2 steps through two scopes, one marker per level
        assert_eq!(opens.len(), 2);
        assert_eq!(closes.len(), 2);
        // Closes unwind the same spans the opens created
        assert_eq!(opens[0].span, closes[1].span);
        assert_eq!(opens[1].span, closes[0].span);
        assert_eq!(store.tree.get(opens[0].span).level(), 1);
        assert_eq!(store.tree.get(opens[1].span).level(), 2);
        // All four markers sit at the embedded text boundaries
        assert!(opens.iter().all(|r| r.range == (4..4)));
        assert!(closes.iter().all(|r| r.range == (7..7)));
    }

    #[test]
    fn paragraph_end_closes_the_root() {
        let source = VecSource::paragraph("hello\n");
        let mut store = TextStore::new(0, 0);
        fetch_all(&mut store, &source);
        assert!(store.complete);
        assert_eq!(store.tree.get(store.root()).length, Some(6));
    }

    #[test]
    fn fetch_past_end_is_rejected() {
        let source = VecSource::paragraph("hi\n");
        let mut store = TextStore::new(0, 0);
        fetch_all(&mut store, &source);
        let analyzer = UnicodeAnalyzer::new();
        let fonts = FixedFonts::new();
        let err = store
            .fetch(99, None, &source, &analyzer, &fonts, true)
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidParameter(_)));
    }

    #[test]
    fn refetch_hits_the_cache() {
        let source = VecSource::paragraph("cache me\n");
        let mut store = TextStore::new(0, 0);
        let first = fetch_all(&mut store, &source);
        let cached = store.cache.len();
        let second = fetch_all(&mut store, &source);
        assert_eq!(store.cache.len(), cached);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn spacing_lands_in_advances() {
        let source = VecSource::new(vec![SourceRun::text(
            "ab\n",
            RunProps::new().char_spacing(4),
        )]);
        let mut store = TextStore::new(0, 0);
        let runs = fetch_all(&mut store, &source);
        let advances = runs
            .iter()
            .find_map(|r| match &r.kind {
                CachedRunKind::Text { advances, .. } => Some(advances.clone()),
                _ => None,
            })
            .unwrap();
        // Tracking after the first character; suppressed before the
        // terminator
        assert_eq!(advances, vec![14.0, 10.0]);
    }

    #[test]
    fn clear_resets_coverage() {
        let source = VecSource::paragraph("hello\n");
        let mut store = TextStore::new(0, 0);
        fetch_all(&mut store, &source);
        store.clear();
        assert!(store.cache.is_empty());
        assert!(!store.complete);
        assert_eq!(store.fetched, 0);
        // The store repopulates after a clear
        let runs = fetch_all(&mut store, &source);
        assert!(!runs.is_empty());
    }
}
