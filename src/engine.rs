// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;

use crate::{
    BreakCondition, CachedRun, CachedRunKind, FlowDirection, FormatError, Result, SpanHandle, Wrap,
};

/// Pull-based run-fetch contract the engine drives during formatting.
///
/// The engine may query out of linear order and re-query the same
/// position; implementations answer from a cache. The span context
/// identifies which nesting scope the engine is currently inside and
/// disambiguates stacked zero-length runs.
pub trait RunProvider {
    fn fetch_run(&mut self, index: usize, context: SpanHandle) -> Result<CachedRun>;
    fn root_span(&self) -> SpanHandle;
}

/// Formatting request for one line attempt
#[derive(Clone, Debug)]
pub struct LineParams {
    pub start: usize,
    /// Wrapping width in pixels; ignored for [`Wrap::None`]
    pub max_width: f32,
    pub wrap: Wrap,
    pub flow: FlowDirection,
    /// Break at character granularity regardless of wrap mode; set by
    /// the second pass of the forced-break correction
    pub force_character_break: bool,
    /// Stop consuming at the wrapping width without reporting a break;
    /// set by end-clipping collapse
    pub end_clip: bool,
}

/// Content classification of a formatted cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellKind {
    Text { glyph_based: bool },
    Object,
    /// Hidden or directional-control characters; zero advance
    Hidden,
    /// The line or paragraph terminator
    Newline,
}

/// One engine-visible text cell: a maximal piece of a fetched run
/// placed inside a single subline
#[derive(Clone, Debug)]
pub struct Cell {
    pub subline: usize,
    pub range: Range<usize>,
    pub text: String,
    /// Per-character advances, in pixels
    pub advances: Vec<f32>,
    /// Pixel offset of the cell's left edge, set during placement
    pub x: f32,
    pub rtl: bool,
    pub kind: CellKind,
    pub ascent: f32,
    pub descent: f32,
}

impl Cell {
    pub fn width(&self) -> f32 {
        self.advances.iter().sum()
    }

    fn prefix(&self, k: usize) -> f32 {
        self.advances[..k].iter().sum()
    }

    /// Left edge and width of the character at `cp`
    pub fn char_extent(&self, cp: usize) -> (f32, f32) {
        let k = cp - self.range.start;
        let advance = self.advances.get(k).copied().unwrap_or(0.0);
        if self.rtl {
            (self.x + self.width() - self.prefix(k) - advance, advance)
        } else {
            (self.x + self.prefix(k), advance)
        }
    }
}

/// One visually contiguous run of content at a single nesting depth
#[derive(Clone, Debug)]
pub struct Subline {
    pub parent: Option<usize>,
    pub depth: usize,
    pub span: SpanHandle,
    pub flow: FlowDirection,
    /// Character bounds of content inside this subline and its
    /// descendants
    pub range: Range<usize>,
    /// Pixel offset and width, set during placement
    pub x: f32,
    pub width: f32,
    pub items: Vec<SublineItem>,
}

/// Logical-order content of a subline
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SublineItem {
    Cell(usize),
    Child(usize),
}

/// Result of formatting one line attempt
#[derive(Clone, Debug)]
pub struct EngineLine {
    pub start: usize,
    /// Characters consumed, including the terminator
    pub length: usize,
    pub newline_length: usize,
    pub trailing_whitespace: usize,
    /// Width excluding trailing whitespace
    pub width: f32,
    pub width_with_trailing: f32,
    pub ascent: f32,
    pub descent: f32,
    /// The line broke without a break opportunity
    pub forced: bool,
    /// The line was cut at the wrapping width by end clipping
    pub clipped: bool,
    pub sublines: Vec<Subline>,
    pub cells: Vec<Cell>,
}

impl EngineLine {
    /// Index of the cell containing `cp`
    pub fn cell_at(&self, cp: usize) -> Option<usize> {
        self.cells
            .iter()
            .position(|cell| cell.range.contains(&cp) || (cell.range.is_empty() && cell.range.start == cp))
    }

    /// Recompute widths, heights, trailing whitespace, and cell
    /// placement from the current cell content
    pub(crate) fn refresh(&mut self) {
        self.measure();
        self.place();
    }

    fn measure(&mut self) {
        let mut total = 0.0;
        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;
        for cell in &self.cells {
            total += cell.width();
            if cell.kind != CellKind::Newline {
                ascent = ascent.max(cell.ascent);
                descent = descent.max(cell.descent);
            } else if self.cells.len() == 1 {
                // An empty line takes its height from the terminator
                ascent = cell.ascent;
                descent = cell.descent;
            }
        }
        self.ascent = ascent;
        self.descent = descent;
        self.width_with_trailing = total;

        // Trailing whitespace: visible whitespace characters before the
        // terminator, counted from the logical end
        let mut trailing = 0;
        let mut trailing_advance = 0.0;
        'scan: for cell in self.cells.iter().rev() {
            match cell.kind {
                CellKind::Newline => continue,
                CellKind::Hidden => continue,
                CellKind::Object => break,
                CellKind::Text { .. } => {
                    for (k, ch) in cell.text.chars().rev().enumerate() {
                        if ch.is_whitespace() {
                            trailing += 1;
                            trailing_advance += cell.advances[cell.advances.len() - 1 - k];
                        } else {
                            break 'scan;
                        }
                    }
                }
            }
        }
        self.trailing_whitespace = trailing;
        self.width = self.width_with_trailing - trailing_advance;
    }

    fn place(&mut self) {
        fn width_of(line: &EngineLine, subline: usize) -> f32 {
            let mut width = 0.0;
            for item in &line.sublines[subline].items {
                width += match item {
                    SublineItem::Cell(cell) => line.cells[*cell].width(),
                    SublineItem::Child(child) => width_of(line, *child),
                };
            }
            width
        }

        // Recursion depth is bounded by the bidi nesting limit, never
        // by content size
        fn place_subline(line: &mut EngineLine, subline: usize, x: f32) {
            let width = width_of(line, subline);
            line.sublines[subline].x = x;
            line.sublines[subline].width = width;
            let rtl = line.sublines[subline].flow.is_rtl();
            let mut cursor = if rtl { x + width } else { x };
            let items = line.sublines[subline].items.clone();
            for item in items {
                match item {
                    SublineItem::Cell(cell) => {
                        let w = line.cells[cell].width();
                        if rtl {
                            cursor -= w;
                            line.cells[cell].x = cursor;
                        } else {
                            line.cells[cell].x = cursor;
                            cursor += w;
                        }
                    }
                    SublineItem::Child(child) => {
                        let w = width_of(line, child);
                        if rtl {
                            cursor -= w;
                            place_subline(line, child, cursor);
                        } else {
                            place_subline(line, child, cursor);
                            cursor += w;
                        }
                    }
                }
            }
        }

        place_subline(self, 0, 0.0);
    }
}

struct Collector {
    sublines: Vec<Subline>,
    cells: Vec<Cell>,
    stack: Vec<usize>,
    total_advance: f32,
    last_opportunity: Option<usize>,
    prev_whitespace: bool,
    after_object: bool,
    overflowed: bool,
}

impl Collector {
    fn new(start: usize, flow: FlowDirection, root: SpanHandle) -> Self {
        Self {
            sublines: vec![Subline {
                parent: None,
                depth: 0,
                span: root,
                flow,
                range: start..start,
                x: 0.0,
                width: 0.0,
                items: Vec::new(),
            }],
            cells: Vec::new(),
            stack: vec![0],
            total_advance: 0.0,
            last_opportunity: None,
            prev_whitespace: false,
            after_object: false,
            overflowed: false,
        }
    }

    fn current(&self) -> usize {
        *self.stack.last().unwrap()
    }

    fn push_cell(&mut self, start: usize, rtl: bool, kind: CellKind, ascent: f32, descent: f32) {
        let subline = self.current();
        self.cells.push(Cell {
            subline,
            range: start..start,
            text: String::new(),
            advances: Vec::new(),
            x: 0.0,
            rtl,
            kind,
            ascent,
            descent,
        });
        let index = self.cells.len() - 1;
        self.sublines[subline].items.push(SublineItem::Cell(index));
    }

    fn push_char(&mut self, ch: char, advance: f32) {
        let cell = self.cells.last_mut().unwrap();
        cell.text.push(ch);
        cell.advances.push(advance);
        cell.range.end += 1;
        self.total_advance += advance;
    }

    /// Drop everything consumed at or past `at`
    fn truncate(&mut self, at: usize) {
        while let Some(cell) = self.cells.last_mut() {
            if cell.range.end <= at {
                break;
            }
            if cell.range.start >= at {
                let subline = cell.subline;
                let item = self.sublines[subline].items.pop();
                debug_assert_eq!(item, Some(SublineItem::Cell(self.cells.len() - 1)));
                for advance in &self.cells.last().unwrap().advances {
                    self.total_advance -= advance;
                }
                self.cells.pop();
            } else {
                let keep = at - cell.range.start;
                for advance in &cell.advances[keep..] {
                    self.total_advance -= advance;
                }
                cell.advances.truncate(keep);
                cell.text = cell.text.chars().take(keep).collect();
                cell.range.end = at;
                break;
            }
        }
        for subline in self.sublines.iter_mut() {
            subline.range.start = subline.range.start.min(at);
            subline.range.end = subline.range.end.min(at);
        }
    }
}

/// Greedy line-breaking engine over the fetchable-run contract.
///
/// Pulls runs from a [`RunProvider`] starting at the line position,
/// maintains the span context from open/close reversal markers to
/// build nested sublines, and breaks at the last allowed opportunity
/// within the wrapping width.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineEngine;

impl LineEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, provider: &mut dyn RunProvider, params: &LineParams) -> Result<EngineLine> {
        let root = provider.root_span();
        let mut state = Collector::new(params.start, params.flow, root);
        let wrapping = params.wrap != Wrap::None && params.max_width.is_finite();
        let char_break =
            params.force_character_break || params.end_clip || params.wrap == Wrap::Glyph;

        let mut pos = params.start;
        let mut newline_length = 0;
        let mut end = params.start;
        let mut forced = false;
        let mut clipped = false;
        let mut break_at: Option<usize> = None;

        'collect: loop {
            let context = state.sublines[state.current()].span;
            let run = provider.fetch_run(pos, context)?;
            match run.kind {
                CachedRunKind::OpenReversal => {
                    let parent = state.current();
                    let depth = state.stack.len();
                    state.sublines.push(Subline {
                        parent: Some(parent),
                        depth,
                        span: run.span,
                        flow: FlowDirection::from_level(run.level),
                        range: pos..pos,
                        x: 0.0,
                        width: 0.0,
                        items: Vec::new(),
                    });
                    let index = state.sublines.len() - 1;
                    state.sublines[parent].items.push(SublineItem::Child(index));
                    state.stack.push(index);
                }
                CachedRunKind::CloseReversal => {
                    if state.stack.len() <= 1 {
                        return Err(FormatError::Internal("close marker outside reversal"));
                    }
                    let index = state.stack.pop().unwrap();
                    state.sublines[index].range.end = pos;
                }
                CachedRunKind::Text {
                    ref text,
                    ref advances,
                    ref breaks,
                    glyph_based,
                } => {
                    let rtl = state.sublines[state.current()].flow.is_rtl();
                    state.push_cell(pos, rtl, CellKind::Text { glyph_based }, run.ascent, run.descent);
                    let skip = pos - run.range.start;
                    for (k, ch) in text.chars().enumerate().skip(skip) {
                        let cp = run.range.start + k;
                        let advance = advances[k];
                        let condition = breaks
                            .as_ref()
                            .map(|infos| infos[k].before)
                            .unwrap_or(if state.prev_whitespace {
                                BreakCondition::Allowed
                            } else {
                                BreakCondition::Prohibited
                            });
                        let opportunity = state.after_object
                            || matches!(condition, BreakCondition::Allowed | BreakCondition::Mandatory);
                        state.after_object = false;
                        if opportunity && cp > params.start {
                            state.last_opportunity = Some(cp);
                            if state.overflowed {
                                break_at = Some(cp);
                                break 'collect;
                            }
                        }
                        // Whitespace hangs past the wrapping width
                        // rather than causing a break
                        if wrapping
                            && cp > params.start
                            && !ch.is_whitespace()
                            && state.total_advance + advance > params.max_width
                            && !state.overflowed
                        {
                            if params.end_clip {
                                break_at = Some(cp);
                                clipped = true;
                                break 'collect;
                            }
                            if char_break {
                                break_at = Some(cp);
                                break 'collect;
                            }
                            if let Some(opp) = state.last_opportunity {
                                break_at = Some(opp);
                                break 'collect;
                            }
                            match params.wrap {
                                // Let the unbreakable word overflow
                                Wrap::Word => state.overflowed = true,
                                _ => {
                                    forced = true;
                                    break_at = Some(cp);
                                    break 'collect;
                                }
                            }
                        }
                        state.push_char(ch, advance);
                        state.prev_whitespace = ch.is_whitespace();
                        pos = cp + 1;
                    }
                    pos = run.range.end.max(pos);
                }
                CachedRunKind::Object(metrics) => {
                    if pos > params.start {
                        state.last_opportunity = Some(pos);
                        if state.overflowed {
                            break_at = Some(pos);
                            break 'collect;
                        }
                    }
                    if wrapping
                        && pos > params.start
                        && state.total_advance + metrics.width > params.max_width
                        && !state.overflowed
                    {
                        // The position before an object is always an
                        // opportunity, so this break is never forced
                        if params.end_clip {
                            clipped = true;
                        }
                        break_at = Some(pos);
                        break 'collect;
                    }
                    let rtl = state.sublines[state.current()].flow.is_rtl();
                    state.push_cell(pos, rtl, CellKind::Object, run.ascent, run.descent);
                    state.push_char(crate::OBJECT_REPLACEMENT, metrics.width);
                    state.prev_whitespace = false;
                    state.after_object = true;
                    pos = run.range.end;
                }
                CachedRunKind::Hidden | CachedRunKind::Control => {
                    let rtl = state.sublines[state.current()].flow.is_rtl();
                    state.push_cell(pos, rtl, CellKind::Hidden, run.ascent, run.descent);
                    for _ in pos..run.range.end {
                        state.push_char('\u{feff}', 0.0);
                    }
                    pos = run.range.end;
                }
                CachedRunKind::LineBreak | CachedRunKind::ParagraphBreak => {
                    let rtl = state.sublines[state.current()].flow.is_rtl();
                    state.push_cell(pos, rtl, CellKind::Newline, run.ascent, run.descent);
                    for _ in pos..run.range.end {
                        state.push_char('\n', 0.0);
                    }
                    newline_length = run.len();
                    end = run.range.end;
                    break 'collect;
                }
            }
        }

        if let Some(at) = break_at {
            state.truncate(at);
            end = at;
        }
        while state.stack.len() > 1 {
            let index = state.stack.pop().unwrap();
            state.sublines[index].range.end = state.sublines[index].range.end.min(end);
        }
        state.sublines[0].range = params.start..end;

        let mut line = EngineLine {
            start: params.start,
            length: end - params.start,
            newline_length,
            trailing_whitespace: 0,
            width: 0.0,
            width_with_trailing: 0.0,
            ascent: 0.0,
            descent: 0.0,
            forced,
            clipped,
            sublines: state.sublines,
            cells: state.cells,
        };
        line.refresh();
        log::debug!(
            "format line {}..{}: width {} ({} cells, {} sublines)",
            line.start,
            line.start + line.length,
            line.width,
            line.cells.len(),
            line.sublines.len()
        );
        Ok(line)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{FixedFonts, VecSource};
    use crate::{RunProps, SourceRun, StoreSession, TextStore, UnicodeAnalyzer, Wrap};

    fn format(text: &str, max_width: f32, wrap: Wrap) -> EngineLine {
        format_runs(vec![SourceRun::text(text, RunProps::new())], max_width, wrap)
    }

    fn format_runs(runs: Vec<SourceRun>, max_width: f32, wrap: Wrap) -> EngineLine {
        let source = VecSource::new(runs);
        let analyzer = UnicodeAnalyzer::new();
        let fonts = FixedFonts::new();
        let mut store = TextStore::new(0, 0);
        let mut provider = StoreSession {
            store: &mut store,
            source: &source,
            analyzer: &analyzer,
            fonts: &fonts,
            want_breaks: wrap != Wrap::None,
        };
        let params = LineParams {
            start: 0,
            max_width,
            wrap,
            flow: crate::FlowDirection::LeftToRight,
            force_character_break: false,
            end_clip: false,
        };
        LineEngine::new().format(&mut provider, &params).unwrap()
    }

    #[test]
    fn unwrapped_line_ends_at_newline() {
        let line = format("hello world\nmore", f32::INFINITY, Wrap::None);
        assert_eq!(line.length, 12);
        assert_eq!(line.newline_length, 1);
        assert_eq!(line.width, 110.0);
        assert!(!line.forced);
    }

    #[test]
    fn trailing_whitespace_is_measured_separately() {
        let line = format("ABC \u{2028}", f32::INFINITY, Wrap::None);
        assert_eq!(line.newline_length, 1);
        assert_eq!(line.trailing_whitespace, 1);
        assert_eq!(line.width, 30.0);
        assert_eq!(line.width_with_trailing, 40.0);
    }

    #[test]
    fn word_wrap_breaks_at_last_opportunity() {
        // 10px per char, 55px wide: "hello " fits, "world" does not
        let line = format("hello world\n", 55.0, Wrap::WordOrGlyph);
        assert_eq!(line.length, 6);
        assert_eq!(line.newline_length, 0);
        assert!(!line.forced);
        // The wrapped space trails the line
        assert_eq!(line.trailing_whitespace, 1);
        assert_eq!(line.width, 50.0);
    }

    #[test]
    fn unbreakable_word_reports_forced_break() {
        let line = format("abcdefghij\n", 35.0, Wrap::WordOrGlyph);
        assert!(line.forced);
        assert_eq!(line.length, 3);
    }

    #[test]
    fn word_wrap_with_overflow_keeps_the_word() {
        let line = format("abcdefghij klm\n", 35.0, Wrap::Word);
        assert!(!line.forced);
        // The whole unbreakable word overflows, then breaks at the space
        assert_eq!(line.length, 11);
        assert_eq!(line.trailing_whitespace, 1);
    }

    #[test]
    fn glyph_wrap_breaks_mid_word() {
        let line = format("abcdef\n", 35.0, Wrap::Glyph);
        assert_eq!(line.length, 3);
        assert!(!line.forced);
    }

    #[test]
    fn first_character_always_fits() {
        let line = format("wide\n", 5.0, Wrap::Glyph);
        assert_eq!(line.length, 1);
    }

    #[test]
    fn embedding_builds_nested_sublines() {
        // Latin letters inside the embedding resolve two levels up
        let line = format("abc\u{202b}DEF\u{202c}ghi\n", f32::INFINITY, Wrap::None);
        // Paragraph root plus the level-1 and level-2 reversals
        assert_eq!(line.sublines.len(), 3);
        assert_eq!(line.sublines[0].depth, 0);
        assert_eq!(line.sublines[1].depth, 1);
        assert_eq!(line.sublines[2].depth, 2);
        assert!(line.sublines[1].flow.is_rtl());
        assert_eq!(line.sublines[2].range, 4..7);
    }

    #[test]
    fn rtl_cells_place_right_to_left() {
        let line = format("ab\u{05d0}\u{05d1}cd\n", f32::INFINITY, Wrap::None);
        let hebrew = line
            .cells
            .iter()
            .find(|cell| cell.rtl && matches!(cell.kind, CellKind::Text { .. }))
            .unwrap();
        // Visual order inside the reversal runs right to left
        let (first_left, _) = hebrew.char_extent(2);
        let (second_left, _) = hebrew.char_extent(3);
        assert!(first_left > second_left);
    }

    #[test]
    fn object_breaks_before_when_it_overflows() {
        let runs = vec![
            SourceRun::text("abc", RunProps::new()),
            SourceRun {
                kind: crate::SourceRunKind::Object(crate::ObjectMetrics {
                    width: 50.0,
                    height: 40.0,
                    baseline: 30.0,
                }),
                props: RunProps::new(),
            },
            SourceRun::text("d\n", RunProps::new()),
        ];
        let line = format_runs(runs, 60.0, Wrap::WordOrGlyph);
        assert_eq!(line.length, 3);
        assert!(!line.forced);
    }

    #[test]
    fn object_metrics_feed_line_height() {
        let runs = vec![
            SourceRun::text("a", RunProps::new()),
            SourceRun {
                kind: crate::SourceRunKind::Object(crate::ObjectMetrics {
                    width: 20.0,
                    height: 40.0,
                    baseline: 30.0,
                }),
                props: RunProps::new(),
            },
            SourceRun::text("\n", RunProps::new()),
        ];
        let line = format_runs(runs, f32::INFINITY, Wrap::None);
        assert_eq!(line.ascent, 30.0);
        assert_eq!(line.descent, 10.0);
        assert_eq!(line.width, 30.0);
    }

    #[test]
    fn hidden_runs_take_no_width() {
        let runs = vec![
            SourceRun::text("ab", RunProps::new()),
            SourceRun {
                kind: crate::SourceRunKind::Hidden(3),
                props: RunProps::new(),
            },
            SourceRun::text("cd\n", RunProps::new()),
        ];
        let line = format_runs(runs, f32::INFINITY, Wrap::None);
        assert_eq!(line.length, 8);
        assert_eq!(line.width, 40.0);
        // Hidden characters still occupy positions
        assert!(line.cell_at(3).is_some());
    }

    #[test]
    fn empty_paragraph_keeps_terminator_height() {
        let line = format("\n", f32::INFINITY, Wrap::None);
        assert_eq!(line.length, 1);
        assert_eq!(line.newline_length, 1);
        assert_eq!(line.width, 0.0);
        assert_eq!(line.ascent, 12.0);
        assert_eq!(line.descent, 4.0);
    }

    #[test]
    fn end_clip_stops_at_width_without_break() {
        let source = VecSource::paragraph("abcdefgh\n");
        let analyzer = UnicodeAnalyzer::new();
        let fonts = FixedFonts::new();
        let mut store = TextStore::new(0, 0);
        let mut provider = StoreSession {
            store: &mut store,
            source: &source,
            analyzer: &analyzer,
            fonts: &fonts,
            want_breaks: true,
        };
        let params = LineParams {
            start: 0,
            max_width: 45.0,
            wrap: Wrap::WordOrGlyph,
            flow: crate::FlowDirection::LeftToRight,
            force_character_break: false,
            end_clip: true,
        };
        let line = LineEngine::new().format(&mut provider, &params).unwrap();
        assert!(line.clipped);
        assert_eq!(line.length, 4);
        assert!(!line.forced);
    }
}
