// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    CachedRun, CachedRunKind, CollapsingProps, EngineLine, FontSource, FormatError, FormattedLine,
    LineEngine, LineParams, ParagraphProps, Result, RunProvider, SpanHandle, StoreSession,
    TextAnalyzer, TextSource, TextStore, UnicodeAnalyzer, Wrap,
};

/// Which run kinds the caller is prepared to position and draw.
///
/// An explicit value passed to [`FormatterContext::new`], replacing
/// process-global handler registration: a line containing a run the
/// configuration rejects fails with [`FormatError::Formatting`].
#[derive(Clone, Debug)]
pub struct FormatterConfig {
    pub handle_reversals: bool,
    pub handle_objects: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            handle_reversals: true,
            handle_objects: true,
        }
    }
}

impl FormatterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_reversals(mut self, handle_reversals: bool) -> Self {
        self.handle_reversals = handle_reversals;
        self
    }

    pub fn handle_objects(mut self, handle_objects: bool) -> Self {
        self.handle_objects = handle_objects;
        self
    }
}

/// Where a formatted line ended, carried to the next call so line
/// starts stay contiguous
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineBreakRecord {
    /// First character position after the line
    pub end: usize,
    /// The line broke without a break opportunity
    pub forced: bool,
}

impl LineBreakRecord {
    pub fn after(line: &FormattedLine) -> Self {
        Self {
            end: line.start() + line.length(),
            forced: line.is_forced_break(),
        }
    }
}

/// Entry point for formatting lines.
///
/// Owns the engine, the analyzer, and a reusable internal
/// [`TextStore`]; callers that format the same position repeatedly,
/// such as measure-then-draw passes, can pass their own store to
/// [`FormatterContext::format_line_in`] and reuse its cached analysis.
pub struct FormatterContext {
    config: FormatterConfig,
    engine: LineEngine,
    analyzer: Box<dyn TextAnalyzer>,
    store: TextStore,
}

impl FormatterContext {
    pub fn new(config: FormatterConfig) -> Self {
        Self::with_analyzer(config, Box::new(UnicodeAnalyzer::new()))
    }

    /// Build a context around a caller-supplied analyzer instead of
    /// the Unicode default
    pub fn with_analyzer(config: FormatterConfig, analyzer: Box<dyn TextAnalyzer>) -> Self {
        Self {
            config,
            engine: LineEngine::new(),
            analyzer,
            store: TextStore::new(0, 0),
        }
    }

    /// Format one line starting at `start`, using the context's own
    /// run store
    pub fn format_line(
        &mut self,
        source: &dyn TextSource,
        fonts: &dyn FontSource,
        start: usize,
        max_width: f32,
        paragraph: &ParagraphProps,
        previous: Option<&LineBreakRecord>,
    ) -> Result<FormattedLine> {
        let Self {
            config,
            engine,
            analyzer,
            store,
        } = self;
        format_in(
            config,
            engine,
            analyzer.as_ref(),
            store,
            source,
            fonts,
            start,
            max_width,
            paragraph,
            previous,
        )
    }

    /// Format one line against a caller-owned store
    pub fn format_line_in(
        &self,
        store: &mut TextStore,
        source: &dyn TextSource,
        fonts: &dyn FontSource,
        start: usize,
        max_width: f32,
        paragraph: &ParagraphProps,
        previous: Option<&LineBreakRecord>,
    ) -> Result<FormattedLine> {
        format_in(
            &self.config,
            &self.engine,
            self.analyzer.as_ref(),
            store,
            source,
            fonts,
            start,
            max_width,
            paragraph,
            previous,
        )
    }

    /// Collapse a previously formatted line, rerunning the engine at
    /// the collapsing width against the context's cached analysis
    pub fn collapse_line(
        &mut self,
        source: &dyn TextSource,
        fonts: &dyn FontSource,
        line: &FormattedLine,
        props: &CollapsingProps,
    ) -> Result<FormattedLine> {
        let Self {
            config,
            analyzer,
            store,
            ..
        } = self;
        store.prepare(line.start(), line.flow_direction().base_level());
        let mut provider = ConfiguredProvider {
            inner: StoreSession {
                store,
                source,
                analyzer: analyzer.as_ref(),
                fonts,
                want_breaks: true,
            },
            config,
        };
        line.collapse(&mut provider, props)
    }
}

#[allow(clippy::too_many_arguments)]
fn format_in(
    config: &FormatterConfig,
    engine: &LineEngine,
    analyzer: &dyn TextAnalyzer,
    store: &mut TextStore,
    source: &dyn TextSource,
    fonts: &dyn FontSource,
    start: usize,
    max_width: f32,
    paragraph: &ParagraphProps,
    previous: Option<&LineBreakRecord>,
) -> Result<FormattedLine> {
    if let Some(record) = previous {
        if record.end != start {
            return Err(FormatError::InvalidParameter(
                "line start disagrees with the previous break record",
            ));
        }
    }
    let wrapping = paragraph.wrap != Wrap::None;
    if wrapping && !(max_width > 0.0) {
        return Err(FormatError::InvalidParameter(
            "wrapping width must be positive",
        ));
    }

    store.prepare(start, paragraph.flow_direction.base_level());
    let line = run_engine(
        config, engine, analyzer, store, source, fonts, start, max_width, paragraph, false,
    )?;

    // A forced mid-word break is redone at character granularity so
    // the break lands on a clean caret stop
    let line = if line.forced && paragraph.wrap == Wrap::WordOrGlyph {
        log::trace!("reformatting line at {} with forced character break", start);
        let mut second = run_engine(
            config, engine, analyzer, store, source, fonts, start, max_width, paragraph, true,
        )?;
        second.forced = true;
        second
    } else {
        line
    };

    Ok(FormattedLine::new(line, paragraph, max_width))
}

#[allow(clippy::too_many_arguments)]
fn run_engine(
    config: &FormatterConfig,
    engine: &LineEngine,
    analyzer: &dyn TextAnalyzer,
    store: &mut TextStore,
    source: &dyn TextSource,
    fonts: &dyn FontSource,
    start: usize,
    max_width: f32,
    paragraph: &ParagraphProps,
    force_character_break: bool,
) -> Result<EngineLine> {
    let mut provider = ConfiguredProvider {
        inner: StoreSession {
            store,
            source,
            analyzer,
            fonts,
            want_breaks: paragraph.wrap != Wrap::None,
        },
        config,
    };
    engine.format(
        &mut provider,
        &LineParams {
            start,
            max_width,
            wrap: paragraph.wrap,
            flow: paragraph.flow_direction,
            force_character_break,
            end_clip: false,
        },
    )
}

/// Run provider that enforces the handler configuration on every
/// fetched run
struct ConfiguredProvider<'a> {
    inner: StoreSession<'a>,
    config: &'a FormatterConfig,
}

impl RunProvider for ConfiguredProvider<'_> {
    fn fetch_run(&mut self, index: usize, context: SpanHandle) -> Result<CachedRun> {
        let run = self.inner.fetch_run(index, context)?;
        match run.kind {
            CachedRunKind::Object(_) if !self.config.handle_objects => {
                Err(FormatError::Formatting("no object handler installed"))
            }
            CachedRunKind::OpenReversal if !self.config.handle_reversals => {
                Err(FormatError::Formatting("no reversal handler installed"))
            }
            _ => Ok(run),
        }
    }

    fn root_span(&self) -> SpanHandle {
        self.inner.root_span()
    }
}
