// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;

use crate::{
    FontSource, FormatError, Itemizer, OffsetSink, Result, RunChain, RunFlags, RunRecord,
    SourceRunKind, TextAnalyzer, TextSource,
};

/// Character that stands in for an embedded object in the analyzed text
pub const OBJECT_REPLACEMENT: char = '\u{fffc}';

/// Stand-in for hidden characters; BN bidi class and common script, so
/// it never perturbs the surrounding analysis
const HIDDEN_REPLACEMENT: char = '\u{feff}';

fn is_bidi_control(ch: char) -> bool {
    matches!(
        ch,
        '\u{200e}' | '\u{200f}' | '\u{061c}' | '\u{202a}'..='\u{202e}' | '\u{2066}'..='\u{2069}'
    )
}

/// Newline classification.
/// U+2028 ends a line without ending the paragraph; everything else
/// here terminates the paragraph.
fn newline_flags(ch: char) -> Option<RunFlags> {
    match ch {
        '\u{2028}' => Some(RunFlags::END_OF_LINE),
        '\n' | '\r' | '\u{000b}' | '\u{000c}' | '\u{0085}' | '\u{2029}' => {
            Some(RunFlags::END_OF_PARAGRAPH)
        }
        _ => None,
    }
}

/// One analysis pass over a paragraph-terminated segment of source
/// text: populates run records, drives the analyzer and itemizer,
/// resolves fallback and shaping complexity, balances spacing, and
/// optionally attaches break conditions.
#[derive(Debug)]
pub struct AnalysisSession {
    start: usize,
    text: String,
    /// Byte offset of each character in `text`
    byte_of: Vec<usize>,
    chain: RunChain,
    base_level: u8,
    /// Length excluding hidden and directional-control runs, used only
    /// by line-break analysis
    break_length: usize,
    needs_number_sub: bool,
}

impl AnalysisSession {
    /// Pull runs from `source` starting at `start` until a line or
    /// paragraph terminator is produced. A source that never
    /// terminates the paragraph violates the caller contract.
    pub fn populate(start: usize, source: &dyn TextSource, base_level: u8) -> Result<Self> {
        let mut session = Self {
            start,
            text: String::new(),
            byte_of: Vec::new(),
            chain: RunChain::new(),
            base_level,
            break_length: 0,
            needs_number_sub: false,
        };

        let mut pos = start;
        'populate: loop {
            let run = source.fetch_run(pos);
            if run.props.number_substitution.is_some() {
                session.needs_number_sub = true;
            }
            match run.kind {
                SourceRunKind::Text(text) => {
                    let mut seg_start = pos;
                    let mut seg_control = false;
                    let mut chars = text.chars().peekable();
                    while let Some(ch) = chars.next() {
                        if let Some(flags) = newline_flags(ch) {
                            if pos > seg_start {
                                session.push_record(
                                    seg_start..pos,
                                    control_flags(seg_control),
                                    run.props.clone(),
                                );
                            }
                            let mut end = pos + 1;
                            session.push_char(ch);
                            // CR directly followed by LF is one break
                            if ch == '\r' && chars.peek() == Some(&'\n') {
                                session.push_char('\n');
                                end += 1;
                            }
                            session.push_record(pos..end, flags, run.props.clone());
                            break 'populate;
                        }
                        let control = is_bidi_control(ch);
                        if control != seg_control && pos > seg_start {
                            session.push_record(
                                seg_start..pos,
                                control_flags(seg_control),
                                run.props.clone(),
                            );
                            seg_start = pos;
                        }
                        seg_control = control;
                        session.push_char(ch);
                        pos += 1;
                    }
                    if pos > seg_start {
                        session.push_record(
                            seg_start..pos,
                            control_flags(seg_control),
                            run.props.clone(),
                        );
                    }
                }
                SourceRunKind::Object(metrics) => {
                    session.push_char(OBJECT_REPLACEMENT);
                    let mut record = RunRecord::new(pos..pos + 1, RunFlags::OBJECT, run.props);
                    record.object = Some(metrics);
                    record.bidi_level = base_level;
                    session.chain.push(record);
                    session.break_length += 1;
                    pos += 1;
                }
                SourceRunKind::Hidden(len) => {
                    for _ in 0..len {
                        session.push_char(HIDDEN_REPLACEMENT);
                    }
                    let mut record = RunRecord::new(pos..pos + len, RunFlags::HIDDEN, run.props);
                    record.bidi_level = base_level;
                    session.chain.push(record);
                    pos += len;
                }
                SourceRunKind::LineBreak(text) => {
                    let len = text.chars().count();
                    for ch in text.chars() {
                        session.push_char(ch);
                    }
                    session.push_record(pos..pos + len, RunFlags::END_OF_LINE, run.props);
                    break 'populate;
                }
                SourceRunKind::ParagraphBreak(text) => {
                    let len = text.chars().count();
                    for ch in text.chars() {
                        session.push_char(ch);
                    }
                    session.push_record(pos..pos + len, RunFlags::END_OF_PARAGRAPH, run.props);
                    break 'populate;
                }
            }
        }

        Ok(session)
    }

    fn push_char(&mut self, ch: char) {
        self.byte_of.push(self.text.len());
        self.text.push(ch);
    }

    fn push_record(&mut self, range: Range<usize>, flags: RunFlags, props: crate::RunProps) {
        let mut record = RunRecord::new(range, flags, props);
        // A terminator-only segment skips analysis entirely, so records
        // start at the paragraph level rather than level zero
        record.bidi_level = self.base_level;
        if !record.flags.is_break_hidden() {
            self.break_length += record.len();
        }
        self.chain.push(record);
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Characters covered, including hidden and terminator runs
    pub fn length(&self) -> usize {
        self.chain.total_length()
    }

    pub fn chain(&self) -> &RunChain {
        &self.chain
    }

    pub fn base_level(&self) -> u8 {
        self.base_level
    }

    /// Slice of the session text covering an absolute character range
    pub fn slice(&self, range: Range<usize>) -> &str {
        let from = self.byte_of[range.start - self.start];
        let to = match self.byte_of.get(range.end - self.start) {
            Some(byte) => *byte,
            None => self.text.len(),
        };
        &self.text[from..to]
    }

    /// Run every analysis pass over the populated records
    pub fn analyze(
        &mut self,
        analyzer: &dyn TextAnalyzer,
        fonts: &dyn FontSource,
        want_breaks: bool,
    ) -> Result<()> {
        if self.length() == 0 {
            return Ok(());
        }
        log::trace!(
            "analyze segment {}..{}: {:?}",
            self.start,
            self.start + self.length(),
            self.text
        );

        let mut itemizer = Itemizer::new();
        analyzer.analyze_script(&self.text, &mut itemizer);
        analyzer.analyze_bidi(&self.text, self.base_level, &mut itemizer);
        if self.needs_number_sub {
            self.analyze_number_substitution(analyzer, &mut itemizer)?;
        }
        itemizer.itemize(&mut self.chain, self.start, self.base_level);

        self.resolve_fonts(fonts);
        self.resolve_complexity(fonts)?;
        self.balance_spacing();
        if want_breaks && self.break_length > 0 {
            self.analyze_breaks(analyzer);
        }
        Ok(())
    }

    /// Request digit substitution analysis once per maximal span of
    /// records sharing a substitution method
    fn analyze_number_substitution(
        &self,
        analyzer: &dyn TextAnalyzer,
        itemizer: &mut Itemizer,
    ) -> Result<()> {
        let mut i = 0;
        while let Some(record) = self.chain.get(i) {
            let Some(method) = record.props.number_substitution else {
                i += 1;
                continue;
            };
            let span_start = record.range.start;
            let mut span_end = record.range.end;
            while let Some(next) = self.chain.get(i + 1) {
                if next.props.number_substitution != Some(method) {
                    break;
                }
                span_end = next.range.end;
                i += 1;
            }
            let mut sink = OffsetSink::new(itemizer, span_start - self.start);
            analyzer.analyze_number_substitution(
                self.slice(span_start..span_end),
                method,
                &mut sink,
            );
            i += 1;
        }
        Ok(())
    }

    /// Resolve font fallback per record, splitting wherever the mapped
    /// face or scale changes mid-run
    fn resolve_fonts(&mut self, fonts: &dyn FontSource) {
        let mut i = 0;
        while i < self.chain.len() {
            let record = self.chain.get(i).unwrap();
            if !record.is_text() || record.is_empty() {
                i += 1;
                continue;
            }
            let text = self.slice(record.range.clone());
            let mapping = fonts.map_characters(text, &record.props);
            let mapped = mapping.mapped.clamp(1, record.len());
            if mapped < record.len() {
                self.chain.split_at(i, mapped);
            }
            let record = self.chain.get_mut(i).unwrap();
            record.font = mapping.face;
            record.font_scale = mapping.scale;
            i += 1;
        }
    }

    /// Decide per record whether glyph-based shaping is required
    fn resolve_complexity(&mut self, fonts: &dyn FontSource) -> Result<()> {
        let mut i = 0;
        while i < self.chain.len() {
            let record = self.chain.get(i).unwrap();
            if !record.is_text() || record.is_empty() {
                i += 1;
                continue;
            }
            if !record.props.default_typography {
                self.chain.get_mut(i).unwrap().glyph_based = true;
                i += 1;
                continue;
            }
            // Odd levels are always shaped so mirrored forms resolve
            if record.bidi_level % 2 == 1 {
                self.chain.get_mut(i).unwrap().glyph_based = true;
                i += 1;
                continue;
            }
            let Some(face) = record.font else {
                self.chain.get_mut(i).unwrap().glyph_based = true;
                i += 1;
                continue;
            };
            let text = self.slice(record.range.clone());
            let (simple, consumed) = fonts.probe_simple(text, face);
            let consumed = consumed.clamp(1, record.len());
            if consumed < record.len() {
                self.chain.split_at(i, consumed);
            }
            self.chain.get_mut(i).unwrap().glyph_based = !simple;
            i += 1;
        }
        Ok(())
    }

    /// Balance trailing character spacing across bidi direction
    /// changes, and suppress it at line and paragraph end
    fn balance_spacing(&mut self) {
        let base_rtl = self.base_level % 2 == 1;
        let n = self.chain.len();
        for i in 0..n {
            let record = self.chain.get(i).unwrap();
            if !record.is_text() || record.props.char_spacing == 0 {
                continue;
            }
            let spacing = record.props.char_spacing;
            let outgoing = (record.bidi_level % 2 == 1) != base_rtl;
            let next = self.chain.get(i + 1);
            match next {
                None => {}
                Some(next) if next.flags.is_terminator() => {
                    // Never space past the end of the line
                    self.chain.get_mut(i).unwrap().space_last_char = false;
                }
                Some(next) => {
                    let next_paragraph_dir = (next.bidi_level % 2 == 1) == base_rtl;
                    if outgoing && next_paragraph_dir && next.is_text() {
                        self.chain.get_mut(i).unwrap().space_last_char = false;
                        self.chain.get_mut(i + 1).unwrap().initial_spacing += spacing;
                    }
                }
            }
        }
    }

    /// Run break analysis over the text with hidden and control runs
    /// removed, then map the results back onto the full chain
    fn analyze_breaks(&mut self, analyzer: &dyn TextAnalyzer) {
        let mut filtered = String::new();
        for record in self.chain.iter() {
            if record.flags.is_break_hidden() || record.is_empty() {
                continue;
            }
            filtered.push_str(self.slice(record.range.clone()));
        }
        let infos = analyzer.analyze_line_breaks(&filtered);
        debug_assert_eq!(infos.len(), self.break_length);

        let mut offset = 0;
        for record in self.chain.iter_mut() {
            if record.flags.is_break_hidden() || record.is_empty() {
                record.breakpoints = None;
                continue;
            }
            let len = record.len();
            record.breakpoints = Some(infos[offset..offset + len].to_vec());
            offset += len;
        }

        self.propagate_space_breaks();
    }

    /// A record made entirely of spaces never gets its own break
    /// query: the analyzer reports the break-before of whatever
    /// follows the spaces. Copy that decision backward onto the
    /// break-after of the record preceding the spaces.
    fn propagate_space_breaks(&mut self) {
        let n = self.chain.len();
        let blank: Vec<bool> = self
            .chain
            .iter()
            .map(|record| {
                record.is_text()
                    && !record.is_empty()
                    && self.slice(record.range.clone()).chars().all(|ch| ch == ' ')
            })
            .collect();

        let mut fixups = Vec::new();
        let mut i = 0;
        while i < n {
            if !blank[i] {
                i += 1;
                continue;
            }
            let blank_start = i;
            while i < n && blank[i] {
                i += 1;
            }
            if blank_start == 0 || i >= n {
                continue;
            }
            let before_ok = self
                .chain
                .get(blank_start - 1)
                .is_some_and(|r| r.breakpoints.is_some());
            let after_ok = self.chain.get(i).is_some_and(|r| r.breakpoints.is_some());
            if before_ok && after_ok {
                fixups.push((blank_start - 1, i));
            }
        }
        for (prev, next) in fixups {
            let condition = self.chain.get(next).unwrap().breakpoints.as_ref().unwrap()[0].before;
            let record = self.chain.get_mut(prev).unwrap();
            if let Some(breaks) = record.breakpoints.as_mut() {
                if let Some(last) = breaks.last_mut() {
                    last.after = condition;
                }
            }
        }
    }

    /// Validate that the populated segment ends in a terminator
    pub fn ensure_terminated(&self) -> Result<()> {
        match self.chain.iter().last() {
            Some(last) if last.flags.is_terminator() => Ok(()),
            _ => Err(FormatError::Internal("analysis segment not terminated")),
        }
    }
}

fn control_flags(control: bool) -> RunFlags {
    if control {
        RunFlags::DIRECTIONAL_CONTROL
    } else {
        RunFlags::empty()
    }
}
