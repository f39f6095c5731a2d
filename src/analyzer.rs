// SPDX-License-Identifier: MIT OR Apache-2.0

use unicode_bidi::{BidiClass, BidiInfo, Level};
use unicode_script::{Script, UnicodeScript};

use crate::{AnalysisSink, BreakCondition, BreakInfo, NumberSubstitution};

/// Script, bidi, substitution, and line-break analysis over one
/// analysis segment.
///
/// Results are reported as sorted, non-overlapping `(range, value)`
/// annotations in character units, relative to the analyzed text.
pub trait TextAnalyzer {
    fn analyze_script(&self, text: &str, sink: &mut dyn AnalysisSink);
    fn analyze_bidi(&self, text: &str, base_level: u8, sink: &mut dyn AnalysisSink);
    fn analyze_number_substitution(
        &self,
        text: &str,
        method: NumberSubstitution,
        sink: &mut dyn AnalysisSink,
    );
    /// Per-character break conditions for the visible text
    fn analyze_line_breaks(&self, text: &str) -> Vec<BreakInfo>;
}

/// Default analyzer backed by unicode-script, unicode-bidi, and
/// unicode-linebreak.
#[derive(Debug, Default)]
pub struct UnicodeAnalyzer;

impl UnicodeAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl TextAnalyzer for UnicodeAnalyzer {
    fn analyze_script(&self, text: &str, sink: &mut dyn AnalysisSink) {
        let total = text.chars().count();
        if total == 0 {
            return;
        }
        let mut start = 0;
        let mut current = Script::Common;
        for (i, ch) in text.chars().enumerate() {
            let script = ch.script();
            // Common, inherited, and unknown characters extend the
            // surrounding run
            if matches!(script, Script::Common | Script::Inherited | Script::Unknown) {
                continue;
            }
            if current == Script::Common {
                current = script;
            } else if script != current {
                sink.set_script_analysis(start..i, current);
                start = i;
                current = script;
            }
        }
        sink.set_script_analysis(start..total, current);
    }

    fn analyze_bidi(&self, text: &str, base_level: u8, sink: &mut dyn AnalysisSink) {
        if text.is_empty() {
            return;
        }
        let base = if base_level % 2 == 0 {
            Level::ltr()
        } else {
            Level::rtl()
        };
        let info = BidiInfo::new(text, Some(base));

        let mut start = 0;
        let mut current: Option<u8> = None;
        let mut count = 0;
        for (i, (byte, _)) in text.char_indices().enumerate() {
            count = i + 1;
            // Explicit formatting characters are removed by rule X9;
            // report them at the paragraph level so they never open a
            // reversal of their own.
            let level = match info.original_classes[byte] {
                BidiClass::RLE
                | BidiClass::LRE
                | BidiClass::RLO
                | BidiClass::LRO
                | BidiClass::PDF
                | BidiClass::BN => base_level,
                _ => info.levels[byte].number(),
            };
            match current {
                Some(level_run) if level_run == level => {}
                Some(level_run) => {
                    sink.set_bidi_level(start..i, level_run);
                    start = i;
                    current = Some(level);
                }
                None => current = Some(level),
            }
        }
        if let Some(level_run) = current {
            sink.set_bidi_level(start..count, level_run);
        }
    }

    fn analyze_number_substitution(
        &self,
        text: &str,
        method: NumberSubstitution,
        sink: &mut dyn AnalysisSink,
    ) {
        // Substitution applies to European digits only
        let mut start = None;
        let mut count = 0;
        for (i, ch) in text.chars().enumerate() {
            count = i + 1;
            if ch.is_ascii_digit() {
                if start.is_none() {
                    start = Some(i);
                }
            } else if let Some(from) = start.take() {
                sink.set_number_substitution(from..i, method);
            }
        }
        if let Some(from) = start {
            sink.set_number_substitution(from..count, method);
        }
    }

    fn analyze_line_breaks(&self, text: &str) -> Vec<BreakInfo> {
        let char_starts: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        let total = char_starts.len();
        let mut infos = vec![BreakInfo::default(); total];
        for (byte, opportunity) in unicode_linebreak::linebreaks(text) {
            let condition = match opportunity {
                unicode_linebreak::BreakOpportunity::Mandatory => BreakCondition::Mandatory,
                unicode_linebreak::BreakOpportunity::Allowed => BreakCondition::Allowed,
            };
            let ci = match char_starts.binary_search(&byte) {
                Ok(ci) => ci,
                Err(ci) => ci,
            };
            if ci < total {
                infos[ci].before = condition;
            }
            if ci > 0 {
                infos[ci - 1].after = condition;
            }
        }
        infos
    }
}
