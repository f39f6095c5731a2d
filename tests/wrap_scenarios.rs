// SPDX-License-Identifier: MIT OR Apache-2.0

use lineflow::{
    FormattedLine, FormatterConfig, FormatterContext, LineBreakRecord, ParagraphProps, Wrap,
};

mod common;
use common::{FixedFonts, VecSource};

fn format_paragraph(
    source: &VecSource,
    total: usize,
    max_width: f32,
    paragraph: &ParagraphProps,
) -> Vec<FormattedLine> {
    let fonts = FixedFonts::new();
    let mut context = FormatterContext::new(FormatterConfig::new());
    let mut lines = Vec::new();
    let mut start = 0;
    let mut previous: Option<LineBreakRecord> = None;
    while start < total {
        let line = context
            .format_line(source, &fonts, start, max_width, paragraph, previous.as_ref())
            .unwrap();
        assert!(line.length() > 0, "line at {} consumed nothing", start);
        start += line.length();
        previous = Some(LineBreakRecord::after(&line));
        lines.push(line);
    }
    lines
}

// Word wrapping at 70px with 10px characters: every line must fit, and
// the line lengths must tile the paragraph exactly.
#[test]
fn word_wrap_tiles_the_paragraph() {
    let source = VecSource::paragraph("Lorem ipsum dolor sit amet\n");
    let lines = format_paragraph(&source, 27, 70.0, &ParagraphProps::new());

    let total: usize = lines.iter().map(|line| line.length()).sum();
    assert_eq!(total, 27);
    for line in &lines {
        assert!(
            line.width() <= 70.0,
            "line at {} overflows: {}",
            line.start(),
            line.width()
        );
        assert!(!line.is_forced_break());
    }
    // Only the last line carries the paragraph terminator
    assert_eq!(lines.last().unwrap().newline_length(), 1);
    for line in &lines[..lines.len() - 1] {
        assert_eq!(line.newline_length(), 0);
    }
}

// A word too long for the wrapping width falls back to character
// breaks; no line overflows and every mid-word break is flagged.
#[test]
fn long_word_falls_back_to_character_breaks() {
    let source = VecSource::paragraph("antidisestablishmentarianism\n");
    let lines = format_paragraph(&source, 29, 50.0, &ParagraphProps::new());

    assert!(lines.len() > 1);
    for line in &lines {
        assert!(line.width() <= 50.0);
    }
    for line in &lines[..lines.len() - 1] {
        assert!(line.is_forced_break());
        assert_eq!(line.length(), 5);
    }
}

// The same word overflows instead when overflow wrapping is selected.
#[test]
fn overflow_wrap_keeps_long_words_whole() {
    let source = VecSource::paragraph("antidisestablishmentarianism\n");
    let paragraph = ParagraphProps::new().wrap(Wrap::Word);
    let lines = format_paragraph(&source, 29, 50.0, &paragraph);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].has_overflowed());
    assert!(!lines[0].is_forced_break());
}

// A line separator ends the line but not the paragraph; trailing
// whitespace before it is measured separately from the line width.
#[test]
fn line_separator_ends_line_with_trailing_space() {
    let source = VecSource::paragraph("ABC \u{2028}rest\n");
    let lines = format_paragraph(&source, 10, f32::INFINITY, &ParagraphProps::new());

    assert_eq!(lines.len(), 2);
    let first = &lines[0];
    assert_eq!(first.length(), 5);
    assert_eq!(first.newline_length(), 1);
    assert_eq!(first.trailing_whitespace_length(), 1);
    assert_eq!(first.width(), 30.0);
    assert_eq!(first.width_with_trailing(), 40.0);
    assert_eq!(lines[1].start(), 5);
}

// Formatting is deterministic: a second pass over the same paragraph
// produces identical line geometry.
#[test]
fn reformatting_is_stable() {
    let source = VecSource::paragraph("The quick brown fox jumps over the lazy dog\n");
    let paragraph = ParagraphProps::new();
    let first = format_paragraph(&source, 44, 90.0, &paragraph);
    let second = format_paragraph(&source, 44, 90.0, &paragraph);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.start(), b.start());
        assert_eq!(a.length(), b.length());
        assert_eq!(a.width(), b.width());
    }
}

// Consumed length always includes the characters a caller must skip to
// reach the next line, so dependent length equals length.
#[test]
fn dependent_length_matches_consumed_length() {
    let source = VecSource::paragraph("hello world\n");
    let lines = format_paragraph(&source, 12, 55.0, &ParagraphProps::new());
    for line in &lines {
        assert_eq!(line.dependent_length(), line.length());
    }
}
