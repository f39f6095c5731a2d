// SPDX-License-Identifier: MIT OR Apache-2.0

use lineflow::{
    CachedRun, CachedRunKind, FlowDirection, FormatterConfig, FormatterContext, ParagraphProps,
    TextStore, UnicodeAnalyzer, Wrap,
};

mod common;
use common::{FixedFonts, VecSource};

/// Walk a whole line through the store the way the engine does,
/// tracking the span context across markers
fn fetch_line(store: &mut TextStore, source: &VecSource) -> Vec<CachedRun> {
    let analyzer = UnicodeAnalyzer::new();
    let fonts = FixedFonts::new();
    let mut runs = Vec::new();
    let mut stack = vec![store.root()];
    let mut pos = store.origin();
    loop {
        let slot = store
            .fetch(pos, stack.last().copied(), source, &analyzer, &fonts, true)
            .unwrap();
        let run = store.runs()[slot].clone();
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

// Latin text inside an explicit right-to-left embedding resolves two
// levels above the paragraph, producing exactly two open/close marker
// pairs that unwind in reverse order.
#[test]
fn explicit_embedding_emits_two_marker_pairs() {
    let source = VecSource::paragraph("abc\u{202b}DEF\u{202c}ghi\n");
    let mut store = TextStore::new(0, 0);
    let runs = fetch_line(&mut store, &source);

    let opens: Vec<&CachedRun> = runs
        .iter()
        .filter(|r| matches!(r.kind, CachedRunKind::OpenReversal))
        .collect();
    let closes: Vec<&CachedRun> = runs
        .iter()
        .filter(|r| matches!(r.kind, CachedRunKind::CloseReversal))
        .collect();
    assert_eq!(opens.len(), 2);
    assert_eq!(closes.len(), 2);
    assert_eq!(opens[0].span, closes[1].span);
    assert_eq!(opens[1].span, closes[0].span);
    // Markers are zero-length and sit at the embedding boundaries
    assert!(opens.iter().all(|r| r.range == (4..4)));
    assert!(closes.iter().all(|r| r.range == (7..7)));
    // The spans nest under the paragraph root
    let outer = store.tree().get(opens[0].span);
    let inner = store.tree().get(opens[1].span);
    assert_eq!(outer.parent, Some(store.root()));
    assert_eq!(inner.parent, Some(opens[0].span));
    assert_eq!(outer.length, Some(3));
    assert_eq!(inner.length, Some(3));
}

// Hebrew letters in left-to-right text reverse visually: bounds for a
// range crossing the direction change split into one piece per
// direction, tiling the full width.
#[test]
fn mixed_direction_bounds_split_at_reversals() {
    let source = VecSource::paragraph("ab\u{05d0}\u{05d1}cd\n");
    let fonts = FixedFonts::new();
    let mut context = FormatterContext::new(FormatterConfig::new());
    let paragraph = ParagraphProps::new().wrap(Wrap::None);

    let line = context
        .format_line(&source, &fonts, 0, f32::INFINITY, &paragraph, None)
        .unwrap();
    let bounds = line.text_bounds(0, 6).unwrap();
    assert_eq!(bounds.len(), 3);
    assert_eq!(bounds[0].flow_direction, FlowDirection::LeftToRight);
    assert_eq!(bounds[1].flow_direction, FlowDirection::RightToLeft);
    assert_eq!(bounds[2].flow_direction, FlowDirection::LeftToRight);
    let total: f32 = bounds.iter().map(|b| b.width).sum();
    assert_eq!(total, 60.0);

    // A range inside the reversal stays a single right-to-left piece
    let hebrew = line.text_bounds(2, 2).unwrap();
    assert_eq!(hebrew.len(), 1);
    assert_eq!(hebrew[0].flow_direction, FlowDirection::RightToLeft);
    assert_eq!(hebrew[0].width, 20.0);
}

// A right-to-left paragraph in a finite width starts at the right
// margin.
#[test]
fn rtl_paragraph_offsets_from_the_right_margin() {
    let source = VecSource::paragraph("\u{05e9}\u{05dc}\u{05d5}\u{05dd}\n");
    let fonts = FixedFonts::new();
    let mut context = FormatterContext::new(FormatterConfig::new());
    let paragraph = ParagraphProps::new()
        .flow_direction(FlowDirection::RightToLeft)
        .wrap(Wrap::None);

    let line = context
        .format_line(&source, &fonts, 0, 100.0, &paragraph, None)
        .unwrap();
    assert_eq!(line.width(), 40.0);
    assert_eq!(line.start_offset(), 60.0);
}

// Bidi control characters occupy positions but are invisible: they take
// no width and never open reversal scopes of their own.
#[test]
fn directional_controls_are_zero_width() {
    let source = VecSource::paragraph("ab\u{202b}\u{05d0}\u{202c}cd\n");
    let fonts = FixedFonts::new();
    let mut context = FormatterContext::new(FormatterConfig::new());
    let paragraph = ParagraphProps::new().wrap(Wrap::None);

    let line = context
        .format_line(&source, &fonts, 0, f32::INFINITY, &paragraph, None)
        .unwrap();
    // Seven characters consumed plus the newline, five of them visible
    assert_eq!(line.length(), 8);
    assert_eq!(line.width(), 50.0);
}
