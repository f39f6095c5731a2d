// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;
use unicode_script::Script;

use crate::{FontFaceId, NumberSubstitution, ObjectMetrics, RunProps};

bitflags::bitflags! {
    /// Classification of a run record
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RunFlags: u8 {
        /// Occupies character positions but is never visible
        const HIDDEN = 1;
        /// Bidi control character(s), excluded from break analysis
        const DIRECTIONAL_CONTROL = 1 << 1;
        /// Explicit line break
        const END_OF_LINE = 1 << 2;
        /// End of the paragraph
        const END_OF_PARAGRAPH = 1 << 3;
        /// Embedded object
        const OBJECT = 1 << 4;
    }
}

impl RunFlags {
    /// True for records that terminate an analysis segment
    pub fn is_terminator(&self) -> bool {
        self.intersects(Self::END_OF_LINE | Self::END_OF_PARAGRAPH)
    }

    /// True for records hidden from line-break analysis
    pub fn is_break_hidden(&self) -> bool {
        self.intersects(Self::HIDDEN | Self::DIRECTIONAL_CONTROL)
    }
}

/// Whether a line may break at a character boundary
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BreakCondition {
    #[default]
    Prohibited,
    Allowed,
    Mandatory,
}

/// Break conditions on both sides of one character
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BreakInfo {
    pub before: BreakCondition,
    pub after: BreakCondition,
}

/// One contiguous span of characters sharing a source run and, after
/// analysis, a single script, bidi level, and substitution method.
///
/// Records are mutated only during analysis; once materialized into the
/// run cache they are never touched again.
#[derive(Clone, Debug)]
pub struct RunRecord {
    /// Absolute character range covered by this record
    pub range: Range<usize>,
    pub flags: RunFlags,
    /// Properties of the source run this record came from
    pub props: RunProps,
    /// Metrics when this record is an embedded object
    pub object: Option<ObjectMetrics>,
    /// Resolved bidi embedding level
    pub bidi_level: u8,
    /// Itemized script
    pub script: Script,
    /// Itemized digit substitution
    pub number_substitution: Option<NumberSubstitution>,
    /// Face resolved by font fallback
    pub font: Option<FontFaceId>,
    /// Scale the resolved face renders at
    pub font_scale: f32,
    /// True when the record requires glyph-based shaping
    pub glyph_based: bool,
    /// Spacing moved onto this record's first character from a
    /// preceding run across a bidi direction change
    pub initial_spacing: i32,
    /// Whether the record's own spacing applies after its last character
    pub space_last_char: bool,
    /// Per-character break conditions, populated by break analysis
    pub breakpoints: Option<Vec<BreakInfo>>,
}

impl RunRecord {
    pub fn new(range: Range<usize>, flags: RunFlags, props: RunProps) -> Self {
        let space_last_char = props.char_spacing != 0;
        let font_scale = props.font_scale;
        Self {
            range,
            flags,
            props,
            object: None,
            bidi_level: 0,
            script: Script::Unknown,
            number_substitution: None,
            font: None,
            font_scale,
            glyph_based: false,
            initial_spacing: 0,
            space_last_char,
            breakpoints: None,
        }
    }

    pub fn len(&self) -> usize {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// True for records carrying visible text subject to itemization,
    /// fallback, and shaping analysis
    pub fn is_text(&self) -> bool {
        self.flags
            .intersection(
                RunFlags::OBJECT
                    | RunFlags::HIDDEN
                    | RunFlags::DIRECTIONAL_CONTROL
                    | RunFlags::END_OF_LINE
                    | RunFlags::END_OF_PARAGRAPH,
            )
            .is_empty()
    }

    /// Split this record at `offset` characters from its start,
    /// returning the tail. The head keeps every property it had; the
    /// tail starts as a copy and is re-annotated by the caller.
    pub fn split(&mut self, offset: usize) -> Self {
        debug_assert!(offset > 0 && offset < self.len(), "split offset out of range");
        let mid = self.range.start + offset;
        let mut tail = self.clone();
        tail.range = mid..self.range.end;
        tail.initial_spacing = 0;
        self.range = self.range.start..mid;
        if let Some(breaks) = self.breakpoints.as_mut() {
            tail.breakpoints = Some(breaks.split_off(offset));
        }
        // Spacing after the head's last character stays live; only the
        // true end of the original record can suppress it.
        tail.space_last_char = self.space_last_char;
        self.space_last_char = self.props.char_spacing != 0;
        tail
    }
}

/// Ordered sequence of run records for one analysis segment.
///
/// Stands in for the doubly linked record chain of the original design;
/// neighbors are reached by index arithmetic.
#[derive(Debug, Default)]
pub struct RunChain {
    records: Vec<RunRecord>,
}

impl RunChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RunRecord) {
        if let Some(last) = self.records.last() {
            debug_assert_eq!(last.range.end, record.range.start, "record chain gap");
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total characters covered by the chain
    pub fn total_length(&self) -> usize {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => last.range.end - first.range.start,
            _ => 0,
        }
    }

    pub fn get(&self, index: usize) -> Option<&RunRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RunRecord> {
        self.records.get_mut(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, RunRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, RunRecord> {
        self.records.iter_mut()
    }

    /// Index of the record containing the absolute position `pos`
    pub fn index_of(&self, pos: usize) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.range.contains(&pos) || (r.is_empty() && r.range.start == pos))
    }

    /// Split the record at `index` into two records at `offset`
    /// characters from its start. The tail is inserted directly after
    /// the head.
    pub fn split_at(&mut self, index: usize, offset: usize) {
        let tail = self.records[index].split(offset);
        self.records.insert(index + 1, tail);
    }
}
