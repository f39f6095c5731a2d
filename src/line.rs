// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::{
    CellKind, EngineLine, FlowDirection, FormatError, LineEngine, LineParams, ParagraphProps,
    Result, RunProvider, Wrap,
};

/// Caret position expressed as a character index plus the number of
/// trailing characters of its cluster the caret sits after
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CharacterHit {
    pub first_index: usize,
    pub trailing_length: usize,
}

/// Horizontal extent of a visually contiguous piece of a character
/// range, in line placement space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBounds {
    pub x: f32,
    pub width: f32,
    pub flow_direction: FlowDirection,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineKind {
    Formatted,
    /// Re-broken at a collapsing width; reports the metrics of the
    /// original line but draws only the retained prefix
    Collapsed,
}

/// Granularity of the cut made by [`FormattedLine::collapse`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollapsingStyle {
    TrailingCharacter,
    TrailingWord,
}

/// How to collapse a line that overflows its available width
#[derive(Clone, Debug)]
pub struct CollapsingProps {
    /// Width available for the collapsed line, including the symbol
    pub width: f32,
    pub style: CollapsingStyle,
    /// Width reserved for the collapsing symbol, such as an ellipsis
    pub symbol_width: f32,
}

/// Grapheme cluster inside one cell; the unit of caret movement
struct Cluster {
    range: Range<usize>,
    cell: usize,
}

/// One formatted line with its metrics and query surface.
///
/// Positions are character indices from the paragraph origin; distances
/// are pixels from the left edge of the line's placement space.
#[derive(Clone, Debug)]
pub struct FormattedLine {
    engine: EngineLine,
    kind: LineKind,
    flow: FlowDirection,
    max_width: f32,
    line_height: f32,
    symbol_width: f32,
}

impl FormattedLine {
    pub(crate) fn new(engine: EngineLine, paragraph: &ParagraphProps, max_width: f32) -> Self {
        Self {
            engine,
            kind: LineKind::Formatted,
            flow: paragraph.flow_direction,
            max_width,
            line_height: paragraph.line_height,
            symbol_width: 0.0,
        }
    }

    pub fn start(&self) -> usize {
        self.engine.start
    }

    /// Characters the line consumed, including the terminator
    pub fn length(&self) -> usize {
        self.engine.length
    }

    /// Characters whose formatting the line depends on; equals the
    /// consumed length
    pub fn dependent_length(&self) -> usize {
        self.engine.length
    }

    pub fn newline_length(&self) -> usize {
        self.engine.newline_length
    }

    pub fn trailing_whitespace_length(&self) -> usize {
        self.engine.trailing_whitespace
    }

    /// Width excluding trailing whitespace, plus the collapsing symbol
    /// when collapsed
    pub fn width(&self) -> f32 {
        self.engine.width + self.symbol_width
    }

    pub fn width_with_trailing(&self) -> f32 {
        self.engine.width_with_trailing + self.symbol_width
    }

    /// Offset of the line's placement space from the paragraph's
    /// leading margin
    pub fn start_offset(&self) -> f32 {
        if self.flow.is_rtl() && self.max_width.is_finite() {
            (self.max_width - self.width()).max(0.0)
        } else {
            0.0
        }
    }

    pub fn ascent(&self) -> f32 {
        self.engine.ascent
    }

    pub fn height(&self) -> f32 {
        if self.line_height > 0.0 {
            self.line_height
        } else {
            self.engine.ascent + self.engine.descent
        }
    }

    /// The line broke without a break opportunity
    pub fn is_forced_break(&self) -> bool {
        self.engine.forced
    }

    pub fn is_collapsed(&self) -> bool {
        self.kind == LineKind::Collapsed
    }

    pub fn has_overflowed(&self) -> bool {
        self.engine.width > self.max_width
    }

    pub fn flow_direction(&self) -> FlowDirection {
        self.flow
    }

    /// Re-break the line visually at a narrower width, keeping the
    /// reported lengths of the original so pagination is unaffected.
    ///
    /// The cut is a fresh formatting pass over `provider` at the width
    /// left beside the collapsing symbol: character-style collapsing
    /// end-clips at glyph granularity, word-style collapsing re-breaks
    /// at the last word boundary that fits. `provider` must serve the
    /// same paragraph the line was formatted from.
    pub fn collapse(
        &self,
        provider: &mut dyn RunProvider,
        props: &CollapsingProps,
    ) -> Result<FormattedLine> {
        if self.kind == LineKind::Collapsed {
            return Err(FormatError::InvalidOperation("line is already collapsed"));
        }
        let target = (props.width - props.symbol_width).max(0.0);
        let mut engine = if self.engine.width_with_trailing <= target {
            self.engine.clone()
        } else {
            let (wrap, end_clip) = match props.style {
                CollapsingStyle::TrailingCharacter => (Wrap::Glyph, true),
                CollapsingStyle::TrailingWord => (Wrap::WordOrGlyph, false),
            };
            LineEngine::new().format(
                provider,
                &LineParams {
                    start: self.engine.start,
                    max_width: target,
                    wrap,
                    flow: self.flow,
                    force_character_break: false,
                    end_clip,
                },
            )?
        };
        // Collapse is visual only: the line still accounts for every
        // character the original consumed
        engine.length = self.engine.length;
        engine.newline_length = self.engine.newline_length;
        engine.forced = self.engine.forced;

        Ok(FormattedLine {
            engine,
            kind: LineKind::Collapsed,
            flow: self.flow,
            max_width: props.width,
            line_height: self.line_height,
            symbol_width: props.symbol_width,
        })
    }

    fn clusters(&self) -> Vec<Cluster> {
        let mut out = Vec::new();
        for (i, cell) in self.engine.cells.iter().enumerate() {
            match cell.kind {
                CellKind::Text { .. } => {
                    let mut cp = cell.range.start;
                    for grapheme in cell.text.graphemes(true) {
                        let len = grapheme.chars().count();
                        out.push(Cluster {
                            range: cp..cp + len,
                            cell: i,
                        });
                        cp += len;
                    }
                }
                // An object is a single indivisible caret unit
                CellKind::Object => out.push(Cluster {
                    range: cell.range.clone(),
                    cell: i,
                }),
                CellKind::Hidden | CellKind::Newline => {}
            }
        }
        out
    }

    fn cluster_extent(&self, cluster: &Cluster) -> (f32, f32) {
        let cell = &self.engine.cells[cluster.cell];
        let mut left = f32::INFINITY;
        let mut width = 0.0;
        for cp in cluster.range.clone() {
            let (l, w) = cell.char_extent(cp);
            left = left.min(l);
            width += w;
        }
        (left, width)
    }

    /// Character hit for a pixel distance from the line's left edge
    pub fn character_hit_from_distance(&self, distance: f32) -> CharacterHit {
        let clusters = self.clusters();
        let Some(first) = clusters.first() else {
            return CharacterHit {
                first_index: self.engine.start,
                trailing_length: 0,
            };
        };

        let mut nearest: Option<(f32, CharacterHit)> = None;
        for cluster in &clusters {
            let (left, width) = self.cluster_extent(cluster);
            let rtl = self.engine.cells[cluster.cell].rtl;
            let hit_of = |trailing: bool| CharacterHit {
                first_index: cluster.range.start,
                trailing_length: if trailing { cluster.range.len() } else { 0 },
            };
            if distance >= left && distance < left + width {
                let second_half = distance >= left + width / 2.0;
                return hit_of(second_half != rtl);
            }
            let gap = if distance < left {
                left - distance
            } else {
                distance - (left + width)
            };
            let toward_trailing = (distance >= left + width) != rtl;
            if nearest.as_ref().map_or(true, |(best, _)| gap < *best) {
                nearest = Some((gap, hit_of(toward_trailing)));
            }
        }
        nearest.map(|(_, hit)| hit).unwrap_or(CharacterHit {
            first_index: first.range.start,
            trailing_length: 0,
        })
    }

    /// Pixel distance of a caret position from the line's left edge
    pub fn distance_from_character_hit(&self, hit: CharacterHit) -> Result<f32> {
        if hit.first_index < self.engine.start
            || hit.first_index > self.engine.start + self.engine.length
        {
            return Err(FormatError::InvalidParameter("hit outside the line"));
        }
        let clusters = self.clusters();
        for cluster in &clusters {
            if !cluster.range.contains(&hit.first_index) {
                continue;
            }
            let (left, width) = self.cluster_extent(cluster);
            let rtl = self.engine.cells[cluster.cell].rtl;
            let trailing = hit.trailing_length > 0;
            // The leading edge of an RTL cluster is its right edge
            return Ok(if trailing != rtl { left + width } else { left });
        }
        // Past the visible content: the caret parks at the line end
        Ok(if self.flow.is_rtl() {
            0.0
        } else {
            self.engine.width_with_trailing
        })
    }

    /// Next caret stop in logical order; returns the input hit at the
    /// end of the line
    pub fn next_caret_character_hit(&self, hit: CharacterHit) -> Result<CharacterHit> {
        let clusters = self.caret_clusters()?;
        let Some(i) = position_of(&clusters, hit.first_index) else {
            return Ok(hit);
        };
        if hit.trailing_length == 0 {
            let cluster = &clusters[i];
            return Ok(CharacterHit {
                first_index: cluster.range.start,
                trailing_length: cluster.range.len(),
            });
        }
        match clusters.get(i + 1) {
            Some(next) => Ok(CharacterHit {
                first_index: next.range.start,
                trailing_length: next.range.len(),
            }),
            None => Ok(hit),
        }
    }

    /// Previous caret stop in logical order; returns the input hit at
    /// the start of the line
    pub fn previous_caret_character_hit(&self, hit: CharacterHit) -> Result<CharacterHit> {
        let clusters = self.caret_clusters()?;
        let Some(i) = position_of(&clusters, hit.first_index) else {
            return Ok(hit);
        };
        if hit.trailing_length > 0 {
            return Ok(CharacterHit {
                first_index: clusters[i].range.start,
                trailing_length: 0,
            });
        }
        match i.checked_sub(1).map(|p| &clusters[p]) {
            Some(prev) => Ok(CharacterHit {
                first_index: prev.range.start,
                trailing_length: 0,
            }),
            None => Ok(hit),
        }
    }

    fn caret_clusters(&self) -> Result<Vec<Cluster>> {
        if self.kind == LineKind::Collapsed {
            return Err(FormatError::InvalidOperation(
                "caret navigation on a collapsed line",
            ));
        }
        Ok(self.clusters())
    }

    /// Visual extents of a character range, one bounds entry per
    /// visually contiguous piece
    pub fn text_bounds(&self, first: usize, length: usize) -> Result<Vec<TextBounds>> {
        if length == 0 {
            return Err(FormatError::InvalidParameter("empty bounds range"));
        }
        let line_end = self.engine.start + self.engine.length;
        if first >= line_end || first + length <= self.engine.start {
            return Err(FormatError::InvalidParameter("bounds range outside line"));
        }
        let range = first.max(self.engine.start)..(first + length).min(line_end);

        let mut bounds: Vec<TextBounds> = Vec::new();
        for cell in &self.engine.cells {
            if matches!(cell.kind, CellKind::Newline | CellKind::Hidden) {
                continue;
            }
            let from = range.start.max(cell.range.start);
            let to = range.end.min(cell.range.end);
            if from >= to {
                continue;
            }
            let mut left = f32::INFINITY;
            let mut width = 0.0;
            for cp in from..to {
                let (l, w) = cell.char_extent(cp);
                left = left.min(l);
                width += w;
            }
            let flow = self.engine.sublines[cell.subline].flow;
            if let Some(last) = bounds.last_mut() {
                if last.flow_direction == flow && joins(last, left, width) {
                    last.x = last.x.min(left);
                    last.width += width;
                    continue;
                }
            }
            bounds.push(TextBounds {
                x: left,
                width,
                flow_direction: flow,
            });
        }
        Ok(bounds)
    }
}

fn position_of(clusters: &[Cluster], index: usize) -> Option<usize> {
    clusters.iter().position(|c| c.range.contains(&index))
}

/// Fragments belong to the same bounds entry when they abut on either
/// side
fn joins(last: &TextBounds, left: f32, width: f32) -> bool {
    let eps = 0.01;
    (left - (last.x + last.width)).abs() < eps || (last.x - (left + width)).abs() < eps
}
