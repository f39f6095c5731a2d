// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic source and font fixtures shared by the scenario tests.

#![allow(dead_code)]

use lineflow::{
    FaceMetrics, FontFaceId, FontMapping, FontSource, RunProps, SourceRun, SourceRunKind,
    TextSource,
};

/// Text source backed by a vector of runs laid end to end
pub struct VecSource {
    runs: Vec<SourceRun>,
    starts: Vec<usize>,
}

impl VecSource {
    pub fn new(runs: Vec<SourceRun>) -> Self {
        let mut starts = Vec::with_capacity(runs.len());
        let mut pos = 0;
        for run in &runs {
            starts.push(pos);
            pos += match &run.kind {
                SourceRunKind::Text(text) => text.chars().count(),
                SourceRunKind::Object(_) => 1,
                SourceRunKind::Hidden(len) => *len,
                SourceRunKind::LineBreak(text) | SourceRunKind::ParagraphBreak(text) => {
                    text.chars().count()
                }
            };
        }
        Self { runs, starts }
    }

    pub fn paragraph(text: &str) -> Self {
        Self::new(vec![SourceRun::text(text, RunProps::new())])
    }
}

impl TextSource for VecSource {
    fn fetch_run(&self, index: usize) -> SourceRun {
        for (i, start) in self.starts.iter().enumerate().rev() {
            if index >= *start {
                let run = self.runs[i].clone();
                if index == *start {
                    return run;
                }
                // A fetch inside a text run returns its tail
                if let SourceRunKind::Text(text) = &run.kind {
                    let tail: String = text.chars().skip(index - start).collect();
                    return SourceRun::text(tail, run.props);
                }
                return run;
            }
        }
        self.runs[0].clone()
    }
}

/// Font source with one face and a fixed 10px advance per character
pub struct FixedFonts {
    pub advance: f32,
}

impl FixedFonts {
    pub fn new() -> Self {
        Self { advance: 10.0 }
    }
}

impl FontSource for FixedFonts {
    fn map_characters(&self, text: &str, props: &RunProps) -> FontMapping {
        FontMapping {
            face: Some(FontFaceId(1)),
            scale: props.font_scale,
            mapped: text.chars().count().max(1),
        }
    }

    fn char_advance(&self, _face: FontFaceId, _scale: f32, _ch: char) -> f32 {
        self.advance
    }

    fn face_metrics(&self, _face: FontFaceId, scale: f32) -> FaceMetrics {
        FaceMetrics {
            ascent: scale * 0.75,
            descent: scale * 0.25,
        }
    }

    fn probe_simple(&self, text: &str, _face: FontFaceId) -> (bool, usize) {
        (true, text.chars().count())
    }
}
