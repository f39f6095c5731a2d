// SPDX-License-Identifier: MIT OR Apache-2.0

//! # lineflow
//!
//! This library provides the run-analysis and line-formatting core of a
//! retained-mode text layout pipeline. Callers expose their content
//! through the [TextSource] and [FontSource] traits; the library
//! itemizes it by script, bidi level, and digit substitution, caches
//! the analyzed runs, and formats them into lines with wrapping,
//! collapsing, caret navigation, and hit testing. Bidi analysis
//! utilizes unicode-bidi, script classification unicode-script, break
//! opportunities unicode-linebreak, and caret clusters
//! unicode-segmentation.
//!
//! It is recommended that you start by creating a [FormatterContext],
//! after which you can format lines one at a time, threading each
//! line's [LineBreakRecord] into the next call:
//!
//! ```
//! use lineflow::{
//!     FaceMetrics, FontFaceId, FontMapping, FontSource, FormatterConfig, FormatterContext,
//!     LineBreakRecord, ParagraphProps, RunProps, SourceRun, TextSource,
//! };
//!
//! // A fixed-advance font source; real callers wrap a font database
//! struct Mono;
//!
//! impl FontSource for Mono {
//!     fn map_characters(&self, text: &str, props: &RunProps) -> FontMapping {
//!         FontMapping {
//!             face: Some(FontFaceId(0)),
//!             scale: props.font_scale,
//!             mapped: text.chars().count().max(1),
//!         }
//!     }
//!     fn char_advance(&self, _face: FontFaceId, scale: f32, _ch: char) -> f32 {
//!         scale * 0.5
//!     }
//!     fn face_metrics(&self, _face: FontFaceId, scale: f32) -> FaceMetrics {
//!         FaceMetrics {
//!             ascent: scale * 0.75,
//!             descent: scale * 0.25,
//!         }
//!     }
//!     fn probe_simple(&self, text: &str, _face: FontFaceId) -> (bool, usize) {
//!         (true, text.chars().count())
//!     }
//! }
//!
//! // A single-paragraph text source
//! struct Plain(&'static str);
//!
//! impl TextSource for Plain {
//!     fn fetch_run(&self, index: usize) -> SourceRun {
//!         let tail: String = self.0.chars().skip(index).collect();
//!         SourceRun::text(tail, RunProps::new())
//!     }
//! }
//!
//! let source = Plain("Hello, wrapped world!\n");
//! let fonts = Mono;
//! let paragraph = ParagraphProps::new();
//! let mut context = FormatterContext::new(FormatterConfig::new());
//!
//! // Format the whole paragraph line by line at 80 pixels
//! let mut start = 0;
//! let mut previous: Option<LineBreakRecord> = None;
//! loop {
//!     let line = context
//!         .format_line(&source, &fonts, start, 80.0, &paragraph, previous.as_ref())
//!         .unwrap();
//!     println!("line at {}: {} chars, {} px", line.start(), line.length(), line.width());
//!     start += line.length();
//!     if line.newline_length() > 0 {
//!         break;
//!     }
//!     previous = Some(LineBreakRecord::after(&line));
//! }
//! ```

pub use self::analysis::*;
mod analysis;

pub use self::analyzer::*;
mod analyzer;

pub use self::engine::*;
mod engine;

pub use self::error::*;
mod error;

pub use self::formatter::*;
mod formatter;

pub use self::itemize::*;
mod itemize;

pub use self::line::*;
mod line;

pub use self::run_cache::*;
mod run_cache;

pub use self::run_record::*;
mod run_record;

pub use self::source::*;
mod source;

pub use self::span_tree::*;
mod span_tree;

pub use self::store::*;
mod store;

#[cfg(test)]
pub(crate) mod testutil;
