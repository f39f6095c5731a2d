// SPDX-License-Identifier: MIT OR Apache-2.0

/// Opaque handle to a font face resolved by a [`FontSource`]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FontFaceId(pub u32);

/// Digit substitution method requested for a run
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NumberSubstitution {
    /// Substitute according to surrounding text
    Context,
    /// Substitute with national digit shapes
    National,
    /// Substitute with traditional digit shapes
    Traditional,
}

/// Properties shared by every character of a source run
#[derive(Clone, Debug, PartialEq)]
pub struct RunProps {
    /// Em size in pixels
    pub font_scale: f32,
    /// Tracking applied after each character, in pixels
    pub char_spacing: i32,
    /// Digit substitution, if any
    pub number_substitution: Option<NumberSubstitution>,
    /// False when typographic features beyond defaults are requested,
    /// which forces glyph-based shaping
    pub default_typography: bool,
}

impl Default for RunProps {
    fn default() -> Self {
        Self {
            font_scale: 16.0,
            char_spacing: 0,
            number_substitution: None,
            default_typography: true,
        }
    }
}

impl RunProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font_scale(mut self, font_scale: f32) -> Self {
        self.font_scale = font_scale;
        self
    }

    pub fn char_spacing(mut self, char_spacing: i32) -> Self {
        self.char_spacing = char_spacing;
        self
    }

    pub fn number_substitution(mut self, method: NumberSubstitution) -> Self {
        self.number_substitution = Some(method);
        self
    }

    pub fn default_typography(mut self, default_typography: bool) -> Self {
        self.default_typography = default_typography;
        self
    }
}

/// Metrics of an embedded object run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectMetrics {
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the object to its baseline
    pub baseline: f32,
}

/// Content of one run pulled from a [`TextSource`]
#[derive(Clone, Debug)]
pub enum SourceRunKind {
    /// Visible characters
    Text(String),
    /// An embedded object occupying one character position
    Object(ObjectMetrics),
    /// Characters that occupy positions but are never visible
    Hidden(usize),
    /// An explicit line break; the string is the break character(s)
    LineBreak(String),
    /// End of the paragraph; the string is the break character(s), and
    /// may be empty for the final paragraph of a source
    ParagraphBreak(String),
}

/// One run pulled from a [`TextSource`]
#[derive(Clone, Debug)]
pub struct SourceRun {
    pub kind: SourceRunKind,
    pub props: RunProps,
}

impl SourceRun {
    pub fn text(text: impl Into<String>, props: RunProps) -> Self {
        Self {
            kind: SourceRunKind::Text(text.into()),
            props,
        }
    }
}

/// Pull-based character stream for one or more paragraphs.
///
/// `fetch_run` is called with increasing character indices during
/// analysis. A paragraph must eventually produce a
/// [`SourceRunKind::LineBreak`] or [`SourceRunKind::ParagraphBreak`]
/// run (possibly as a newline character embedded in a text run); a
/// source that never terminates the paragraph violates the caller
/// contract and analysis will not return.
pub trait TextSource {
    /// Return the run starting at `index` (in characters from the
    /// source origin)
    fn fetch_run(&self, index: usize) -> SourceRun;
}

/// Result of mapping characters to a concrete font face
#[derive(Clone, Copy, Debug)]
pub struct FontMapping {
    /// Face the characters mapped to, if any face supports them
    pub face: Option<FontFaceId>,
    /// Scale to render the face at, in pixels per em
    pub scale: f32,
    /// Number of characters mapped; always at least one
    pub mapped: usize,
}

/// Vertical metrics of a face at a given scale, in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// Font fallback and measurement collaborator.
///
/// Fallback selection internals are outside this crate; implementations
/// typically wrap a font database and shaping probe.
pub trait FontSource {
    /// Map a prefix of `text` to a single face and scale
    fn map_characters(&self, text: &str, props: &RunProps) -> FontMapping;

    /// Advance width of one character, in pixels
    fn char_advance(&self, face: FontFaceId, scale: f32, ch: char) -> f32;

    /// Vertical metrics of a face at a scale
    fn face_metrics(&self, face: FontFaceId, scale: f32) -> FaceMetrics;

    /// Probe whether a prefix of `text` can be rendered without
    /// glyph-based shaping, returning the decision and the number of
    /// characters the decision covers (at least one)
    fn probe_simple(&self, text: &str, face: FontFaceId) -> (bool, usize);
}

/// Reading order of a paragraph or subline
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlowDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl FlowDirection {
    pub fn is_rtl(&self) -> bool {
        *self == Self::RightToLeft
    }

    /// Base bidi level implied by this direction
    pub fn base_level(&self) -> u8 {
        match self {
            Self::LeftToRight => 0,
            Self::RightToLeft => 1,
        }
    }

    /// Direction implied by a bidi level
    pub fn from_level(level: u8) -> Self {
        if level % 2 == 0 {
            Self::LeftToRight
        } else {
            Self::RightToLeft
        }
    }
}

/// Wrapping behavior of a paragraph
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Wrap {
    /// No wrapping; lines end only at explicit breaks
    None,
    /// Break at word boundaries only, letting an unbreakable word
    /// overflow the wrapping width
    Word,
    /// Break at word boundaries, falling back to character boundaries
    /// when a word cannot fit (two formatting passes)
    #[default]
    WordOrGlyph,
    /// Break at character boundaries
    Glyph,
}

/// Paragraph-level formatting properties
#[derive(Clone, Debug)]
pub struct ParagraphProps {
    pub flow_direction: FlowDirection,
    pub wrap: Wrap,
    /// Properties assumed for the line when it contains no runs of its
    /// own, such as an empty last line
    pub default_props: RunProps,
    /// Fixed line height in pixels; zero derives the height from runs
    pub line_height: f32,
}

impl Default for ParagraphProps {
    fn default() -> Self {
        Self {
            flow_direction: FlowDirection::LeftToRight,
            wrap: Wrap::WordOrGlyph,
            default_props: RunProps::default(),
            line_height: 0.0,
        }
    }
}

impl ParagraphProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow_direction(mut self, flow_direction: FlowDirection) -> Self {
        self.flow_direction = flow_direction;
        self
    }

    pub fn wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn default_props(mut self, default_props: RunProps) -> Self {
        self.default_props = default_props;
        self
    }

    pub fn line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }
}
