// SPDX-License-Identifier: MIT OR Apache-2.0

/// Stable handle to a span in a [`SpanTree`] arena
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SpanHandle(usize);

/// Nesting scope recorded by a span
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpanKind {
    /// The paragraph scope; always the tree root
    Paragraph,
    /// An embedded object scope
    Object,
    /// A bidi reversal scope at the given embedding level
    Reversal(u8),
}

/// One node of the bidi/paragraph nesting tree.
///
/// A span's length is set exactly once, when data up to its end has
/// been produced; until then it is open. The parent link is a
/// non-owning back-reference; the arena owns every node.
#[derive(Clone, Debug)]
pub struct Span {
    pub start: usize,
    pub kind: SpanKind,
    /// Characters covered; `None` while the span is open
    pub length: Option<usize>,
    pub parent: Option<SpanHandle>,
    pub first_child: Option<SpanHandle>,
    pub next_sibling: Option<SpanHandle>,
    last_child: Option<SpanHandle>,
    level: u8,
}

impl Span {
    pub fn is_open(&self) -> bool {
        self.length.is_none()
    }

    /// Bidi embedding level of content directly inside this span
    pub fn level(&self) -> u8 {
        self.level
    }
}

/// Arena of spans rooted at the paragraph span.
#[derive(Debug)]
pub struct SpanTree {
    spans: Vec<Span>,
    start: usize,
    base_level: u8,
}

impl SpanTree {
    /// Create a tree whose root is an open paragraph span starting at
    /// `start` with the paragraph base level
    pub fn new(start: usize, base_level: u8) -> Self {
        let mut tree = Self {
            spans: Vec::new(),
            start,
            base_level,
        };
        tree.reset();
        tree
    }

    fn reset(&mut self) {
        self.spans.push(Span {
            start: self.start,
            kind: SpanKind::Paragraph,
            length: None,
            parent: None,
            first_child: None,
            next_sibling: None,
            last_child: None,
            level: self.base_level,
        });
    }

    pub fn root(&self) -> SpanHandle {
        SpanHandle(0)
    }

    pub fn get(&self, handle: SpanHandle) -> &Span {
        &self.spans[handle.0]
    }

    /// Open a child span of `parent` at `start`. Children are only
    /// discovered at positions inside a still-open ancestor chain.
    pub fn open_span(&mut self, parent: SpanHandle, start: usize, kind: SpanKind) -> SpanHandle {
        debug_assert!(self.spans[parent.0].is_open() || {
            let p = &self.spans[parent.0];
            start < p.start + p.length.unwrap_or(0)
        });
        let level = match kind {
            SpanKind::Reversal(level) => level,
            _ => self.spans[parent.0].level,
        };
        let handle = SpanHandle(self.spans.len());
        self.spans.push(Span {
            start,
            kind,
            length: None,
            parent: Some(parent),
            first_child: None,
            next_sibling: None,
            last_child: None,
            level,
        });
        let parent_span = &mut self.spans[parent.0];
        match parent_span.last_child {
            Some(last) => {
                parent_span.last_child = Some(handle);
                self.spans[last.0].next_sibling = Some(handle);
            }
            None => {
                parent_span.first_child = Some(handle);
                parent_span.last_child = Some(handle);
            }
        }
        handle
    }

    /// Fix the final length of an open span, ending at `end`
    pub fn close_span(&mut self, handle: SpanHandle, end: usize) {
        let span = &mut self.spans[handle.0];
        debug_assert!(span.is_open(), "span length set twice");
        debug_assert!(end >= span.start);
        span.length = Some(end - span.start);
    }

    /// Release the whole tree without recursing on content size.
    ///
    /// Walks first-child, then sibling, then parent, detaching the
    /// first-child pointer on the way down so each node is visited
    /// once; pathological nesting depth cannot overflow the stack.
    pub fn clear(&mut self) {
        let mut current = Some(self.root());
        while let Some(handle) = current {
            if let Some(child) = self.spans[handle.0].first_child.take() {
                current = Some(child);
            } else if let Some(sibling) = self.spans[handle.0].next_sibling {
                current = Some(sibling);
            } else {
                current = self.spans[handle.0].parent;
            }
        }
        self.spans.clear();
        self.reset();
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
