use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Change marker of one line in the current buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineClassification {
    #[default]
    None,
    Added,
    Modified,
    Removed,
}

impl LineClassification {
    /// The line itself is new or changed
    fn has_new_text(self) -> bool {
        matches!(self, Self::Added | Self::Modified)
    }

    /// Baseline text went missing at this line
    fn has_removed_text(self) -> bool {
        matches!(self, Self::Modified | Self::Removed)
    }
}

/// Run of current-buffer lines a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub count: usize,
}

impl LineSpan {
    pub fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    pub fn lines(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }
}

/// Diff state at one line of the current buffer.
///
/// `removed_lines` is non-empty exactly when the classification is
/// [`Removed`](LineClassification::Removed) or
/// [`Modified`](LineClassification::Modified). All lines of a modified run
/// share one removed list, anchored at the first line of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineContext {
    classification: LineClassification,
    removed_lines: Arc<[String]>,
    span: LineSpan,
}

impl LineContext {
    pub(crate) fn added(span: LineSpan) -> Self {
        Self {
            classification: LineClassification::Added,
            removed_lines: Arc::from(Vec::new()),
            span,
        }
    }

    pub(crate) fn removed(anchor: usize, removed_lines: Arc<[String]>) -> Self {
        debug_assert!(!removed_lines.is_empty());
        Self {
            classification: LineClassification::Removed,
            removed_lines,
            span: LineSpan::new(anchor, 1),
        }
    }

    pub(crate) fn modified(span: LineSpan, removed_lines: Arc<[String]>) -> Self {
        debug_assert!(!removed_lines.is_empty());
        Self {
            classification: LineClassification::Modified,
            removed_lines,
            span,
        }
    }

    pub fn classification(&self) -> LineClassification {
        self.classification
    }

    pub fn removed_lines(&self) -> &[String] {
        &self.removed_lines
    }

    pub fn span(&self) -> LineSpan {
        self.span
    }

    /// Line this context is anchored at
    pub fn anchor(&self) -> usize {
        self.span.start
    }

    pub(crate) fn reanchored(mut self, anchor: usize) -> Self {
        self.span.start = anchor;
        self
    }

    /// Combine with a context that lands on the same line later in hunk order.
    ///
    /// New text and removed text on one line make it modified; added lines
    /// never turn back into plain removals.
    pub(crate) fn merge(self, later: LineContext) -> LineContext {
        let has_new = self.classification.has_new_text() || later.classification.has_new_text();
        let has_removed =
            self.classification.has_removed_text() || later.classification.has_removed_text();

        let classification = match (has_new, has_removed) {
            (true, true) => LineClassification::Modified,
            (true, false) => LineClassification::Added,
            (false, true) => LineClassification::Removed,
            (false, false) => LineClassification::None,
        };
        let span = if !self.classification.has_new_text() && later.classification.has_new_text() {
            later.span
        } else {
            self.span
        };
        let removed_lines = concat_removed(self.removed_lines, later.removed_lines);

        LineContext {
            classification,
            removed_lines,
            span,
        }
    }
}

fn concat_removed(first: Arc<[String]>, second: Arc<[String]>) -> Arc<[String]> {
    if second.is_empty() {
        return first;
    }
    if first.is_empty() {
        return second;
    }
    first.iter().chain(second.iter()).cloned().collect()
}

/// Removed text to show for a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub kind: LineClassification,
    pub removed_text: String,
    pub span: LineSpan,
}

impl Tooltip {
    /// The first `max_lines` lines of the removed text
    pub fn truncated(&self, max_lines: usize) -> &str {
        if max_lines == 0 {
            return "";
        }
        match self.removed_text.match_indices('\n').nth(max_lines - 1) {
            Some((idx, _)) => &self.removed_text[..idx],
            None => &self.removed_text,
        }
    }
}

/// Number of lines per marker kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

/// Current-buffer line number (1-based) to diff state.
///
/// Lines without an entry are unchanged. A published map is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineClassificationMap {
    lines: BTreeMap<usize, LineContext>,
}

impl LineClassificationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line of a file without baseline marked as added
    pub fn all_added(line_count: usize) -> Self {
        let mut map = Self::new();
        if line_count == 0 {
            return map;
        }
        let span = LineSpan::new(1, line_count);
        for line in span.lines() {
            map.lines.insert(line, LineContext::added(span));
        }
        map
    }

    pub fn get(&self, line: usize) -> Option<&LineContext> {
        self.lines.get(&line)
    }

    pub fn classification(&self, line: usize) -> LineClassification {
        self.get(line)
            .map(LineContext::classification)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries ordered by line number
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LineContext)> {
        self.lines.iter().map(|(line, context)| (*line, context))
    }

    /// Removed text for `line`, if any was removed there
    pub fn tooltip(&self, line: usize) -> Option<Tooltip> {
        let context = self.get(line)?;
        if !context.classification().has_removed_text() {
            return None;
        }
        Some(Tooltip {
            kind: context.classification(),
            removed_text: context.removed_lines().join("\n"),
            span: context.span(),
        })
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for context in self.lines.values() {
            match context.classification() {
                LineClassification::Added => summary.added += 1,
                LineClassification::Modified => summary.modified += 1,
                LineClassification::Removed => summary.removed += 1,
                LineClassification::None => {}
            }
        }
        summary
    }

    /// Put `context` at `line`, merging with what is already there
    pub(crate) fn merge_at(&mut self, line: usize, context: LineContext) {
        let merged = match self.lines.remove(&line) {
            Some(existing) => existing.merge(context),
            None => context,
        };
        self.lines.insert(line, merged);
    }

    pub(crate) fn take(&mut self, line: usize) -> Option<LineContext> {
        self.lines.remove(&line)
    }
}
