use super::differ::Hunk;
use super::types::{LineClassificationMap, LineContext, LineSpan};
use std::sync::Arc;

/// What a hunk does to the current buffer
enum HunkShape {
    Empty,
    /// Baseline lines vanished between two current lines
    Removal { anchor: usize, removed: Arc<[String]> },
    Addition { span: LineSpan },
    /// Removed lines replaced by `span.count` new ones
    Replacement { span: LineSpan, removed: Arc<[String]> },
}

impl HunkShape {
    fn of(hunk: Hunk) -> Self {
        let Hunk {
            anchor_line,
            removed,
            added_count,
        } = hunk;

        match (removed.is_empty(), added_count) {
            (true, 0) => Self::Empty,
            (false, 0) => Self::Removal {
                anchor: anchor_line,
                removed: removed.into(),
            },
            (true, count) => Self::Addition {
                span: LineSpan::new(anchor_line, count),
            },
            (false, count) => Self::Replacement {
                span: LineSpan::new(anchor_line, count),
                removed: removed.into(),
            },
        }
    }
}

/// Fold hunks into per-line markers.
///
/// - a removal marks the line above it as removed, carrying the removed text
/// - every added line is marked added
/// - every line of a replacement is marked modified and shares the whole
///   removed run, anchored at the run's first line
/// - a removal at the very top (anchor 0) is shown on line 1
pub fn reduce<I>(hunks: I) -> LineClassificationMap
where
    I: IntoIterator<Item = Hunk>,
{
    let mut map = LineClassificationMap::new();

    for hunk in hunks {
        match HunkShape::of(hunk) {
            HunkShape::Empty => {}
            HunkShape::Removal { anchor, removed } => {
                map.merge_at(anchor, LineContext::removed(anchor, removed));
            }
            HunkShape::Addition { span } => {
                for line in span.lines() {
                    map.merge_at(line, LineContext::added(span));
                }
            }
            HunkShape::Replacement { span, removed } => {
                for line in span.lines() {
                    map.merge_at(line, LineContext::modified(span, Arc::clone(&removed)));
                }
            }
        }
    }

    relocate_zero_anchor(&mut map);
    map
}

/// Line 0 is not addressable; what was removed above line 1 is shown on it
fn relocate_zero_anchor(map: &mut LineClassificationMap) {
    let Some(top) = map.take(0) else {
        return;
    };
    let top = top.reanchored(1);
    let merged = match map.take(1) {
        Some(first) => top.merge(first),
        None => top,
    };
    map.merge_at(1, merged);
}
