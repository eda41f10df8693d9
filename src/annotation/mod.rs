//! Line change annotations
//!
//! The live buffer is diffed line by line against its baseline
//! ([`differ`]), the hunks are folded into a per-line
//! [`LineClassificationMap`] ([`reducer`]), and an [`AnnotationSession`]
//! keeps that map current while the file is edited.

pub mod differ;
pub mod reducer;
mod session;
mod types;
mod worker;

pub use session::{AnnotationConsumer, AnnotationSession, SessionState, SessionStats};
pub use types::{
    ChangeSummary, LineClassification, LineClassificationMap, LineContext, LineSpan, Tooltip,
};
pub use worker::Waker;

use crate::baseline::{
    BaselineError, BaselineProvider, BaselineSnapshot, Resolution, line_count, resolve_baseline,
    split_lines,
};
use std::path::Path;

/// Annotate `buffer` against `baseline` in one go
pub fn annotate(baseline: &BaselineSnapshot, buffer: &str) -> LineClassificationMap {
    if !baseline.is_tracked() {
        return LineClassificationMap::all_added(line_count(buffer));
    }
    reducer::reduce(differ::diff(baseline.lines(), &split_lines(buffer)))
}

/// Resolve the baseline of `path` and annotate `buffer` against it.
///
/// A file without repository or with a binary baseline has no annotations.
pub fn annotate_file(
    provider: &dyn BaselineProvider,
    path: &Path,
    buffer: &str,
) -> Result<LineClassificationMap, BaselineError> {
    match resolve_baseline(provider, path) {
        Resolution::Ready(baseline) => Ok(annotate(&baseline, buffer)),
        Resolution::Unavailable(_) => Ok(LineClassificationMap::new()),
        Resolution::Failed(e) => Err(e),
    }
}
