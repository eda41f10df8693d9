use similar::{Algorithm, DiffOp, capture_diff_slices};

/// One contiguous change between baseline and current lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based current line of the first added line, or the line just above
    /// a pure removal (0 when the removal is at the top)
    pub anchor_line: usize,
    pub removed: Vec<String>,
    pub added_count: usize,
}

/// Zero-context Myers line diff, hunks in increasing anchor order.
///
/// Lines compare by exact string equality.
pub fn diff<'a, B, C>(baseline: &'a [B], current: &[C]) -> Hunks<'a, B>
where
    B: AsRef<str>,
    C: AsRef<str>,
{
    let old: Vec<&str> = baseline.iter().map(AsRef::as_ref).collect();
    let new: Vec<&str> = current.iter().map(AsRef::as_ref).collect();
    // A delete directly followed by an insert comes back as one replace op
    let ops = capture_diff_slices(Algorithm::Myers, &old, &new);

    Hunks {
        ops: ops.into_iter(),
        baseline,
    }
}

/// Lazily turns diff ops into [`Hunk`]s
pub struct Hunks<'a, B> {
    ops: std::vec::IntoIter<DiffOp>,
    baseline: &'a [B],
}

impl<B: AsRef<str>> Hunks<'_, B> {
    fn removed(&self, old_index: usize, old_len: usize) -> Vec<String> {
        self.baseline[old_index..old_index + old_len]
            .iter()
            .map(|line| line.as_ref().to_string())
            .collect()
    }
}

impl<B: AsRef<str>> Iterator for Hunks<'_, B> {
    type Item = Hunk;

    fn next(&mut self) -> Option<Hunk> {
        loop {
            let hunk = match self.ops.next()? {
                DiffOp::Equal { .. } => continue,
                DiffOp::Delete {
                    old_index,
                    old_len,
                    new_index,
                } => Hunk {
                    anchor_line: new_index,
                    removed: self.removed(old_index, old_len),
                    added_count: 0,
                },
                DiffOp::Insert {
                    new_index, new_len, ..
                } => Hunk {
                    anchor_line: new_index + 1,
                    removed: Vec::new(),
                    added_count: new_len,
                },
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => Hunk {
                    anchor_line: new_index + 1,
                    removed: self.removed(old_index, old_len),
                    added_count: new_len,
                },
            };
            if hunk.removed.is_empty() && hunk.added_count == 0 {
                continue;
            }
            return Some(hunk);
        }
    }
}
