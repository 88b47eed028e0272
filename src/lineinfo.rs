//! Bidirectional mapping between preprocessed-text line numbers and the
//! original source file's line numbers.

/// `map[i]` is the 1-based original-file line number of preprocessed line `i`
/// (0-based index). A pass that doesn't reshuffle lines returns `None` from
/// its transform function, which [`LineMap::compose`] treats as identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMap {
    original_line: Vec<usize>,
}

impl LineMap {
    /// Builds the identity map for a piece of text with `line_count` lines.
    pub fn identity(line_count: usize) -> Self {
        LineMap {
            original_line: (1..=line_count).collect(),
        }
    }

    pub fn from_rows(rows: Vec<usize>) -> Self {
        LineMap {
            original_line: rows,
        }
    }

    pub fn len(&self) -> usize {
        self.original_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_line.is_empty()
    }

    /// Translates a 1-based preprocessed line number into the original line.
    /// Out-of-range lines clamp to the nearest known line; preprocessing
    /// passes should never produce a statement position past the end of the
    /// text they emit, so this is a defensive fallback rather than a
    /// load-bearing behavior.
    pub fn translate(&self, preprocessed_line: usize) -> usize {
        if self.original_line.is_empty() {
            return preprocessed_line;
        }
        let idx = preprocessed_line.saturating_sub(1);
        let idx = idx.min(self.original_line.len() - 1);
        self.original_line[idx]
    }

    /// Composes `self` (already-composed map from an earlier pass, in terms
    /// of original lines) with a `next` map produced by one more pass whose
    /// input was `self`'s output space. `next[i]` indexes into `self`'s line
    /// space, so the result re-points each row at the earlier original line.
    pub fn compose(&self, next: &LineMap) -> LineMap {
        let rows = next
            .original_line
            .iter()
            .map(|&line_in_prev_space| self.translate(line_in_prev_space))
            .collect();
        LineMap::from_rows(rows)
    }
}

/// Folds a sequence of optional per-pass maps (as returned by preprocessor
/// passes — `None` meaning the pass didn't change line layout) into the
/// final preprocessed-to-original map, starting from `base` (identity over
/// the original file).
pub fn compose_all(base_line_count: usize, passes: impl IntoIterator<Item = Option<LineMap>>) -> LineMap {
    let mut current = LineMap::identity(base_line_count);
    for pass_map in passes {
        if let Some(next) = pass_map {
            current = current.compose(&next);
        }
    }
    current
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_translates_line_for_line() {
        let map = LineMap::identity(5);
        for i in 1..=5 {
            assert_eq!(map.translate(i), i);
        }
    }

    #[test]
    fn compose_tracks_heredoc_collapse() {
        // Original file has 5 lines; a heredoc on lines 2-4 collapses to a
        // single preprocessed line 2, so preprocessed has 3 lines total.
        let base = LineMap::identity(5);
        let collapse = LineMap::from_rows(vec![1, 2, 5]);
        let composed = base.compose(&collapse);
        assert_eq!(composed.translate(1), 1);
        assert_eq!(composed.translate(2), 2);
        assert_eq!(composed.translate(3), 5);
    }

    #[test]
    fn compose_is_associative_across_two_passes() {
        let base = LineMap::identity(6);
        let pass_a = LineMap::from_rows(vec![1, 3, 4, 6]);
        let pass_b = LineMap::from_rows(vec![1, 2, 4]);
        let composed = base.compose(&pass_a).compose(&pass_b);
        assert_eq!(composed.translate(1), 1);
        assert_eq!(composed.translate(2), 3);
        assert_eq!(composed.translate(3), 6);
    }
}
