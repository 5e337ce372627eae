//! Mapping between byte offsets and the row/column pairs reported in diagnostics.
use core::fmt;

/// Where a token or node came from in the source text.
///
/// Both the row and column are zero-indexed. Nodes that are built by hand instead of
/// parsed carry [`SourceLocation::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub row: i32,
    pub col: i32,
}

impl SourceLocation {
    pub const INVALID: Self = Self { row: -1, col: -1 };

    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.col >= 0
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}", self.row, self.col)
        } else {
            write!(f, "?:?")
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("byte offset {0} does not fit in a source location")]
pub struct LocationOverflow(pub usize);

/// Start offsets of every line in a source, so that byte offsets can be turned into
/// [`SourceLocation`]s (and back) without rescanning.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Columns count bytes from the start of the line.
    pub fn location(&self, offset: usize) -> Result<SourceLocation, LocationOverflow> {
        // line_starts[0] == 0, so there is always at least one start <= offset
        let row = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let col = offset - self.line_starts[row];

        Ok(SourceLocation {
            row: i32::try_from(row).map_err(|_| LocationOverflow(offset))?,
            col: i32::try_from(col).map_err(|_| LocationOverflow(offset))?,
        })
    }

    /// The byte offset a location points at, if it lies within the source.
    pub fn offset(&self, location: SourceLocation) -> Option<usize> {
        let row = usize::try_from(location.row).ok()?;
        let col = usize::try_from(location.col).ok()?;
        let start = *self.line_starts.get(row)?;
        let end = self.line_starts.get(row + 1).copied().unwrap_or(self.len);
        let offset = start.checked_add(col)?;
        (offset <= end).then_some(offset)
    }
}
