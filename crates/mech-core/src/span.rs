use std::fmt;

pub type FileId = u32;

/// Source range of a token or node. `line` and `column` are 1-based and point
/// at the first character; `lo`/`hi` are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32, line: u32, column: u32) -> Span {
        Span {
            file,
            lo,
            hi,
            line,
            column,
        }
    }

    /// Span for nodes that have no source text of their own.
    pub fn synthetic() -> Span {
        Span::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }

    /// Smallest span covering both `self` and `other`; position comes from the earlier one.
    pub fn to(self, other: Span) -> Span {
        if other.is_synthetic() {
            return self;
        }
        if self.is_synthetic() {
            return other;
        }
        let (first, _) = if self.lo <= other.lo {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            file: first.file,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
            line: first.line,
            column: first.column,
        }
    }

    pub fn len(&self) -> u32 {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_earliest_position() {
        let a = Span::new(0, 10, 12, 2, 3);
        let b = Span::new(0, 4, 6, 1, 5);
        let merged = a.to(b);
        assert_eq!(merged.lo, 4);
        assert_eq!(merged.hi, 12);
        assert_eq!(merged.to_string(), "1:5");
    }

    #[test]
    fn synthetic_span_is_neutral() {
        let a = Span::new(0, 10, 12, 2, 3);
        assert_eq!(Span::synthetic().to(a), a);
        assert_eq!(a.to(Span::synthetic()), a);
    }
}
