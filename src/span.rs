/// A byte range inside the rendered text of one statement.
///
/// Build errors have no source file to point into; instead every
/// diagnostic carries the text of the offending operation and the spans
/// of its operands within that text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Span covering `text` when appended at byte offset `at`.
    pub fn of(at: usize, text: &str) -> Self {
        Self {
            start: at as u32,
            end: (at + text.len()) as u32,
        }
    }

    pub fn range(self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_covers_text() {
        let s = Span::of(4, "cross");
        assert_eq!(s, Span::new(4, 9));
        assert_eq!(s.range(), 4..9);
        assert_eq!(Span::of(0, ""), Span::dummy());
    }
}
