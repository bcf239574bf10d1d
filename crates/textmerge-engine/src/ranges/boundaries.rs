/// Punctuation that ends a word when widening a selection
pub const DEFAULT_BOUNDARY_PUNCTUATION: &str = ".,;:!?\"'()[]{}<>";

/// Fixed character set used to snap selections to whole words.
///
/// ASCII whitespace is always a boundary; the punctuation part is configurable.
/// No Unicode word segmentation is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBoundaries {
    punctuation: Vec<char>,
}

impl Default for WordBoundaries {
    fn default() -> Self {
        Self::from_punctuation(DEFAULT_BOUNDARY_PUNCTUATION)
    }
}

impl WordBoundaries {
    pub fn from_punctuation(punctuation: &str) -> Self {
        let mut punctuation: Vec<char> = punctuation.chars().collect();
        punctuation.sort_unstable();
        punctuation.dedup();
        Self { punctuation }
    }

    pub fn is_boundary(&self, c: char) -> bool {
        c.is_ascii_whitespace() || self.punctuation.binary_search(&c).is_ok()
    }

    /// Widen `start..end` outwards until each end sits next to a boundary character
    /// or the edge of `text`. Both offsets must be char boundaries of `text`.
    pub fn expand(&self, text: &str, start: usize, end: usize) -> (usize, usize) {
        let start = text[..start]
            .char_indices()
            .rev()
            .take_while(|&(_, c)| !self.is_boundary(c))
            .last()
            .map_or(start, |(index, _)| index);

        let end = text[end..]
            .char_indices()
            .take_while(|&(_, c)| !self.is_boundary(c))
            .last()
            .map_or(end, |(index, c)| end + index + c.len_utf8());

        (start, end)
    }
}
