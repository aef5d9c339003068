use super::error::DocumentError;
use super::types::{Chunk, Document};

/// Separators tried from coarsest to finest before falling back to a hard cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Minimum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 250,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidArgument` unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.chunk_size == 0 {
            return Err(DocumentError::InvalidArgument(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocumentError::InvalidArgument(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Recursive separator splitter with character overlap.
///
/// Each chunk ends at the last paragraph break that fits, else the last line
/// break, else the last space, else exactly `chunk_size` characters in. The next
/// chunk starts at the latest word start that still leaves at least
/// `chunk_overlap` characters shared with the previous chunk. Chunks are
/// trimmed and whitespace-only chunks are dropped.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidArgument` for an invalid configuration.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split one page into chunks carrying the page metadata.
    #[must_use]
    pub fn split(&self, page: &Document) -> Vec<Chunk> {
        self.split_text(&page.content)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(text, &page.metadata, i))
            .collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.spans(&chars)
            .into_iter()
            .filter_map(|(start, end)| trim_span(&chars, start, end))
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }

    /// Half-open character ranges of every chunk, in order.
    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let SplitterConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        } = self.config;
        let len = chars.len() - chars.iter().rev().take_while(|c| c.is_whitespace()).count();

        let mut spans = Vec::new();
        let mut start = skip_whitespace(chars, 0, len);
        let mut prev_end = 0;

        while start < len {
            if len - start <= size {
                spans.push((start, len));
                break;
            }

            let limit = start + size;
            let lower = (start + overlap).max(prev_end);
            let end = SEPARATORS
                .iter()
                .find_map(|sep| last_separator(chars, sep, lower, limit))
                .unwrap_or(limit);
            spans.push((start, end));

            start = if overlap == 0 {
                skip_whitespace(chars, end, len)
            } else {
                let latest = end - overlap;
                (start + 1..=latest)
                    .rev()
                    .find(|&q| chars[q - 1].is_whitespace() && !chars[q].is_whitespace())
                    .unwrap_or(latest)
            };
            prev_end = end;
        }

        spans
    }
}

fn skip_whitespace(chars: &[char], mut pos: usize, len: usize) -> usize {
    while pos < len && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

/// Span with surrounding whitespace removed, `None` if nothing is left.
fn trim_span(chars: &[char], start: usize, end: usize) -> Option<(usize, usize)> {
    let start = skip_whitespace(chars, start, end);
    let end = end - chars[start..end].iter().rev().take_while(|c| c.is_whitespace()).count();
    (start < end).then_some((start, end))
}

/// Largest position in `(lower, limit]` where `sep` begins.
fn last_separator(chars: &[char], sep: &str, lower: usize, limit: usize) -> Option<usize> {
    let sep: Vec<char> = sep.chars().collect();
    (lower + 1..=limit)
        .rev()
        .find(|&j| chars.get(j..j + sep.len()) == Some(sep.as_slice()))
}
