use crate::error::IngestError;
use std::ops::Range;

/// How far back from the naive cut the chunker looks for a sentence boundary.
pub const BOUNDARY_LOOKBACK_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub const CORPUS_DEFAULT: ChunkingConfig = ChunkingConfig {
        size: 500,
        overlap: 50,
    };

    pub const PDF_DEFAULT: ChunkingConfig = ChunkingConfig {
        size: 800,
        overlap: 100,
    };

    pub fn new(size: usize, overlap: usize) -> Result<Self, IngestError> {
        if size == 0 || overlap >= size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk size {size} must be greater than overlap {overlap}"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Splits `text` into overlapping, sentence-aware chunks.
///
/// Lengths are counted in `char`s. Every chunk is trimmed and non-empty; the
/// same input always produces the same output.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();

    chunk_spans(&chars, config)
        .into_iter()
        .filter_map(|span| {
            let piece: String = chars[span].iter().collect();
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Untrimmed char ranges behind [`chunk_text`]. Consecutive ranges never leave
/// a gap: each one starts at or before the end of the previous.
pub(crate) fn chunk_spans(chars: &[char], config: &ChunkingConfig) -> Vec<Range<usize>> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let naive_end = start + config.size;
        let end = if naive_end >= len {
            len
        } else {
            snap_to_boundary(chars, start, naive_end, config).unwrap_or(naive_end)
        };

        spans.push(start..end);

        if end >= len {
            break;
        }
        start = end - config.overlap;
    }

    spans
}

/// Right-most position just after a `.`, `!`, `?` or paragraph break inside
/// the look-back window. Positions that would not move the next chunk's start
/// forward are ignored.
fn snap_to_boundary(
    chars: &[char],
    start: usize,
    naive_end: usize,
    config: &ChunkingConfig,
) -> Option<usize> {
    let window_start = naive_end - BOUNDARY_LOOKBACK_CHARS.min(config.size);
    let mut best = None;

    for position in window_start..naive_end {
        let candidate = match chars[position] {
            '.' | '!' | '?' => Some(position + 1),
            '\n' if position + 1 < naive_end && chars[position + 1] == '\n' => Some(position + 2),
            _ => None,
        };

        if let Some(candidate) = candidate {
            if candidate > start + config.overlap {
                best = Some(candidate);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap).expect("valid chunking config")
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 0).is_ok());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("  Principle one. Principle two.  ", &config(500, 50));
        assert_eq!(chunks, vec!["Principle one. Principle two.".to_string()]);
    }

    #[test]
    fn text_just_under_size_has_no_overlap_tail() {
        let text = "x".repeat(480);
        assert_eq!(chunk_text(&text, &config(500, 50)).len(), 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", &config(20, 5)).is_empty());
        assert!(chunk_text("   \n\n  ", &config(20, 5)).is_empty());
    }

    #[test]
    fn first_boundary_snaps_after_sentence_terminator() {
        let chunks = chunk_text("A. B. C.", &config(5, 0));
        assert_eq!(chunks, vec!["A. B.".to_string(), "C.".to_string()]);
    }

    #[test]
    fn paragraph_break_is_a_boundary() {
        let text = "alpha beta\n\ngamma delta epsilon";
        let chunks = chunk_text(text, &config(20, 0));
        assert_eq!(chunks[0], "alpha beta");
        assert_eq!(chunks[1], "gamma delta epsilon");
    }

    #[test]
    fn falls_back_to_mid_word_split_without_boundary() {
        let chunks = chunk_text("abcdefghij", &config(4, 1));
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn spans_cover_input_without_gaps_and_respect_size() {
        let text = "Enterprise architecture aligns strategy! Does it? It does. \
                    Capabilities map to systems.\n\nRoadmaps sequence change over time. "
            .repeat(12);
        let chars: Vec<char> = text.chars().collect();

        for (size, overlap) in [(20, 0), (20, 5), (50, 49), (120, 30), (500, 50)] {
            let cfg = config(size, overlap);
            let spans = chunk_spans(&chars, &cfg);

            assert_eq!(spans.first().map(|span| span.start), Some(0));
            assert_eq!(spans.last().map(|span| span.end), Some(chars.len()));
            for pair in spans.windows(2) {
                assert!(pair[1].start <= pair[0].end, "gap between {:?}", pair);
                assert!(pair[1].start > pair[0].start, "no progress at {:?}", pair);
            }
            for span in &spans {
                assert!(span.len() <= size);
            }
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "One. Two! Three? Four.\n\nFive six seven eight nine ten.".repeat(5);
        let cfg = config(40, 10);
        assert_eq!(chunk_text(&text, &cfg), chunk_text(&text, &cfg));
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "Ünïcödé sëntence. Ånöther önë hère.".repeat(3);
        let chunks = chunk_text(&text, &config(15, 3));
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 15));
    }
}
