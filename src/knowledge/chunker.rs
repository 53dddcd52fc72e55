//! Character-budget chunking with bounded overlap.
//!
//! Splits on paragraph boundaries first, falls back to sentence boundaries
//! for oversized paragraphs, and merges tiny trailing chunks so no chunk is
//! too small to embed meaningfully.

/// Minimum chunk length; smaller chunks get merged into a neighbor.
const MIN_CHUNK_CHARS: usize = 20;

pub struct TextChunker {
    chunk_chars: usize,
    overlap_chars: usize,
}

impl TextChunker {
    pub fn new(chunk_chars: usize, overlap_chars: usize) -> Self {
        Self {
            chunk_chars: chunk_chars.max(MIN_CHUNK_CHARS),
            overlap_chars: overlap_chars.min(chunk_chars / 2),
        }
    }

    /// Split text into ordered chunks. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for para in text.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            if current.len() + para.len() > self.chunk_chars && !current.is_empty() {
                self.push_with_overlap(&mut chunks, &mut current);
            }

            if para.len() > self.chunk_chars {
                // Flush whatever accumulated, then split the big paragraph.
                if !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }
                current.clear();
                chunks.extend(self.split_long_paragraph(para));
            } else {
                current.push_str(para);
                current.push_str("\n\n");
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        merge_tiny_chunks(&mut chunks);
        chunks
    }

    fn push_with_overlap(&self, chunks: &mut Vec<String>, current: &mut String) {
        chunks.push(current.trim().to_string());
        if current.len() > self.overlap_chars {
            let tail_start = current.len() - self.overlap_chars;
            let tail_start = ceil_char_boundary(current, tail_start);
            *current = current[tail_start..].to_string();
        } else {
            current.clear();
        }
    }

    fn split_long_paragraph(&self, para: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < para.len() {
            let end = ceil_char_boundary(para, (start + self.chunk_chars).min(para.len()));

            // Prefer a sentence boundary in the last fifth of the window.
            let break_at = if end < para.len() {
                let search_start = ceil_char_boundary(para, start + self.chunk_chars * 4 / 5);
                para[search_start..end]
                    .rfind(". ")
                    .map(|pos| search_start + pos + 2)
                    .unwrap_or(end)
            } else {
                end
            };

            chunks.push(para[start..break_at].trim().to_string());

            if break_at >= para.len() {
                break;
            }
            start = if break_at > self.overlap_chars {
                ceil_char_boundary(para, break_at - self.overlap_chars)
            } else {
                break_at
            };
        }

        chunks
    }
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn merge_tiny_chunks(chunks: &mut Vec<String>) {
    let mut i = 0;
    while i < chunks.len() {
        if chunks[i].len() < MIN_CHUNK_CHARS && i + 1 < chunks.len() {
            let next = chunks.remove(i + 1);
            let merged = format!("{}\n\n{}", chunks[i], next);
            chunks[i] = merged;
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(500, 50);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = TextChunker::new(500, 50);
        let chunks = chunker.chunk("Refunds are available within 30 days of purchase.");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("30 days"));
    }

    #[test]
    fn paragraphs_group_within_budget() {
        let chunker = TextChunker::new(120, 20);
        let text = "First paragraph about refunds and returns policy.\n\n\
                    Second paragraph about shipping times and carriers.\n\n\
                    Third paragraph about warranty coverage and claims.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2, "expected a split, got {}", chunks.len());
    }

    #[test]
    fn long_paragraph_splits_at_sentence_boundaries() {
        let chunker = TextChunker::new(200, 30);
        let para = "The refund window is 30 days. ".repeat(30);
        let chunks = chunker.chunk(&para);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.len() <= 260,
                "chunk too large: {} chars",
                chunk.len()
            );
        }
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let chunker = TextChunker::new(100, 30);
        let para = "All sales of clearance items are final and cannot be returned. ".repeat(10);
        let chunks = chunker.chunk(&para);
        assert!(chunks.len() > 1);

        // The tail of chunk 0 should reappear at the head of chunk 1.
        let tail: String = chunks[0].chars().rev().take(10).collect::<String>()
            .chars().rev().collect();
        assert!(chunks[1].contains(tail.trim()), "no overlap found");
    }

    #[test]
    fn tiny_chunks_get_merged() {
        let chunker = TextChunker::new(80, 10);
        let text = "Hi.\n\nA much longer paragraph with enough content to stand on its own here.";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(chunk.len() >= MIN_CHUNK_CHARS, "tiny chunk survived: '{chunk}'");
        }
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let chunker = TextChunker::new(50, 10);
        let text = "환불은 구매 후 30일 이내에 가능합니다. ".repeat(20);
        let chunks = chunker.chunk(&text);
        assert!(!chunks.is_empty());
    }
}
