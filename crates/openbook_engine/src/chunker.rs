use openbook_domain::{Chunk, InvalidChunking, SourceDocument};

/// Splits documents into overlapping fixed-size character windows.
///
/// Window starts advance by the fixed stride `chunk_size - chunk_overlap`,
/// so for any two consecutive chunks of one document the offset delta is
/// exactly the stride (the final chunk may be shorter than `chunk_size`).
/// Each window's end prefers a natural boundary found in the overlap
/// region at the window tail, in order: paragraph break, sentence end,
/// whitespace. Pulling the end back never crosses the next window start,
/// so every character of the source lands in at least one chunk.
///
/// Splitting is deterministic: the same text and parameters always yield
/// the same chunk sequence and offsets.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, InvalidChunking> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(InvalidChunking { chunk_size, chunk_overlap });
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Split one document into chunks. Offsets are character indices.
    pub fn split(&self, document: &SourceDocument) -> Vec<Chunk> {
        let chars: Vec<char> = document.raw_text.chars().collect();
        let mut chunks = Vec::new();
        let mut offset = 0;

        while offset < chars.len() {
            let hard_end = (offset + self.chunk_size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                // The cut must stay past the next window start or the
                // tail of this window would be lost.
                natural_cut(&chars, offset + self.stride(), hard_end)
            };

            let text: String = chars[offset..end].iter().collect();
            chunks.push(Chunk::new(text, document.source_id.clone(), offset));

            if hard_end == chars.len() {
                break;
            }
            offset += self.stride();
        }

        chunks
    }

    /// Split every document, preserving document order.
    pub fn split_all(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

/// Pick the cut position for a window ending at `hard_end`, scanning
/// backwards no further than `floor` (exclusive). Returns `hard_end`
/// when no natural boundary exists in that range.
fn natural_cut(chars: &[char], floor: usize, hard_end: usize) -> usize {
    // Paragraph break: cut right after a blank line.
    for end in (floor + 1..=hard_end).rev() {
        if end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n' {
            return end;
        }
    }
    // Sentence end: cut after terminal punctuation followed by whitespace.
    for end in (floor + 1..=hard_end).rev() {
        if end >= 2
            && matches!(chars[end - 2], '.' | '!' | '?')
            && chars[end - 1].is_whitespace()
        {
            return end;
        }
    }
    // Word boundary: cut after whitespace so no word is severed.
    for end in (floor + 1..=hard_end).rev() {
        if chars[end - 1].is_whitespace() {
            return end;
        }
    }
    hard_end
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument::new("manual.txt", text)
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let actual = Chunker::new(100, 100);
        let expected: Result<Chunker, InvalidChunking> =
            Err(InvalidChunking { chunk_size: 100, chunk_overlap: 100 });
        assert_eq!(actual.err(), expected.err());
    }

    #[test]
    fn short_document_is_a_single_whole_chunk() {
        let fixture = doc("Reset the device by holding power for 10 seconds.");
        let chunker = Chunker::new(1000, 200).unwrap();

        let actual = chunker.split(&fixture);

        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].text, fixture.raw_text);
        assert_eq!(actual[0].offset, 0);
    }

    #[test]
    fn splitting_is_deterministic() {
        let fixture = doc(&"All work and no play makes Jack a dull boy. ".repeat(50));
        let chunker = Chunker::new(120, 30).unwrap();

        let actual = chunker.split(&fixture);
        let expected = chunker.split(&fixture);

        assert_eq!(actual, expected);
    }

    #[test]
    fn offsets_advance_by_the_fixed_stride() {
        let fixture = doc(&"word ".repeat(200));
        let chunker = Chunker::new(100, 20).unwrap();

        let chunks = chunker.split(&fixture);

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let actual = pair[1].offset - pair[0].offset;
            let expected = 80;
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn boundary_free_text_overlaps_by_exactly_chunk_overlap() {
        // No whitespace anywhere, so every cut is a hard cut and
        // consecutive chunks share exactly `chunk_overlap` characters.
        let fixture = doc(&"x".repeat(25));
        let chunker = Chunker::new(10, 4).unwrap();

        let chunks = chunker.split(&fixture);

        let actual: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        let expected = vec![0, 6, 12, 18];
        assert_eq!(actual, expected);

        for pair in chunks.windows(2) {
            let prev_end = pair[0].offset + pair[0].text.chars().count();
            let shared = prev_end - pair[1].offset;
            assert_eq!(shared, 4);
        }
    }

    #[test]
    fn cuts_prefer_word_boundaries_over_severing_words() {
        let fixture = doc(&"marmalade ".repeat(40));
        let chunker = Chunker::new(64, 16).unwrap();

        let chunks = chunker.split(&fixture);

        for chunk in &chunks[..chunks.len() - 1] {
            let last = chunk.text.chars().last().unwrap();
            assert!(last.is_whitespace(), "chunk ends mid-word: {:?}", chunk.text);
        }
    }

    #[test]
    fn cuts_prefer_paragraph_breaks_when_present() {
        let paragraph = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let fixture = doc(&format!("{paragraph}\n\n{paragraph}\n\n{paragraph}"));
        let chunker = Chunker::new(64, 16).unwrap();

        let chunks = chunker.split(&fixture);

        // The first window's tail contains the blank line, so the cut
        // lands right after it.
        assert!(chunks[0].text.ends_with("\n\n"));
    }

    #[test]
    fn every_character_lands_in_some_chunk() {
        let fixture = doc(&"some manual text with words and spaces. ".repeat(30));
        let chunker = Chunker::new(100, 40).unwrap();

        let chunks = chunker.split(&fixture);
        let total: usize = fixture.raw_text.chars().count();

        let mut covered = vec![false; total];
        for chunk in &chunks {
            let len = chunk.text.chars().count();
            for flag in covered.iter_mut().skip(chunk.offset).take(len) {
                *flag = true;
            }
        }
        let actual = covered.iter().all(|&c| c);
        let expected = true;
        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let fixture = doc("");
        let chunker = Chunker::new(10, 2).unwrap();

        let actual = chunker.split(&fixture).len();
        let expected = 0;
        assert_eq!(actual, expected);
    }
}
