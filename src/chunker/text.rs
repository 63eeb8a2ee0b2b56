use super::{Chunker, ChunkerOptions, DocumentChunk, LineIndex, apply_min_size};

/// Fixed-width character windows advancing by `chunk_size - chunk_overlap`.
///
/// Windows keep starting until the start offset passes the end of the text, so
/// the tail of the file may appear in a short trailing chunk.
pub struct CharacterChunker;

impl Chunker for CharacterChunker {
    fn chunk(&self, text: &str, file_path: &str, options: &ChunkerOptions) -> Vec<DocumentChunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let chars: Vec<char> = text.chars().collect();
        let lines = LineIndex::new(&chars);
        let size = options.chunk_size.max(1);
        let step = size.saturating_sub(options.chunk_overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let end = (start + size).min(chars.len());
            chunks.push(DocumentChunk {
                text: chars[start..end].iter().collect(),
                file_path: file_path.to_string(),
                start_line: lines.line_of(start),
                end_line: lines.line_of(end - 1),
                start_char: start as u32,
                end_char: end as u32,
            });
            start += step;
        }

        apply_min_size(chunks, options)
    }
}
