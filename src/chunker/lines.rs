use super::{Chunker, ChunkerOptions, DocumentChunk, apply_min_size};

/// Packs whole lines into windows of at most `chunk_size` characters.
///
/// A single line longer than `chunk_size` becomes its own chunk. Consecutive
/// chunks share trailing lines worth at most `chunk_overlap` characters, and
/// every window starts at least one line after the previous one.
pub struct LineChunker;

struct Line {
    start_char: usize,
    len: usize,
}

impl Chunker for LineChunker {
    fn chunk(&self, text: &str, file_path: &str, options: &ChunkerOptions) -> Vec<DocumentChunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut lines = Vec::new();
        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            let len = line.chars().count();
            lines.push(Line { start_char: offset, len });
            offset += len;
        }
        let chars: Vec<char> = text.chars().collect();

        let mut chunks = Vec::new();
        let mut first = 0usize;
        while first < lines.len() {
            let mut last = first;
            let mut size = lines[first].len;
            while last + 1 < lines.len() && size + lines[last + 1].len <= options.chunk_size {
                last += 1;
                size += lines[last].len;
            }

            let start_char = lines[first].start_char;
            let end_char = lines[last].start_char + lines[last].len;
            chunks.push(DocumentChunk {
                text: chars[start_char..end_char].iter().collect(),
                file_path: file_path.to_string(),
                start_line: first as u32 + 1,
                end_line: last as u32 + 1,
                start_char: start_char as u32,
                end_char: end_char as u32,
            });

            if last + 1 >= lines.len() {
                break;
            }

            let mut next = last + 1;
            let mut overlap = 0usize;
            while next > first + 1 && overlap + lines[next - 1].len <= options.chunk_overlap {
                next -= 1;
                overlap += lines[next].len;
            }
            first = next;
        }

        apply_min_size(chunks, options)
    }
}
