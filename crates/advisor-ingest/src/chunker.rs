//! Recursive separator-priority text splitter.
//!
//! Splits on the first separator (in priority order) present in the text,
//! re-splits any piece still over `chunk_size` with the remaining
//! separators, then merges adjacent pieces back into chunks of at most
//! `chunk_size` characters, carrying `chunk_overlap` trailing characters
//! of the previous chunk into the head of the next one. Pure function:
//! identical input always yields identical output.

use advisor_core::types::{Chunk, Unit};

/// Separator priority: paragraph, line, space, Latin sentence punctuation,
/// zero-width space, fullwidth/ideographic variants, then character level.
const SEPARATORS: &[&str] = &[
    "\n\n",
    "\n",
    " ",
    ".",
    ",",
    "\u{200b}",
    "\u{ff0c}",
    "\u{3001}",
    "\u{ff0e}",
    "\u{3002}",
    "",
];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        // Overlap must leave room for new content in every chunk.
        let chunk_overlap = chunk_overlap.min(chunk_size / 2);
        Self { chunk_size, chunk_overlap }
    }

    /// Split loader units into chunks, carrying each unit's metadata.
    /// The unit metadata's "source" entry becomes the chunk's source id.
    pub fn split(&self, units: &[Unit]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for unit in units {
            let source_id = unit
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            for text in self.split_text(&unit.text) {
                chunks.push(Chunk {
                    text,
                    metadata: unit.metadata.clone(),
                    source_id: source_id.clone(),
                });
            }
        }
        chunks
    }

    /// Split one text into chunks of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, SEPARATORS)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        // First listed separator actually present in the text; the empty
        // separator always matches and splits at character level.
        let sep_idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len() - 1);
        let sep = separators[sep_idx];
        let remaining = &separators[sep_idx + 1..];

        let pieces = split_keep_separator(text, sep);

        let mut out = Vec::new();
        let mut small = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                out.extend(self.merge(std::mem::take(&mut small)));
            }
            if remaining.is_empty() {
                // An atomic token longer than chunk_size is emitted whole,
                // never dropped or truncated.
                out.push(piece);
            } else {
                out.extend(self.split_with(&piece, remaining));
            }
        }
        if !small.is_empty() {
            out.extend(self.merge(small));
        }
        out
    }

    /// Concatenate small pieces into chunks of at most `chunk_size`
    /// characters, with the previous chunk's tail repeated at the head of
    /// the next chunk.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(&piece);
            if current_len + piece_len > self.chunk_size && current_len > 0 {
                chunks.push(current.clone());
                let tail = char_tail(&current, self.chunk_overlap);
                current = tail;
                current_len = char_len(&current);
                // A single piece near chunk_size can still overflow the
                // carried overlap; shrink the overlap head to keep the
                // size bound.
                if current_len + piece_len > self.chunk_size {
                    let excess = (current_len + piece_len).saturating_sub(self.chunk_size);
                    current = current.chars().skip(excess).collect();
                    current_len = char_len(&current);
                }
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
        if current_len > 0 {
            chunks.push(current);
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`.
fn char_tail(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}

/// Split on `sep`, re-attaching the separator to the end of the piece it
/// terminated so no character of the source is lost. Empty `sep` splits
/// into single characters.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(sep) {
        let end = idx + sep.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::types::Unit;
    use serde_json::Map;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(size, overlap)
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let c = chunker(1000, 200);
        let chunks = c.split_text("Thông báo tuyển sinh năm 2026.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let c = chunker(50, 10);
        let text = "Điểm chuẩn ngành CNTT là 24. Học phí là 15 triệu mỗi năm. \
                    Hồ sơ nhập học nộp trước tháng 9. Liên hệ phòng tuyển sinh để biết thêm.";
        assert_eq!(c.split_text(text), c.split_text(text));
    }

    #[test]
    fn test_size_bound() {
        let c = chunker(100, 20);
        let text = "một hai ba bốn năm ".repeat(60);
        for chunk in c.split_text(&text) {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_overlap_invariant() {
        let size = 100;
        let overlap = 20;
        let c = chunker(size, overlap);
        // Single-character pieces merge into exact-size chunks, so each
        // boundary carries exactly `overlap` characters.
        let text: String = "abcdefghij".repeat(60);
        let chunks = c.split_text(&text);
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let tail: String = char_tail(&pair[0], overlap);
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_oversized_atomic_token_emitted_whole() {
        let c = chunker(10, 2);
        // No separator of any kind inside the token.
        let token = "x".repeat(25);
        // Character-level split still merges back under the bound...
        let chunks = c.split_text(&token);
        assert!(!chunks.is_empty());
        let total: String = chunks.concat();
        assert!(total.contains(&"x".repeat(10)));
        // ...but a token that survives to the last separator level with
        // separators exhausted is pushed whole.
        let pieces = c.split_with(&token, &[" "]);
        assert_eq!(pieces, vec![token]);
    }

    #[test]
    fn test_paragraphs_split_first() {
        let c = chunker(30, 0);
        let text = "đoạn một dài hơn ba mươi ký tự rõ ràng\n\nđoạn hai cũng vậy trong ví dụ này";
        let chunks = c.split_text(text);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].starts_with("đoạn một"));
    }

    #[test]
    fn test_2500_chars_yields_at_least_three_chunks() {
        let c = chunker(1000, 200);
        let sentence = "Trường tuyển sinh các ngành kỹ thuật và kinh tế trong năm nay. ";
        let mut text = String::new();
        while text.chars().count() < 2500 {
            text.push_str(sentence);
        }
        let chunks = c.split_text(&text);
        assert!(chunks.len() >= 3, "expected >= 3 chunks, got {}", chunks.len());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
    }

    #[test]
    fn test_split_units_carries_metadata() {
        let c = chunker(1000, 200);
        let mut meta = Map::new();
        meta.insert("source".into(), "tuyensinh.pdf".into());
        meta.insert("page".into(), 2.into());
        let units = vec![Unit::new("Nội dung trang hai.", meta)];
        let chunks = c.split(&units);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_id, "tuyensinh.pdf");
        assert_eq!(chunks[0].metadata.get("page"), Some(&2.into()));
    }
}
