//! Fixed-window document chunking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters per chunk when the caller does not override it.
pub const DEFAULT_CHUNK_CHARS: usize = 1500;

/// Positional slice of a document's extracted text, the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Generated record identifier.
    pub id: Uuid,
    /// Name of the uploaded file the chunk came from.
    pub filename: String,
    /// Chunk body text submitted to the embedding model.
    pub text: String,
}

impl DocumentChunk {
    /// Tags each window with the source filename and a fresh identifier.
    pub fn from_windows(filename: &str, windows: Vec<String>) -> Vec<Self> {
        windows
            .into_iter()
            .map(|text| Self {
                id: Uuid::new_v4(),
                filename: filename.to_string(),
                text,
            })
            .collect()
    }
}

/// Splits `text` into consecutive, non-overlapping windows of `window` chars.
///
/// The final window may be shorter. Windows that are blank after trimming are
/// dropped; nothing else is filtered, merged or deduplicated. A `window` of
/// zero is treated as one.
pub fn chunk_text(text: &str, window: usize) -> Vec<String> {
    partition(text, window)
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn partition(text: &str, window: usize) -> Vec<&str> {
    let window = window.max(1);
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;
    for (offset, _) in text.char_indices() {
        if count == window {
            pieces.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_3001_chars_into_three_windows() {
        let text = "a".repeat(3001);
        let chunks = chunk_text(&text, DEFAULT_CHUNK_CHARS);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(sizes, vec![1500, 1500, 1]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\t ", 3).is_empty());
    }

    #[test]
    fn blank_windows_are_dropped_and_reconstruction_holds() {
        let text = "abc      def ";
        let windows = partition(text, 3);
        assert_eq!(windows, vec!["abc", "   ", "   ", "def", " "]);
        assert_eq!(windows.concat(), text);

        let chunks = chunk_text(text, 3);
        assert_eq!(chunks, vec!["abc".to_string(), "def".to_string()]);
        let blank_windows = windows.iter().filter(|w| w.trim().is_empty()).count();
        assert_eq!(chunks.len() + blank_windows, windows.len());
    }

    #[test]
    fn windows_count_chars_not_bytes() {
        let text = "åäöåäö";
        let chunks = chunk_text(text, 4);
        assert_eq!(chunks, vec!["åäöå".to_string(), "äö".to_string()]);
    }

    #[test]
    fn zero_window_degrades_to_single_chars() {
        assert_eq!(chunk_text("ab", 0), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn chunk_records_keep_filename_and_unique_ids() {
        let chunks = DocumentChunk::from_windows("notes.txt", chunk_text(&"x".repeat(25), 10));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.filename == "notes.txt"));
        assert_ne!(chunks[0].id, chunks[1].id);
    }
}
