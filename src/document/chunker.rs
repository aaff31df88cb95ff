//! Sentence-based text chunking with overlap.

use crate::config::ChunkingSettings;

/// Splits text into chunks of whole sentences.
///
/// A chunk grows sentence by sentence until adding the next one would exceed
/// `chunk_size` characters. The next chunk starts with as many trailing
/// sentences of the previous chunk as fit within `chunk_overlap` characters.
#[derive(Debug, Clone, Copy)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(800, 100)
    }
}

impl SentenceChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Chunk `text`. Whitespace is normalized to single spaces first.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let sentences = split_sentences(&normalized);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let mut current: Vec<&str> = Vec::new();
            let mut current_size = 0;

            for sentence in sentences[start..].iter().copied() {
                let addition = sentence.chars().count() + usize::from(!current.is_empty());
                if current_size + addition > self.chunk_size && !current.is_empty() {
                    break;
                }
                current.push(sentence);
                current_size += addition;
            }

            chunks.push(current.join(" "));

            // The last sentence is covered, so further chunks would only repeat overlap
            if start + current.len() >= sentences.len() {
                break;
            }

            if self.chunk_overlap == 0 {
                start += current.len();
                continue;
            }

            let mut overlap_size = 0;
            let mut overlap_sentences = 0;
            for (k, sentence) in current.iter().enumerate().rev() {
                let len = sentence.chars().count() + usize::from(k + 1 < current.len());
                if overlap_size + len > self.chunk_overlap {
                    break;
                }
                overlap_size += len;
                overlap_sentences += 1;
            }

            let next_start = start + current.len() - overlap_sentences;
            start = next_start.max(start + 1);
        }

        chunks
    }
}

/// Split on `.`, `!` or `?` followed by whitespace and an uppercase letter.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut begin = 0;
    for (i, c) in text.char_indices() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let rest = &text[end..];
        let trimmed = rest.trim_start();
        if trimmed.len() == rest.len() {
            continue;
        }
        if trimmed.chars().next().is_some_and(char::is_uppercase) {
            let sentence = text[begin..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            begin = end + (rest.len() - trimmed.len());
        }
    }

    let tail = text[begin..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
