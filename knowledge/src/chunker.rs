//! Token-bounded chunking with word overlap.
//!
//! Text is split on whitespace and packed into chunks of at most
//! `max_tokens` tokens. Consecutive chunks share up to `overlap` words so an
//! answer straddling a boundary is still retrievable from one chunk.
//!
//! A chunk is tracked as a word range `[start, end)` over the input, which
//! makes the overlap exact: reassembling the chunks while skipping the
//! shared words reproduces the word sequence of the source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KnowledgeError, Result};
use crate::tokenizer::TokenCounter;

/// Where a chunk sits in the source, in whitespace-separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    /// Position of the chunk in the chunk sequence.
    pub ordinal: usize,

    /// First word of the chunk.
    pub start_word: usize,

    /// One past the last word of the chunk.
    pub end_word: usize,
}

impl ChunkSpan {
    /// Number of words in the chunk.
    pub fn len(&self) -> usize {
        self.end_word - self.start_word
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A contiguous run of words from the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The words of the chunk joined by single spaces.
    pub text: String,

    /// Position in the source.
    pub span: ChunkSpan,

    /// Token count of `text`.
    pub tokens: usize,
}

/// Splits documents into token-bounded, overlapping chunks.
#[derive(Clone)]
pub struct Chunker {
    counter: Arc<dyn TokenCounter>,
}

impl Chunker {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Count the tokens of `text` with this chunker's tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Split `text` into chunks of at most `max_tokens` tokens.
    ///
    /// Each chunk after the first starts with up to `overlap` words from the
    /// end of its predecessor. A single word longer than `max_tokens` becomes
    /// a chunk of its own. `overlap` is clamped below `max_tokens` so every
    /// chunk makes progress.
    pub fn split(&self, text: &str, max_tokens: usize, overlap: usize) -> Result<Vec<Chunk>> {
        if max_tokens == 0 {
            return Err(KnowledgeError::Config("max_tokens must be positive".to_string()));
        }
        let overlap = if overlap >= max_tokens {
            warn!(
                "Chunk overlap {} is not below max_tokens {}, clamping to {}",
                overlap,
                max_tokens,
                max_tokens - 1
            );
            max_tokens - 1
        } else {
            overlap
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        let window = WindowTokens::new(self.counter.as_ref(), &words);
        let mut chunks = Vec::new();

        // Open chunk is words[start..end]; words[start..fresh] were carried over.
        let mut start = 0;
        let mut fresh = 0;

        for end in 1..=words.len() {
            let mut tokens = window.measure(start, end);

            if tokens > max_tokens && end - 1 > fresh {
                self.close(&mut chunks, &words, start, end - 1);
                start = carry_start(start, end - 1, overlap);
                fresh = end - 1;
                tokens = window.measure(start, end);
            }

            while tokens > max_tokens && start < fresh {
                start += 1;
                tokens = window.measure(start, end);
            }

            if tokens >= max_tokens {
                self.close(&mut chunks, &words, start, end);
                start = carry_start(start, end, overlap);
                fresh = end;
            }
        }

        if fresh < words.len() {
            self.close(&mut chunks, &words, start, words.len());
        }

        debug!(
            "Split {} words into {} chunks (max {} tokens, overlap {})",
            words.len(),
            chunks.len(),
            max_tokens,
            overlap
        );
        Ok(chunks)
    }

    fn close(&self, chunks: &mut Vec<Chunk>, words: &[&str], start: usize, end: usize) {
        let text = words[start..end].join(" ");
        let tokens = self.counter.count(&text);
        chunks.push(Chunk {
            text,
            span: ChunkSpan {
                ordinal: chunks.len(),
                start_word: start,
                end_word: end,
            },
            tokens,
        });
    }
}

/// Token counts of word windows, derived from per-word counts.
///
/// A window is its first word counted bare plus every later word counted
/// with its leading space. This matches counting the space-joined text for
/// tokenizers whose pre-tokenization never merges across a space, which
/// holds for `cl100k_base`.
struct WindowTokens {
    bare: Vec<usize>,
    /// `spaced[i]` is the total of `" " + word` counts for words `0..i`.
    spaced: Vec<usize>,
}

impl WindowTokens {
    fn new(counter: &dyn TokenCounter, words: &[&str]) -> Self {
        let bare = words.iter().map(|word| counter.count(word)).collect();
        let mut spaced = Vec::with_capacity(words.len() + 1);
        let mut total = 0;
        spaced.push(total);
        for word in words {
            total += counter.count(&format!(" {word}"));
            spaced.push(total);
        }
        Self { bare, spaced }
    }

    /// Tokens of `words[start..end]` joined by single spaces.
    fn measure(&self, start: usize, end: usize) -> usize {
        if start >= end {
            return 0;
        }
        self.bare[start] + self.spaced[end] - self.spaced[start + 1]
    }
}

/// First word of the chunk following `[start, end)`.
///
/// Never carries the whole closed chunk, so the next one always gains a word.
fn carry_start(start: usize, end: usize, overlap: usize) -> usize {
    end - overlap.min(end - start - 1)
}

/// Rebuild the word sequence of the source from its chunks.
pub fn reassemble(chunks: &[Chunk]) -> Vec<String> {
    let mut words = Vec::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.span.start_word);
        words.extend(chunk.text.split_whitespace().skip(skip).map(str::to_string));
        covered = covered.max(chunk.span.end_word);
    }
    words
}
