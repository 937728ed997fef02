//! Token counting shared by the chunker and the rebuild statistics.

use tiktoken_rs::CoreBPE;

use crate::error::{KnowledgeError, Result};

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize;
}

/// `cl100k_base` tokenizer, the encoding of the OpenAI embedding models.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// Load the encoding tables.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| KnowledgeError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Counts whitespace-separated words. Handy where exact BPE counts don't matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
