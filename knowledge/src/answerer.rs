//! Grounded answer generation over retrieved chunks.

use std::sync::Arc;

use kbqa_generation::{ChatMessage, GenerationProvider, GenerationRequest, complete};
use tracing::debug;

use crate::chunker::Chunk;
use crate::error::Result;

const GROUNDED_PROMPT: &str =
    "You are a helpful assistant. Answer the query based ONLY on the context below.";

/// Answers a query using only the supplied chunks as context.
pub struct RetrievalAnswerer {
    generator: Arc<dyn GenerationProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl RetrievalAnswerer {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self {
            generator,
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    /// Set the answer's token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model answering the queries.
    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    /// Generate an answer to `query` from `chunks`.
    pub async fn answer(&self, query: &str, chunks: &[Chunk]) -> Result<String> {
        let context = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = GenerationRequest::new(vec![
            ChatMessage::system(GROUNDED_PROMPT),
            ChatMessage::user(format!("Context:\n{context}\n\nQuery: {query}")),
        ])
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature);

        debug!(
            "Answering from {} chunks ({} context chars)",
            chunks.len(),
            context.len()
        );
        let answer = complete(self.generator.as_ref(), request).await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkSpan;
    use kbqa_generation::Role;
    use kbqa_test_support::ScriptedGenerator;
    use pretty_assertions::assert_eq;

    fn chunk(ordinal: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            span: ChunkSpan {
                ordinal,
                start_word: 0,
                end_word: 1,
            },
            tokens: 1,
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_query() {
        let generator = Arc::new(ScriptedGenerator::new(" They process electrical signals. "));
        let answerer = RetrievalAnswerer::new(generator.clone());

        let answer = answerer
            .answer(
                "What do electronic devices do?",
                &[
                    chunk(0, "Electronic devices process electrical signals."),
                    chunk(1, "A circuit carries current."),
                ],
            )
            .await
            .unwrap();

        assert_eq!(answer, "They process electrical signals.");

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("based ONLY on the context"));
        assert_eq!(
            request.messages[1].content,
            "Context:\nElectronic devices process electrical signals.\n\n\
             A circuit carries current.\n\nQuery: What do electronic devices do?"
        );
    }
}
