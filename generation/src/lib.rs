//! # Generation
//!
//! Text generation for kbqa. Providers return an asynchronous stream of text
//! fragments which callers concatenate with [`collect_text`].
//!
//! ```rust,ignore
//! use kbqa_generation::{ChatMessage, GenerationRequest, OpenAIChatProvider, complete};
//!
//! let provider = OpenAIChatProvider::groq();
//! let request = GenerationRequest::new(vec![
//!     ChatMessage::system("You are an AI expert."),
//!     ChatMessage::user("Answer this in 50 words: what is a diode?"),
//! ]);
//! let answer = complete(&provider, request).await?;
//! ```

pub mod error;
pub mod openai;
pub mod provider;

pub use error::{GenerationError, Result};
pub use openai::OpenAIChatProvider;
pub use provider::{
    ChatMessage, GenerationProvider, GenerationRequest, Provenance, Role, TextStream,
    collect_text, complete,
};
