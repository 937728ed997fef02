//! The contract every pipeline step implements.

use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::error::Result;

/// Registry name of the retriever.
pub const RETRIEVER: &str = "retriever";
/// Registry name of the primary (fallback) generator.
pub const MAIN: &str = "main";
pub const SUMMARY: &str = "summary";
pub const EMAIL: &str = "email";
pub const SMS: &str = "sms";
/// Registry name of the knowledge-base builder.
pub const CREATE_KB: &str = "create_kb";

/// One step of a pipeline.
///
/// An agent takes the context by value, updates it and hands it back with
/// exactly one trace entry of its own appended. Failures it can recover from
/// are recorded in the context; only errors that should end the whole run
/// are returned.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name recorded in the trace.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether this agent stands down when the context already holds a
    /// grounded answer.
    fn yields_to_grounded_answer(&self) -> bool {
        false
    }

    async fn run(&self, ctx: PipelineContext) -> Result<PipelineContext>;
}
