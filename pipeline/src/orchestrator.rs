//! Runs named agents in order over one context.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::{AgentStatus, PipelineContext};
use crate::error::{PipelineError, Result};
use crate::registry::AgentRegistry;

/// Executes pipelines against a registry.
///
/// Every name is resolved before anything runs, so a typo fails the request
/// without side effects. Agents then run strictly one after another; an agent
/// that yields to grounded answers is skipped, and recorded as skipped, when
/// the context already holds one.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound the duration of a whole run.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run `names` in order over `ctx`.
    pub async fn run<S: AsRef<str>>(&self, names: &[S], ctx: PipelineContext) -> Result<PipelineContext> {
        let agents = self.registry.resolve(names)?;
        info!("Running pipeline with {} agents", agents.len());

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, execute(agents, ctx))
                .await
                .map_err(|_| PipelineError::Timeout(limit))?,
            None => execute(agents, ctx).await,
        }
    }

    /// Run a single agent, under the same rules as [`Self::run`].
    pub async fn run_agent(&self, name: &str, ctx: PipelineContext) -> Result<PipelineContext> {
        self.run(&[name], ctx).await
    }
}

async fn execute(agents: Vec<Arc<dyn Agent>>, mut ctx: PipelineContext) -> Result<PipelineContext> {
    for agent in agents {
        if agent.yields_to_grounded_answer() && ctx.has_grounded_answer() {
            info!("Skipping {}: grounded answer already present", agent.name());
            ctx.record(agent.name(), AgentStatus::Skipped);
            continue;
        }

        debug!("Running agent {}", agent.name());
        let recorded = ctx.trace.len();
        ctx = agent.run(ctx).await?;
        debug_assert_eq!(
            ctx.trace.len(),
            recorded + 1,
            "agent {} must record exactly one trace entry",
            agent.name()
        );
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{META_SOURCE, SOURCE_VECTORSTORE, TraceEntry};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sets a grounded answer.
    struct Grounded;

    #[async_trait]
    impl Agent for Grounded {
        fn name(&self) -> &str {
            "grounded"
        }

        fn description(&self) -> &str {
            "test"
        }

        async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
            ctx.response = Some("from the knowledge base".to_string());
            ctx.set_meta(META_SOURCE, SOURCE_VECTORSTORE);
            ctx.record(self.name(), AgentStatus::Completed);
            Ok(ctx)
        }
    }

    /// Overwrites the response, counting its runs.
    struct Fallback(Arc<AtomicUsize>);

    #[async_trait]
    impl Agent for Fallback {
        fn name(&self) -> &str {
            "fallback"
        }

        fn description(&self) -> &str {
            "test"
        }

        fn yields_to_grounded_answer(&self) -> bool {
            true
        }

        async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.response = Some("from the model".to_string());
            ctx.record(self.name(), AgentStatus::Completed);
            Ok(ctx)
        }
    }

    struct Slow;

    #[async_trait]
    impl Agent for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "test"
        }

        async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ctx.record(self.name(), AgentStatus::Completed);
            Ok(ctx)
        }
    }

    fn orchestrator(fallback_runs: Arc<AtomicUsize>) -> Orchestrator {
        let mut registry = AgentRegistry::new();
        registry.register("grounded", || Arc::new(Grounded));
        registry.register("fallback", move || Arc::new(Fallback(fallback_runs.clone())));
        registry.register("slow", || Arc::new(Slow));
        Orchestrator::new(Arc::new(registry))
    }

    fn entry(agent: &str, status: AgentStatus) -> TraceEntry {
        TraceEntry {
            agent: agent.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_grounded_answer_preempts_fallback() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ctx = orchestrator(runs.clone())
            .run(&["grounded", "fallback"], PipelineContext::new("q"))
            .await
            .unwrap();

        assert_eq!(ctx.response.as_deref(), Some("from the knowledge base"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            ctx.trace,
            vec![
                entry("grounded", AgentStatus::Completed),
                entry("fallback", AgentStatus::Skipped)
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_runs_without_grounded_answer() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ctx = orchestrator(runs.clone())
            .run(&["fallback"], PipelineContext::new("q"))
            .await
            .unwrap();

        assert_eq!(ctx.response.as_deref(), Some("from the model"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_runs_nothing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let result = orchestrator(runs.clone())
            .run(&["fallback", "nope"], PipelineContext::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::UnknownAgent(name)) if name == "nope"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trace_has_one_entry_per_agent_in_order() {
        let runs = Arc::new(AtomicUsize::new(0));
        let names = ["fallback", "grounded", "fallback", "grounded"];
        let ctx = orchestrator(runs)
            .run(&names, PipelineContext::new("q"))
            .await
            .unwrap();

        let agents: Vec<&str> = ctx.trace.iter().map(|e| e.agent.as_str()).collect();
        assert_eq!(agents, names);
        assert_eq!(ctx.trace[2].status, AgentStatus::Skipped);
    }

    #[tokio::test]
    async fn test_run_agent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ctx = orchestrator(runs)
            .run_agent("grounded", PipelineContext::new("q"))
            .await
            .unwrap();
        assert_eq!(ctx.trace, vec![entry("grounded", AgentStatus::Completed)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let runs = Arc::new(AtomicUsize::new(0));
        let result = orchestrator(runs)
            .with_timeout(Some(Duration::from_secs(5)))
            .run(&["slow"], PipelineContext::new("q"))
            .await;

        assert!(matches!(result, Err(PipelineError::Timeout(limit)) if limit == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_context_untouched() {
        let runs = Arc::new(AtomicUsize::new(0));
        let names: [&str; 0] = [];
        let ctx = orchestrator(runs)
            .run(&names, PipelineContext::new("q"))
            .await
            .unwrap();
        assert_eq!(ctx, PipelineContext::new("q"));
    }
}
