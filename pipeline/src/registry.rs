//! Name-keyed agent constructors.

use std::collections::BTreeMap;
use std::sync::Arc;

use kbqa_generation::GenerationProvider;
use kbqa_knowledge::{KnowledgeBaseManager, Retriever};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, CREATE_KB, EMAIL, MAIN, RETRIEVER, SMS, SUMMARY};
use crate::agents::{
    CreateKbAgent, EmailAgent, PrimaryGenerator, RetrieverAgent, SmsAgent, SummaryAgent,
};
use crate::config::GenerationConfig;
use crate::error::{PipelineError, Result};
use crate::notify::Notifier;

/// Builds an agent on demand.
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

/// Information about a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
}

/// Shared resources the bundled agents are built from.
#[derive(Clone)]
pub struct AgentDeps {
    pub retriever: Arc<Retriever>,
    pub generator: Arc<dyn GenerationProvider>,
    pub generation: GenerationConfig,
    pub knowledge: Arc<KnowledgeBaseManager>,
    pub email: Arc<dyn Notifier>,
    pub sms: Arc<dyn Notifier>,
}

/// Maps agent names to constructors.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every bundled agent.
    pub fn standard(deps: AgentDeps) -> Self {
        let mut registry = Self::new();

        let retriever = deps.retriever.clone();
        registry.register(RETRIEVER, move || Arc::new(RetrieverAgent::new(retriever.clone())));

        let generator = deps.generator.clone();
        let generation = deps.generation.clone();
        registry.register(MAIN, move || {
            Arc::new(
                PrimaryGenerator::new(generator.clone())
                    .with_max_tokens(generation.max_tokens)
                    .with_temperature(generation.temperature),
            )
        });

        let generator = deps.generator.clone();
        registry.register(SUMMARY, move || Arc::new(SummaryAgent::new(generator.clone())));

        let email = deps.email.clone();
        registry.register(EMAIL, move || Arc::new(EmailAgent::new(email.clone())));

        let sms = deps.sms.clone();
        registry.register(SMS, move || Arc::new(SmsAgent::new(sms.clone())));

        let knowledge = deps.knowledge;
        registry.register(CREATE_KB, move || Arc::new(CreateKbAgent::new(knowledge.clone())));

        registry
    }

    /// Register a constructor under `name`, replacing any previous one.
    ///
    /// The agents it builds should report `name` as their own.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Build the agent registered under `name`.
    pub fn create(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Build every named agent, failing on the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Agent>>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.create(name)
                    .ok_or_else(|| PipelineError::UnknownAgent(name.to_string()))
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> Vec<AgentInfo> {
        self.factories
            .iter()
            .map(|(name, factory)| AgentInfo {
                name: name.clone(),
                description: factory().description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentStatus, PipelineContext};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Copies the query into the response"
        }

        async fn run(&self, mut ctx: PipelineContext) -> crate::error::Result<PipelineContext> {
            ctx.response = Some(ctx.query.clone());
            ctx.record(self.name(), AgentStatus::Completed);
            Ok(ctx)
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = AgentRegistry::new();
        registry.register("echo", || Arc::new(Echo));

        assert!(registry.contains("echo"));
        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.create("echo").unwrap().name(), "echo");
        assert!(registry.create("missing").is_none());
        assert_eq!(
            registry.list(),
            vec![AgentInfo {
                name: "echo".to_string(),
                description: "Copies the query into the response".to_string()
            }]
        );
    }

    #[test]
    fn test_resolve_reports_first_unknown_name() {
        let mut registry = AgentRegistry::new();
        registry.register("echo", || Arc::new(Echo));

        let err = match registry.resolve(&["echo", "translate", "other"]) {
            Ok(_) => panic!("expected an unknown agent"),
            Err(err) => err,
        };
        assert!(matches!(&err, PipelineError::UnknownAgent(name) if name == "translate"));
        assert_eq!(err.to_string(), "Unknown agent 'translate'");
    }
}
