//! Process-level wiring of providers, knowledge base and agents.

use std::sync::Arc;

use kbqa_embeddings::{EmbeddingProvider, OpenAIProvider};
use kbqa_generation::{GenerationProvider, OpenAIChatProvider};
use kbqa_knowledge::{
    Chunker, Cl100kTokenizer, DocumentExtractor, HttpExtractor, IndexStore, KnowledgeBaseManager,
    KnowledgeBaseMetadata, LiveIndex, RelevanceGate, RetrievalAnswerer, Retriever, TokenCounter,
};
use tracing::info;

use crate::config::KbqaConfig;
use crate::context::PipelineContext;
use crate::error::Result;
use crate::notify::{ConsoleNotifier, Notifier};
use crate::orchestrator::Orchestrator;
use crate::registry::{AgentDeps, AgentRegistry};

/// The external collaborators a service is built from.
///
/// Each is constructed once per process and shared by every request.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub tokenizer: Arc<dyn TokenCounter>,
    pub email: Arc<dyn Notifier>,
    pub sms: Arc<dyn Notifier>,
}

impl Providers {
    /// Network-backed providers as described by `config`.
    pub fn from_config(config: &KbqaConfig) -> Result<Self> {
        let mut embedder = OpenAIProvider::new()
            .with_base_url(&config.embedding.base_url)
            .with_model(&config.embedding.model);
        if let Some(key) = &config.embedding.api_key {
            embedder = embedder.with_api_key(key);
        }

        let mut generator =
            OpenAIChatProvider::new(&config.generation.base_url, &config.generation.model)
                .with_default_temperature(config.generation.temperature);
        if let Some(key) = &config.generation.api_key {
            generator = generator.with_api_key(key);
        }

        Ok(Self {
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
            extractor: Arc::new(HttpExtractor::new()),
            tokenizer: Arc::new(Cl100kTokenizer::new()?),
            email: Arc::new(ConsoleNotifier::new("email", config.notification.dev_mode)),
            sms: Arc::new(ConsoleNotifier::new("sms", config.notification.dev_mode)),
        })
    }
}

/// Entry point for running pipelines and maintaining the knowledge base.
pub struct KbqaService {
    orchestrator: Orchestrator,
    knowledge: Arc<KnowledgeBaseManager>,
}

impl KbqaService {
    /// Wire every component. The knowledge base starts empty; call
    /// [`Self::restore`] to load a persisted one.
    pub fn new(config: &KbqaConfig, providers: Providers) -> Result<Self> {
        config.validate()?;
        let knowledge_config = &config.knowledge;
        let live = Arc::new(LiveIndex::new());

        let answerer = RetrievalAnswerer::new(providers.generator.clone())
            .with_max_tokens(knowledge_config.answer_max_tokens)
            .with_temperature(knowledge_config.answer_temperature);
        let retriever = Retriever::new(
            live.clone(),
            providers.embedder.clone(),
            RelevanceGate::new(knowledge_config.relevance_threshold),
            answerer,
        )
        .with_top_k(knowledge_config.top_k);

        let knowledge = Arc::new(KnowledgeBaseManager::new(
            knowledge_config,
            providers.extractor,
            Chunker::new(providers.tokenizer),
            IndexStore::new(knowledge_config.index_dir.clone(), providers.embedder),
            live,
        ));

        let registry = AgentRegistry::standard(AgentDeps {
            retriever: Arc::new(retriever),
            generator: providers.generator,
            generation: config.generation.clone(),
            knowledge: knowledge.clone(),
            email: providers.email,
            sms: providers.sms,
        });
        info!("Registered agents: {}", registry.names().join(", "));

        let orchestrator =
            Orchestrator::new(Arc::new(registry)).with_timeout(config.pipeline.run_timeout());

        Ok(Self {
            orchestrator,
            knowledge,
        })
    }

    /// Load the persisted knowledge base, if any. Returns whether one was found.
    pub async fn restore(&self) -> bool {
        self.knowledge.restore().await.is_some()
    }

    /// Run `agents` in order over `ctx`.
    pub async fn run<S: AsRef<str>>(&self, agents: &[S], ctx: PipelineContext) -> Result<PipelineContext> {
        self.orchestrator.run(agents, ctx).await
    }

    /// Run one agent over `ctx`.
    pub async fn run_agent(&self, name: &str, ctx: PipelineContext) -> Result<PipelineContext> {
        self.orchestrator.run_agent(name, ctx).await
    }

    /// Replace the knowledge base with the document at `url`.
    pub async fn rebuild(&self, url: &str) -> Result<KnowledgeBaseMetadata> {
        Ok(self.knowledge.rebuild(url).await?)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBaseManager> {
        &self.knowledge
    }
}
