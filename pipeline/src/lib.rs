//! # Pipeline
//!
//! Named agents run in sequence over one [`PipelineContext`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         KbqaService                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ["retriever", "main", "summary", "email", "sms"]              │
//! │                          │                                      │
//! │                          ▼                                      │
//! │   ┌───────────────┐  resolve  ┌──────────────┐                  │
//! │   │ Orchestrator  │──────────►│AgentRegistry │                  │
//! │   └───────────────┘           └──────────────┘                  │
//! │          │ ctx by value                                         │
//! │          ▼                                                      │
//! │   retriever ──► main ──► summary ──► email ──► sms              │
//! │       │          ▲                                              │
//! │       │          └─ skipped when source == "vectorstore"        │
//! │       ▼                                                         │
//! │   kbqa-knowledge (LiveIndex, gate, answerer)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kbqa_pipeline::{KbqaConfig, KbqaService, PipelineContext, Providers};
//!
//! let config = KbqaConfig::load(None)?;
//! let service = KbqaService::new(&config, Providers::from_config(&config)?)?;
//! service.restore().await;
//!
//! let ctx = service
//!     .run(&["retriever", "main"], PipelineContext::new("What is an electronic device?"))
//!     .await?;
//! ```

pub mod agent;
pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod service;

pub use agent::Agent;
pub use config::{EmbeddingConfig, GenerationConfig, KbqaConfig, NotificationConfig, PipelineConfig};
pub use context::{AgentStatus, Meta, PipelineContext, TraceEntry};
pub use error::{PipelineError, Result};
pub use notify::{ConsoleNotifier, Notifier};
pub use orchestrator::Orchestrator;
pub use registry::{AgentDeps, AgentFactory, AgentInfo, AgentRegistry};
pub use service::{KbqaService, Providers};
