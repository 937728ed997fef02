//! The bundled agents.

mod create_kb;
mod generator;
mod notifications;
mod retriever;
mod summary;

pub use create_kb::{CreateKbAgent, NO_URL_RESPONSE};
pub use generator::PrimaryGenerator;
pub use notifications::{EmailAgent, NO_RECIPIENT_STATUS, SmsAgent};
pub use retriever::{NOT_FOUND_RESPONSE, RetrieverAgent};
pub use summary::{NO_INPUT_SUMMARY, SummaryAgent};
