use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::agent::{Agent, EMAIL, SMS};
use crate::context::{AgentStatus, PipelineContext};
use crate::error::Result;
use crate::notify::{Notifier, is_failure};

pub const NO_RECIPIENT_STATUS: &str = "failed: no recipient email provided";

fn status_of(delivery: &str) -> AgentStatus {
    if is_failure(delivery) {
        AgentStatus::Failed
    } else {
        AgentStatus::Completed
    }
}

/// Emails the summary (or response) to `to_email`.
pub struct EmailAgent {
    notifier: Arc<dyn Notifier>,
}

impl EmailAgent {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Agent for EmailAgent {
    fn name(&self) -> &str {
        EMAIL
    }

    fn description(&self) -> &str {
        "Emails the result to the requested recipient"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let Some(to_email) = ctx.to_email.clone().filter(|to| !to.trim().is_empty()) else {
            ctx.email_status = Some(NO_RECIPIENT_STATUS.to_string());
            ctx.record(self.name(), AgentStatus::Failed);
            return Ok(ctx);
        };

        let subject = ctx.subject.as_deref().unwrap_or("No Subject");
        let body = ctx
            .body
            .as_deref()
            .or(ctx.summary.as_deref())
            .or(ctx.response.as_deref())
            .unwrap_or("No Body");

        let delivery = self.notifier.send(&to_email, Some(subject), body).await;
        info!("Email to {to_email}: {delivery}");

        let status = status_of(&delivery);
        ctx.email_status = Some(delivery);
        ctx.record(self.name(), status);
        Ok(ctx)
    }
}

/// Texts the summary (or response) to `phone`.
pub struct SmsAgent {
    notifier: Arc<dyn Notifier>,
}

impl SmsAgent {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Agent for SmsAgent {
    fn name(&self) -> &str {
        SMS
    }

    fn description(&self) -> &str {
        "Texts the result to the requested phone number"
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let recipient = ctx.phone.as_deref().unwrap_or("unknown");
        let message = ctx
            .summary
            .as_deref()
            .or(ctx.response.as_deref())
            .unwrap_or_default();

        let delivery = self.notifier.send(recipient, None, message).await;
        info!("SMS to {recipient}: {delivery}");

        let status = status_of(&delivery);
        ctx.sms_status = Some(delivery);
        ctx.record(self.name(), status);
        Ok(ctx)
    }
}
