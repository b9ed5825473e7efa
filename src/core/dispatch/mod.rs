mod inngest;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::requests::AgentRequest;

pub use inngest::InngestDispatcher;

/// Event name consumed by the execution worker.
pub const AGENT_REQUEST_EVENT: &str = "app/agent.request";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRequestEventData {
    pub request_id: String,
    pub prompt: String,
    pub context: Option<String>,
    /// Workers read the model endpoint from `data.execution_endpoint`; the
    /// older `ollama_base_url` key is not sent.
    pub execution_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    pub name: &'static str,
    /// Idempotency key; the broker may drop repeats with the same id.
    pub id: String,
    pub data: AgentRequestEventData,
}

impl DispatchEvent {
    pub fn agent_request(record: &AgentRequest, execution_endpoint: &str) -> Self {
        Self {
            name: AGENT_REQUEST_EVENT,
            id: record.request_id.clone(),
            data: AgentRequestEventData {
                request_id: record.request_id.clone(),
                prompt: record.prompt.clone(),
                context: record.context.clone(),
                execution_endpoint: execution_endpoint.to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("event broker unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("event broker rejected event with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Signing,
}

/// Fire-and-forget hand-off to the event broker. One attempt per call;
/// redelivery is the broker's job.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn publish(&self, event: &DispatchEvent) -> Result<(), DispatchError>;
}
