use std::sync::Arc;
use tracing::{error, info, warn};

use super::types::{
    AgentRequest, NewAgentRequest, RequestStatus, ValidationErrors, can_transition, now_utc,
};
use crate::core::dispatch::{DispatchEvent, Dispatcher};
use crate::core::store::{RequestStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid payload: {0}")]
    Validation(ValidationErrors),
    #[error("unsupported status '{0}'")]
    UnsupportedStatus(String),
    #[error("request '{0}' not found")]
    NotFound(String),
    #[error("failed to dispatch request '{request_id}': {reason}")]
    DispatchFailed { request_id: String, reason: String },
    #[error("request '{request_id}' is already {status}")]
    TerminalConflict {
        request_id: String,
        status: RequestStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for RequestError {
    fn from(errors: ValidationErrors) -> Self {
        RequestError::Validation(errors)
    }
}

/// Owns the request state machine: creation and dispatch, status reads, and
/// completion reported by the execution worker.
pub struct AgentRequestService {
    store: Arc<dyn RequestStore>,
    dispatcher: Arc<dyn Dispatcher>,
    execution_endpoint: String,
    strict_transitions: bool,
}

impl AgentRequestService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        dispatcher: Arc<dyn Dispatcher>,
        execution_endpoint: impl Into<String>,
        strict_transitions: bool,
    ) -> Self {
        Self {
            store,
            dispatcher,
            execution_endpoint: execution_endpoint.into(),
            strict_transitions,
        }
    }

    /// Persist a queued record, then publish it for execution.
    ///
    /// A failed publish moves the record to `error` with the failure text
    /// as its result and returns [`RequestError::DispatchFailed`], which
    /// still carries the id.
    pub async fn create(&self, request: NewAgentRequest) -> Result<AgentRequest, RequestError> {
        let record = AgentRequest::queued(uuid::Uuid::new_v4().to_string(), request, now_utc());
        self.store.insert(&record).await?;
        info!("Queued agent request {}", record.request_id);

        let event = DispatchEvent::agent_request(&record, &self.execution_endpoint);
        let Err(err) = self.dispatcher.publish(&event).await else {
            return Ok(record);
        };

        let reason = err.to_string();
        error!(
            "Failed to enqueue agent request {}: {}",
            record.request_id, reason
        );
        // Only a still-queued record is marked; a worker that received the
        // event anyway may already have reported.
        match self
            .store
            .update_status_from(
                &record.request_id,
                RequestStatus::Queued,
                RequestStatus::Error,
                Some(&reason),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "Request {} left queued state before dispatch failure was recorded",
                record.request_id
            ),
            Err(store_err) => error!(
                "Could not record dispatch failure for {}: {}",
                record.request_id, store_err
            ),
        }

        Err(RequestError::DispatchFailed {
            request_id: record.request_id,
            reason,
        })
    }

    pub async fn query(&self, request_id: &str) -> Result<AgentRequest, RequestError> {
        self.store
            .get(request_id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))
    }

    /// Apply a worker-reported outcome. `status` is matched
    /// case-insensitively and must be `completed` or `failed`.
    pub async fn complete_from_callback(
        &self,
        request_id: &str,
        status: &str,
        result: Option<&str>,
    ) -> Result<RequestStatus, RequestError> {
        let Some(status) = RequestStatus::from_callback(status) else {
            return Err(RequestError::UnsupportedStatus(status.trim().to_string()));
        };

        let updated = if self.strict_transitions {
            self.store
                .update_status_from(request_id, RequestStatus::Queued, status, result)
                .await?
        } else {
            self.store.update_status(request_id, status, result).await?
        };

        if !updated {
            return Err(self.explain_rejected_update(request_id, status).await?);
        }

        info!("Request {} reported {}", request_id, status);
        Ok(status)
    }

    async fn explain_rejected_update(
        &self,
        request_id: &str,
        to: RequestStatus,
    ) -> Result<RequestError, RequestError> {
        let current = if self.strict_transitions {
            self.store.get(request_id).await?
        } else {
            None
        };

        match current {
            Some(current)
                if current.status.is_terminal() && !can_transition(current.status, to, true) =>
            {
                warn!(
                    "Rejected {} callback for request {} already {}",
                    to, request_id, current.status
                );
                Ok(RequestError::TerminalConflict {
                    request_id: request_id.to_string(),
                    status: current.status,
                })
            }
            _ => {
                warn!("Callback for unknown request {}", request_id);
                Ok(RequestError::NotFound(request_id.to_string()))
            }
        }
    }
}
