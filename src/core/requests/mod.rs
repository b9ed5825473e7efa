mod service;
mod types;

pub use service::{AgentRequestService, RequestError};
pub use types::{
    AgentRequest, CallbackReport, NewAgentRequest, RequestStatus, ValidationErrors, now_utc,
};

#[cfg(test)]
mod tests;
