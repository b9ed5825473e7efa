use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Completed,
    Failed,
    Error,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Error => "error",
        }
    }

    /// Parse a status exactly as it is persisted.
    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(RequestStatus::Queued),
            "completed" => Some(RequestStatus::Completed),
            "failed" => Some(RequestStatus::Failed),
            "error" => Some(RequestStatus::Error),
            _ => None,
        }
    }

    /// Normalize a status reported by the execution worker. Only `completed`
    /// and `failed` may be reported, in any letter case.
    pub fn from_callback(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "completed" => Some(RequestStatus::Completed),
            "failed" => Some(RequestStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Queued)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record in `from` may move to `to`.
///
/// `queued` may reach any terminal state. In lenient mode a terminal record
/// may still be re-reported as `completed` or `failed` (last write wins);
/// strict mode forbids leaving a terminal state.
pub fn can_transition(from: RequestStatus, to: RequestStatus, strict: bool) -> bool {
    if !to.is_terminal() {
        return false;
    }
    if !from.is_terminal() {
        return true;
    }
    // `error` is only ever set by a failed dispatch of a queued record
    !strict && to != RequestStatus::Error
}

/// Current time at the precision the store persists.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRequest {
    pub request_id: String,
    pub prompt: String,
    pub context: Option<String>,
    pub status: RequestStatus,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRequest {
    pub fn queued(request_id: String, request: NewAgentRequest, now: DateTime<Utc>) -> Self {
        Self {
            request_id,
            prompt: request.prompt().to_string(),
            context: request.context().map(str::to_string),
            status: RequestStatus::Queued,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every failing field of a rejected payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Append `other`, skipping fields that already carry an error.
    pub fn merge(&mut self, other: ValidationErrors) {
        for error in other.0 {
            if !self.fields().any(|f| f == error.field) {
                self.0.push(error);
            }
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn required_text(field: &str, value: Option<String>, errors: &mut ValidationErrors) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        Some(_) => {
            errors.push(field, "must not be blank");
            String::new()
        }
        None => {
            errors.push(field, "field required");
            String::new()
        }
    }
}

fn optional_text(
    field: &str,
    value: Option<String>,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let v = value?.trim().to_string();
    if v.is_empty() {
        errors.push(field, "must not be blank when provided");
        return None;
    }
    Some(v)
}

/// A creation request that has passed validation: a trimmed non-empty prompt
/// and, if present, a trimmed non-empty context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAgentRequest {
    prompt: String,
    context: Option<String>,
}

impl NewAgentRequest {
    pub fn parse(prompt: Option<String>, context: Option<String>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let prompt = required_text("prompt", prompt, &mut errors);
        let context = optional_text("context", context, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self { prompt, context })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

/// Outcome reported by the execution worker. The status is kept raw here;
/// normalization belongs to the lifecycle service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReport {
    pub request_id: String,
    pub status: String,
    pub result: Option<String>,
}

impl CallbackReport {
    pub fn parse(
        request_id: Option<String>,
        status: Option<String>,
        result: Option<String>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let request_id = required_text("request_id", request_id, &mut errors);
        let status = required_text("status", status, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            request_id,
            status,
            result,
        })
    }
}
