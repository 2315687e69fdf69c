use serde::{Deserialize, Serialize};

use crate::domain::JobState;

/// Body of a successful job submission response.
///
/// The service includes a human-readable `status` hint alongside the id; only
/// `jobID` is load-bearing. The id stays optional here so the transport layer
/// can report a missing id as a protocol error rather than a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    #[serde(rename = "jobID", default)]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Body of a status poll response.
///
/// The service spells the error-message field `error`; older clients read
/// `message`. Accept both on the way in, write `message` on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusPayload {
    pub status: JobState,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
