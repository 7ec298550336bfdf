use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, failed, and cancelled are terminal; nothing transitions
    /// out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: String,
    pub user_id: Option<String>,
    pub job_type: String,
    pub status: JobStatus,
    pub request_params: serde_json::Value,
    pub progress: f64,
    pub results: Option<serde_json::Value>,
    pub error_details: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn new(user_id: Option<String>, job_type: impl Into<String>, request_params: serde_json::Value) -> Self {
        let now = crate::utc_now!();
        Self {
            job_id: crate::new_id!(),
            user_id,
            job_type: job_type.into(),
            status: JobStatus::Pending,
            request_params,
            progress: 0.0,
            results: None,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct JobFilter {
    pub user_id: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}
