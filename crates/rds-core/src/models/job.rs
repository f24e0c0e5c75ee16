use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RdsError, Result};
use crate::store::{FieldKind, FieldSchema, StoreItem};

/// Job lifecycle states. Transitions are strictly monotonic per job; the
/// legal successors are encoded in [`JobStatus::successors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    PendingCodeReview,
    Approved,
    Rejected,
    JobInProgress,
    JobRunFailed,
    JobRunFinished,
    Shared,
}

impl JobStatus {
    pub const VARIANTS: &'static [&'static str] = &[
        "pending_code_review",
        "approved",
        "rejected",
        "job_in_progress",
        "job_run_failed",
        "job_run_finished",
        "shared",
    ];

    /// Legal next states. `job_in_progress` is reachable directly from
    /// `pending_code_review` only through the forced legacy run path.
    pub fn successors(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            PendingCodeReview => &[Approved, Rejected, JobInProgress],
            Approved => &[JobInProgress],
            JobInProgress => &[JobRunFinished, JobRunFailed],
            JobRunFinished => &[Shared],
            Rejected | JobRunFailed | Shared => &[],
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        use JobStatus::*;
        match self {
            PendingCodeReview => "pending_code_review",
            Approved => "approved",
            Rejected => "rejected",
            JobInProgress => "job_in_progress",
            JobRunFailed => "job_run_failed",
            JobRunFinished => "job_run_finished",
            Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub uid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub dataset_name: String,
    pub user_code_id: Uuid,
    #[serde(default)]
    pub runtime_id: Option<Uuid>,
    pub status: JobStatus,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub return_code: Option<i32>,
}

impl Job {
    /// Apply a partial update in place. The update must target this job.
    pub fn apply_update(&mut self, update: &JobUpdate) -> Result<()> {
        if update.uid != self.uid {
            return Err(RdsError::InvalidUpdate(format!(
                "update uid {} does not match job {}",
                update.uid, self.uid
            )));
        }
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(output_url) = &update.output_url {
            self.output_url = Some(output_url.clone());
        }
        if let Some(error_message) = &update.error_message {
            self.error_message = Some(error_message.clone());
        }
        if let Some(return_code) = update.return_code {
            self.return_code = Some(return_code);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Non-destructive variant: returns the updated clone.
    pub fn with_update(&self, update: &JobUpdate) -> Result<Job> {
        let mut clone = self.clone();
        clone.apply_update(update)?;
        Ok(clone)
    }
}

impl StoreItem for Job {
    fn kind() -> &'static str {
        "job"
    }

    fn uid(&self) -> Uuid {
        self.uid
    }

    fn schema() -> FieldSchema {
        &[
            ("uid", FieldKind::Uuid),
            ("created_at", FieldKind::Instant),
            ("updated_at", FieldKind::Instant),
            ("user_code_id", FieldKind::Uuid),
            ("runtime_id", FieldKind::Uuid),
            ("status", FieldKind::Enum(JobStatus::VARIANTS)),
            ("return_code", FieldKind::Int),
        ]
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub dataset_name: String,
    pub user_code_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<Uuid>,
}

impl JobCreate {
    pub fn into_job(self, created_by: &str) -> Job {
        let now = Utc::now();
        Job {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name: self.name,
            description: self.description,
            tags: self.tags,
            dataset_name: self.dataset_name,
            user_code_id: self.user_code_id,
            runtime_id: self.runtime_id,
            status: JobStatus::PendingCodeReview,
            output_url: None,
            error_message: None,
            return_code: None,
        }
    }
}

/// Partial update companion: all fields optional, `uid` mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
}

impl JobUpdate {
    pub fn new(uid: Uuid) -> Self {
        Self {
            uid,
            name: None,
            description: None,
            tags: None,
            status: None,
            output_url: None,
            error_message: None,
            return_code: None,
        }
    }

    pub fn with_status(uid: Uuid, status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::new(uid)
        }
    }

    /// Update emitted when execution starts.
    pub fn in_progress(uid: Uuid) -> Self {
        Self::with_status(uid, JobStatus::JobInProgress)
    }

    /// Terminal update derived from a process exit.
    pub fn for_return_code(uid: Uuid, return_code: i32, error_message: Option<String>) -> Self {
        let status = if return_code == 0 {
            JobStatus::JobRunFinished
        } else {
            JobStatus::JobRunFailed
        };
        Self {
            status: Some(status),
            return_code: Some(return_code),
            error_message,
            ..Self::new(uid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        JobCreate {
            name: Some("test".into()),
            description: None,
            tags: vec![],
            dataset_name: "dummy".into(),
            user_code_id: Uuid::new_v4(),
            runtime_id: None,
        }
        .into_job("ds@x")
    }

    #[test]
    fn successors_match_lifecycle() {
        use JobStatus::*;
        assert!(PendingCodeReview.can_transition_to(Approved));
        assert!(PendingCodeReview.can_transition_to(Rejected));
        assert!(PendingCodeReview.can_transition_to(JobInProgress));
        assert!(Approved.can_transition_to(JobInProgress));
        assert!(JobInProgress.can_transition_to(JobRunFinished));
        assert!(JobInProgress.can_transition_to(JobRunFailed));
        assert!(JobRunFinished.can_transition_to(Shared));

        assert!(!Approved.can_transition_to(Rejected));
        assert!(!JobRunFinished.can_transition_to(JobInProgress));
        assert!(Rejected.is_terminal());
        assert!(JobRunFailed.is_terminal());
        assert!(Shared.is_terminal());
    }

    #[test]
    fn apply_update_refuses_mismatched_uid() {
        let mut j = job();
        let before = j.status;
        let update = JobUpdate::with_status(Uuid::new_v4(), JobStatus::Rejected);
        assert!(matches!(
            j.apply_update(&update),
            Err(RdsError::InvalidUpdate(_))
        ));
        assert_eq!(j.status, before);
    }

    #[test]
    fn with_update_leaves_original_unchanged() {
        let j = job();
        let update = JobUpdate::with_status(j.uid, JobStatus::Rejected);
        let updated = j.with_update(&update).unwrap();
        assert_eq!(updated.status, JobStatus::Rejected);
        assert_eq!(j.status, JobStatus::PendingCodeReview);
    }

    #[test]
    fn for_return_code_maps_zero_to_finished() {
        let uid = Uuid::new_v4();
        assert_eq!(
            JobUpdate::for_return_code(uid, 0, None).status,
            Some(JobStatus::JobRunFinished)
        );
        assert_eq!(
            JobUpdate::for_return_code(uid, 1, Some("boom".into())).status,
            Some(JobStatus::JobRunFailed)
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&JobStatus::PendingCodeReview).unwrap();
        assert_eq!(s, "\"pending_code_review\"");
    }
}
