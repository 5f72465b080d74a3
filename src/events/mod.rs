/// Event records, categories, registrations and favorites
///
/// Events are owned by the organizer who submitted them and move through
/// the approval lifecycle driven by the moderation service.

pub mod categories;
mod manager;
pub mod registrations;

pub use categories::{Category, CategoryManager, CategoryStatus};
pub use manager::EventManager;
pub use registrations::{Registration, RegistrationManager};

use crate::error::{KoiError, KoiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "changes_requested" => Ok(ApprovalStatus::ChangesRequested),
            _ => Err(KoiError::Validation(format!("Invalid approval status: {}", s))),
        }
    }
}

/// A change an admin asked the organizer to make
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedChange {
    pub field: String,
    pub comment: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Event record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i64>,
    /// Assigned at creation, never changes
    pub organizer_id: String,
    pub approval_status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub requested_changes: Vec<RequestedChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_public(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

/// Event submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// Fields an organizer may edit when resubmitting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i64>,
}

fn validate_schedule(
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    capacity: Option<i64>,
) -> KoiResult<()> {
    if let Some(ends_at) = ends_at {
        if ends_at < starts_at {
            return Err(KoiError::Validation(
                "Event cannot end before it starts".to_string(),
            ));
        }
    }
    if let Some(capacity) = capacity {
        if capacity <= 0 {
            return Err(KoiError::Validation("Capacity must be positive".to_string()));
        }
    }
    Ok(())
}

impl NewEvent {
    pub fn validate(&self) -> KoiResult<()> {
        if self.title.trim().is_empty() {
            return Err(KoiError::Validation("Title is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(KoiError::Validation("Description is required".to_string()));
        }
        if self.venue.trim().is_empty() {
            return Err(KoiError::Validation("Venue is required".to_string()));
        }
        validate_schedule(self.starts_at, self.ends_at, self.capacity)
    }
}
