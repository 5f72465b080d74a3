/// Event record store
use crate::{
    error::{KoiError, KoiResult},
    events::{validate_schedule, ApprovalStatus, Event, EventUpdate, NewEvent, RequestedChange},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

pub(crate) const EVENT_COLUMNS: &str = "id, title, description, category_id, venue, starts_at, ends_at, \
                                        capacity, organizer_id, approval_status, rejection_reason, \
                                        requested_changes, created_at, updated_at";

/// Event manager
#[derive(Clone)]
pub struct EventManager {
    db: SqlitePool,
}

impl EventManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Submit a new event; it always starts pending
    pub async fn submit_event(&self, organizer_id: &str, new: NewEvent) -> KoiResult<Event> {
        new.validate()?;

        if let Some(category_id) = &new.category_id {
            let active: Option<bool> =
                sqlx::query_scalar("SELECT is_active FROM categories WHERE id = ?1")
                    .bind(category_id)
                    .fetch_optional(&self.db)
                    .await?;
            if active != Some(true) {
                return Err(KoiError::Validation(format!(
                    "Category {} is not available",
                    category_id
                )));
            }
        }

        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            category_id: new.category_id,
            venue: new.venue.trim().to_string(),
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            capacity: new.capacity,
            organizer_id: organizer_id.to_string(),
            approval_status: ApprovalStatus::Pending,
            rejection_reason: None,
            requested_changes: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO events (id, title, description, category_id, venue, starts_at, ends_at,
                                 capacity, organizer_id, approval_status, requested_changes,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, '[]', ?11, ?12)",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.category_id)
        .bind(&event.venue)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.capacity)
        .bind(&event.organizer_id)
        .bind(event.approval_status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!("Event {} submitted by {}", event.id, organizer_id);
        Ok(event)
    }

    /// Get an event by id
    pub async fn get_event(&self, id: &str) -> KoiResult<Event> {
        self.find_event(id)
            .await?
            .ok_or_else(|| KoiError::NotFound(format!("Event {} not found", id)))
    }

    /// Look up an event by id
    pub async fn find_event(&self, id: &str) -> KoiResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(parse_event).transpose()
    }

    /// List events by approval status, optionally within a category
    pub async fn list_events(
        &self,
        status: ApprovalStatus,
        category_id: Option<&str>,
        limit: i64,
    ) -> KoiResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events
             WHERE approval_status = ?1 AND (?2 IS NULL OR category_id = ?2)
             ORDER BY starts_at ASC
             LIMIT ?3",
            EVENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(category_id)
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(parse_event).collect()
    }

    /// List every event an organizer submitted
    pub async fn list_by_organizer(&self, organizer_id: &str) -> KoiResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE organizer_id = ?1 ORDER BY created_at DESC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(organizer_id)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(parse_event).collect()
    }

    /// Persist an approval transition
    ///
    /// `new_changes` are appended to the existing requested changes.
    pub async fn set_approval(
        &self,
        event: &Event,
        status: ApprovalStatus,
        rejection_reason: Option<&str>,
        new_changes: &[RequestedChange],
    ) -> KoiResult<Event> {
        let mut requested_changes = event.requested_changes.clone();
        requested_changes.extend_from_slice(new_changes);
        let changes_json = encode_changes(&requested_changes)?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE events
             SET approval_status = ?1, rejection_reason = ?2, requested_changes = ?3, updated_at = ?4
             WHERE id = ?5",
        )
        .bind(status.as_str())
        .bind(rejection_reason)
        .bind(&changes_json)
        .bind(now)
        .bind(&event.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::NotFound(format!("Event {} not found", event.id)));
        }

        let mut updated = event.clone();
        updated.approval_status = status;
        updated.rejection_reason = rejection_reason.map(String::from);
        updated.requested_changes = requested_changes;
        updated.updated_at = now;
        Ok(updated)
    }

    /// Organizer resubmission after changes were requested
    ///
    /// Moves `changes_requested` back to `pending` and marks every requested
    /// change resolved.
    pub async fn resubmit(
        &self,
        organizer_id: &str,
        event_id: &str,
        update: EventUpdate,
    ) -> KoiResult<Event> {
        let mut event = self.get_event(event_id).await?;

        if event.organizer_id != organizer_id {
            return Err(KoiError::Forbidden(
                "Only the organizer can resubmit this event".to_string(),
            ));
        }
        if event.approval_status != ApprovalStatus::ChangesRequested {
            return Err(KoiError::Conflict(format!(
                "Event is {}, resubmission requires changes_requested",
                event.approval_status.as_str()
            )));
        }

        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            event.title = title.trim().to_string();
        }
        if let Some(description) = update.description.filter(|d| !d.trim().is_empty()) {
            event.description = description.trim().to_string();
        }
        if let Some(venue) = update.venue.filter(|v| !v.trim().is_empty()) {
            event.venue = venue.trim().to_string();
        }
        if let Some(starts_at) = update.starts_at {
            event.starts_at = starts_at;
        }
        if update.ends_at.is_some() {
            event.ends_at = update.ends_at;
        }
        if update.capacity.is_some() {
            event.capacity = update.capacity;
        }
        validate_schedule(event.starts_at, event.ends_at, event.capacity)?;

        for change in event.requested_changes.iter_mut() {
            change.resolved = true;
        }
        event.approval_status = ApprovalStatus::Pending;
        event.updated_at = Utc::now();

        sqlx::query(
            "UPDATE events
             SET title = ?1, description = ?2, venue = ?3, starts_at = ?4, ends_at = ?5,
                 capacity = ?6, approval_status = ?7, requested_changes = ?8, updated_at = ?9
             WHERE id = ?10",
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.capacity)
        .bind(event.approval_status.as_str())
        .bind(encode_changes(&event.requested_changes)?)
        .bind(event.updated_at)
        .bind(&event.id)
        .execute(&self.db)
        .await?;

        tracing::info!("Event {} resubmitted by {}", event.id, organizer_id);
        Ok(event)
    }

    /// Count events in a given approval status
    pub async fn count_by_status(&self, status: ApprovalStatus) -> KoiResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE approval_status = ?1")
                .bind(status.as_str())
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }
}

fn encode_changes(changes: &[RequestedChange]) -> KoiResult<String> {
    serde_json::to_string(changes)
        .map_err(|e| KoiError::Internal(format!("Failed to encode requested changes: {}", e)))
}

pub(crate) fn parse_event(row: &SqliteRow) -> KoiResult<Event> {
    let status: String = row.try_get("approval_status")?;
    let changes_json: String = row.try_get("requested_changes")?;
    let requested_changes: Vec<RequestedChange> = serde_json::from_str(&changes_json)
        .map_err(|e| KoiError::Internal(format!("Invalid requested changes: {}", e)))?;

    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category_id: row.try_get("category_id")?,
        venue: row.try_get("venue")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
        capacity: row.try_get("capacity")?,
        organizer_id: row.try_get("organizer_id")?,
        approval_status: ApprovalStatus::from_str(&status)?,
        rejection_reason: row.try_get("rejection_reason")?,
        requested_changes,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
