/// Event registrations and favorites
use crate::{
    error::{KoiError, KoiResult},
    events::{
        manager::{parse_event, EVENT_COLUMNS},
        Event,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Registration record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub event_id: String,
    pub user_id: String,
    pub registered_at: DateTime<Utc>,
}

/// Registration and favorites manager
#[derive(Clone)]
pub struct RegistrationManager {
    db: SqlitePool,
}

impl RegistrationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a user for an approved event
    pub async fn register(&self, event: &Event, user_id: &str) -> KoiResult<Registration> {
        if !event.is_public() {
            return Err(KoiError::Conflict(
                "Registration is only open for approved events".to_string(),
            ));
        }

        if self.is_registered(&event.id, user_id).await? {
            return Err(KoiError::Conflict("Already registered".to_string()));
        }

        if let Some(capacity) = event.capacity {
            if self.count_registrations(&event.id).await? >= capacity {
                return Err(KoiError::Conflict("Event is full".to_string()));
            }
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO registrations (event_id, user_id, registered_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&event.id)
        .bind(user_id)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Registration {
            event_id: event.id.clone(),
            user_id: user_id.to_string(),
            registered_at: now,
        })
    }

    /// Cancel a registration
    pub async fn unregister(&self, event_id: &str, user_id: &str) -> KoiResult<()> {
        let result = sqlx::query("DELETE FROM registrations WHERE event_id = ?1 AND user_id = ?2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::NotFound("Registration not found".to_string()));
        }
        Ok(())
    }

    pub async fn is_registered(&self, event_id: &str, user_id: &str) -> KoiResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND user_id = ?2",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    pub async fn count_registrations(&self, event_id: &str) -> KoiResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = ?1")
                .bind(event_id)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    /// Events a user registered for, soonest first
    pub async fn registered_events(&self, user_id: &str) -> KoiResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events
             WHERE id IN (SELECT event_id FROM registrations WHERE user_id = ?1)
             ORDER BY starts_at ASC",
            EVENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.db).await?;
        rows.iter().map(parse_event).collect()
    }

    /// Mark an event as favorite; repeated calls are no-ops
    pub async fn add_favorite(&self, event: &Event, user_id: &str) -> KoiResult<()> {
        if !event.is_public() {
            return Err(KoiError::Conflict(
                "Only approved events can be favorited".to_string(),
            ));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO favorites (event_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&event.id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, event_id: &str, user_id: &str) -> KoiResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE event_id = ?1 AND user_id = ?2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }

    /// Favorited events, most recently favorited first
    pub async fn favorite_events(&self, user_id: &str) -> KoiResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events e
             JOIN favorites f ON f.event_id = e.id
             WHERE f.user_id = ?1
             ORDER BY f.created_at DESC",
            EVENT_COLUMNS
                .split(", ")
                .map(|c| format!("e.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.db).await?;
        rows.iter().map(parse_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{AccountManager, Role},
        db,
        events::{ApprovalStatus, EventManager, NewEvent},
    };
    use chrono::Duration;

    struct Fixture {
        events: EventManager,
        registrations: RegistrationManager,
        accounts: AccountManager,
        event: Event,
    }

    async fn setup(capacity: Option<i64>) -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        let accounts = AccountManager::new(pool.clone());
        let organizer = accounts
            .create_account("Org", "org@example.edu", "password123", Role::Organizer)
            .await
            .unwrap();
        let events = EventManager::new(pool.clone());
        let event = events
            .submit_event(
                &organizer.id,
                NewEvent {
                    title: "Tea Ceremony".to_string(),
                    description: "Matcha and mochi".to_string(),
                    category_id: None,
                    venue: "Garden Hall".to_string(),
                    starts_at: Utc::now() + Duration::days(2),
                    ends_at: None,
                    capacity,
                },
            )
            .await
            .unwrap();

        Fixture {
            events,
            registrations: RegistrationManager::new(pool),
            accounts,
            event,
        }
    }

    async fn user(accounts: &AccountManager, email: &str) -> String {
        accounts
            .create_account("Guest", email, "password123", Role::User)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_register_requires_approved_event() {
        let fx = setup(None).await;
        let guest = user(&fx.accounts, "guest@example.edu").await;

        let err = fx.registrations.register(&fx.event, &guest).await.unwrap_err();
        assert!(matches!(err, KoiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_capacity_and_duplicates() {
        let fx = setup(Some(1)).await;
        let event = fx
            .events
            .set_approval(&fx.event, ApprovalStatus::Approved, None, &[])
            .await
            .unwrap();
        let first = user(&fx.accounts, "first@example.edu").await;
        let second = user(&fx.accounts, "second@example.edu").await;

        fx.registrations.register(&event, &first).await.unwrap();

        let dup = fx.registrations.register(&event, &first).await.unwrap_err();
        assert!(matches!(dup, KoiError::Conflict(_)));

        let full = fx.registrations.register(&event, &second).await.unwrap_err();
        assert!(matches!(full, KoiError::Conflict(_)));

        fx.registrations.unregister(&event.id, &first).await.unwrap();
        fx.registrations.register(&event, &second).await.unwrap();

        let mine = fx.registrations.registered_events(&second).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, event.id);
    }

    #[tokio::test]
    async fn test_favorites() {
        let fx = setup(None).await;
        let event = fx
            .events
            .set_approval(&fx.event, ApprovalStatus::Approved, None, &[])
            .await
            .unwrap();
        let guest = user(&fx.accounts, "guest@example.edu").await;

        fx.registrations.add_favorite(&event, &guest).await.unwrap();
        fx.registrations.add_favorite(&event, &guest).await.unwrap();

        let favorites = fx.registrations.favorite_events(&guest).await.unwrap();
        assert_eq!(favorites.len(), 1);

        fx.registrations.remove_favorite(&event.id, &guest).await.unwrap();
        let err = fx
            .registrations
            .remove_favorite(&event.id, &guest)
            .await
            .unwrap_err();
        assert!(matches!(err, KoiError::NotFound(_)));
    }
}
