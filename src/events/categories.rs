/// Event categories
///
/// Organizers propose categories; they stay inactive until an admin
/// approves them.
use crate::error::{KoiError, KoiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "id, name, description, status, is_active, rejection_reason, \
                                created_by, reviewed_by, reviewed_at, created_at";

/// Category review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    Pending,
    Approved,
    Rejected,
}

impl CategoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryStatus::Pending => "pending",
            CategoryStatus::Approved => "approved",
            CategoryStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CategoryStatus::Pending),
            "approved" => Ok(CategoryStatus::Approved),
            "rejected" => Ok(CategoryStatus::Rejected),
            _ => Err(KoiError::Validation(format!("Invalid category status: {}", s))),
        }
    }
}

/// Category record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: CategoryStatus,
    pub is_active: bool,
    pub rejection_reason: Option<String>,
    pub created_by: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Category manager
#[derive(Clone)]
pub struct CategoryManager {
    db: SqlitePool,
}

impl CategoryManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Propose a new category
    pub async fn propose(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> KoiResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KoiError::Validation("Category name is required".to_string()));
        }

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE lower(name) = lower(?1)")
                .bind(name)
                .fetch_one(&self.db)
                .await?;
        if existing > 0 {
            return Err(KoiError::Conflict(format!("Category {} already exists", name)));
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|d| d.trim().to_string()),
            status: CategoryStatus::Pending,
            is_active: false,
            rejection_reason: None,
            created_by: created_by.to_string(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, status, is_active, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.status.as_str())
        .bind(category.is_active)
        .bind(&category.created_by)
        .bind(category.created_at)
        .execute(&self.db)
        .await?;

        Ok(category)
    }

    /// Get a category by id
    pub async fn get_category(&self, id: &str) -> KoiResult<Category> {
        self.find_category(id)
            .await?
            .ok_or_else(|| KoiError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn find_category(&self, id: &str) -> KoiResult<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(parse_category).transpose()
    }

    /// Active categories, alphabetical
    pub async fn list_active(&self) -> KoiResult<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE is_active = 1 ORDER BY name ASC",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;
        rows.iter().map(parse_category).collect()
    }

    /// Categories in a given review status, oldest first
    pub async fn list_by_status(&self, status: CategoryStatus) -> KoiResult<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE status = ?1 ORDER BY created_at ASC",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(parse_category).collect()
    }

    /// Persist a review decision
    pub async fn set_review(
        &self,
        category: &Category,
        status: CategoryStatus,
        rejection_reason: Option<&str>,
        reviewed_by: &str,
    ) -> KoiResult<Category> {
        let now = Utc::now();
        let is_active = status == CategoryStatus::Approved;

        sqlx::query(
            "UPDATE categories
             SET status = ?1, is_active = ?2, rejection_reason = ?3, reviewed_by = ?4, reviewed_at = ?5
             WHERE id = ?6",
        )
        .bind(status.as_str())
        .bind(is_active)
        .bind(rejection_reason)
        .bind(reviewed_by)
        .bind(now)
        .bind(&category.id)
        .execute(&self.db)
        .await?;

        let mut updated = category.clone();
        updated.status = status;
        updated.is_active = is_active;
        updated.rejection_reason = rejection_reason.map(String::from);
        updated.reviewed_by = Some(reviewed_by.to_string());
        updated.reviewed_at = Some(now);
        Ok(updated)
    }
}

fn parse_category(row: &SqliteRow) -> KoiResult<Category> {
    let status: String = row.try_get("status")?;

    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: CategoryStatus::from_str(&status)?,
        is_active: row.try_get("is_active")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_by: row.try_get("created_by")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
    })
}
