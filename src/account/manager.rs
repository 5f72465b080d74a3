/// Account manager implementation using runtime queries
use crate::{
    account::{AccountStatus, Role, User},
    error::{KoiError, KoiResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, account_status, status_reason, \
                            status_changed_at, status_changed_by, created_at, updated_at";

/// Hash a password with Argon2id
pub fn hash_password(password: &str) -> KoiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| KoiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> KoiResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| KoiError::Internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Identity store
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a new account
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> KoiResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KoiError::Validation("Name is required".to_string()));
        }

        let email = email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(KoiError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, account_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&id)
        .bind(name)
        .bind(&email)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(AccountStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!("Created {} account {}", role.as_str(), id);

        Ok(User {
            id,
            name: name.to_string(),
            email,
            password_hash,
            role,
            account_status: AccountStatus::Active,
            status_reason: None,
            status_changed_at: None,
            status_changed_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Authenticate by email and password
    ///
    /// Banned and suspended accounts are refused with their stored reason.
    pub async fn login(&self, email: &str, password: &str) -> KoiResult<User> {
        let email = email.trim().to_lowercase();
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| KoiError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(KoiError::Authentication("Invalid credentials".to_string()));
        }

        if let Err(e) = user.ensure_usable() {
            tracing::warn!("Refused login for {} ({})", user.id, user.account_status.as_str());
            return Err(e);
        }

        Ok(user)
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> KoiResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| KoiError::NotFound(format!("User {} not found", id)))
    }

    /// Look up a user by id
    pub async fn find_user(&self, id: &str) -> KoiResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;
        row.as_ref().map(parse_user).transpose()
    }

    /// Look up a user by email
    pub async fn find_by_email(&self, email: &str) -> KoiResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(parse_user).transpose()
    }

    /// List users with optional role and status filters
    pub async fn list_users(
        &self,
        role: Option<Role>,
        status: Option<AccountStatus>,
        limit: i64,
    ) -> KoiResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users
             WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR account_status = ?2)
             ORDER BY created_at DESC
             LIMIT ?3",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(role.map(|r| r.as_str()))
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(parse_user).collect()
    }

    pub async fn count_users(&self) -> KoiResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Count active accounts holding the admin role
    pub async fn count_admins(&self) -> KoiResult<i64> {
        let mut conn = self.db.acquire().await?;
        count_admins(&mut *conn).await
    }

    /// Persist a new account status
    pub async fn update_status(
        &self,
        user: &User,
        status: AccountStatus,
        reason: Option<&str>,
        changed_by: &str,
    ) -> KoiResult<User> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE users
             SET account_status = ?1, status_reason = ?2, status_changed_at = ?3,
                 status_changed_by = ?4, updated_at = ?5
             WHERE id = ?6",
        )
        .bind(status.as_str())
        .bind(reason)
        .bind(now)
        .bind(changed_by)
        .bind(now)
        .bind(&user.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(KoiError::NotFound(format!("User {} not found", user.id)));
        }

        let mut updated = user.clone();
        updated.account_status = status;
        updated.status_reason = reason.map(String::from);
        updated.status_changed_at = Some(now);
        updated.status_changed_by = Some(changed_by.to_string());
        updated.updated_at = now;
        Ok(updated)
    }

    /// Change a user's role inside a transaction
    ///
    /// Demoting an active admin runs `ensure_admin_remains` on the same
    /// transaction immediately before the write. Only active accounts can be
    /// promoted to admin.
    pub async fn update_role(&self, user_id: &str, role: Role) -> KoiResult<User> {
        let mut tx = self.db.begin().await?;

        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| KoiError::NotFound(format!("User {} not found", user_id)))?;
        let mut user = parse_user(&row)?;

        if role == Role::Admin && user.account_status != AccountStatus::Active {
            return Err(KoiError::Conflict(format!(
                "Cannot promote a {} account to admin",
                user.account_status.as_str()
            )));
        }
        if user.is_admin() && user.account_status == AccountStatus::Active && role != Role::Admin
        {
            ensure_admin_remains(&mut *tx).await?;
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(role.as_str())
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        user.role = role;
        user.updated_at = now;
        Ok(user)
    }
}

async fn count_admins(conn: &mut SqliteConnection) -> KoiResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE role = 'admin' AND account_status = 'active'",
    )
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Invariant: the system always keeps at least one active admin.
///
/// Must be called before removing the admin role from an account.
pub(crate) async fn ensure_admin_remains(conn: &mut SqliteConnection) -> KoiResult<()> {
    if count_admins(conn).await? <= 1 {
        return Err(KoiError::Forbidden(
            "Cannot remove the last remaining admin".to_string(),
        ));
    }
    Ok(())
}

fn parse_user(row: &SqliteRow) -> KoiResult<User> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("account_status")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_str(&role)?,
        account_status: AccountStatus::from_str(&status)?,
        status_reason: row.try_get("status_reason")?,
        status_changed_at: row.try_get("status_changed_at")?,
        status_changed_by: row.try_get("status_changed_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_create_and_login() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());

        let user = manager
            .create_account("Ada", "Ada@Example.edu", "password123", Role::Organizer)
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.edu");
        assert_eq!(user.account_status, AccountStatus::Active);

        let logged_in = manager.login("ada@example.edu", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = manager.login("ada@example.edu", "nope").await.unwrap_err();
        assert!(matches!(err, KoiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());
        manager
            .create_account("Ada", "ada@example.edu", "password123", Role::User)
            .await
            .unwrap();

        let err = manager
            .create_account("Ada Two", "ada@example.edu", "password123", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, KoiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_banned_login_carries_reason() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());
        let admin = manager
            .create_account("Root", "root@example.edu", "password123", Role::Admin)
            .await
            .unwrap();
        let user = manager
            .create_account("Bob", "bob@example.edu", "password123", Role::User)
            .await
            .unwrap();

        manager
            .update_status(&user, AccountStatus::Banned, Some("harassment"), &admin.id)
            .await
            .unwrap();

        match manager.login("bob@example.edu", "password123").await {
            Err(KoiError::AccountBanned(reason)) => assert_eq!(reason, "harassment"),
            other => panic!("expected ban notice, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_demoted() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());
        let admin = manager
            .create_account("Root", "root@example.edu", "password123", Role::Admin)
            .await
            .unwrap();

        let err = manager.update_role(&admin.id, Role::User).await.unwrap_err();
        assert!(matches!(err, KoiError::Forbidden(_)));
        assert_eq!(manager.count_admins().await.unwrap(), 1);

        manager
            .create_account("Second", "second@example.edu", "password123", Role::Admin)
            .await
            .unwrap();
        let demoted = manager.update_role(&admin.id, Role::User).await.unwrap();
        assert_eq!(demoted.role, Role::User);
        assert_eq!(manager.count_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_only_active_accounts_hold_admin() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());
        let root = manager
            .create_account("Root", "root@example.edu", "password123", Role::Admin)
            .await
            .unwrap();
        let user = manager
            .create_account("Mallory", "mallory@example.edu", "password123", Role::User)
            .await
            .unwrap();
        manager
            .update_status(&user, AccountStatus::Banned, Some("fraud"), &root.id)
            .await
            .unwrap();

        let err = manager.update_role(&user.id, Role::Admin).await.unwrap_err();
        assert!(matches!(err, KoiError::Conflict(_)));
        assert_eq!(manager.get_user(&user.id).await.unwrap().role, Role::User);

        // A suspended admin does not keep the last active admin replaceable
        let second = manager
            .create_account("Second", "second@example.edu", "password123", Role::Admin)
            .await
            .unwrap();
        manager
            .update_status(&second, AccountStatus::Suspended, Some("leave"), &root.id)
            .await
            .unwrap();
        assert_eq!(manager.count_admins().await.unwrap(), 1);

        let err = manager.update_role(&root.id, Role::User).await.unwrap_err();
        assert!(matches!(err, KoiError::Forbidden(_)));

        // The inactive admin itself can still be demoted
        let demoted = manager.update_role(&second.id, Role::User).await.unwrap();
        assert_eq!(demoted.role, Role::User);
    }

    #[tokio::test]
    async fn test_list_users_filters() {
        let manager = AccountManager::new(db::create_memory_pool().await.unwrap());
        manager
            .create_account("A", "a@example.edu", "password123", Role::User)
            .await
            .unwrap();
        manager
            .create_account("B", "b@example.edu", "password123", Role::Organizer)
            .await
            .unwrap();

        let organizers = manager
            .list_users(Some(Role::Organizer), None, 50)
            .await
            .unwrap();
        assert_eq!(organizers.len(), 1);
        assert_eq!(organizers[0].email, "b@example.edu");

        let all = manager.list_users(None, None, 50).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
