//! User accounts: registration and password verification.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, email, password_hash, display_name, avatar_url, created_at, updated_at";

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a user with a bcrypt-hashed password. The email is
    /// normalized to lowercase before the uniqueness check.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, StoreError> {
        let email = email.trim().to_lowercase();
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, display_name) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&email)
        .bind(&hash)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from);

        match result {
            Err(ref e) if e.is_unique_violation() => Err(StoreError::EmailExists),
            other => other,
        }
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Checks a login attempt. Unknown email and wrong password both
    /// return `None` so callers cannot enumerate accounts.
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let Some(user) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };
        match bcrypt::verify(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) | Err(_) => Ok(None),
        }
    }
}
