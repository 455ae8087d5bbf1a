use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::user_models::{Role, User};
use crate::error::Result;

/// Recipient lookup used by the notification dispatcher. The production
/// implementation reads the users table; tests substitute an in-memory one.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// All users holding any of the given roles.
    async fn find_by_roles(&self, roles: &[Role]) -> Result<Vec<User>>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry to the activity log. Activity feeds the inactivity
    /// and velocity collectors.
    pub async fn record_activity(&self, user_id: Uuid, kind: &str) -> Result<()> {
        sqlx::query("INSERT INTO activity_log (user_id, kind) VALUES ($1, $2)")
            .bind(user_id)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        let role_names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = ANY($1) ORDER BY username",
        )
        .bind(&role_names)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
