use std::collections::HashMap;
use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, hashed_password, created_at, updated_at, deleted_at";

impl DatabaseService {
    /// Create a new user
    pub async fn create_user(&self, email: &str, hashed_password: &str) -> AppResult<User> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                &format!(
                    "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING {}",
                    USER_COLUMNS
                ),
                &[&email, &hashed_password],
            )
            .await?;

        Ok(row_to_user(&row))
    }

    /// Get user by email
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS),
                &[&email],
            )
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    /// Load users by id, keyed for embedding into posts and comments
    pub async fn get_users_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let client = self.get_client().await?;

        let rows = client
            .query(
                &format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS),
                &[&ids],
            )
            .await?;

        Ok(rows.iter().map(row_to_user).map(|u| (u.id, u)).collect())
    }
}

fn row_to_user(row: &tokio_postgres::Row) -> User {
    User {
        id: row.get(0),
        email: row.get(1),
        hashed_password: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
        deleted_at: row.get(5),
    }
}
