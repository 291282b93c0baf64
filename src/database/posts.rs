use std::collections::HashMap;
use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::{Comment, Post, PostCreate, PostFilter, PostUpdate};
use crate::utils::escape_like;

const POST_COLUMNS: &str = "id, title, description, like_count, user_id, flight_id, created_at, updated_at, deleted_at";
const COMMENT_COLUMNS: &str = "id, content, user_id, post_id, created_at, updated_at, deleted_at";

// Optional filters are bound as NULL when absent so the statement text stays fixed
const POST_FILTER: &str = "deleted_at IS NULL \
                           AND ($1::uuid IS NULL OR flight_id = $1) \
                           AND ($2::text IS NULL OR title ILIKE $2) \
                           AND ($3::uuid IS NULL OR user_id = $3)";

impl DatabaseService {
    pub async fn count_posts(&self, filter: &PostFilter) -> AppResult<i64> {
        let client = self.get_client().await?;
        let pattern = filter.search().map(|q| format!("%{}%", escape_like(q)));
        let row = client
            .query_one(
                &format!("SELECT COUNT(*) FROM posts WHERE {}", POST_FILTER),
                &[&filter.flight_id, &pattern, &filter.author_id],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Live posts matching the filter, newest first
    pub async fn list_posts(&self, filter: &PostFilter, limit: i64, offset: i64) -> AppResult<Vec<Post>> {
        let client = self.get_client().await?;
        let pattern = filter.search().map(|q| format!("%{}%", escape_like(q)));
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM posts WHERE {} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
                    POST_COLUMNS, POST_FILTER
                ),
                &[&filter.flight_id, &pattern, &filter.author_id, &limit, &offset],
            )
            .await?;
        Ok(rows.iter().map(row_to_post).collect())
    }

    /// Get a post that has not been soft-deleted
    pub async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM posts WHERE id = $1 AND deleted_at IS NULL", POST_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_post))
    }

    /// Get a post whether or not it is deleted
    pub async fn get_post_any(&self, id: Uuid) -> AppResult<Option<Post>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS), &[&id])
            .await?;
        Ok(row.as_ref().map(row_to_post))
    }

    pub async fn create_post(&self, user_id: Uuid, post: &PostCreate) -> AppResult<Post> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO posts (title, description, user_id, flight_id) VALUES ($1, $2, $3, $4) RETURNING {}",
                    POST_COLUMNS
                ),
                &[&post.title, &post.description, &user_id, &post.flight_id],
            )
            .await?;
        Ok(row_to_post(&row))
    }

    pub async fn update_post(&self, id: Uuid, update: &PostUpdate) -> AppResult<Option<Post>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE posts SET \
                        title = COALESCE($2::varchar, title), \
                        description = COALESCE($3::text, description), \
                        updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
                    POST_COLUMNS
                ),
                &[&id, &update.title, &update.description],
            )
            .await?;
        Ok(row.as_ref().map(row_to_post))
    }

    pub async fn soft_delete_post(&self, id: Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;
        let affected = client
            .execute(
                "UPDATE posts SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await?;
        Ok(affected == 1)
    }

    pub async fn restore_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE posts SET deleted_at = NULL, updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
                    POST_COLUMNS
                ),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_post))
    }

    /// Flip the user's like on a live post and adjust the counter in the
    /// same transaction. Returns the updated post and whether it is now liked.
    pub async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> AppResult<Option<(Post, bool)>> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let locked = tx
            .query_opt(
                "SELECT id FROM posts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
                &[&post_id],
            )
            .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let removed = tx
            .execute(
                "DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2",
                &[&user_id, &post_id],
            )
            .await?;

        let (liked, adjust) = if removed > 0 {
            (false, "GREATEST(0, like_count - 1)")
        } else {
            tx.execute(
                "INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)",
                &[&user_id, &post_id],
            )
            .await?;
            (true, "like_count + 1")
        };

        let row = tx
            .query_one(
                &format!(
                    "UPDATE posts SET like_count = {} WHERE id = $1 RETURNING {}",
                    adjust, POST_COLUMNS
                ),
                &[&post_id],
            )
            .await?;

        tx.commit().await?;
        Ok(Some((row_to_post(&row), liked)))
    }

    /// Live comments for the given posts, oldest first
    pub async fn comments_for_posts(&self, post_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Comment>>> {
        let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(grouped);
        }
        let client = self.get_client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM comments WHERE post_id = ANY($1) AND deleted_at IS NULL \
                     ORDER BY post_id, created_at, id",
                    COMMENT_COLUMNS
                ),
                &[&post_ids],
            )
            .await?;
        for comment in rows.iter().map(row_to_comment) {
            grouped.entry(comment.post_id).or_default().push(comment);
        }
        Ok(grouped)
    }

    /// Get a comment whether or not it is deleted
    pub async fn get_comment_any(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS), &[&id])
            .await?;
        Ok(row.as_ref().map(row_to_comment))
    }

    pub async fn create_comment(&self, post_id: Uuid, user_id: Uuid, content: &str) -> AppResult<Comment> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO comments (content, user_id, post_id) VALUES ($1, $2, $3) RETURNING {}",
                    COMMENT_COLUMNS
                ),
                &[&content, &user_id, &post_id],
            )
            .await?;
        Ok(row_to_comment(&row))
    }

    pub async fn update_comment(&self, id: Uuid, content: Option<&str>) -> AppResult<Option<Comment>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE comments SET content = COALESCE($2::text, content), updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
                    COMMENT_COLUMNS
                ),
                &[&id, &content],
            )
            .await?;
        Ok(row.as_ref().map(row_to_comment))
    }

    pub async fn soft_delete_comment(&self, id: Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;
        let affected = client
            .execute(
                "UPDATE comments SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await?;
        Ok(affected == 1)
    }

    pub async fn restore_comment(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE comments SET deleted_at = NULL, updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
                    COMMENT_COLUMNS
                ),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_comment))
    }
}

fn row_to_post(row: &tokio_postgres::Row) -> Post {
    Post {
        id: row.get(0),
        title: row.get(1),
        description: row.get(2),
        like_count: row.get(3),
        user_id: row.get(4),
        flight_id: row.get(5),
        created_at: row.get(6),
        updated_at: row.get(7),
        deleted_at: row.get(8),
    }
}

fn row_to_comment(row: &tokio_postgres::Row) -> Comment {
    Comment {
        id: row.get(0),
        content: row.get(1),
        user_id: row.get(2),
        post_id: row.get(3),
        created_at: row.get(4),
        updated_at: row.get(5),
        deleted_at: row.get(6),
    }
}
