use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::flight::FlightRead;
use super::user::UserRead;

/// Stored post about a flight
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub like_count: i32,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostCreate {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,

    pub description: String,
    pub flight_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostUpdate {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
}

/// Optional filters for the post listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub flight_id: Option<Uuid>,
    /// Case-insensitive partial match against the title
    pub q: Option<String>,
    pub author_id: Option<Uuid>,
}

impl PostFilter {
    /// Search text with surrounding whitespace removed; blank searches are dropped
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentCreate {
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentUpdate {
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRead {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author: UserRead,
}

impl CommentRead {
    pub fn assemble(comment: Comment, author: UserRead) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            user_id: comment.user_id,
            post_id: comment.post_id,
            created_at: Some(comment.created_at),
            updated_at: Some(comment.updated_at),
            author,
        }
    }
}

/// Post view with author, flight and live comments expanded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRead {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub like_count: i32,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author: UserRead,
    pub flight: FlightRead,
    pub comments: Vec<CommentRead>,
}

impl PostRead {
    pub fn assemble(post: Post, author: UserRead, flight: FlightRead, comments: Vec<CommentRead>) -> Self {
        Self {
            id: post.id,
            title: post.title,
            description: post.description,
            like_count: post.like_count,
            user_id: post.user_id,
            flight_id: post.flight_id,
            created_at: Some(post.created_at),
            updated_at: Some(post.updated_at),
            author,
            flight,
            comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_is_ignored() {
        let filter = PostFilter {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search(), None);

        let filter = PostFilter {
            q: Some("  lisbon ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search(), Some("lisbon"));
    }

    #[test]
    fn title_is_limited_to_100_chars() {
        let post = PostCreate {
            title: "t".repeat(101),
            description: "too long".to_string(),
            flight_id: Uuid::new_v4(),
        };
        assert!(post.validate().is_err());

        let update = PostUpdate {
            title: Some("Window seat over the Alps".to_string()),
            description: None,
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn empty_comment_is_rejected() {
        assert!(CommentCreate { content: String::new() }.validate().is_err());
        assert!(CommentUpdate { content: Some(String::new()) }.validate().is_err());
        assert!(CommentUpdate::default().validate().is_ok());
    }
}
