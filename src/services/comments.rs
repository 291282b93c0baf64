use std::sync::Arc;
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{Comment, CommentCreate, CommentRead, CommentUpdate, User, UserRead};

const COMMENT_NOT_FOUND: &str = "Comment not found";

/// What the caller wants to do with an existing comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentAction {
    Update,
    Delete,
    Restore,
}

impl CommentAction {
    fn verb(self) -> &'static str {
        match self {
            CommentAction::Update => "update",
            CommentAction::Delete => "delete",
            CommentAction::Restore => "restore",
        }
    }
}

/// Run the checks every comment mutation shares, in order: the comment
/// exists (restores may target deleted ones), it belongs to the post in the
/// path, it is in the right deletion state, and the caller wrote it.
fn authorize(
    comment: Option<Comment>,
    post_id: Uuid,
    user: &User,
    action: CommentAction,
) -> AppResult<Comment> {
    let comment = match comment {
        Some(c) if action == CommentAction::Restore || c.deleted_at.is_none() => c,
        _ => return Err(AppError::not_found(COMMENT_NOT_FOUND)),
    };

    if comment.post_id != post_id {
        return Err(AppError::bad_request("Comment does not belong to the specified post"));
    }
    if action == CommentAction::Restore && comment.deleted_at.is_none() {
        return Err(AppError::bad_request("Comment is not deleted"));
    }
    if comment.user_id != user.id {
        return Err(AppError::forbidden(format!("Not authorized to {} this comment", action.verb())));
    }
    Ok(comment)
}

pub struct CommentService {
    pub db: Arc<DatabaseService>,
}

impl CommentService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create(&self, post_id: Uuid, user: &User, payload: CommentCreate) -> AppResult<CommentRead> {
        if self.db.get_post(post_id).await?.is_none() {
            return Err(AppError::not_found("Post not found"));
        }

        let comment = self.db.create_comment(post_id, user.id, &payload.content).await?;
        Ok(CommentRead::assemble(comment, UserRead::from(user)))
    }

    pub async fn update(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        user: &User,
        payload: CommentUpdate,
    ) -> AppResult<CommentRead> {
        let existing = self.db.get_comment_any(comment_id).await?;
        authorize(existing, post_id, user, CommentAction::Update)?;

        let updated = self
            .db
            .update_comment(comment_id, payload.content.as_deref())
            .await?
            .ok_or_else(|| AppError::not_found(COMMENT_NOT_FOUND))?;
        Ok(CommentRead::assemble(updated, UserRead::from(user)))
    }

    pub async fn delete(&self, post_id: Uuid, comment_id: Uuid, user: &User) -> AppResult<()> {
        let existing = self.db.get_comment_any(comment_id).await?;
        authorize(existing, post_id, user, CommentAction::Delete)?;

        self.db.soft_delete_comment(comment_id).await?;
        Ok(())
    }

    pub async fn restore(&self, post_id: Uuid, comment_id: Uuid, user: &User) -> AppResult<()> {
        let existing = self.db.get_comment_any(comment_id).await?;
        authorize(existing, post_id, user, CommentAction::Restore)?;

        self.db.restore_comment(comment_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "pilot@example.com".to_string(),
            hashed_password: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn comment(post_id: Uuid, user_id: Uuid, deleted: bool) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            content: "Smooth landing".to_string(),
            user_id,
            post_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: deleted.then(Utc::now),
        }
    }

    #[test]
    fn missing_or_deleted_comment_is_not_found() {
        let author = user();
        let post = Uuid::new_v4();
        assert!(matches!(
            authorize(None, post, &author, CommentAction::Update),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            authorize(Some(comment(post, author.id, true)), post, &author, CommentAction::Delete),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn comment_must_belong_to_path_post() {
        let author = user();
        let c = comment(Uuid::new_v4(), author.id, false);
        assert!(matches!(
            authorize(Some(c), Uuid::new_v4(), &author, CommentAction::Update),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn restore_requires_a_deleted_comment() {
        let author = user();
        let post = Uuid::new_v4();
        match authorize(Some(comment(post, author.id, false)), post, &author, CommentAction::Restore) {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Comment is not deleted"),
            other => panic!("unexpected: {:?}", other.map(|c| c.id)),
        }
        assert!(authorize(Some(comment(post, author.id, true)), post, &author, CommentAction::Restore).is_ok());
    }

    #[test]
    fn only_the_author_may_change_a_comment() {
        let author = user();
        let stranger = user();
        let post = Uuid::new_v4();
        match authorize(Some(comment(post, author.id, false)), post, &stranger, CommentAction::Delete) {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Not authorized to delete this comment"),
            other => panic!("unexpected: {:?}", other.map(|c| c.id)),
        }
        assert!(authorize(Some(comment(post, author.id, false)), post, &author, CommentAction::Update).is_ok());
    }
}
