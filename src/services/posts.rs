use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::flights::load_flight_reads;
use crate::database::{distinct_ids, DatabaseService};
use crate::error::{AppError, AppResult};
use crate::models::{
    CommentRead, FlightRead, Page, PageParams, Post, PostCreate, PostFilter, PostRead, PostUpdate, User, UserRead,
};

const POST_NOT_FOUND: &str = "Post not found";

/// Expand author, flight and live comments (with their authors) for a batch of posts
pub(crate) async fn load_post_reads(db: &DatabaseService, posts: Vec<Post>) -> AppResult<Vec<PostRead>> {
    let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let mut comments = db.comments_for_posts(&post_ids).await?;

    let user_ids = distinct_ids(
        posts
            .iter()
            .map(|p| p.user_id)
            .chain(comments.values().flatten().map(|c| c.user_id)),
    );
    let users = db.get_users_by_ids(&user_ids).await?;

    let flight_ids = distinct_ids(posts.iter().map(|p| p.flight_id));
    let flights = db.get_flights_by_ids(&flight_ids).await?;
    let flights: HashMap<Uuid, FlightRead> = load_flight_reads(db, flights.into_values().collect())
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    let mut reads = Vec::with_capacity(posts.len());
    for post in posts {
        let author = author_for(&users, post.user_id)?;
        let flight = flights
            .get(&post.flight_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("post {} references missing flight", post.id)))?;
        let post_comments = comments
            .remove(&post.id)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let author = author_for(&users, c.user_id)?;
                Ok(CommentRead::assemble(c, author))
            })
            .collect::<AppResult<Vec<_>>>()?;
        reads.push(PostRead::assemble(post, author, flight, post_comments));
    }
    Ok(reads)
}

fn author_for(users: &HashMap<Uuid, User>, id: Uuid) -> AppResult<UserRead> {
    users
        .get(&id)
        .map(UserRead::from)
        .ok_or_else(|| AppError::Internal(format!("missing author {}", id)))
}

pub struct PostService {
    pub db: Arc<DatabaseService>,
}

impl PostService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create(&self, user: &User, payload: PostCreate) -> AppResult<PostRead> {
        if self.db.get_flight(payload.flight_id).await?.is_none() {
            return Err(AppError::not_found(format!("Flight with ID {} not found.", payload.flight_id)));
        }

        let post = self.db.create_post(user.id, &payload).await?;
        log::info!("Post {} created on flight {}", post.id, post.flight_id);
        self.read_one(post).await
    }

    pub async fn list(&self, params: &PageParams, filter: &PostFilter) -> AppResult<Page<PostRead>> {
        let total = self.db.count_posts(filter).await?;
        let posts = self.db.list_posts(filter, params.limit(), params.offset()).await?;
        let items = load_post_reads(&self.db, posts).await?;
        Ok(Page::new(items, total, params))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PostRead> {
        let post = self.live_post(id).await?;
        self.read_one(post).await
    }

    pub async fn update(&self, id: Uuid, user: &User, payload: PostUpdate) -> AppResult<PostRead> {
        let post = self.live_post(id).await?;
        if post.user_id != user.id {
            return Err(AppError::forbidden("Not authorized to update this post"));
        }

        let updated = self
            .db
            .update_post(id, &payload)
            .await?
            .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;
        self.read_one(updated).await
    }

    pub async fn delete(&self, id: Uuid, user: &User) -> AppResult<()> {
        let post = self.live_post(id).await?;
        if post.user_id != user.id {
            return Err(AppError::forbidden("Not authorized to delete this post"));
        }

        self.db.soft_delete_post(id).await?;
        log::info!("Post {} soft-deleted", id);
        Ok(())
    }

    pub async fn restore(&self, id: Uuid, user: &User) -> AppResult<PostRead> {
        let not_restorable = || AppError::not_found("Post not found or was not deleted");

        let post = self.db.get_post_any(id).await?.ok_or_else(not_restorable)?;
        if post.deleted_at.is_none() {
            return Err(not_restorable());
        }
        if post.user_id != user.id {
            return Err(AppError::forbidden("Not authorized to restore this post"));
        }

        let restored = self.db.restore_post(id).await?.ok_or_else(not_restorable)?;
        self.read_one(restored).await
    }

    /// Like the post, or remove the caller's existing like
    pub async fn toggle_like(&self, id: Uuid, user: &User) -> AppResult<PostRead> {
        let (post, liked) = self
            .db
            .toggle_like(id, user.id)
            .await?
            .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;

        log::debug!("User {} {} post {}", user.id, if liked { "liked" } else { "unliked" }, id);
        self.read_one(post).await
    }

    async fn live_post(&self, id: Uuid) -> AppResult<Post> {
        self.db
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))
    }

    async fn read_one(&self, post: Post) -> AppResult<PostRead> {
        load_post_reads(&self.db, vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("post vanished while loading".to_string()))
    }
}
