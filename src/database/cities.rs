use std::collections::HashMap;
use tokio_postgres::Transaction;
use uuid::Uuid;

use super::{distinct_ids, is_unique_violation, DatabaseService};
use crate::error::AppResult;
use crate::models::city::{apply_new_rating, apply_rating_change};
use crate::models::{City, CityCreate, CityUpdate, Photo, PhotoBase, Review, ReviewCreate, ReviewUpdate};

const CITY_COLUMNS: &str = "id, name, country, description, latitude, longitude, average_rating, review_count, \
                            created_at, updated_at, deleted_at";
const PHOTO_COLUMNS: &str = "id, city_id, url, caption, position, created_at, updated_at";
const REVIEW_COLUMNS: &str = "id, city_id, user_id, rating, comment, created_at, updated_at";

/// Outcome of adding a review to a city
#[derive(Debug)]
pub enum ReviewInsert {
    CityNotFound,
    AlreadyReviewed,
    Created(Review),
}

impl DatabaseService {
    pub async fn count_cities(&self) -> AppResult<i64> {
        let client = self.get_client().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM cities WHERE deleted_at IS NULL", &[])
            .await?;
        Ok(row.get(0))
    }

    /// Live cities ordered by name
    pub async fn list_cities(&self, limit: i64, offset: i64) -> AppResult<Vec<City>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM cities WHERE deleted_at IS NULL ORDER BY name LIMIT $1 OFFSET $2",
                    CITY_COLUMNS
                ),
                &[&limit, &offset],
            )
            .await?;
        Ok(rows.iter().map(row_to_city).collect())
    }

    /// Get a city that has not been soft-deleted
    pub async fn get_city(&self, id: Uuid) -> AppResult<Option<City>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM cities WHERE id = $1 AND deleted_at IS NULL", CITY_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_city))
    }

    /// Cities by id regardless of deletion, for embedding into flights
    pub async fn get_cities_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, City>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let client = self.get_client().await?;
        let rows = client
            .query(&format!("SELECT {} FROM cities WHERE id = ANY($1)", CITY_COLUMNS), &[&ids])
            .await?;
        Ok(rows.iter().map(row_to_city).map(|c| (c.id, c)).collect())
    }

    /// Whether every id names a stored city (deleted ones included)
    pub async fn check_cities_exist(&self, ids: &[Uuid]) -> AppResult<bool> {
        let ids = distinct_ids(ids.iter().copied());
        if ids.is_empty() {
            return Ok(true);
        }
        let client = self.get_client().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM cities WHERE id = ANY($1)", &[&ids])
            .await?;
        let found: i64 = row.get(0);
        Ok(found == ids.len() as i64)
    }

    /// Name uniqueness spans deleted cities too, since the column is unique
    pub async fn city_name_taken(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM cities WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
                &[&name, &exclude],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Insert a city and its photos in one transaction
    pub async fn create_city(&self, city: &CityCreate) -> AppResult<(City, Vec<Photo>)> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                &format!(
                    "INSERT INTO cities (name, country, description, latitude, longitude) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING {}",
                    CITY_COLUMNS
                ),
                &[&city.name, &city.country, &city.description, &city.latitude, &city.longitude],
            )
            .await?;
        let created = row_to_city(&row);
        let photos = insert_photos(&tx, created.id, &city.photos).await?;

        tx.commit().await?;
        Ok((created, photos))
    }

    /// Apply a partial update to a live city. When `photos` is present the
    /// whole photo set is replaced in the same transaction.
    pub async fn update_city(&self, id: Uuid, update: &CityUpdate) -> AppResult<Option<City>> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let description = update.description.as_ref().and_then(|d| d.as_deref());
        let latitude = update.latitude.flatten();
        let longitude = update.longitude.flatten();

        let row = tx
            .query_opt(
                &format!(
                    "UPDATE cities SET \
                        name = COALESCE($2::varchar, name), \
                        country = COALESCE($3::varchar, country), \
                        description = CASE WHEN $4::bool THEN $5::varchar ELSE description END, \
                        latitude = CASE WHEN $6::bool THEN $7::float8 ELSE latitude END, \
                        longitude = CASE WHEN $8::bool THEN $9::float8 ELSE longitude END, \
                        updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NULL \
                     RETURNING {}",
                    CITY_COLUMNS
                ),
                &[
                    &id,
                    &update.name,
                    &update.country,
                    &update.description.is_some(),
                    &description,
                    &update.latitude.is_some(),
                    &latitude,
                    &update.longitude.is_some(),
                    &longitude,
                ],
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(photos) = &update.photos {
            tx.execute("DELETE FROM photos WHERE city_id = $1", &[&id]).await?;
            insert_photos(&tx, id, photos).await?;
        }

        tx.commit().await?;
        Ok(Some(row_to_city(&row)))
    }

    /// Soft delete; false when the city is missing or already deleted
    pub async fn soft_delete_city(&self, id: Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;
        let affected = client
            .execute(
                "UPDATE cities SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await?;
        Ok(affected == 1)
    }

    /// Clear the deletion mark; None unless the city was soft-deleted
    pub async fn restore_city(&self, id: Uuid) -> AppResult<Option<City>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE cities SET deleted_at = NULL, updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
                    CITY_COLUMNS
                ),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_city))
    }

    /// Live photos for the given cities in display order
    pub async fn photos_for_cities(&self, city_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Photo>>> {
        let mut grouped: HashMap<Uuid, Vec<Photo>> = HashMap::new();
        if city_ids.is_empty() {
            return Ok(grouped);
        }
        let client = self.get_client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM photos WHERE city_id = ANY($1) AND deleted_at IS NULL \
                     ORDER BY city_id, position, created_at",
                    PHOTO_COLUMNS
                ),
                &[&city_ids],
            )
            .await?;
        for photo in rows.iter().map(row_to_photo) {
            grouped.entry(photo.city_id).or_default().push(photo);
        }
        Ok(grouped)
    }

    /// Live reviews for the given cities, oldest first
    pub async fn reviews_for_cities(&self, city_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Review>>> {
        let mut grouped: HashMap<Uuid, Vec<Review>> = HashMap::new();
        if city_ids.is_empty() {
            return Ok(grouped);
        }
        let client = self.get_client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM reviews WHERE city_id = ANY($1) AND deleted_at IS NULL \
                     ORDER BY city_id, created_at",
                    REVIEW_COLUMNS
                ),
                &[&city_ids],
            )
            .await?;
        for review in rows.iter().map(row_to_review) {
            grouped.entry(review.city_id).or_default().push(review);
        }
        Ok(grouped)
    }

    /// Add a review and fold its rating into the city's aggregates. The city
    /// row is locked for the duration so concurrent reviews can't lose updates.
    pub async fn create_review(&self, city_id: Uuid, user_id: Uuid, review: &ReviewCreate) -> AppResult<ReviewInsert> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let Some(city) = tx
            .query_opt(
                "SELECT average_rating, review_count FROM cities \
                 WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
                &[&city_id],
            )
            .await?
        else {
            return Ok(ReviewInsert::CityNotFound);
        };

        let existing = tx
            .query_opt(
                "SELECT 1 FROM reviews WHERE city_id = $1 AND user_id = $2",
                &[&city_id, &user_id],
            )
            .await?;
        if existing.is_some() {
            return Ok(ReviewInsert::AlreadyReviewed);
        }

        let inserted = tx
            .query_one(
                &format!(
                    "INSERT INTO reviews (city_id, user_id, rating, comment) VALUES ($1, $2, $3, $4) RETURNING {}",
                    REVIEW_COLUMNS
                ),
                &[&city_id, &user_id, &review.rating, &review.comment],
            )
            .await;
        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(ReviewInsert::AlreadyReviewed),
            Err(err) => return Err(err.into()),
        };

        let (average, count) = apply_new_rating(city.get(0), city.get(1), review.rating);
        tx.execute(
            "UPDATE cities SET average_rating = $2, review_count = $3, updated_at = NOW() WHERE id = $1",
            &[&city_id, &average, &count],
        )
        .await?;

        tx.commit().await?;
        Ok(ReviewInsert::Created(row_to_review(&row)))
    }

    /// Update the caller's own review on a city; None when no such review
    pub async fn update_review(
        &self,
        city_id: Uuid,
        review_id: Uuid,
        user_id: Uuid,
        update: &ReviewUpdate,
    ) -> AppResult<Option<Review>> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let city = tx
            .query_opt(
                "SELECT average_rating, review_count FROM cities WHERE id = $1 FOR UPDATE",
                &[&city_id],
            )
            .await?;
        let Some(city) = city else {
            return Ok(None);
        };

        let current = tx
            .query_opt(
                &format!(
                    "SELECT {} FROM reviews \
                     WHERE id = $1 AND city_id = $2 AND user_id = $3 AND deleted_at IS NULL FOR UPDATE",
                    REVIEW_COLUMNS
                ),
                &[&review_id, &city_id, &user_id],
            )
            .await?;
        let Some(current) = current.as_ref().map(row_to_review) else {
            return Ok(None);
        };

        let rating = update.rating.unwrap_or(current.rating);
        let row = tx
            .query_one(
                &format!(
                    "UPDATE reviews SET rating = $2, comment = COALESCE($3::varchar, comment), updated_at = NOW() \
                     WHERE id = $1 RETURNING {}",
                    REVIEW_COLUMNS
                ),
                &[&review_id, &rating, &update.comment],
            )
            .await?;

        if rating != current.rating {
            let average = apply_rating_change(city.get(0), city.get(1), current.rating, rating);
            tx.execute(
                "UPDATE cities SET average_rating = $2, updated_at = NOW() WHERE id = $1",
                &[&city_id, &average],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(row_to_review(&row)))
    }
}

async fn insert_photos(tx: &Transaction<'_>, city_id: Uuid, photos: &[PhotoBase]) -> Result<Vec<Photo>, tokio_postgres::Error> {
    let statement = tx
        .prepare(&format!(
            "INSERT INTO photos (city_id, url, caption, position) VALUES ($1, $2, $3, $4) RETURNING {}",
            PHOTO_COLUMNS
        ))
        .await?;

    let mut created = Vec::with_capacity(photos.len());
    for photo in photos {
        let row = tx
            .query_one(&statement, &[&city_id, &photo.url, &photo.caption, &photo.position])
            .await?;
        created.push(row_to_photo(&row));
    }
    created.sort_by_key(|p| p.position);
    Ok(created)
}

fn row_to_city(row: &tokio_postgres::Row) -> City {
    City {
        id: row.get(0),
        name: row.get(1),
        country: row.get(2),
        description: row.get(3),
        latitude: row.get(4),
        longitude: row.get(5),
        average_rating: row.get(6),
        review_count: row.get(7),
        created_at: row.get(8),
        updated_at: row.get(9),
        deleted_at: row.get(10),
    }
}

fn row_to_photo(row: &tokio_postgres::Row) -> Photo {
    Photo {
        id: row.get(0),
        city_id: row.get(1),
        url: row.get(2),
        caption: row.get(3),
        position: row.get(4),
        created_at: row.get(5),
        updated_at: row.get(6),
    }
}

fn row_to_review(row: &tokio_postgres::Row) -> Review {
    Review {
        id: row.get(0),
        city_id: row.get(1),
        user_id: row.get(2),
        rating: row.get(3),
        comment: row.get(4),
        created_at: row.get(5),
        updated_at: row.get(6),
    }
}
