use std::sync::Arc;
use uuid::Uuid;

use crate::database::{is_unique_violation, DatabaseService, ReviewInsert};
use crate::error::{AppError, AppResult};
use crate::models::{City, CityCreate, CityRead, CityUpdate, Page, PageParams, ReviewCreate, ReviewRead, ReviewUpdate, User};

const CITY_NOT_FOUND: &str = "City not found";
const DUPLICATE_NAME: &str = "City with this name already exists";

/// Attach photos and reviews to a batch of cities with two queries total
pub(crate) async fn load_city_reads(db: &DatabaseService, cities: Vec<City>) -> AppResult<Vec<CityRead>> {
    let ids: Vec<Uuid> = cities.iter().map(|c| c.id).collect();
    let mut photos = db.photos_for_cities(&ids).await?;
    let mut reviews = db.reviews_for_cities(&ids).await?;

    Ok(cities
        .into_iter()
        .map(|city| {
            let city_photos = photos.remove(&city.id).unwrap_or_default();
            let city_reviews = reviews.remove(&city.id).unwrap_or_default();
            CityRead::assemble(city, &city_photos, &city_reviews)
        })
        .collect())
}

pub struct CityService {
    pub db: Arc<DatabaseService>,
}

impl CityService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn list(&self, params: &PageParams) -> AppResult<Page<CityRead>> {
        let total = self.db.count_cities().await?;
        let cities = self.db.list_cities(params.limit(), params.offset()).await?;
        let items = load_city_reads(&self.db, cities).await?;
        Ok(Page::new(items, total, params))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<CityRead> {
        let city = self.live_city(id).await?;
        self.read_one(city).await
    }

    pub async fn create(&self, payload: CityCreate) -> AppResult<CityRead> {
        if self.db.city_name_taken(&payload.name, None).await? {
            return Err(AppError::bad_request(DUPLICATE_NAME));
        }

        let (city, _) = match self.db.create_city(&payload).await {
            Ok(created) => created,
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::bad_request(DUPLICATE_NAME));
            }
            Err(err) => return Err(err),
        };

        log::info!("City {} created ({})", city.name, city.id);
        self.read_one(city).await
    }

    pub async fn update(&self, id: Uuid, payload: CityUpdate) -> AppResult<CityRead> {
        let current = self.live_city(id).await?;

        if let Some(name) = payload.name.as_deref() {
            if name != current.name && self.db.city_name_taken(name, Some(id)).await? {
                return Err(AppError::bad_request(DUPLICATE_NAME));
            }
        }

        let updated = match self.db.update_city(id, &payload).await {
            Ok(Some(city)) => city,
            Ok(None) => return Err(AppError::not_found(CITY_NOT_FOUND)),
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::bad_request(DUPLICATE_NAME));
            }
            Err(err) => return Err(err),
        };
        self.read_one(updated).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.db.soft_delete_city(id).await? {
            return Err(AppError::not_found(CITY_NOT_FOUND));
        }
        log::info!("City {} soft-deleted", id);
        Ok(())
    }

    pub async fn restore(&self, id: Uuid) -> AppResult<CityRead> {
        let city = self
            .db
            .restore_city(id)
            .await?
            .ok_or_else(|| AppError::not_found("City not found or was not deleted"))?;
        self.read_one(city).await
    }

    pub async fn add_review(&self, city_id: Uuid, user: &User, payload: ReviewCreate) -> AppResult<ReviewRead> {
        match self.db.create_review(city_id, user.id, &payload).await? {
            ReviewInsert::Created(review) => Ok(ReviewRead::from(&review)),
            ReviewInsert::CityNotFound => Err(AppError::not_found(CITY_NOT_FOUND)),
            ReviewInsert::AlreadyReviewed => Err(AppError::bad_request("You have already reviewed this city")),
        }
    }

    /// Reviews can only be changed by their author and only through the city they belong to
    pub async fn update_review(
        &self,
        city_id: Uuid,
        review_id: Uuid,
        user: &User,
        payload: ReviewUpdate,
    ) -> AppResult<ReviewRead> {
        let review = self
            .db
            .update_review(city_id, review_id, user.id, &payload)
            .await?
            .ok_or_else(|| AppError::not_found("Review not found"))?;
        Ok(ReviewRead::from(&review))
    }

    async fn live_city(&self, id: Uuid) -> AppResult<City> {
        self.db
            .get_city(id)
            .await?
            .ok_or_else(|| AppError::not_found(CITY_NOT_FOUND))
    }

    async fn read_one(&self, city: City) -> AppResult<CityRead> {
        load_city_reads(&self.db, vec![city])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("city vanished while loading".to_string()))
    }
}
