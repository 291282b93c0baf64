use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::deserialize_some;

/// Stored city (or other place) travellers can review
#[derive(Debug, Clone)]
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub average_rating: Option<f64>,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Photo {
    pub id: Uuid,
    pub city_id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Review {
    pub id: Uuid,
    pub city_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Photo payload accepted on city create/update
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhotoBase {
    #[validate(length(min = 1, max = 500, message = "Photo url must be 1-500 characters"))]
    pub url: String,

    #[validate(length(max = 200, message = "Photo caption must be at most 200 characters"))]
    pub caption: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Photo position must be greater than or equal to 0"))]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CityCreate {
    #[validate(length(min = 1, max = 100, message = "City name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Country must be 1-100 characters"))]
    pub country: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[serde(default)]
    pub photos: Vec<PhotoBase>,
}

/// Partial city update; absent fields are left untouched and nullable
/// fields may be cleared with an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CityUpdate {
    #[validate(length(min = 1, max = 100, message = "City name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Country must be 1-100 characters"))]
    pub country: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub latitude: Option<Option<f64>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub longitude: Option<Option<f64>>,

    /// When present, replaces the city's whole photo set
    pub photos: Option<Vec<PhotoBase>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRead {
    pub id: Uuid,
    pub city_id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub position: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewCreate {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewUpdate {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRead {
    pub id: Uuid,
    pub city_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityRead {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub average_rating: Option<f64>,
    pub review_count: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reviews: Vec<ReviewRead>,
    pub photos: Vec<PhotoRead>,
}

impl From<&Photo> for PhotoRead {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            city_id: photo.city_id,
            url: photo.url.clone(),
            caption: photo.caption.clone(),
            position: photo.position,
            created_at: Some(photo.created_at),
            updated_at: Some(photo.updated_at),
        }
    }
}

impl From<&Review> for ReviewRead {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id,
            city_id: review.city_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Some(review.created_at),
            updated_at: Some(review.updated_at),
        }
    }
}

impl CityRead {
    /// Assemble the read model; `photos` are expected in display order
    pub fn assemble(city: City, photos: &[Photo], reviews: &[Review]) -> Self {
        Self {
            id: city.id,
            name: city.name,
            country: city.country,
            description: city.description,
            latitude: city.latitude,
            longitude: city.longitude,
            average_rating: city.average_rating,
            review_count: city.review_count,
            created_at: Some(city.created_at),
            updated_at: Some(city.updated_at),
            deleted_at: city.deleted_at,
            reviews: reviews.iter().map(ReviewRead::from).collect(),
            photos: photos.iter().map(PhotoRead::from).collect(),
        }
    }
}

/// Fold one more rating into a running average, returning the new
/// `(average, count)` pair.
pub fn apply_new_rating(average: Option<f64>, count: i32, rating: i32) -> (f64, i32) {
    let count = count.max(0);
    let total = average.unwrap_or(0.0) * count as f64 + rating as f64;
    let new_count = count + 1;
    (total / new_count as f64, new_count)
}

/// Replace one rating inside a running average; the count is unchanged
pub fn apply_rating_change(average: Option<f64>, count: i32, old_rating: i32, new_rating: i32) -> f64 {
    let average = average.unwrap_or(0.0);
    if count <= 0 {
        return average;
    }
    let total = average * count as f64 - old_rating as f64 + new_rating as f64;
    total / count as f64
}
