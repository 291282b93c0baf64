//! End-to-end service flow against a live Postgres. Skipped when
//! `DATABASE_URL` is not set.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use flights_posting_api::auth::AuthService;
use flights_posting_api::config::{AuthConfig, DatabaseConfig};
use flights_posting_api::database::DatabaseService;
use flights_posting_api::error::AppError;
use flights_posting_api::models::{
    CityCreate, CityUpdate, CommentCreate, CommentUpdate, FlightCreate, FlightStatus, PageParams, PhotoBase,
    PostCreate, PostFilter, PostUpdate, ReviewCreate, ReviewUpdate, User, UserCreate,
};
use flights_posting_api::services::{CityService, CommentService, FlightService, PostService, UserService};

// Tests run in parallel; the schema is applied once per test binary
static SCHEMA_READY: tokio::sync::Mutex<bool> = tokio::sync::Mutex::const_new(false);

struct Services {
    users: UserService,
    cities: CityService,
    flights: FlightService,
    posts: PostService,
    comments: CommentService,
}

async fn services() -> Option<Services> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Skipping test: DATABASE_URL not set");
            return None;
        }
    };

    let db = DatabaseService::new(&DatabaseConfig { url, max_connections: 4 })
        .await
        .expect("db init");
    {
        let mut ready = SCHEMA_READY.lock().await;
        if !*ready {
            db.init_schema().await.expect("init schema");
            *ready = true;
        }
    }
    let db = Arc::new(db);

    let auth = Arc::new(
        AuthService::new(AuthConfig {
            algorithm: "HS256".to_string(),
            private_key_path: None,
            public_key_path: None,
            jwt_secret: Some("flow-test-secret".to_string()),
            access_token_expire_minutes: 30,
            refresh_token_expire_minutes: 60,
            bcrypt_cost: 4,
        })
        .expect("auth"),
    );

    Some(Services {
        users: UserService::new(Arc::clone(&db), Arc::clone(&auth)),
        cities: CityService::new(Arc::clone(&db)),
        flights: FlightService::new(Arc::clone(&db)),
        posts: PostService::new(Arc::clone(&db)),
        comments: CommentService::new(db),
    })
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..10])
}

async fn register(s: &Services) -> User {
    let email = format!("{}@example.com", unique("flow"));
    let resp = s
        .users
        .register(UserCreate {
            email: email.clone(),
            password: "TestPass123".to_string(),
        })
        .await
        .expect("register");
    assert_eq!(resp.user.email, email);

    let claims = s.users.auth.verify_access(&resp.token.access_token).expect("claims");
    s.users.current_user(&claims).await.expect("current user")
}

fn city(name: &str) -> CityCreate {
    CityCreate {
        name: name.to_string(),
        country: "Peru".to_string(),
        description: Some("Coastal capital".to_string()),
        latitude: Some(-12.05),
        longitude: Some(-77.04),
        photos: vec![
            PhotoBase {
                url: "https://img.example.com/2.jpg".to_string(),
                caption: None,
                position: 2,
            },
            PhotoBase {
                url: "https://img.example.com/1.jpg".to_string(),
                caption: Some("Plaza".to_string()),
                position: 1,
            },
        ],
    }
}

#[tokio::test]
async fn accounts_register_login_and_refresh() {
    let Some(s) = services().await else { return };

    let email = format!("{}@example.com", unique("acct"));
    s.users
        .register(UserCreate {
            email: email.clone(),
            password: "TestPass123".to_string(),
        })
        .await
        .expect("register");

    let dup = s
        .users
        .register(UserCreate {
            email: email.clone(),
            password: "TestPass123".to_string(),
        })
        .await;
    assert!(matches!(dup, Err(AppError::BadRequest(_))));

    let bad = s.users.login(&email, "WrongPass999").await;
    assert!(matches!(bad, Err(AppError::Unauthorized(m)) if m == "Incorrect email or password"));

    let login = s.users.login(&email, "TestPass123").await.expect("login");
    let refresh = login.token.refresh_token.expect("refresh token");
    let renewed = s.users.refresh(&refresh).await.expect("refresh");
    assert_eq!(renewed.token_type, "bearer");

    // An access token is not accepted where a refresh token is expected
    assert!(s.users.refresh(&login.token.access_token).await.is_err());
}

#[tokio::test]
async fn cities_reviews_and_soft_delete() {
    let Some(s) = services().await else { return };
    let alice = register(&s).await;
    let bob = register(&s).await;

    let name = unique("Lima");
    let created = s.cities.create(city(&name)).await.expect("create city");
    let positions: Vec<i32> = created.photos.iter().map(|p| p.position).collect();
    assert_eq!(positions, vec![1, 2]);
    assert_eq!(created.review_count, 0);

    assert!(matches!(s.cities.create(city(&name)).await, Err(AppError::BadRequest(_))));

    let first = s
        .cities
        .add_review(created.id, &alice, ReviewCreate { rating: 4, comment: None })
        .await
        .expect("review");
    s.cities
        .add_review(created.id, &bob, ReviewCreate { rating: 2, comment: Some("Grey".into()) })
        .await
        .expect("second review");

    let again = s
        .cities
        .add_review(created.id, &alice, ReviewCreate { rating: 5, comment: None })
        .await;
    assert!(matches!(again, Err(AppError::BadRequest(m)) if m == "You have already reviewed this city"));

    let city = s.cities.get(created.id).await.expect("get");
    assert_eq!(city.review_count, 2);
    assert!((city.average_rating.unwrap() - 3.0).abs() < 1e-9);

    // Only the author may edit; a rating change moves the average by (new-old)/count
    let stranger = s
        .cities
        .update_review(created.id, first.id, &bob, ReviewUpdate { rating: Some(1), comment: None })
        .await;
    assert!(matches!(stranger, Err(AppError::NotFound(_))));
    s.cities
        .update_review(created.id, first.id, &alice, ReviewUpdate { rating: Some(5), comment: None })
        .await
        .expect("update review");
    let city = s.cities.get(created.id).await.expect("get");
    assert!((city.average_rating.unwrap() - 3.5).abs() < 1e-9);
    assert_eq!(city.review_count, 2);

    let updated = s
        .cities
        .update(
            created.id,
            CityUpdate {
                description: Some(None),
                photos: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .expect("update city");
    assert!(updated.description.is_none());
    assert!(updated.photos.is_empty());
    assert_eq!(updated.latitude, Some(-12.05));

    s.cities.delete(created.id).await.expect("delete");
    assert!(matches!(s.cities.get(created.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(s.cities.delete(created.id).await, Err(AppError::NotFound(_))));

    let restored = s.cities.restore(created.id).await.expect("restore");
    assert!(restored.deleted_at.is_none());
    assert!(matches!(s.cities.restore(created.id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn flights_posts_likes_and_comments() {
    let Some(s) = services().await else { return };
    let author = register(&s).await;
    let reader = register(&s).await;

    let origin = s.cities.create(city(&unique("Cusco"))).await.expect("origin");
    let destination = s.cities.create(city(&unique("Quito"))).await.expect("destination");

    let departure = Utc::now() + Duration::days(3);
    let flight_number = unique("LA");
    let flight_payload = || FlightCreate {
        flight_number: flight_number.clone(),
        airline: "LATAM".to_string(),
        description: None,
        origin_city_id: origin.id,
        destination_city_id: destination.id,
        status: FlightStatus::default(),
        departure,
        arrival: departure + Duration::hours(2),
    };

    let flight = s.flights.create(flight_payload()).await.expect("flight");
    assert_eq!(flight.status, FlightStatus::Scheduled);
    assert_eq!(flight.origin.id, origin.id);
    assert!(matches!(s.flights.create(flight_payload()).await, Err(AppError::BadRequest(_))));

    let missing_city = FlightCreate {
        flight_number: unique("XX"),
        origin_city_id: Uuid::new_v4(),
        ..flight_payload()
    };
    assert!(matches!(s.flights.create(missing_city).await, Err(AppError::NotFound(_))));

    let title = unique("Window seat");
    let post = s
        .posts
        .create(
            &author,
            PostCreate {
                title: title.clone(),
                description: "Andes all the way".to_string(),
                flight_id: flight.id,
            },
        )
        .await
        .expect("post");
    assert_eq!(post.author.id, author.id);
    assert_eq!(post.flight.destination.id, destination.id);

    let found = s
        .posts
        .list(
            &PageParams::default(),
            &PostFilter {
                q: Some(title.to_uppercase()),
                ..Default::default()
            },
        )
        .await
        .expect("search");
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].id, post.id);

    let forbidden = s
        .posts
        .update(post.id, &reader, PostUpdate { title: Some("Hijack".into()), description: None })
        .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden(m)) if m == "Not authorized to update this post"));

    let liked = s.posts.toggle_like(post.id, &reader).await.expect("like");
    assert_eq!(liked.like_count, 1);
    let unliked = s.posts.toggle_like(post.id, &reader).await.expect("unlike");
    assert_eq!(unliked.like_count, 0);

    let comment = s
        .comments
        .create(post.id, &reader, CommentCreate { content: "Nice view".into() })
        .await
        .expect("comment");
    assert_eq!(comment.author.id, reader.id);

    let edit = s
        .comments
        .update(post.id, comment.id, &author, CommentUpdate { content: Some("Mine now".into()) })
        .await;
    assert!(matches!(edit, Err(AppError::Forbidden(_))));

    let wrong_post = s.comments.delete(Uuid::new_v4(), comment.id, &reader).await;
    assert!(matches!(wrong_post, Err(AppError::BadRequest(m)) if m == "Comment does not belong to the specified post"));

    let not_deleted = s.comments.restore(post.id, comment.id, &reader).await;
    assert!(matches!(not_deleted, Err(AppError::BadRequest(m)) if m == "Comment is not deleted"));

    s.comments.delete(post.id, comment.id, &reader).await.expect("delete comment");
    assert!(s.posts.get(post.id).await.expect("get post").comments.is_empty());

    s.comments.restore(post.id, comment.id, &reader).await.expect("restore comment");
    assert_eq!(s.posts.get(post.id).await.expect("get post").comments.len(), 1);

    s.posts.delete(post.id, &author).await.expect("delete post");
    assert!(matches!(s.posts.get(post.id).await, Err(AppError::NotFound(_))));
    let restored = s.posts.restore(post.id, &author).await.expect("restore post");
    assert_eq!(restored.id, post.id);

    s.flights.delete(flight.id).await.expect("delete flight");
    assert!(matches!(s.flights.get(flight.id).await, Err(AppError::NotFound(_))));
    s.flights.restore(flight.id).await.expect("restore flight");
}
