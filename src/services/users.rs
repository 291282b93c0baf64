use std::sync::Arc;

use crate::auth::{AuthService, Claims};
use crate::database::{is_unique_violation, DatabaseService};
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, Token, User, UserCreate, UserOut};
use crate::utils::mask_sensitive;

const DUPLICATE_EMAIL: &str = "An account with this email already exists.";
const BAD_CREDENTIALS: &str = "Incorrect email or password";

/// Accounts and token issuance
pub struct UserService {
    pub db: Arc<DatabaseService>,
    pub auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseService>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    /// Register a new user and sign them in
    pub async fn register(&self, req: UserCreate) -> AppResult<AuthResponse> {
        if self.db.get_user_by_email(&req.email).await?.is_some() {
            return Err(AppError::bad_request(DUPLICATE_EMAIL));
        }

        let hashed = self.hash_password(req.password).await?;
        let user = match self.db.create_user(&req.email, &hashed).await {
            Ok(user) => user,
            // lost a race with a concurrent registration
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::bad_request(DUPLICATE_EMAIL));
            }
            Err(err) => return Err(err),
        };

        log::info!("Registered user {}", mask_sensitive(&user.email));
        self.auth_response(&user)
    }

    /// Check email and password and return a fresh token pair with the user
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let user = self.authenticate(email, password).await?;
        self.auth_response(&user)
    }

    /// OAuth2 password-grant variant of login; only the token is returned
    pub async fn issue_token(&self, username: &str, password: &str) -> AppResult<Token> {
        let user = self.authenticate(username, password).await?;
        Ok(self.auth.issue_tokens(&user.email)?)
    }

    /// Exchange a refresh token for a new pair
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<Token> {
        let claims = self
            .auth
            .verify_refresh(refresh_token)
            .map_err(|_| AppError::invalid_credentials())?;
        let user = self.current_user(&claims).await?;
        Ok(self.auth.issue_tokens(&user.email)?)
    }

    /// Resolve verified access claims to the stored account
    pub async fn current_user(&self, claims: &Claims) -> AppResult<User> {
        self.db
            .get_user_by_email(&claims.sub)
            .await?
            .ok_or_else(AppError::invalid_credentials)
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let Some(user) = self.db.get_user_by_email(email).await? else {
            log::warn!("Login attempt for unknown account {}", mask_sensitive(email));
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        };

        if !self.verify_password(password.to_string(), user.hashed_password.clone()).await? {
            log::warn!("Failed login for {}", mask_sensitive(email));
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }

        Ok(user)
    }

    fn auth_response(&self, user: &User) -> AppResult<AuthResponse> {
        Ok(AuthResponse {
            token: self.auth.issue_tokens(&user.email)?,
            user: UserOut::from(user),
        })
    }

    // bcrypt is CPU bound; keep it off the async workers
    async fn hash_password(&self, password: String) -> AppResult<String> {
        let auth = Arc::clone(&self.auth);
        tokio::task::spawn_blocking(move || auth.hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(AppError::from)
    }

    async fn verify_password(&self, password: String, hash: String) -> AppResult<bool> {
        let auth = Arc::clone(&self.auth);
        tokio::task::spawn_blocking(move || auth.verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("password check task failed: {}", e)))?
            .map_err(AppError::from)
    }
}
