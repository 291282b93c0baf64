use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    Error, HttpMessage, HttpResponse, ResponseError,
};

use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{extract_token_from_request, AuthService, RateLimitStore};
use crate::error::AppError;
use crate::utils::logging::log_request;

/// Reads never need a token; writes outside `/auth` do.
fn requires_auth(method: &Method, path: &str) -> bool {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return false;
    }
    !(path == "/auth" || path.starts_with("/auth/"))
}

/// Authentication middleware
pub struct AuthMiddleware {
    pub auth_service: Arc<AuthService>,
}

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Arc::new(service),
            auth_service: Arc::clone(&self.auth_service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    auth_service: Arc<AuthService>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let auth_service = Arc::clone(&self.auth_service);

        Box::pin(async move {
            if !requires_auth(req.method(), req.path()) {
                return service.call(req).await;
            }

            let token = match extract_token_from_request(&req) {
                Some(token) => token,
                None => {
                    log::debug!("Rejected {} {}: missing token", req.method(), req.path());
                    let response = AppError::invalid_credentials().error_response();
                    return Ok(req.into_response(response));
                }
            };

            match auth_service.verify_access(&token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await
                }
                Err(e) => {
                    log::debug!("Rejected {} {}: {}", req.method(), req.path(), e);
                    let response = AppError::invalid_credentials().error_response();
                    Ok(req.into_response(response))
                }
            }
        })
    }
}

/// CORS middleware. An empty origin list or `*` admits every origin.
pub struct CorsMiddleware {
    pub allowed_origins: Vec<String>,
}

impl CorsMiddleware {
    /// Production honours the configured origins; every other status allows any origin
    pub fn for_status(is_production: bool, allowed_origins: &[String]) -> Self {
        let allowed_origins = if is_production {
            allowed_origins.to_vec()
        } else {
            vec!["*".to_string()]
        };
        Self { allowed_origins }
    }
}

fn origin_allowed(allowed_origins: &[String], origin: &str) -> bool {
    allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*" || o == origin)
}

fn apply_cors_headers(headers: &mut header::HeaderMap, origin: Option<header::HeaderValue>) {
    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::VARY, header::HeaderValue::from_static("Origin"));
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        header::HeaderValue::from_static("true"),
    );
}

impl<S> Transform<S, ServiceRequest> for CorsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorsMiddlewareService {
            service: Arc::new(service),
            allowed_origins: Arc::new(self.allowed_origins.clone()),
        }))
    }
}

pub struct CorsMiddlewareService<S> {
    service: Arc<S>,
    allowed_origins: Arc<Vec<String>>,
}

impl<S> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let allowed_origins = Arc::clone(&self.allowed_origins);

        Box::pin(async move {
            // Credentials rule out a literal `*`, so the request origin is echoed
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .filter(|o| o.to_str().map(|o| origin_allowed(&allowed_origins, o)).unwrap_or(false))
                .cloned();

            let is_preflight = *req.method() == Method::OPTIONS
                && req.headers().contains_key(header::ORIGIN)
                && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
            if is_preflight {
                if origin.is_none() {
                    let response = HttpResponse::BadRequest()
                        .content_type("text/plain; charset=utf-8")
                        .body("Disallowed CORS origin");
                    return Ok(req.into_response(response));
                }
                let mut response = HttpResponse::Ok().finish();
                apply_cors_headers(response.headers_mut(), origin);
                return Ok(req.into_response(response));
            }

            let mut res = service.call(req).await?;
            apply_cors_headers(res.headers_mut(), origin);
            Ok(res)
        })
    }
}

/// Rejects requests whose `Host` header is not listed
pub struct TrustedHostMiddleware {
    pub allowed_hosts: Vec<String>,
}

impl TrustedHostMiddleware {
    /// Host checks only apply in production
    pub fn for_status(is_production: bool, allowed_hosts: &[String]) -> Self {
        let allowed_hosts = if is_production {
            allowed_hosts.to_vec()
        } else {
            vec!["*".to_string()]
        };
        Self { allowed_hosts }
    }
}

/// Exact match, `*`, or a `*.domain` suffix pattern. Any port is ignored.
pub fn host_allowed(allowed_hosts: &[String], host: &str) -> bool {
    let host = host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host);
    allowed_hosts.iter().any(|pattern| {
        if pattern == "*" {
            return true;
        }
        match pattern.strip_prefix("*.") {
            Some(domain) => host.ends_with(&format!(".{}", domain)),
            None => pattern.eq_ignore_ascii_case(host),
        }
    })
}

impl<S> Transform<S, ServiceRequest> for TrustedHostMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = TrustedHostMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TrustedHostMiddlewareService {
            service: Arc::new(service),
            allowed_hosts: Arc::new(self.allowed_hosts.clone()),
        }))
    }
}

pub struct TrustedHostMiddlewareService<S> {
    service: Arc<S>,
    allowed_hosts: Arc<Vec<String>>,
}

impl<S> Service<ServiceRequest> for TrustedHostMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let allowed_hosts = Arc::clone(&self.allowed_hosts);

        Box::pin(async move {
            let host = req
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string();

            if !host_allowed(&allowed_hosts, &host) {
                log::warn!("Rejected request for untrusted host '{}'", host);
                let response = AppError::bad_request("Invalid host header").error_response();
                return Ok(req.into_response(response));
            }

            service.call(req).await
        })
    }
}

/// Rate limiting middleware
pub struct RateLimitMiddleware {
    pub store: Arc<Mutex<RateLimitStore>>,
    pub max_requests: u32,
    pub window_seconds: u64,
    pub auth_service: Option<Arc<AuthService>>,
}

impl<S> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Arc::new(service),
            store: Arc::clone(&self.store),
            max_requests: self.max_requests,
            window_seconds: self.window_seconds,
            auth_service: self.auth_service.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Arc<S>,
    store: Arc<Mutex<RateLimitStore>>,
    max_requests: u32,
    window_seconds: u64,
    auth_service: Option<Arc<AuthService>>,
}

/// Authenticated callers are keyed by account, everyone else by peer address.
fn rate_limit_key(ip: &str, token: Option<&str>, auth_service: Option<&AuthService>) -> String {
    let user = token
        .zip(auth_service)
        .and_then(|(token, auth)| auth.verify_access(token).ok())
        .map(|claims| claims.sub);

    match user {
        Some(sub) => format!("user:{}|ip:{}", sub, ip),
        None => format!("ip:{}", ip),
    }
}

impl<S> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let store = Arc::clone(&self.store);
        let max_requests = self.max_requests;
        let window_seconds = self.window_seconds;
        let auth_service = self.auth_service.clone();

        Box::pin(async move {
            let ip = req.connection_info().peer_addr().unwrap_or("unknown").to_string();
            let token = extract_token_from_request(&req);
            let key = rate_limit_key(&ip, token.as_deref(), auth_service.as_deref());

            let allowed = store.lock().await.is_allowed(&key, max_requests, window_seconds);
            if !allowed {
                log::warn!("Rate limit exceeded for {}", key);
                let response =
                    AppError::TooManyRequests("Rate limit exceeded. Please try again later.".to_string())
                        .error_response();
                return Ok(req.into_response(response));
            }

            service.call(req).await
        })
    }
}

/// Request size limiting middleware
pub struct RequestSizeLimitMiddleware {
    pub max_size: usize,
}

impl<S> Transform<S, ServiceRequest> for RequestSizeLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestSizeLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestSizeLimitMiddlewareService {
            service: Arc::new(service),
            max_size: self.max_size,
        }))
    }
}

pub struct RequestSizeLimitMiddlewareService<S> {
    service: Arc<S>,
    max_size: usize,
}

impl<S> Service<ServiceRequest> for RequestSizeLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let max_size = self.max_size;

        Box::pin(async move {
            let declared = req
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());

            if let Some(length) = declared {
                if length > max_size {
                    let response = AppError::PayloadTooLarge(format!(
                        "Request size {} exceeds maximum allowed size {}",
                        length, max_size
                    ))
                    .error_response();
                    return Ok(req.into_response(response));
                }
            }

            service.call(req).await
        })
    }
}

/// Security headers middleware
pub struct SecurityHeadersMiddleware;

impl<S> Transform<S, ServiceRequest> for SecurityHeadersMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct SecurityHeadersMiddlewareService<S> {
    service: Arc<S>,
}

impl<S> Service<ServiceRequest> for SecurityHeadersMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);

        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();

            headers.insert(header::X_CONTENT_TYPE_OPTIONS, header::HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, header::HeaderValue::from_static("DENY"));
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            );
            headers.insert(
                header::REFERRER_POLICY,
                header::HeaderValue::from_static("strict-origin-when-cross-origin"),
            );

            Ok(res)
        })
    }
}

/// Logging middleware
pub struct LoggingMiddleware;

impl<S> Transform<S, ServiceRequest> for LoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggingMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggingMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct LoggingMiddlewareService<S> {
    service: Arc<S>,
}

impl<S> Service<ServiceRequest> for LoggingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let start_time = std::time::Instant::now();
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let remote_addr = req.connection_info().peer_addr().unwrap_or("unknown").to_string();

        Box::pin(async move {
            let result = service.call(req).await;
            let duration = start_time.elapsed().as_millis();

            match &result {
                Ok(res) => log_request(&method, &uri, res.status().as_u16(), duration, &remote_addr),
                Err(err) => {
                    log::error!(
                        "Request failed: {} {} {} {}ms from {}",
                        method, uri, err, duration, remote_addr
                    );
                }
            }

            result
        })
    }
}
