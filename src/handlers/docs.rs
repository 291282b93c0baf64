//! Interactive API documentation, mounted only outside production.

use actix_web::{web, HttpResponse};
use serde_json::{json, Map, Value};

use crate::config::AppSettings;

/// (method, path, summary, requires auth, success status)
const OPERATIONS: &[(&str, &str, &str, bool, u16)] = &[
    ("get", "/", "Welcome message", false, 200),
    ("get", "/health", "Health check", false, 200),
    ("post", "/auth/register", "Register a new user", false, 201),
    ("post", "/auth/login", "Log in with email and password", false, 200),
    ("post", "/auth/token", "OAuth2 password flow token", false, 200),
    ("post", "/auth/refresh", "Exchange a refresh token", false, 200),
    ("get", "/cities", "List cities", false, 200),
    ("post", "/cities", "Create a city", true, 201),
    ("get", "/cities/{city_id}", "Get a city", false, 200),
    ("patch", "/cities/{city_id}", "Update a city", true, 200),
    ("delete", "/cities/{city_id}", "Soft-delete a city", true, 200),
    ("post", "/cities/{city_id}/restore", "Restore a deleted city", true, 200),
    ("post", "/cities/{city_id}/reviews", "Review a city", true, 201),
    ("patch", "/cities/{city_id}/reviews/{review_id}", "Update a review", true, 200),
    ("get", "/flights", "List flights", false, 200),
    ("post", "/flights", "Create a flight", true, 201),
    ("get", "/flights/{flight_id}", "Get a flight", false, 200),
    ("patch", "/flights/{flight_id}", "Update a flight", true, 200),
    ("delete", "/flights/{flight_id}", "Soft-delete a flight", true, 200),
    ("post", "/flights/{flight_id}/restore", "Restore a deleted flight", true, 200),
    ("get", "/posts", "List posts", false, 200),
    ("post", "/posts", "Create a post", true, 201),
    ("get", "/posts/{post_id}", "Get a post", false, 200),
    ("patch", "/posts/{post_id}", "Update a post", true, 200),
    ("delete", "/posts/{post_id}", "Soft-delete a post", true, 200),
    ("post", "/posts/{post_id}/restore", "Restore a deleted post", true, 200),
    ("post", "/posts/{post_id}/toggle-like", "Like or unlike a post", true, 200),
    ("post", "/posts/{post_id}/comments", "Comment on a post", true, 201),
    ("patch", "/posts/{post_id}/comments/{comment_id}", "Update a comment", true, 200),
    ("delete", "/posts/{post_id}/comments/{comment_id}/delete", "Soft-delete a comment", true, 200),
    ("post", "/posts/{post_id}/comments/{comment_id}/restore", "Restore a deleted comment", true, 200),
];

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/openapi.json", web::get().to(openapi_json))
        .route("/docs", web::get().to(swagger_ui))
        .route("/redoc", web::get().to(redoc));
}

fn path_parameters(path: &str) -> Vec<Value> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(|name| {
            json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": { "type": "string", "format": "uuid" },
            })
        })
        .collect()
}

/// Build the OpenAPI 3.1 description of every route
pub fn openapi_document(settings: &AppSettings) -> Value {
    let mut paths = Map::new();
    for &(method, path, summary, secured, status) in OPERATIONS {
        let mut responses = Map::new();
        responses.insert(status.to_string(), json!({ "description": "Successful Response" }));
        let mut operation = json!({ "summary": summary, "responses": responses });
        let parameters = path_parameters(path);
        if !parameters.is_empty() {
            operation["parameters"] = Value::Array(parameters);
        }
        if secured {
            operation["security"] = json!([{ "bearerAuth": [] }]);
            operation["responses"]["401"] = json!({ "description": "Could not validate credentials" });
        }

        let entry = paths.entry(path.to_string()).or_insert_with(|| json!({}));
        entry[method] = operation;
    }

    json!({
        "openapi": "3.1.0",
        "info": { "title": settings.project_name, "version": env!("CARGO_PKG_VERSION") },
        "paths": paths,
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        },
    })
}

pub async fn openapi_json(settings: web::Data<AppSettings>) -> HttpResponse {
    HttpResponse::Ok().json(openapi_document(&settings))
}

pub async fn swagger_ui(settings: web::Data<AppSettings>) -> HttpResponse {
    let page = format!(
        r##"<!DOCTYPE html>
<html>
<head>
<title>{title} - Swagger UI</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>SwaggerUIBundle({{ url: "/openapi.json", dom_id: "#swagger-ui" }});</script>
</body>
</html>"##,
        title = settings.project_name
    );
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(page)
}

pub async fn redoc(settings: web::Data<AppSettings>) -> HttpResponse {
    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>{title} - ReDoc</title>
</head>
<body>
<redoc spec-url="/openapi.json"></redoc>
<script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>"#,
        title = settings.project_name
    );
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AppSettings {
        AppSettings {
            project_name: "Flights".to_string(),
            app_status: "development".to_string(),
        }
    }

    #[test]
    fn document_lists_secured_operations() {
        let doc = openapi_document(&settings());
        assert_eq!(doc["info"]["title"], "Flights");

        let create = &doc["paths"]["/cities"]["post"];
        assert_eq!(create["security"][0]["bearerAuth"], json!([]));
        assert!(create["responses"]["201"].is_object());

        let list = &doc["paths"]["/cities"]["get"];
        assert!(list.get("security").is_none());
    }

    #[test]
    fn path_ids_become_parameters() {
        let params = path_parameters("/posts/{post_id}/comments/{comment_id}");
        let names: Vec<&str> = params.iter().filter_map(|p| p["name"].as_str()).collect();
        assert_eq!(names, vec!["post_id", "comment_id"]);
        assert!(path_parameters("/health").is_empty());
    }
}
