// Additional middleware for logging, compression and CORS.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, Logger};

pub fn setup_middleware() -> (Logger, Compress) {
    let logger = Logger::default();
    let compress = Compress::default();
    (logger, compress)
}

/// `*` allows any origin; otherwise a comma-separated allow list.
pub fn setup_cors(allowed_origins: &str) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);

    if allowed_origins.trim() == "*" {
        return cors.allow_any_origin();
    }

    for origin in allowed_origins.split(',').map(str::trim) {
        if !origin.is_empty() {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn allow_origin_for(allowed: &str, origin: &str) -> Option<String> {
        let app = test::init_service(
            App::new()
                .wrap(setup_cors(allowed))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((header::ORIGIN, origin))
            .to_request();
        let resp = test::call_service(&app, req).await;
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    #[actix_web::test]
    async fn wildcard_allows_any_origin() {
        assert!(allow_origin_for("*", "https://maps.example.org")
            .await
            .is_some());
    }

    #[actix_web::test]
    async fn listed_origin_is_echoed() {
        assert_eq!(
            allow_origin_for("https://a.example.org, https://b.example.org", "https://b.example.org")
                .await
                .as_deref(),
            Some("https://b.example.org")
        );
    }
}
