// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .route("/get_categories", web::get().to(handlers::get_categories))
        .route("/get_places", web::get().to(handlers::get_places))
        .route("/get_info_place", web::get().to(handlers::get_info_place))
        .default_service(web::to(handlers::not_found));
}
