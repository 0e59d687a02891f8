// API server implementation using actix-web

use crate::api::{error::ApiError, middleware, routes};
use crate::database_ops::db::Db;
use crate::util::env::{env_flag, env_opt, env_parse};
use actix_web::{error::InternalError, web, App, HttpRequest, HttpServer};
use anyhow::{Context, Result};

/// Per-request policy shared with the handlers.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Upper bound on names in one filter parameter.
    pub max_filter_values: usize,
    /// Answer errors with 200 instead of their own status.
    pub legacy_error_status: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            max_filter_values: 500,
            legacy_error_status: false,
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_filter_values: env_parse("API_MAX_FILTER_VALUES", defaults.max_filter_values),
            legacy_error_status: env_flag("API_LEGACY_ERROR_STATUS", defaults.legacy_error_status),
        }
    }
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
    pub settings: ApiSettings,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_opt("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .trim()
            .parse()
            .context("Invalid API_PORT")?;

        let allowed_origins = env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
            settings: ApiSettings::from_env(),
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            settings = ?self.settings,
            "Starting place directory API server"
        );

        let db_data = web::Data::new(db);
        let settings = web::Data::new(self.settings);
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(configure_app(db_data.clone(), settings.clone()))
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}

/// Shared state, query-string error handling and routes. Used by the server
/// and by tests that drive the app in-process.
pub fn configure_app(
    db: web::Data<Db>,
    settings: web::Data<ApiSettings>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(db)
            .app_data(settings)
            .app_data(web::QueryConfig::default().error_handler(query_error));
        routes::configure_routes(cfg);
    }
}

fn query_error(err: actix_web::error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    let legacy = req
        .app_data::<web::Data<ApiSettings>>()
        .is_some_and(|s| s.legacy_error_status);
    let api_err = ApiError::Validation(format!("invalid query string: {err}"));
    api_err.log(req.path());
    let response = api_err.to_response(legacy);
    InternalError::from_response(api_err, response).into()
}
