// HTTP API server binary for the place directory

use anyhow::Result;
use place_directory::api::ApiServer;
use place_directory::database_ops::db::{Db, PoolSettings};
use place_directory::logging;
use place_directory::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    logging::init_tracing(logging::DEFAULT_FILTER)?;

    tracing::info!("Initializing place directory API server");

    env_util::preflight_check(
        "api_server",
        &[],
        &[
            "DATABASE_URL",
            "DB_HOST",
            "DB_PORT",
            "DB_USERNAME",
            "DB_PASSWORD",
            "DB_DATABASE",
            "DB_MAX_CONNS",
            "API_HOST",
            "API_PORT",
            "ALLOWED_ORIGINS",
            "API_MAX_FILTER_VALUES",
            "API_LEGACY_ERROR_STATUS",
        ],
    )?;

    let server = ApiServer::from_env()?;

    let database_url = env_util::db_url()?;
    let db = Db::connect(&database_url, PoolSettings::from_env()).await?;

    tracing::info!("Database connected successfully");

    server.run(db).await?;

    Ok(())
}
