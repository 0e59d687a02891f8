// HTTP surface of the place directory: three read-only listing endpoints
// plus a health check.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{configure_app, ApiServer, ApiSettings};
