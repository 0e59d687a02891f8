pub mod db;
pub mod directory;
pub mod filters;
pub mod loader;
pub mod schema;
