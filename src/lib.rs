//! Restaurant directory: a read-only HTTP API over categories, subcategories
//! and places, and the bulk loader that fills its tables from a spreadsheet.

pub mod api;
pub mod database_ops;
pub mod logging;

pub mod util {
    pub mod env;
}
