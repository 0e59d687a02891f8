// API request/response models (DTOs)

use crate::database_ops::directory::Listing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Success envelope shared by every directory endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: Vec<T>,
    pub ntotal: usize,
    pub message: &'static str,
}

impl<T> From<Listing<T>> for ApiResponse<T> {
    fn from(listing: Listing<T>) -> Self {
        Self {
            data: listing.data,
            ntotal: listing.ntotal,
            message: "ok",
        }
    }
}

/// Failure envelope: only a message, no `data` or `ntotal`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn from_error(err: &impl std::fmt::Display) -> Self {
        Self {
            message: format!("error: {err}"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    pub categories: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlacesQuery {
    pub categories: Option<String>,
    pub subcategories: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceInfoQuery {
    pub places: Option<String>,
    pub categories: Option<String>,
    pub subcategories: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::directory::{distinct_places, Listing};

    #[test]
    fn success_envelope_shape() {
        let body = ApiResponse::from(distinct_places(vec!["Café X".into()]));
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"data":[{"places":["Café X"]}],"ntotal":1,"message":"ok"}"#
        );
    }

    #[test]
    fn empty_listing_still_reports_ok() {
        let body: ApiResponse<u8> = Listing {
            data: vec![],
            ntotal: 0,
        }
        .into();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"data": [], "ntotal": 0, "message": "ok"}));
    }

    #[test]
    fn error_envelope_has_only_message() {
        let json = serde_json::to_value(ErrorBody::from_error(&"relation missing")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "error: relation missing"}));
    }
}
