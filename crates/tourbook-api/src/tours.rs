//! Tour catalog
//!
//! Enough of the tour service to answer remote existence checks and let
//! admins add tours.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tourbook_core::{Result, TourbookError};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tour {
    pub id: String,
    pub title: String,
    pub city: String,
    pub price: f64,
    pub max_group_size: u32,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn positive_price(price: f64) -> std::result::Result<(), ValidationError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("price_must_be_positive"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTourRequest {
    #[validate(length(min = 3, max = 100, message = "Title must be 3 to 100 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,

    #[validate(custom(function = "positive_price"))]
    pub price: f64,

    #[validate(range(min = 1, message = "Group size must be positive"))]
    pub max_group_size: u32,

    #[serde(default)]
    pub featured: bool,
}

/// In-memory tour store; titles are unique
#[derive(Default)]
pub struct TourStore {
    tours: RwLock<HashMap<String, Tour>>,
}

impl TourStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, request: CreateTourRequest) -> Result<Tour> {
        request
            .validate()
            .map_err(|e| TourbookError::ValidationError(e.to_string()))?;

        let title = request.title.trim().to_string();
        let mut tours = self.tours.write().await;
        if tours.values().any(|t| t.title.eq_ignore_ascii_case(&title)) {
            return Err(TourbookError::Conflict(format!(
                "Tour titled '{title}' already exists"
            )));
        }

        let now = Utc::now();
        let tour = Tour {
            id: Uuid::new_v4().to_string(),
            title,
            city: request.city.trim().to_string(),
            price: request.price,
            max_group_size: request.max_group_size,
            featured: request.featured,
            created_at: now,
            updated_at: now,
        };
        tours.insert(tour.id.clone(), tour.clone());

        Ok(tour)
    }

    pub async fn get(&self, id: &str) -> Result<Tour> {
        self.tours
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TourbookError::NotFound("Tour".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> CreateTourRequest {
        CreateTourRequest {
            title: title.to_string(),
            city: "Lisbon".to_string(),
            price: 99.5,
            max_group_size: 12,
            featured: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = TourStore::new();
        let tour = store.create(request("Old Town Walk")).await.unwrap();

        assert_eq!(store.get(&tour.id).await.unwrap(), tour);
        assert!(matches!(
            store.get("missing").await,
            Err(TourbookError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_title_is_unique() {
        let store = TourStore::new();
        store.create(request("Old Town Walk")).await.unwrap();

        assert!(matches!(
            store.create(request("old town walk")).await,
            Err(TourbookError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let store = TourStore::new();

        assert!(store.create(request("ab")).await.is_err());

        let free = CreateTourRequest {
            price: 0.0,
            ..request("Free Tour")
        };
        assert!(matches!(
            store.create(free).await,
            Err(TourbookError::ValidationError(_))
        ));

        let empty = CreateTourRequest {
            max_group_size: 0,
            ..request("Empty Tour")
        };
        assert!(store.create(empty).await.is_err());
    }
}
