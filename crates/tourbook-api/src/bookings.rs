//! Bookings
//!
//! A booking belongs to the user who made it; the owner id comes from the
//! verified identity, never from the request body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tourbook_core::{Result, TourbookError};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub tour_id: String,
    pub full_name: String,
    pub guest_size: u32,
    pub phone: String,
    pub book_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, message = "Tour id is required"))]
    pub tour_id: String,

    #[validate(length(min = 1, max = 100, message = "Full name is required"))]
    pub full_name: String,

    #[validate(range(min = 1, max = 50, message = "Guest size must be between 1 and 50"))]
    pub guest_size: u32,

    #[validate(length(min = 5, max = 20, message = "Phone must be 5 to 20 characters"))]
    pub phone: String,

    pub book_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct BookingStore {
    bookings: RwLock<HashMap<String, Booking>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user_id: &str, request: CreateBookingRequest) -> Result<Booking> {
        request
            .validate()
            .map_err(|e| TourbookError::ValidationError(e.to_string()))?;
        if request.full_name.trim().is_empty() {
            return Err(TourbookError::ValidationError(
                "Full name is required".to_string(),
            ));
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tour_id: request.tour_id.trim().to_string(),
            full_name: request.full_name.trim().to_string(),
            guest_size: request.guest_size,
            phone: request.phone.trim().to_string(),
            book_at: request.book_at,
            created_at: Utc::now(),
        };
        self.bookings
            .write()
            .await
            .insert(booking.id.clone(), booking.clone());

        Ok(booking)
    }

    pub async fn get(&self, id: &str) -> Result<Booking> {
        self.bookings
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TourbookError::NotFound("Booking".to_string()))
    }

    /// All bookings, oldest first
    pub async fn list(&self) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        bookings.sort_by_key(|b| b.created_at);
        bookings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(guests: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            tour_id: "t-1".to_string(),
            full_name: "Alice Doe".to_string(),
            guest_size: guests,
            phone: "+351 900 000".to_string(),
            book_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_get_and_list() {
        let store = BookingStore::new();
        let first = store.create("u-1", request(2)).await.unwrap();
        let second = store.create("u-2", request(4)).await.unwrap();

        assert_eq!(first.user_id, "u-1");
        assert_eq!(store.get(&second.id).await.unwrap(), second);
        assert_eq!(store.list().await.len(), 2);
        assert!(matches!(
            store.get("missing").await,
            Err(TourbookError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let store = BookingStore::new();

        assert!(matches!(
            store.create("u-1", request(0)).await,
            Err(TourbookError::ValidationError(_))
        ));

        let blank = CreateBookingRequest {
            full_name: "   ".to_string(),
            ..request(2)
        };
        assert!(store.create("u-1", blank).await.is_err());
        assert!(store.list().await.is_empty());
    }
}
