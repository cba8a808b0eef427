//! Reviews
//!
//! A review references a user and a tour owned by other services; the
//! handler verifies both remotely before anything is stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tourbook_core::{Result, TourbookError};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub tour_id: String,
    pub review_text: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "Review text is required"))]
    pub review_text: String,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
}

#[derive(Default)]
pub struct ReviewStore {
    reviews: RwLock<Vec<Review>>,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the request body before any remote call is made
    pub fn validate(request: &CreateReviewRequest) -> Result<()> {
        request
            .validate()
            .map_err(|e| TourbookError::ValidationError(e.to_string()))?;
        if request.review_text.trim().is_empty() {
            return Err(TourbookError::ValidationError(
                "Review text is required".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        user_id: &str,
        tour_id: &str,
        request: CreateReviewRequest,
    ) -> Result<Review> {
        Self::validate(&request)?;

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tour_id: tour_id.to_string(),
            review_text: request.review_text.trim().to_string(),
            rating: request.rating,
            created_at: now,
            updated_at: now,
        };
        self.reviews.write().await.push(review.clone());

        Ok(review)
    }

    pub async fn for_tour(&self, tour_id: &str) -> Vec<Review> {
        self.reviews
            .read()
            .await
            .iter()
            .filter(|r| r.tour_id == tour_id)
            .cloned()
            .collect()
    }
}
