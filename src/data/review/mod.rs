use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::user::User;
use crate::resp::problem::{problems, Problem};

pub mod db;

pub static REVIEW_COLLECTION_NAME: &str = "reviews";

const MIN_RATING: i32 = 1;
const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewInput {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    pub fn into_review(self, course_id: Uuid, author: &User) -> Result<Review, Problem> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(problems::validation(
                "rating",
                format!("Rating must be between {} and {}.", MIN_RATING, MAX_RATING),
            ));
        }

        Ok(Review {
            id: Uuid::new_v4(),
            course_id,
            user_id: author.id,
            user_name: author.name.clone(),
            rating: self.rating,
            comment: self.comment.trim().to_string(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(value: Review) -> Self {
        ReviewResponse {
            id: value.id,
            course_id: value.course_id,
            user_id: value.user_id,
            user_name: value.user_name,
            rating: value.rating,
            comment: value.comment,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewStats {
    /// Rounded to one decimal, 0 without reviews.
    pub average_rating: f64,
    pub total_reviews: u64,
}

impl ReviewStats {
    pub fn of(reviews: &[Review]) -> ReviewStats {
        if reviews.is_empty() {
            return ReviewStats {
                average_rating: 0.0,
                total_reviews: 0,
            };
        }

        let sum: i64 = reviews.iter().map(|it| it.rating as i64).sum();
        let average = sum as f64 / reviews.len() as f64;

        ReviewStats {
            average_rating: (average * 10.0).round() / 10.0,
            total_reviews: reviews.len() as u64,
        }
    }
}
