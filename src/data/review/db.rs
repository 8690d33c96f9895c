use bson::doc;
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Review, REVIEW_COLLECTION_NAME};
use crate::data::filter;
use crate::data::MongoStore;
use crate::error::StoreError;

#[rocket::async_trait]
pub trait ReviewDb {
    /// Fails with [`StoreError::Duplicate`] for a second review of the same course.
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_reviews(&self, course_id: Uuid) -> Result<Vec<Review>, StoreError>;
}

#[rocket::async_trait]
impl ReviewDb for MongoStore {
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        self.collection::<Review>(REVIEW_COLLECTION_NAME)
            .insert_one(review, None)
            .await
            .map_err(StoreError::classify("review"))?;
        Ok(())
    }

    async fn list_reviews(&self, course_id: Uuid) -> Result<Vec<Review>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        Ok(self
            .collection::<Review>(REVIEW_COLLECTION_NAME)
            .find(filter::by_ref("course_id", course_id), options)
            .await?
            .try_collect()
            .await?)
    }
}
