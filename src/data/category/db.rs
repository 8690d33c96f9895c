use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Category, CATEGORY_COLLECTION_NAME};
use crate::data::course::COURSE_COLLECTION_NAME;
use crate::data::filter;
use crate::data::MongoStore;
use crate::error::StoreError;

#[rocket::async_trait]
pub trait CategoryDb {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn delete_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;

    async fn count_courses_in_category(&self, id: Uuid) -> Result<u64, StoreError>;
}

#[rocket::async_trait]
impl CategoryDb for MongoStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        self.collection::<Category>(CATEGORY_COLLECTION_NAME)
            .insert_one(category, None)
            .await
            .map_err(StoreError::classify("category name"))?;
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self
            .collection(CATEGORY_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let options = FindOptions::builder().sort(bson::doc! { "name": 1 }).build();

        Ok(self
            .collection::<Category>(CATEGORY_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn delete_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self
            .collection(CATEGORY_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await?)
    }

    async fn count_courses_in_category(&self, id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .collection::<bson::Document>(COURSE_COLLECTION_NAME)
            .count_documents(filter::by_ref("category_id", id), None)
            .await?)
    }
}
