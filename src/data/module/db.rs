use bson::{doc, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Module, MODULE_COLLECTION_NAME};
use crate::data::enrollment::PROGRESS_COLLECTION_NAME;
use crate::data::filter;
use crate::data::lesson::{Lesson, LESSON_COLLECTION_NAME};
use crate::data::MongoStore;
use crate::error::StoreError;

fn changes(module: &Module) -> Document {
    doc! {
        "$set": {
            "title": module.title.clone(),
            "description": module.description.clone(),
            "order": module.order,
        }
    }
}

#[rocket::async_trait]
pub trait ModuleDb {
    async fn insert_module(&self, module: &Module) -> Result<(), StoreError>;

    async fn get_module(&self, id: Uuid) -> Result<Option<Module>, StoreError>;

    /// Modules of a course sorted by their order.
    async fn list_modules(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError>;

    /// One past the highest order used in the course, starting at 1.
    async fn next_module_order(&self, course_id: Uuid) -> Result<i32, StoreError>;

    /// Writes the editable fields, leaving the course reference untouched.
    async fn update_module(&self, module: &Module) -> Result<bool, StoreError>;

    /// Removes the module, its lessons and their progress.
    async fn delete_module(&self, id: Uuid) -> Result<Option<Module>, StoreError>;
}

#[rocket::async_trait]
impl ModuleDb for MongoStore {
    async fn insert_module(&self, module: &Module) -> Result<(), StoreError> {
        self.collection::<Module>(MODULE_COLLECTION_NAME)
            .insert_one(module, None)
            .await?;
        Ok(())
    }

    async fn get_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        Ok(self
            .collection(MODULE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn list_modules(&self, course_id: Uuid) -> Result<Vec<Module>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "order": 1, "created_at": 1 })
            .build();

        Ok(self
            .collection::<Module>(MODULE_COLLECTION_NAME)
            .find(filter::by_ref("course_id", course_id), options)
            .await?
            .try_collect()
            .await?)
    }

    async fn next_module_order(&self, course_id: Uuid) -> Result<i32, StoreError> {
        let options = FindOneOptions::builder().sort(doc! { "order": -1 }).build();

        let last = self
            .collection::<Module>(MODULE_COLLECTION_NAME)
            .find_one(filter::by_ref("course_id", course_id), options)
            .await?;

        Ok(last.map(|it| it.order + 1).unwrap_or(1))
    }

    async fn update_module(&self, module: &Module) -> Result<bool, StoreError> {
        let result = self
            .collection::<Module>(MODULE_COLLECTION_NAME)
            .update_one(filter::by_id(module.id), changes(module), None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_module(&self, id: Uuid) -> Result<Option<Module>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let by_module = filter::by_ref("module_id", id);
        let removed = async {
            let lessons = self.collection::<Lesson>(LESSON_COLLECTION_NAME);
            let mut cursor = lessons
                .find_with_session(by_module.clone(), None, &mut session)
                .await?;
            let lesson_ids: Vec<Uuid> = cursor
                .stream(&mut session)
                .map_ok(|lesson| lesson.id)
                .try_collect()
                .await?;

            if !lesson_ids.is_empty() {
                self.collection::<Document>(PROGRESS_COLLECTION_NAME)
                    .delete_many_with_session(filter::by_refs("lesson_id", &lesson_ids), None, &mut session)
                    .await?;
                lessons
                    .delete_many_with_session(by_module, None, &mut session)
                    .await?;
            }

            self.collection::<Module>(MODULE_COLLECTION_NAME)
                .find_one_and_delete_with_session(filter::by_id(id), None, &mut session)
                .await
        }
        .await;

        match removed {
            Ok(removed) => {
                session.commit_transaction().await?;
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!("aborting module {} removal: {}", id, e);
                let _ = session.abort_transaction().await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;
    use chrono::Utc;

    #[test]
    fn edits_keep_course_reference() {
        let module = Module {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Basics".to_string(),
            description: String::new(),
            order: 3,
            created_at: Utc::now(),
        };
        let update = changes(&module);
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.get_str("title").unwrap(), "Basics");
        assert_eq!(set.get_i32("order").unwrap(), 3);
        assert!(!set.contains_key("course_id"));
        assert!(!set.contains_key("_id"));
    }

    #[test]
    fn cascade_matches_progress_of_every_lesson() {
        let lessons = [Uuid::new_v4(), Uuid::new_v4()];
        let filter = filter::by_refs("lesson_id", &lessons);

        let ids = filter.get_document("lesson_id").unwrap().get_array("$in").unwrap();
        assert_eq!(
            ids,
            &lessons.iter().copied().map(filter::uuid).collect::<Vec<Bson>>()
        );
    }
}
