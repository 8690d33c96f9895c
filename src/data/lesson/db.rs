use bson::{doc, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Lesson, LESSON_COLLECTION_NAME};
use crate::data::enrollment::PROGRESS_COLLECTION_NAME;
use crate::data::filter;
use crate::data::MongoStore;
use crate::error::StoreError;

fn ordered() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "order": 1, "created_at": 1 })
        .build()
}

fn changes(lesson: &Lesson) -> Result<Document, StoreError> {
    Ok(doc! {
        "$set": {
            "title": lesson.title.clone(),
            "content_type": bson::to_bson(&lesson.content_type)?,
            "content_url": lesson.content_url.clone(),
            "description": lesson.description.clone(),
            "duration": lesson.duration.map(i64::from),
            "order": lesson.order,
        }
    })
}

#[rocket::async_trait]
pub trait LessonDb {
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError>;

    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, StoreError>;

    /// Every lesson of a course, ordered within each module.
    async fn list_course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError>;

    async fn next_lesson_order(&self, module_id: Uuid) -> Result<i32, StoreError>;

    /// Writes the editable fields, leaving module and course references untouched.
    async fn update_lesson(&self, lesson: &Lesson) -> Result<bool, StoreError>;

    /// Removes the lesson and the progress recorded for it.
    async fn delete_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError>;
}

#[rocket::async_trait]
impl LessonDb for MongoStore {
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.collection::<Lesson>(LESSON_COLLECTION_NAME)
            .insert_one(lesson, None)
            .await?;
        Ok(())
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        Ok(self
            .collection(LESSON_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn list_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        Ok(self
            .collection::<Lesson>(LESSON_COLLECTION_NAME)
            .find(filter::by_ref("module_id", module_id), ordered())
            .await?
            .try_collect()
            .await?)
    }

    async fn list_course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        Ok(self
            .collection::<Lesson>(LESSON_COLLECTION_NAME)
            .find(filter::by_ref("course_id", course_id), ordered())
            .await?
            .try_collect()
            .await?)
    }

    async fn next_lesson_order(&self, module_id: Uuid) -> Result<i32, StoreError> {
        let options = FindOneOptions::builder().sort(doc! { "order": -1 }).build();

        let last = self
            .collection::<Lesson>(LESSON_COLLECTION_NAME)
            .find_one(filter::by_ref("module_id", module_id), options)
            .await?;

        Ok(last.map(|it| it.order + 1).unwrap_or(1))
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<bool, StoreError> {
        let result = self
            .collection::<Lesson>(LESSON_COLLECTION_NAME)
            .update_one(filter::by_id(lesson.id), changes(lesson)?, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let removed = async {
            self.collection::<Document>(PROGRESS_COLLECTION_NAME)
                .delete_many_with_session(filter::by_ref("lesson_id", id), None, &mut session)
                .await?;
            self.collection::<Lesson>(LESSON_COLLECTION_NAME)
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
                tracing::warn!("aborting lesson {} removal: {}", id, e);
                let _ = session.abort_transaction().await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::lesson::ContentType;
    use bson::Bson;
    use chrono::Utc;

    fn lesson() -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            module_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Welcome".to_string(),
            content_type: ContentType::Video,
            content_url: Some("https://example.com/welcome.mp4".to_string()),
            description: String::new(),
            duration: Some(12),
            order: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn edits_keep_parent_references() {
        let update = changes(&lesson()).unwrap();
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.get_str("content_type").unwrap(), "video");
        assert_eq!(set.get_i64("duration").unwrap(), 12);
        assert!(!set.contains_key("module_id"));
        assert!(!set.contains_key("course_id"));
    }

    #[test]
    fn cleared_fields_are_written_as_null() {
        let mut lesson = lesson();
        lesson.content_type = ContentType::Text;
        lesson.content_url = None;
        lesson.duration = None;

        let update = changes(&lesson).unwrap();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("content_url"), Some(&Bson::Null));
        assert_eq!(set.get("duration"), Some(&Bson::Null));
    }
}
