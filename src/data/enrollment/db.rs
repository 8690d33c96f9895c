use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Enrollment, LessonProgress, ENROLLMENT_COLLECTION_NAME, PROGRESS_COLLECTION_NAME};
use crate::data::filter;
use crate::data::MongoStore;
use crate::error::StoreError;

fn progress_key(progress: &LessonProgress) -> Document {
    doc! {
        "user_id": filter::uuid(progress.user_id),
        "lesson_id": filter::uuid(progress.lesson_id),
    }
}

/// Only sets fields when the upsert inserts, so the first completion wins.
fn progress_upsert(progress: &LessonProgress) -> Result<Document, StoreError> {
    Ok(doc! { "$setOnInsert": bson::to_document(progress)? })
}

#[rocket::async_trait]
pub trait EnrollmentDb {
    /// Fails with [`StoreError::Duplicate`] when the user is already enrolled.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError>;

    async fn find_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError>;

    async fn list_enrollments(&self, user: Uuid) -> Result<Vec<Enrollment>, StoreError>;

    /// Unenrolls the user and forgets their progress in the course.
    async fn delete_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError>;

    /// Idempotent, returns the first recorded completion.
    async fn mark_lesson_complete(&self, progress: &LessonProgress) -> Result<LessonProgress, StoreError>;

    async fn completed_lessons(&self, user: Uuid, course: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

#[rocket::async_trait]
impl EnrollmentDb for MongoStore {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError> {
        self.collection::<Enrollment>(ENROLLMENT_COLLECTION_NAME)
            .insert_one(enrollment, None)
            .await
            .map_err(StoreError::classify("enrollment"))?;
        Ok(())
    }

    async fn find_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .collection(ENROLLMENT_COLLECTION_NAME)
            .find_one(filter::by_user_and_course(user, course), None)
            .await?)
    }

    async fn list_enrollments(&self, user: Uuid) -> Result<Vec<Enrollment>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "enrolled_at": -1 }).build();

        Ok(self
            .collection::<Enrollment>(ENROLLMENT_COLLECTION_NAME)
            .find(filter::by_ref("user_id", user), options)
            .await?
            .try_collect()
            .await?)
    }

    async fn delete_enrollment(&self, user: Uuid, course: Uuid) -> Result<Option<Enrollment>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let by_pair = filter::by_user_and_course(user, course);
        let removed = async {
            self.collection::<Document>(PROGRESS_COLLECTION_NAME)
                .delete_many_with_session(by_pair.clone(), None, &mut session)
                .await?;
            self.collection::<Enrollment>(ENROLLMENT_COLLECTION_NAME)
                .find_one_and_delete_with_session(by_pair, None, &mut session)
                .await
        }
        .await;

        match removed {
            Ok(removed) => {
                session.commit_transaction().await?;
                Ok(removed)
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(e.into())
            }
        }
    }

    async fn mark_lesson_complete(&self, progress: &LessonProgress) -> Result<LessonProgress, StoreError> {
        let collection = self.collection::<LessonProgress>(PROGRESS_COLLECTION_NAME);
        let by_pair = progress_key(progress);
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let result = collection
            .find_one_and_update(by_pair.clone(), progress_upsert(progress)?, options)
            .await
            .map_err(StoreError::classify("lesson progress"));

        match result {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(progress.clone()),
            // a concurrent request inserted it first
            Err(StoreError::Duplicate(_)) => Ok(collection
                .find_one(by_pair, None)
                .await?
                .unwrap_or_else(|| progress.clone())),
            Err(e) => Err(e),
        }
    }

    async fn completed_lessons(&self, user: Uuid, course: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "completed_at": 1 }).build();

        Ok(self
            .collection::<LessonProgress>(PROGRESS_COLLECTION_NAME)
            .find(filter::by_user_and_course(user, course), options)
            .await?
            .map_ok(|it| it.lesson_id)
            .try_collect()
            .await?)
    }
}
