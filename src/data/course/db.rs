use bson::{doc, Document};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{Course, CourseChange, CourseScope, CourseStatus, COURSE_COLLECTION_NAME};
use crate::data::enrollment::{ENROLLMENT_COLLECTION_NAME, PROGRESS_COLLECTION_NAME};
use crate::data::filter;
use crate::data::lesson::LESSON_COLLECTION_NAME;
use crate::data::module::MODULE_COLLECTION_NAME;
use crate::data::review::REVIEW_COLLECTION_NAME;
use crate::data::MongoStore;
use crate::error::StoreError;
use crate::middleware::paging::PageState;

impl CourseScope {
    fn filter(&self) -> Document {
        let public = doc! {
            "status": CourseStatus::Approved.to_string(),
            "is_published": true,
        };

        match self {
            CourseScope::All => doc! {},
            CourseScope::Public => public,
            CourseScope::PublicOrOwnedBy(owner) => doc! {
                "$or": [public, filter::by_ref("instructor_id", *owner)]
            },
        }
    }
}

/// Matches the course only while it still has the status the caller read.
fn guarded(id: Uuid, read_status: CourseStatus) -> Document {
    let mut filter = filter::by_id(id);
    filter.insert("status", read_status.to_string());
    filter
}

fn changes(course: &Course, change: CourseChange) -> Document {
    let mut set = match change {
        CourseChange::Content => doc! {
            "title": course.title.clone(),
            "description": course.description.clone(),
            "category_id": course.category_id.map(filter::uuid),
            "price": course.price,
            "thumbnail": course.thumbnail.clone(),
            "status": course.status.to_string(),
            "rejection_reason": course.rejection_reason.clone(),
        },
        CourseChange::Moderation => doc! {
            "status": course.status.to_string(),
            "rejection_reason": course.rejection_reason.clone(),
            "is_published": course.is_published,
        },
        CourseChange::Publishing => doc! {
            "is_published": course.is_published,
        },
    };
    set.insert("updated_at", bson::DateTime::from_chrono(course.updated_at));
    doc! { "$set": set }
}

#[rocket::async_trait]
pub trait CourseDb {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError>;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;

    /// Newest first.
    async fn list_courses(&self, scope: CourseScope, page: PageState) -> Result<Vec<Course>, StoreError>;

    async fn get_courses(&self, ids: &[Uuid]) -> Result<Vec<Course>, StoreError>;

    /// Writes the fields of `change` unless the stored status moved away from
    /// `read_status`. Returns `false` when nothing matched.
    async fn update_course(
        &self,
        course: &Course,
        change: CourseChange,
        read_status: CourseStatus,
    ) -> Result<bool, StoreError>;

    /// Removes the course with its modules, lessons, enrollments, progress and reviews.
    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
}

#[rocket::async_trait]
impl CourseDb for MongoStore {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError> {
        self.collection::<Course>(COURSE_COLLECTION_NAME)
            .insert_one(course, None)
            .await?;
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self
            .collection(COURSE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn list_courses(&self, scope: CourseScope, page: PageState) -> Result<Vec<Course>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        Ok(self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(scope.filter(), options)
            .await?
            .try_collect()
            .await?)
    }

    async fn get_courses(&self, ids: &[Uuid]) -> Result<Vec<Course>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Ok(self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?)
    }

    async fn update_course(
        &self,
        course: &Course,
        change: CourseChange,
        read_status: CourseStatus,
    ) -> Result<bool, StoreError> {
        let result = self
            .collection::<Course>(COURSE_COLLECTION_NAME)
            .update_one(guarded(course.id, read_status), changes(course, change), None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let by_course = filter::by_ref("course_id", id);
        let removed = async {
            for collection in [
                PROGRESS_COLLECTION_NAME,
                LESSON_COLLECTION_NAME,
                MODULE_COLLECTION_NAME,
                ENROLLMENT_COLLECTION_NAME,
                REVIEW_COLLECTION_NAME,
            ] {
                let deleted = self
                    .collection::<Document>(collection)
                    .delete_many_with_session(by_course.clone(), None, &mut session)
                    .await?;
                tracing::debug!("removed {} '{}' of course {}", deleted.deleted_count, collection, id);
            }
            self.collection::<Course>(COURSE_COLLECTION_NAME)
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
                tracing::warn!("aborting course {} removal: {}", id, e);
                let _ = session.abort_transaction().await;
                Err(e.into())
            }
        }
    }
}
