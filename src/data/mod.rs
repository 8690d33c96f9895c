//! Persistence. Each entity has a `*Db` trait implemented for [`MongoStore`];
//! routes only see the object safe [`Store`] umbrella.

use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::error::StoreError;

pub mod category;
pub mod course;
pub mod enrollment;
pub mod filter;
pub mod lesson;
pub mod module;
pub mod review;
pub mod user;

#[cfg(test)]
pub mod memory;

pub use category::db::CategoryDb;
pub use course::db::CourseDb;
pub use enrollment::db::EnrollmentDb;
pub use lesson::db::LessonDb;
pub use module::db::ModuleDb;
pub use review::db::ReviewDb;
pub use user::db::UserDb;

#[rocket::async_trait]
pub trait HealthDb {
    async fn ping(&self) -> Result<(), StoreError>;
}

pub trait Store:
    UserDb
    + CategoryDb
    + CourseDb
    + ModuleDb
    + LessonDb
    + EnrollmentDb
    + ReviewDb
    + HealthDb
    + std::fmt::Debug
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: UserDb
        + CategoryDb
        + CourseDb
        + ModuleDb
        + LessonDb
        + EnrollmentDb
        + ReviewDb
        + HealthDb
        + std::fmt::Debug
        + Send
        + Sync
{
}

/// Store handle managed by Rocket.
pub type DynStore = Box<dyn Store>;

/// MongoDB backed store. Keeps the [`Client`] next to the database so
/// cascades can open transaction sessions.
#[derive(Debug, Clone)]
pub struct MongoStore {
    pub client: Client,
    pub db: Database,
}

impl MongoStore {
    pub fn new(client: Client, database: &str) -> MongoStore {
        let db = client.database(database);
        MongoStore { client, db }
    }

    #[inline]
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

#[rocket::async_trait]
impl HealthDb for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(bson::doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

fn unique_index(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn plain_index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Creates the indexes backing uniqueness invariants and parent lookups.
pub async fn ensure_indexes(store: &MongoStore) -> Result<(), StoreError> {
    use bson::{doc, Document};

    let indexes: [(&str, IndexModel); 10] = [
        (user::USER_COLLECTION_NAME, unique_index(doc! { "email": 1 })),
        (
            category::CATEGORY_COLLECTION_NAME,
            unique_index(doc! { "name": 1 }),
        ),
        (
            course::COURSE_COLLECTION_NAME,
            plain_index(doc! { "instructor_id": 1 }),
        ),
        (
            module::MODULE_COLLECTION_NAME,
            plain_index(doc! { "course_id": 1, "order": 1 }),
        ),
        (
            lesson::LESSON_COLLECTION_NAME,
            plain_index(doc! { "module_id": 1, "order": 1 }),
        ),
        (
            enrollment::ENROLLMENT_COLLECTION_NAME,
            unique_index(doc! { "user_id": 1, "course_id": 1 }),
        ),
        (
            enrollment::ENROLLMENT_COLLECTION_NAME,
            plain_index(doc! { "course_id": 1 }),
        ),
        (
            enrollment::PROGRESS_COLLECTION_NAME,
            unique_index(doc! { "user_id": 1, "lesson_id": 1 }),
        ),
        (
            review::REVIEW_COLLECTION_NAME,
            unique_index(doc! { "user_id": 1, "course_id": 1 }),
        ),
        (
            review::REVIEW_COLLECTION_NAME,
            plain_index(doc! { "course_id": 1 }),
        ),
    ];

    for (collection, index) in indexes {
        tracing::debug!("ensuring index on '{}'", collection);
        store
            .collection::<Document>(collection)
            .create_index(index, None)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn mongo_store_shares_client_with_database() {
        // the driver connects lazily, nothing is contacted here
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let store = MongoStore::new(client, "lms_test");

        assert_eq!(store.db.name(), "lms_test");
        assert_eq!(
            store.collection::<bson::Document>(course::COURSE_COLLECTION_NAME).name(),
            "courses"
        );

        let boxed: DynStore = Box::new(store.clone());
        assert!(format!("{:?}", boxed).contains("MongoStore"));
    }
}
