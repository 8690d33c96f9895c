use bson::{doc, Document};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{is_valid_email, User, USER_COLLECTION_NAME};
use crate::data::course::COURSE_COLLECTION_NAME;
use crate::data::enrollment::{ENROLLMENT_COLLECTION_NAME, PROGRESS_COLLECTION_NAME};
use crate::data::filter;
use crate::data::review::REVIEW_COLLECTION_NAME;
use crate::data::MongoStore;
use crate::error::StoreError;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;

pub mod problem {
    use crate::resp::problem::{problems, Problem};
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_name(detail: impl ToString) -> Problem {
        problems::validation("name", detail)
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad email or password.")
    }
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 72;

fn validate_email(email: &str) -> Result<(), Problem> {
    if !is_valid_email(email.trim()) {
        return Err(problem::bad_email(email, "Not a valid e-mail address."));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), Problem> {
    if name.trim().is_empty() {
        return Err(problem::bad_name("Name can't be empty."));
    }
    if name.len() > 100 {
        return Err(problem::bad_name("Name can't be longer than 100 characters (bytes)."));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), Problem> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(problem::bad_password(
            "Password must be at least 8 characters (bytes) long.",
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(problem::bad_password(
            "Passwords longer than 72 characters (bytes) aren't supported.",
        ));
    }
    Ok(())
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct RegisterData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[schema(format = "email")]
    pub email: String,
    #[serde(default)]
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegisterData:{}", self.email)
    }
}

impl RegisterData {
    pub fn validate(&self) -> Result<(), Problem> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.email)
    }
}

/// User created by an admin.
#[derive(Clone, Deserialize, ToSchema)]
pub struct CreateUserData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    pub password: Option<String>,
}

impl std::fmt::Debug for CreateUserData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CreateUserData:{}:{}", self.email, self.role)
    }
}

impl CreateUserData {
    pub fn validate(&self) -> Result<(), Problem> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        match &self.password {
            Some(password) => validate_password(password),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateUserData {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateUserData {
    pub fn validate(&self) -> Result<(), Problem> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            user.email = email.trim().to_lowercase();
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub role: Role,
}

fn profile_changes(user: &User) -> Document {
    doc! {
        "$set": {
            "name": user.name.clone(),
            "email": user.email.clone(),
            "google_id": user.google_id.clone(),
        }
    }
}

#[rocket::async_trait]
pub trait UserDb {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self, page: PageState) -> Result<Vec<User>, StoreError>;

    /// Writes name, email and Google id. Returns `false` when no such user exists.
    async fn update_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, StoreError>;

    /// Deletes the user along with their enrollments, progress and reviews.
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn count_courses_by_instructor(&self, instructor: Uuid) -> Result<u64, StoreError>;
}

#[rocket::async_trait]
impl UserDb for MongoStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(user, None)
            .await
            .map_err(StoreError::classify("email"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .collection(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .collection(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email), None)
            .await?)
    }

    async fn list_users(&self, page: PageState) -> Result<Vec<User>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .skip(page.skip())
            .limit(page.limit())
            .build();

        Ok(self
            .collection::<User>(USER_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_one(filter::by_id(user.id), profile_changes(user), None)
            .await
            .map_err(StoreError::classify("email"))?;
        Ok(result.matched_count > 0)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<bool, StoreError> {
        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_one(filter::by_id(id), doc! { "$set": { "role": role.to_string() } }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let by_user = filter::by_ref("user_id", id);
        let removed = async {
            for collection in [
                ENROLLMENT_COLLECTION_NAME,
                PROGRESS_COLLECTION_NAME,
                REVIEW_COLLECTION_NAME,
            ] {
                self.collection::<Document>(collection)
                    .delete_many_with_session(by_user.clone(), None, &mut session)
                    .await?;
            }
            self.collection::<User>(USER_COLLECTION_NAME)
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
                let _ = session.abort_transaction().await;
                Err(e.into())
            }
        }
    }

    async fn count_courses_by_instructor(&self, instructor: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .collection::<bson::Document>(COURSE_COLLECTION_NAME)
            .count_documents(filter::by_ref("instructor_id", instructor), None)
            .await?)
    }
}
