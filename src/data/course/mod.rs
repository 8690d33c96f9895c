use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::module::ModuleDetail;
use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;

pub static COURSE_COLLECTION_NAME: &str = "courses";

/// Moderation state of a course, controlled by admins.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Pending,
    Approved,
    Rejected,
}

impl Default for CourseStatus {
    fn default() -> Self {
        CourseStatus::Pending
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseStatus::Pending => write!(f, "pending"),
            CourseStatus::Approved => write!(f, "approved"),
            CourseStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl CourseStatus {
    fn transition(self, to: CourseStatus) -> Result<CourseStatus, Problem> {
        match (self, to) {
            (CourseStatus::Pending, CourseStatus::Approved)
            | (CourseStatus::Pending, CourseStatus::Rejected) => Ok(to),
            (from, to) => Err(problems::conflict(format!(
                "A {} course can't become {}.",
                from, to
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub instructor_id: Uuid,
    #[serde(default, with = "crate::util::option_uuid_as_binary")]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_public(&self) -> bool {
        self.status == CourseStatus::Approved && self.is_published
    }

    pub fn approve(&mut self) -> Result<(), Problem> {
        self.status = self.status.transition(CourseStatus::Approved)?;
        self.rejection_reason = None;
        self.touch();
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), Problem> {
        let reason = non_blank(Some(reason))
            .ok_or_else(|| problems::validation("reason", "A rejection reason is required."))?;

        self.status = self.status.transition(CourseStatus::Rejected)?;
        self.rejection_reason = Some(reason);
        self.is_published = false;
        self.touch();
        Ok(())
    }

    pub fn set_published(&mut self, published: bool) -> Result<(), Problem> {
        if published && self.status != CourseStatus::Approved {
            return Err(problems::conflict(format!(
                "Only approved courses can be published, this one is {}.",
                self.status
            )));
        }
        self.is_published = published;
        self.touch();
        Ok(())
    }

    /// Applies owner edits. Editing a rejected course submits it for review again.
    pub fn apply(&mut self, data: CourseData) {
        self.title = data.title;
        self.description = data.description;
        self.category_id = data.category_id;
        self.price = data.price;
        self.thumbnail = data.thumbnail;
        if self.status == CourseStatus::Rejected {
            self.status = CourseStatus::Pending;
            self.rejection_reason = None;
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Fields a course write touches. Writes only persist their own group so
/// concurrent edits and moderation don't overwrite each other.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CourseChange {
    /// Owner edits, which may also resubmit a rejected course.
    Content,
    /// Approval or rejection.
    Moderation,
    Publishing,
}

impl CourseChange {
    /// Copies the fields of this group from `from` into `to`.
    pub fn copy(self, from: &Course, to: &mut Course) {
        match self {
            CourseChange::Content => {
                to.title = from.title.clone();
                to.description = from.description.clone();
                to.category_id = from.category_id;
                to.price = from.price;
                to.thumbnail = from.thumbnail.clone();
                to.status = from.status;
                to.rejection_reason = from.rejection_reason.clone();
            }
            CourseChange::Moderation => {
                to.status = from.status;
                to.rejection_reason = from.rejection_reason.clone();
                to.is_published = from.is_published;
            }
            CourseChange::Publishing => {
                to.is_published = from.is_published;
            }
        }
        to.updated_at = from.updated_at;
    }
}

/// Course fields supplied by instructors.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, alias = "thumbnail_url")]
    pub thumbnail: Option<String>,
}

/// Validated [`CourseInput`].
#[derive(Debug, Clone)]
pub struct CourseData {
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub price: f64,
    pub thumbnail: Option<String>,
}

impl CourseInput {
    pub fn validate(self) -> Result<CourseData, Problem> {
        let title = non_blank(self.title.as_deref())
            .ok_or_else(|| problems::validation("title", "Course title is required."))?;
        let description = non_blank(self.description.as_deref())
            .ok_or_else(|| problems::validation("description", "Course description is required."))?;

        let price = self.price.unwrap_or(0.0);
        if !price.is_finite() || price < 0.0 {
            return Err(problems::validation("price", "Price can't be negative."));
        }

        Ok(CourseData {
            title,
            description,
            category_id: self.category_id,
            price,
            thumbnail: non_blank(self.thumbnail.as_deref()),
        })
    }
}

impl CourseData {
    /// New courses always wait for moderation and start unpublished.
    pub fn into_course(self, instructor_id: Uuid) -> Course {
        let now = Utc::now();
        Course {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            instructor_id,
            category_id: self.category_id,
            price: self.price,
            thumbnail: self.thumbnail,
            status: CourseStatus::Pending,
            rejection_reason: None,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RejectData {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishData {
    pub is_published: bool,
}

/// Which courses a listing may include.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CourseScope {
    All,
    Public,
    PublicOrOwnedBy(Uuid),
}

impl CourseScope {
    pub fn includes(&self, course: &Course) -> bool {
        match self {
            CourseScope::All => true,
            CourseScope::Public => course.is_public(),
            CourseScope::PublicOrOwnedBy(owner) => {
                course.is_public() || course.instructor_id == *owner
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub instructor_id: Uuid,
    pub category_id: Option<Uuid>,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub status: CourseStatus,
    pub rejection_reason: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(value: Course) -> Self {
        CourseResponse {
            id: value.id,
            title: value.title,
            description: value.description,
            instructor_id: value.instructor_id,
            category_id: value.category_id,
            price: value.price,
            thumbnail: value.thumbnail,
            status: value.status,
            rejection_reason: value.rejection_reason,
            is_published: value.is_published,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// A course with its ordered modules and their lessons.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub modules: Vec<ModuleDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enrolled: Option<bool>,
}
