use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::module::Module;
use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;

pub static LESSON_COLLECTION_NAME: &str = "lessons";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Text,
    Assignment,
    Quiz,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub module_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course_id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    pub order: i32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LessonInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub order: Option<i32>,
}

/// Only video lessons point at external content.
fn content_url(content_type: ContentType, url: Option<&str>) -> Result<Option<String>, Problem> {
    match content_type {
        ContentType::Video => match non_blank(url) {
            Some(url) => Ok(Some(url)),
            None => Err(problems::validation(
                "content_url",
                "Video lessons need a content URL.",
            )),
        },
        _ => Ok(None),
    }
}

impl LessonInput {
    pub fn into_lesson(self, module: &Module, next_order: i32) -> Result<Lesson, Problem> {
        let title = non_blank(self.title.as_deref())
            .ok_or_else(|| problems::validation("title", "Lesson title is required."))?;
        let content_type = self.content_type.unwrap_or_default();

        Ok(Lesson {
            id: Uuid::new_v4(),
            module_id: module.id,
            course_id: module.course_id,
            title,
            content_type,
            content_url: content_url(content_type, self.content_url.as_deref())?,
            description: self.description.unwrap_or_default(),
            duration: self.duration,
            order: self.order.unwrap_or(next_order),
            created_at: Utc::now(),
        })
    }

    /// Fields left out of the request keep their current value.
    pub fn apply(self, lesson: &mut Lesson) -> Result<(), Problem> {
        if let Some(title) = self.title {
            lesson.title = non_blank(Some(&title))
                .ok_or_else(|| problems::validation("title", "Lesson title is required."))?;
        }

        let content_type = self.content_type.unwrap_or(lesson.content_type);
        let url = self.content_url.or_else(|| lesson.content_url.clone());
        lesson.content_url = content_url(content_type, url.as_deref())?;
        lesson.content_type = content_type;

        if let Some(description) = self.description {
            lesson.description = description;
        }
        if self.duration.is_some() {
            lesson.duration = self.duration;
        }
        if let Some(order) = self.order {
            lesson.order = order;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    pub id: Uuid,
    pub module_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    pub content_url: Option<String>,
    pub description: String,
    pub duration: Option<u32>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Lesson> for LessonResponse {
    fn from(value: Lesson) -> Self {
        LessonResponse {
            id: value.id,
            module_id: value.module_id,
            course_id: value.course_id,
            title: value.title,
            content_type: value.content_type,
            content_url: value.content_url,
            description: value.description,
            duration: value.duration,
            order: value.order,
            created_at: value.created_at,
        }
    }
}
