use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::lesson::Lesson;

pub mod db;

pub static ENROLLMENT_COLLECTION_NAME: &str = "enrollments";
pub static PROGRESS_COLLECTION_NAME: &str = "lesson_progress";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course_id: Uuid,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(user_id: Uuid, course_id: Uuid) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            enrolled_at: Utc::now(),
        }
    }
}

/// A lesson a user has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub lesson_id: Uuid,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub completed_at: DateTime<Utc>,
}

impl LessonProgress {
    pub fn new(user_id: Uuid, lesson: &Lesson) -> LessonProgress {
        LessonProgress {
            id: Uuid::new_v4(),
            user_id,
            course_id: lesson.course_id,
            lesson_id: lesson.id,
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(value: Enrollment) -> Self {
        EnrollmentResponse {
            id: value.id,
            user_id: value.user_id,
            course_id: value.course_id,
            enrolled_at: value.enrolled_at,
        }
    }
}

/// An enrollment of the caller as listed by `GET /api/enrollments`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentSummary {
    #[serde(flatten)]
    pub enrollment: EnrollmentResponse,
    pub course_title: Option<String>,
    pub completed_lessons: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressResponse {
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

impl From<LessonProgress> for ProgressResponse {
    fn from(value: LessonProgress) -> Self {
        ProgressResponse {
            lesson_id: value.lesson_id,
            course_id: value.course_id,
            completed_at: value.completed_at,
        }
    }
}
