use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::lesson::LessonResponse;
use crate::resp::problem::{problems, Problem};
use crate::util::non_blank;

pub mod db;

pub static MODULE_COLLECTION_NAME: &str = "modules";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: i32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ModuleInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Appended after the last module when omitted.
    #[serde(default)]
    pub order: Option<i32>,
}

impl ModuleInput {
    pub fn validate(&self) -> Result<String, Problem> {
        non_blank(self.title.as_deref())
            .ok_or_else(|| problems::validation("title", "Module title is required."))
    }

    pub fn into_module(self, course_id: Uuid, next_order: i32) -> Result<Module, Problem> {
        let title = self.validate()?;
        Ok(Module {
            id: Uuid::new_v4(),
            course_id,
            title,
            description: self.description.unwrap_or_default().trim().to_string(),
            order: self.order.unwrap_or(next_order),
            created_at: Utc::now(),
        })
    }

    /// Fields left out of the request keep their current value.
    pub fn apply(self, module: &mut Module) -> Result<(), Problem> {
        if self.title.is_some() {
            module.title = self.validate()?;
        }
        if let Some(description) = self.description {
            module.description = description.trim().to_string();
        }
        if let Some(order) = self.order {
            module.order = order;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Module> for ModuleResponse {
    fn from(value: Module) -> Self {
        ModuleResponse {
            id: value.id,
            course_id: value.course_id,
            title: value.title,
            description: value.description,
            order: value.order,
            created_at: value.created_at,
        }
    }
}

/// A module with its lessons in order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: ModuleResponse,
    pub lessons: Vec<LessonResponse>,
}

impl ModuleDetail {
    /// Picks the lessons of `module` out of `lessons`, which must already be ordered.
    pub fn assemble(module: Module, lessons: &[crate::data::lesson::Lesson]) -> ModuleDetail {
        let lessons = lessons
            .iter()
            .filter(|it| it.module_id == module.id)
            .cloned()
            .map(LessonResponse::from)
            .collect();

        ModuleDetail {
            module: module.into(),
            lessons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: Option<&str>, order: Option<i32>) -> ModuleInput {
        ModuleInput {
            title: title.map(str::to_string),
            description: None,
            order,
        }
    }

    #[test]
    fn order_defaults_to_next_slot() {
        let course = Uuid::new_v4();
        let module = input(Some("Basics"), None).into_module(course, 3).unwrap();
        assert_eq!(module.order, 3);
        assert_eq!(module.course_id, course);

        let module = input(Some("Basics"), Some(1)).into_module(course, 3).unwrap();
        assert_eq!(module.order, 1);
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(input(Some("  "), None).into_module(Uuid::new_v4(), 1).is_err());
        assert!(input(None, None).into_module(Uuid::new_v4(), 1).is_err());
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let mut module = input(Some("Basics"), Some(2)).into_module(Uuid::new_v4(), 1).unwrap();
        input(None, Some(5)).apply(&mut module).unwrap();

        assert_eq!(module.title, "Basics");
        assert_eq!(module.order, 5);
        assert!(input(Some(""), None).apply(&mut module).is_err());
    }
}
