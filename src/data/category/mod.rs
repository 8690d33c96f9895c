use utoipa::ToSchema;
use uuid::Uuid;

use crate::resp::problem::{problems, Problem};

pub mod db;

pub static CATEGORY_COLLECTION_NAME: &str = "categories";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl From<Category> for CategoryResponse {
    fn from(value: Category) -> Self {
        CategoryResponse {
            id: value.id,
            name: value.name,
            description: value.description,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryCreateData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryCreateData {
    pub fn into_category(self) -> Result<Category, Problem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(problems::validation("name", "Category name can't be empty."));
        }

        Ok(Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: self.description.trim().to_string(),
        })
    }
}
