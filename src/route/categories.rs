use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::category::{CategoryCreateData, CategoryResponse};
use crate::data::DynStore;
use crate::resp::jwt::Authorized;
use crate::resp::problem::{problems, Problem};
use crate::role::AdminOnly;
use crate::route::auth::MessageResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryList {
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryCreated {
    pub message: String,
    pub category: CategoryResponse,
}

/// List categories by name
#[utoipa::path(
    responses(
        (status = 200, description = "All categories", body = CategoryList),
    )
)]
#[get("/categories")]
#[tracing::instrument]
pub async fn category_list(db: &State<DynStore>) -> Result<Json<CategoryList>, Problem> {
    let categories = db.list_categories().await?;

    Ok(Json(CategoryList {
        categories: categories.into_iter().map(CategoryResponse::from).collect(),
    }))
}

/// Create a category
#[utoipa::path(
    request_body = CategoryCreateData,
    responses(
        (status = 201, description = "Category created", body = CategoryCreated),
        (status = 409, description = "Name already used", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/categories", data = "<data>")]
#[tracing::instrument]
pub async fn category_create(
    _admin: Authorized<AdminOnly>,
    data: Json<CategoryCreateData>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<CategoryCreated>>, Problem> {
    let category = data.into_inner().into_category()?;
    db.insert_category(&category).await?;

    Ok(status::Created::new(format!("/api/categories/{}", category.id)).body(Json(
        CategoryCreated {
            message: "Category created successfully".to_string(),
            category: category.into(),
        },
    )))
}

/// Delete an unused category
#[utoipa::path(
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 409, description = "Courses still use the category", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/categories/<id>")]
#[tracing::instrument]
pub async fn category_delete(
    id: Uuid,
    _admin: Authorized<AdminOnly>,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    let in_use = db.count_courses_in_category(id).await?;
    if in_use > 0 {
        return Err(problems::conflict(format!(
            "Category is used by {} course(s).",
            in_use
        )));
    }

    db.delete_category(id)
        .await?
        .ok_or_else(|| problems::not_found("Category", id))?;

    Ok(MessageResponse::new("Category deleted successfully"))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    use crate::role::Role;
    use crate::route::test_support::*;

    #[rocket::async_test]
    async fn categories_are_admin_managed() {
        let client = client().await;
        let (_, admin) = create_user(&client, "admin@example.com", Role::Admin).await;
        let (_, instructor) = create_user(&client, "instructor@example.com", Role::Instructor).await;

        let body = json!({"name": "Programming", "description": "Code"}).to_string();
        let response = client
            .post("/api/categories")
            .header(ContentType::JSON)
            .header(instructor)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post("/api/categories")
            .header(ContentType::JSON)
            .header(admin.clone())
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .post("/api/categories")
            .header(ContentType::JSON)
            .header(admin)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);

        let response = client.get("/api/categories").dispatch().await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["categories"][0]["name"], "Programming");
    }

    #[rocket::async_test]
    async fn category_in_use_is_kept() {
        let client = client().await;
        let (_, admin) = create_user(&client, "admin@example.com", Role::Admin).await;
        let (_, instructor) = create_user(&client, "instructor@example.com", Role::Instructor).await;

        let response = client
            .post("/api/categories")
            .header(ContentType::JSON)
            .header(admin.clone())
            .body(json!({"name": "Design"}).to_string())
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        let category = body["category"]["id"].as_str().unwrap().to_string();

        let response = client
            .post("/api/courses")
            .header(ContentType::JSON)
            .header(instructor)
            .body(json!({"title": "Colors", "description": "Theory", "category_id": category}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .delete(format!("/api/categories/{}", category))
            .header(admin)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }
}
