use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::lesson::{LessonInput, LessonResponse};
use crate::data::module::{Module, ModuleDetail, ModuleInput, ModuleResponse};
use crate::data::DynStore;
use crate::resp::jwt::AuthToken;
use crate::resp::problem::{problems, Problem};
use crate::route::auth::MessageResponse;
use crate::route::courses::{ensure_manages, find_course};
use crate::route::lessons::LessonChanged;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleView {
    pub module: ModuleDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleChanged {
    pub message: String,
    pub module: ModuleResponse,
}

impl ModuleChanged {
    pub(crate) fn new(message: &str, module: Module) -> Json<ModuleChanged> {
        Json(ModuleChanged {
            message: message.to_string(),
            module: module.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonList {
    pub lessons: Vec<LessonResponse>,
}

pub(crate) async fn find_module(db: &DynStore, id: Uuid) -> Result<Module, Problem> {
    db.get_module(id)
        .await?
        .ok_or_else(|| problems::not_found("Module", id))
}

/// Checks the caller manages the course owning `module`.
async fn ensure_manages_module(db: &DynStore, auth: &AuthToken, module: &Module) -> Result<(), Problem> {
    let course = find_course(db, module.course_id).await?;
    ensure_manages(auth, &course)
}

/// Module with its lessons
#[utoipa::path(
    responses(
        (status = 200, description = "Module and ordered lessons", body = ModuleView),
        (status = 404, description = "No such module", body = Problem),
    )
)]
#[get("/modules/<id>")]
#[tracing::instrument]
pub async fn module_get(id: Uuid, db: &State<DynStore>) -> Result<Json<ModuleView>, Problem> {
    let module = find_module(db, id).await?;
    let lessons = db.list_lessons(id).await?;

    Ok(Json(ModuleView {
        module: ModuleDetail::assemble(module, &lessons),
    }))
}

/// Update a module
#[utoipa::path(
    request_body = ModuleInput,
    responses(
        (status = 200, description = "Module updated", body = ModuleChanged),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/modules/<id>", data = "<input>")]
#[tracing::instrument]
pub async fn module_update(
    id: Uuid,
    auth: AuthToken,
    input: Json<ModuleInput>,
    db: &State<DynStore>,
) -> Result<Json<ModuleChanged>, Problem> {
    let mut module = find_module(db, id).await?;
    ensure_manages_module(db, &auth, &module).await?;

    input.into_inner().apply(&mut module)?;
    db.update_module(&module).await?;

    Ok(ModuleChanged::new("Module updated successfully", module))
}

/// Delete a module with its lessons
#[utoipa::path(
    responses(
        (status = 200, description = "Module deleted", body = MessageResponse),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/modules/<id>")]
#[tracing::instrument]
pub async fn module_delete(
    id: Uuid,
    auth: AuthToken,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    let module = find_module(db, id).await?;
    ensure_manages_module(db, &auth, &module).await?;

    db.delete_module(id)
        .await?
        .ok_or_else(|| problems::not_found("Module", id))?;

    Ok(MessageResponse::new("Module deleted successfully"))
}

/// Lessons of a module
#[utoipa::path(
    responses(
        (status = 200, description = "Lessons in order", body = LessonList),
        (status = 404, description = "No such module", body = Problem),
    )
)]
#[get("/modules/<id>/lessons")]
#[tracing::instrument]
pub async fn module_lessons(id: Uuid, db: &State<DynStore>) -> Result<Json<LessonList>, Problem> {
    find_module(db, id).await?;
    let lessons = db.list_lessons(id).await?;

    Ok(Json(LessonList {
        lessons: lessons.into_iter().map(LessonResponse::from).collect(),
    }))
}

/// Add a lesson to a module
#[utoipa::path(
    request_body = LessonInput,
    responses(
        (status = 201, description = "Lesson created", body = LessonChanged),
        (status = 400, description = "Invalid lesson data", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/modules/<id>/lessons", data = "<input>")]
#[tracing::instrument]
pub async fn module_lesson_create(
    id: Uuid,
    auth: AuthToken,
    input: Json<LessonInput>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<LessonChanged>>, Problem> {
    let module = find_module(db, id).await?;
    ensure_manages_module(db, &auth, &module).await?;

    let next_order = db.next_lesson_order(id).await?;
    let lesson = input.into_inner().into_lesson(&module, next_order)?;
    db.insert_lesson(&lesson).await?;

    Ok(status::Created::new(format!("/api/lessons/{}", lesson.id))
        .body(LessonChanged::new("Lesson created successfully", lesson)))
}
