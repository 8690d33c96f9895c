use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, Route, State};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod categories;
pub mod courses;
pub mod enrollments;
pub mod lessons;
pub mod modules;
pub mod uploads;
pub mod users;

#[cfg(test)]
pub mod test_support;

use auth::*;
use categories::*;
use courses::*;
use enrollments::*;
use lessons::*;
use modules::*;
use uploads::*;
use users::*;

use crate::data::{
    category as cd, course as crd, enrollment as ed, lesson as ld, module as md, review as rd,
    user as ud, DynStore,
};
use crate::resp::jwt::doc::JWTAuth;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;

#[derive(OpenApi)]
#[openapi(
    paths(
        db_test,
        register,
        login,
        google_callback,
        me,
        logout,
        user_list,
        user_create,
        user_get,
        user_update,
        user_set_role,
        user_delete,
        category_list,
        category_create,
        category_delete,
        course_list,
        course_create,
        course_get,
        course_update,
        course_approve,
        course_reject,
        course_publish,
        course_delete,
        course_modules,
        course_module_create,
        course_reviews,
        course_review_create,
        module_get,
        module_update,
        module_delete,
        module_lessons,
        module_lesson_create,
        lesson_get,
        lesson_update,
        lesson_delete,
        lesson_complete,
        enrollment_create,
        enrollment_list,
        enrollment_delete,
        upload
    ),
    components(schemas(
        Role,
        ud::UserResponse,
        ud::db::RegisterData,
        ud::db::LoginData,
        ud::db::CreateUserData,
        ud::db::UpdateUserData,
        ud::db::RoleUpdate,
        cd::CategoryResponse,
        cd::CategoryCreateData,
        crd::CourseStatus,
        crd::CourseResponse,
        crd::CourseDetail,
        crd::CourseInput,
        crd::RejectData,
        crd::PublishData,
        md::ModuleResponse,
        md::ModuleDetail,
        md::ModuleInput,
        ld::ContentType,
        ld::LessonResponse,
        ld::LessonInput,
        ed::EnrollRequest,
        ed::EnrollmentResponse,
        ed::EnrollmentSummary,
        ed::ProgressResponse,
        rd::ReviewInput,
        rd::ReviewResponse,
        rd::ReviewStats,
        HealthResponse,
        AuthResponse,
        CurrentUser,
        MessageResponse,
        UserList,
        UserChanged,
        CategoryList,
        CategoryCreated,
        CourseList,
        CourseView,
        CourseChanged,
        ModuleList,
        ReviewList,
        ReviewCreated,
        ModuleView,
        ModuleChanged,
        LessonList,
        LessonView,
        LessonChanged,
        LessonCompleted,
        EnrollmentCreated,
        EnrollmentList,
        UploadResponse,
        Problem
    )),
    modifiers(&JWTAuth, &API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub message: String,
    pub time: DateTime<Utc>,
}

#[get("/")]
pub fn index() -> &'static str {
    "API is working"
}

/// Database connectivity check
#[utoipa::path(
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = Problem),
    )
)]
#[get("/test")]
#[tracing::instrument]
pub async fn db_test(db: &State<DynStore>) -> Result<Json<HealthResponse>, Problem> {
    db.ping().await?;

    Ok(Json(HealthResponse {
        message: "Database connection successful".to_string(),
        time: Utc::now(),
    }))
}

/// Renders every error status as a problem document. Guards store the problem
/// they failed with in the request local cache.
#[catch(default)]
pub fn problem_catcher(status: Status, req: &Request<'_>) -> Problem {
    if let Some(problem) = req.local_cache(|| None::<Problem>) {
        if problem.status == status {
            return problem.clone();
        }
    }

    match status.code {
        400 | 422 => problems::parse_problem(),
        404 => Problem::new_untyped(Status::NotFound, "Resource not found."),
        500 => {
            tracing::error!("unhandled server error for: {} {}", req.method(), req.uri());
            problems::server_error()
        }
        _ => Problem::new_untyped(status, status.reason().unwrap_or("Request failed.")),
    }
}

pub fn api() -> Vec<Route> {
    routes![
        db_test,
        register,
        login,
        google_callback,
        me,
        logout,
        user_list,
        user_create,
        user_get,
        user_update,
        user_set_role,
        user_delete,
        category_list,
        category_create,
        category_delete,
        course_list,
        course_create,
        course_get,
        course_update,
        course_approve,
        course_reject,
        course_publish,
        course_delete,
        course_modules,
        course_module_create,
        course_reviews,
        course_review_create,
        module_get,
        module_update,
        module_delete,
        module_lessons,
        module_lesson_create,
        lesson_get,
        lesson_update,
        lesson_delete,
        lesson_complete,
        enrollment_create,
        enrollment_list,
        enrollment_delete,
        upload
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .mount("/", routes![index, uploaded_file])
        .register("/", catchers![problem_catcher])
}
