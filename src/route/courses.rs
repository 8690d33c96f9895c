use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::course::{
    Course, CourseChange, CourseData, CourseDetail, CourseInput, CourseResponse, CourseScope,
    CourseStatus, PublishData, RejectData,
};
use crate::data::module::{ModuleDetail, ModuleInput, ModuleResponse};
use crate::data::review::{ReviewInput, ReviewResponse, ReviewStats};
use crate::data::DynStore;
use crate::middleware::paging::PageState;
use crate::resp::jwt::{AuthToken, Authorized};
use crate::resp::problem::{problems, Problem};
use crate::role::{AdminOnly, InstructorOnly, Role};
use crate::route::auth::MessageResponse;
use crate::route::modules::ModuleChanged;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseList {
    pub courses: Vec<CourseResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseView {
    pub course: CourseDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseChanged {
    pub message: String,
    pub course: CourseResponse,
}

impl CourseChanged {
    fn new(message: &str, course: Course) -> Json<CourseChanged> {
        Json(CourseChanged {
            message: message.to_string(),
            course: course.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleList {
    pub modules: Vec<ModuleResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewList {
    pub reviews: Vec<ReviewResponse>,
    pub stats: ReviewStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewCreated {
    pub message: String,
    pub review: ReviewResponse,
}

pub(crate) async fn find_course(db: &DynStore, id: Uuid) -> Result<Course, Problem> {
    db.get_course(id)
        .await?
        .ok_or_else(|| problems::not_found("Course", id))
}

/// Content of a course may be changed by its instructor and by admins.
pub(crate) fn ensure_manages(auth: &AuthToken, course: &Course) -> Result<(), Problem> {
    if auth.can_manage(course.instructor_id) {
        Ok(())
    } else {
        Err(problems::forbidden("Only the course instructor or an admin can do this."))
    }
}

/// Persists one group of course fields. Fails with 409 when the course status
/// moved on since `read_status` was loaded.
async fn save(
    db: &DynStore,
    course: &Course,
    change: CourseChange,
    read_status: CourseStatus,
) -> Result<(), Problem> {
    if db.update_course(course, change, read_status).await? {
        Ok(())
    } else {
        Err(problems::conflict(
            "The course changed while it was being updated, reload it and try again.",
        ))
    }
}

async fn validated(db: &DynStore, input: CourseInput) -> Result<CourseData, Problem> {
    let data = input.validate()?;
    if let Some(category) = data.category_id {
        if db.get_category(category).await?.is_none() {
            return Err(problems::validation("category_id", "Category doesn't exist."));
        }
    }
    Ok(data)
}

fn listing_scope(auth: Option<&AuthToken>) -> CourseScope {
    match auth {
        Some(auth) if auth.role == Role::Admin => CourseScope::All,
        Some(auth) if auth.role == Role::Instructor => CourseScope::PublicOrOwnedBy(auth.user),
        _ => CourseScope::Public,
    }
}

/// List visible courses
///
/// Anonymous users and students see approved, published courses. Instructors also
/// see their own courses and admins see every course.
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Zero based page"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses(
        (status = 200, description = "Newest courses first", body = CourseList),
    )
)]
#[get("/courses")]
#[tracing::instrument]
pub async fn course_list(
    auth: Option<AuthToken>,
    page: PageState,
    db: &State<DynStore>,
) -> Result<Json<CourseList>, Problem> {
    let courses = db.list_courses(listing_scope(auth.as_ref()), page).await?;

    Ok(Json(CourseList {
        courses: courses.into_iter().map(CourseResponse::from).collect(),
    }))
}

/// Create a course
///
/// New courses wait for admin approval and are unpublished.
#[utoipa::path(
    request_body = CourseInput,
    responses(
        (status = 201, description = "Course created", body = CourseChanged),
        (status = 400, description = "Invalid course data", body = Problem),
        (status = 403, description = "Caller isn't an instructor", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/courses", data = "<input>")]
#[tracing::instrument]
pub async fn course_create(
    instructor: Authorized<InstructorOnly>,
    input: Json<CourseInput>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<CourseChanged>>, Problem> {
    let course = validated(db, input.into_inner())
        .await?
        .into_course(instructor.user);
    db.insert_course(&course).await?;
    tracing::info!("instructor {} created course {}", instructor.user, course.id);

    Ok(status::Created::new(format!("/api/courses/{}", course.id))
        .body(CourseChanged::new("Course created successfully", course)))
}

/// Course with its modules and lessons
#[utoipa::path(
    responses(
        (status = 200, description = "Course content in order", body = CourseView),
        (status = 404, description = "No such course", body = Problem),
    )
)]
#[get("/courses/<id>")]
#[tracing::instrument]
pub async fn course_get(
    id: Uuid,
    auth: Option<AuthToken>,
    db: &State<DynStore>,
) -> Result<Json<CourseView>, Problem> {
    let course = find_course(db, id).await?;
    let lessons = db.list_course_lessons(id).await?;
    let modules = db
        .list_modules(id)
        .await?
        .into_iter()
        .map(|module| ModuleDetail::assemble(module, &lessons))
        .collect();

    let is_enrolled = match &auth {
        Some(auth) => Some(db.find_enrollment(auth.user, id).await?.is_some()),
        None => None,
    };

    Ok(Json(CourseView {
        course: CourseDetail {
            course: course.into(),
            modules,
            is_enrolled,
        },
    }))
}

/// Update course details
#[utoipa::path(
    request_body = CourseInput,
    responses(
        (status = 200, description = "Course updated", body = CourseChanged),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/courses/<id>", data = "<input>")]
#[tracing::instrument]
pub async fn course_update(
    id: Uuid,
    auth: AuthToken,
    input: Json<CourseInput>,
    db: &State<DynStore>,
) -> Result<Json<CourseChanged>, Problem> {
    let mut course = find_course(db, id).await?;
    ensure_manages(&auth, &course)?;

    let read_status = course.status;
    course.apply(validated(db, input.into_inner()).await?);
    save(db, &course, CourseChange::Content, read_status).await?;

    Ok(CourseChanged::new("Course updated successfully", course))
}

/// Approve a pending course
#[utoipa::path(
    responses(
        (status = 200, description = "Course approved", body = CourseChanged),
        (status = 409, description = "Course isn't pending", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/courses/<id>/approve")]
#[tracing::instrument]
pub async fn course_approve(
    id: Uuid,
    admin: Authorized<AdminOnly>,
    db: &State<DynStore>,
) -> Result<Json<CourseChanged>, Problem> {
    let mut course = find_course(db, id).await?;
    let read_status = course.status;
    course.approve()?;
    save(db, &course, CourseChange::Moderation, read_status).await?;
    tracing::info!("admin {} approved course {}", admin.user, id);

    Ok(CourseChanged::new("Course approved successfully", course))
}

/// Reject a pending course
#[utoipa::path(
    request_body = RejectData,
    responses(
        (status = 200, description = "Course rejected", body = CourseChanged),
        (status = 400, description = "Missing reason", body = Problem),
        (status = 409, description = "Course isn't pending", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/courses/<id>/reject", data = "<data>")]
#[tracing::instrument]
pub async fn course_reject(
    id: Uuid,
    admin: Authorized<AdminOnly>,
    data: Json<RejectData>,
    db: &State<DynStore>,
) -> Result<Json<CourseChanged>, Problem> {
    let mut course = find_course(db, id).await?;
    let read_status = course.status;
    course.reject(&data.reason)?;
    save(db, &course, CourseChange::Moderation, read_status).await?;
    tracing::info!("admin {} rejected course {}", admin.user, id);

    Ok(CourseChanged::new("Course rejected", course))
}

/// Publish or unpublish a course
#[utoipa::path(
    request_body = PublishData,
    responses(
        (status = 200, description = "Visibility changed", body = CourseChanged),
        (status = 409, description = "Course isn't approved", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/courses/<id>/publish", data = "<data>")]
#[tracing::instrument]
pub async fn course_publish(
    id: Uuid,
    auth: AuthToken,
    data: Json<PublishData>,
    db: &State<DynStore>,
) -> Result<Json<CourseChanged>, Problem> {
    let mut course = find_course(db, id).await?;
    ensure_manages(&auth, &course)?;

    let read_status = course.status;
    course.set_published(data.is_published)?;
    save(db, &course, CourseChange::Publishing, read_status).await?;

    let message = if course.is_published {
        "Course published successfully"
    } else {
        "Course unpublished successfully"
    };
    Ok(CourseChanged::new(message, course))
}

/// Delete a course with all of its content, enrollments and reviews
#[utoipa::path(
    responses(
        (status = 200, description = "Course deleted", body = MessageResponse),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/courses/<id>")]
#[tracing::instrument]
pub async fn course_delete(
    id: Uuid,
    auth: AuthToken,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    let course = find_course(db, id).await?;
    ensure_manages(&auth, &course)?;

    db.delete_course(id)
        .await?
        .ok_or_else(|| problems::not_found("Course", id))?;

    Ok(MessageResponse::new("Course deleted successfully"))
}

/// Modules of a course
#[utoipa::path(
    responses(
        (status = 200, description = "Modules in order", body = ModuleList),
        (status = 404, description = "No such course", body = Problem),
    )
)]
#[get("/courses/<id>/modules")]
#[tracing::instrument]
pub async fn course_modules(id: Uuid, db: &State<DynStore>) -> Result<Json<ModuleList>, Problem> {
    find_course(db, id).await?;
    let modules = db.list_modules(id).await?;

    Ok(Json(ModuleList {
        modules: modules.into_iter().map(ModuleResponse::from).collect(),
    }))
}

/// Add a module to a course
#[utoipa::path(
    request_body = ModuleInput,
    responses(
        (status = 201, description = "Module created", body = ModuleChanged),
        (status = 400, description = "Missing title", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/courses/<id>/modules", data = "<input>")]
#[tracing::instrument]
pub async fn course_module_create(
    id: Uuid,
    auth: AuthToken,
    input: Json<ModuleInput>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<ModuleChanged>>, Problem> {
    let course = find_course(db, id).await?;
    ensure_manages(&auth, &course)?;

    let input = input.into_inner();
    input.validate()?;
    let next_order = db.next_module_order(id).await?;
    let module = input.into_module(id, next_order)?;
    db.insert_module(&module).await?;

    Ok(status::Created::new(format!("/api/modules/{}", module.id))
        .body(ModuleChanged::new("Module created successfully", module)))
}

/// Reviews of a course with rating statistics
#[utoipa::path(
    responses(
        (status = 200, description = "Newest reviews first", body = ReviewList),
        (status = 404, description = "No such course", body = Problem),
    )
)]
#[get("/courses/<id>/reviews")]
#[tracing::instrument]
pub async fn course_reviews(id: Uuid, db: &State<DynStore>) -> Result<Json<ReviewList>, Problem> {
    find_course(db, id).await?;
    let reviews = db.list_reviews(id).await?;
    let stats = ReviewStats::of(&reviews);

    Ok(Json(ReviewList {
        reviews: reviews.into_iter().map(ReviewResponse::from).collect(),
        stats,
    }))
}

/// Review an enrolled course
#[utoipa::path(
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review stored", body = ReviewCreated),
        (status = 400, description = "Rating out of range", body = Problem),
        (status = 403, description = "Caller isn't enrolled", body = Problem),
        (status = 409, description = "Course already reviewed", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/courses/<id>/reviews", data = "<input>")]
#[tracing::instrument]
pub async fn course_review_create(
    id: Uuid,
    auth: AuthToken,
    input: Json<ReviewInput>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<ReviewCreated>>, Problem> {
    find_course(db, id).await?;
    if db.find_enrollment(auth.user, id).await?.is_none() {
        return Err(problems::forbidden("Only enrolled users can review a course."));
    }

    let author = db
        .get_user(auth.user)
        .await?
        .ok_or_else(|| problems::unauthenticated("User no longer exists."))?;
    let review = input.into_inner().into_review(id, &author)?;
    db.insert_review(&review).await?;

    Ok(status::Created::new(format!("/api/courses/{}/reviews", id)).body(Json(ReviewCreated {
        message: "Review added successfully".to_string(),
        review: review.into(),
    })))
}
