use std::collections::HashMap;

use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::enrollment::{EnrollRequest, Enrollment, EnrollmentResponse, EnrollmentSummary};
use crate::data::DynStore;
use crate::resp::jwt::AuthToken;
use crate::resp::problem::{problems, Problem};
use crate::route::auth::MessageResponse;
use crate::route::courses::find_course;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentCreated {
    pub message: String,
    pub enrollment: EnrollmentResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentList {
    pub enrollments: Vec<EnrollmentSummary>,
}

/// Enroll in a course
///
/// Only approved and published courses accept enrollments.
#[utoipa::path(
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentCreated),
        (status = 400, description = "Course isn't open for enrollment", body = Problem),
        (status = 404, description = "No such course", body = Problem),
        (status = 409, description = "Already enrolled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/enrollments", data = "<request>")]
#[tracing::instrument]
pub async fn enrollment_create(
    auth: AuthToken,
    request: Json<EnrollRequest>,
    db: &State<DynStore>,
) -> Result<status::Created<Json<EnrollmentCreated>>, Problem> {
    let course = find_course(db, request.course_id).await?;
    if !course.is_public() {
        return Err(problems::validation(
            "course_id",
            "Course isn't open for enrollment.",
        ));
    }

    let enrollment = Enrollment::new(auth.user, course.id);
    db.insert_enrollment(&enrollment).await?;
    tracing::info!("user {} enrolled in course {}", auth.user, course.id);

    Ok(status::Created::new(format!("/api/enrollments/{}", course.id)).body(Json(
        EnrollmentCreated {
            message: "Enrolled successfully".to_string(),
            enrollment: enrollment.into(),
        },
    )))
}

/// Enrollments of the caller
#[utoipa::path(
    responses(
        (status = 200, description = "Newest enrollments first", body = EnrollmentList),
    ),
    security(("jwt" = []))
)]
#[get("/enrollments")]
#[tracing::instrument]
pub async fn enrollment_list(auth: AuthToken, db: &State<DynStore>) -> Result<Json<EnrollmentList>, Problem> {
    let enrollments = db.list_enrollments(auth.user).await?;

    let course_ids: Vec<Uuid> = enrollments.iter().map(|it| it.course_id).collect();
    let titles: HashMap<Uuid, String> = db
        .get_courses(&course_ids)
        .await?
        .into_iter()
        .map(|course| (course.id, course.title))
        .collect();

    let mut summaries = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let completed_lessons = db.completed_lessons(auth.user, enrollment.course_id).await?;
        summaries.push(EnrollmentSummary {
            course_title: titles.get(&enrollment.course_id).cloned(),
            completed_lessons,
            enrollment: enrollment.into(),
        });
    }

    Ok(Json(EnrollmentList {
        enrollments: summaries,
    }))
}

/// Leave a course
#[utoipa::path(
    responses(
        (status = 200, description = "Unenrolled", body = MessageResponse),
        (status = 404, description = "Not enrolled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/enrollments/<course_id>")]
#[tracing::instrument]
pub async fn enrollment_delete(
    course_id: Uuid,
    auth: AuthToken,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    db.delete_enrollment(auth.user, course_id)
        .await?
        .ok_or_else(|| problems::not_found("Enrollment", course_id))?;

    Ok(MessageResponse::new("Unenrolled successfully"))
}
