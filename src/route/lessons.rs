use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::enrollment::{LessonProgress, ProgressResponse};
use crate::data::lesson::{Lesson, LessonInput, LessonResponse};
use crate::data::DynStore;
use crate::resp::jwt::AuthToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::route::auth::MessageResponse;
use crate::route::courses::{ensure_manages, find_course};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonView {
    pub lesson: LessonResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonChanged {
    pub message: String,
    pub lesson: LessonResponse,
}

impl LessonChanged {
    pub(crate) fn new(message: &str, lesson: Lesson) -> Json<LessonChanged> {
        Json(LessonChanged {
            message: message.to_string(),
            lesson: lesson.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonCompleted {
    pub message: String,
    pub progress: ProgressResponse,
}

async fn find_lesson(db: &DynStore, id: Uuid) -> Result<Lesson, Problem> {
    db.get_lesson(id)
        .await?
        .ok_or_else(|| problems::not_found("Lesson", id))
}

async fn is_enrolled(db: &DynStore, auth: &AuthToken, lesson: &Lesson) -> Result<bool, Problem> {
    Ok(db.find_enrollment(auth.user, lesson.course_id).await?.is_some())
}

/// Lesson content
///
/// Available to enrolled users, the course instructor and admins.
#[utoipa::path(
    responses(
        (status = 200, description = "Lesson", body = LessonView),
        (status = 403, description = "Caller isn't enrolled", body = Problem),
        (status = 404, description = "No such lesson", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/lessons/<id>")]
#[tracing::instrument]
pub async fn lesson_get(id: Uuid, auth: AuthToken, db: &State<DynStore>) -> Result<Json<LessonView>, Problem> {
    let lesson = find_lesson(db, id).await?;

    if auth.role != Role::Admin && !is_enrolled(db, &auth, &lesson).await? {
        let course = find_course(db, lesson.course_id).await?;
        if course.instructor_id != auth.user {
            return Err(problems::forbidden("Enroll in the course to access its lessons."));
        }
    }

    Ok(Json(LessonView {
        lesson: lesson.into(),
    }))
}

/// Update a lesson
#[utoipa::path(
    request_body = LessonInput,
    responses(
        (status = 200, description = "Lesson updated", body = LessonChanged),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/lessons/<id>", data = "<input>")]
#[tracing::instrument]
pub async fn lesson_update(
    id: Uuid,
    auth: AuthToken,
    input: Json<LessonInput>,
    db: &State<DynStore>,
) -> Result<Json<LessonChanged>, Problem> {
    let mut lesson = find_lesson(db, id).await?;
    ensure_manages(&auth, &find_course(db, lesson.course_id).await?)?;

    input.into_inner().apply(&mut lesson)?;
    db.update_lesson(&lesson).await?;

    Ok(LessonChanged::new("Lesson updated successfully", lesson))
}

/// Delete a lesson
#[utoipa::path(
    responses(
        (status = 200, description = "Lesson deleted", body = MessageResponse),
        (status = 403, description = "Caller doesn't manage the course", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/lessons/<id>")]
#[tracing::instrument]
pub async fn lesson_delete(
    id: Uuid,
    auth: AuthToken,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    let lesson = find_lesson(db, id).await?;
    ensure_manages(&auth, &find_course(db, lesson.course_id).await?)?;

    db.delete_lesson(id)
        .await?
        .ok_or_else(|| problems::not_found("Lesson", id))?;

    Ok(MessageResponse::new("Lesson deleted successfully"))
}

/// Mark a lesson as completed
#[utoipa::path(
    responses(
        (status = 200, description = "Progress recorded", body = LessonCompleted),
        (status = 403, description = "Caller isn't enrolled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/lessons/<id>/complete")]
#[tracing::instrument]
pub async fn lesson_complete(
    id: Uuid,
    auth: AuthToken,
    db: &State<DynStore>,
) -> Result<Json<LessonCompleted>, Problem> {
    let lesson = find_lesson(db, id).await?;
    if !is_enrolled(db, &auth, &lesson).await? {
        return Err(problems::forbidden("Enroll in the course to track progress."));
    }

    let progress = db
        .mark_lesson_complete(&LessonProgress::new(auth.user, &lesson))
        .await?;

    Ok(Json(LessonCompleted {
        message: "Lesson marked as completed".to_string(),
        progress: progress.into(),
    }))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    use crate::role::Role;
    use crate::route::test_support::*;

    #[rocket::async_test]
    async fn lesson_access_requires_enrollment() {
        let client = client().await;
        let (_, instructor) = create_user(&client, "instructor@example.com", Role::Instructor).await;
        let (_, admin) = create_user(&client, "admin@example.com", Role::Admin).await;
        let (_, student) = create_user(&client, "student@example.com", Role::Student).await;

        let course = create_course(&client, &instructor).await;
        let module = create_module(&client, course, "Basics", None, &instructor).await;
        let lesson = create_lesson(&client, module, "Welcome", &instructor).await;
        let uri = format!("/api/lessons/{}", lesson);

        let response = client.get(&uri).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client.get(&uri).header(student.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client.get(&uri).header(instructor.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get(&uri).header(admin.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        publish_course(&client, course, &instructor, &admin).await;
        enroll(&client, course, &student).await;

        let response = client.get(&uri).header(student).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn completing_lessons_is_idempotent() {
        let client = client().await;
        let (_, instructor) = create_user(&client, "instructor@example.com", Role::Instructor).await;
        let (_, admin) = create_user(&client, "admin@example.com", Role::Admin).await;
        let (_, student) = create_user(&client, "student@example.com", Role::Student).await;

        let course = create_course(&client, &instructor).await;
        let module = create_module(&client, course, "Basics", None, &instructor).await;
        let lesson = create_lesson(&client, module, "Welcome", &instructor).await;
        let uri = format!("/api/lessons/{}/complete", lesson);

        let response = client.post(&uri).header(student.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        publish_course(&client, course, &instructor, &admin).await;
        enroll(&client, course, &student).await;

        let mut completed_at = vec![];
        for _ in 0..2 {
            let response = client.post(&uri).header(student.clone()).dispatch().await;
            assert_eq!(response.status(), Status::Ok);
            let body: Value = response.into_json().await.unwrap();
            completed_at.push(body["progress"]["completed_at"].clone());
        }
        assert_eq!(completed_at[0], completed_at[1]);

        let response = client.get("/api/enrollments").header(student).dispatch().await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["enrollments"][0]["completed_lessons"], json!([lesson]));
    }

    #[rocket::async_test]
    async fn lesson_update_keeps_video_url_rule() {
        let client = client().await;
        let (_, instructor) = create_user(&client, "instructor@example.com", Role::Instructor).await;
        let course = create_course(&client, &instructor).await;
        let module = create_module(&client, course, "Basics", None, &instructor).await;
        let lesson = create_lesson(&client, module, "Welcome", &instructor).await;

        let response = client
            .put(format!("/api/lessons/{}", lesson))
            .header(ContentType::JSON)
            .header(instructor.clone())
            .body(json!({"content_type": "video"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .put(format!("/api/lessons/{}", lesson))
            .header(ContentType::JSON)
            .header(instructor)
            .body(json!({"title": "Hello", "duration": 15}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["lesson"]["title"], "Hello");
        assert_eq!(body["lesson"]["duration"], 15);
    }
}
