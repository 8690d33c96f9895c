//! Builds a full Rocket instance backed by [`MemoryStore`] and a few request
//! shortcuts shared by the route tests.

use chrono::Duration;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use uuid::Uuid;

pub use crate::data::DynStore;

use crate::config::Config;
use crate::data::memory::MemoryStore;
use crate::data::user::User;
use crate::resp::jwt::AuthToken;
use crate::role::Role;
use crate::security::Security;

const JWT_SECRET: &str = "route-test-secret";

fn security() -> Security {
    Security::new([9; 16], JWT_SECRET, "route-test-session")
}

pub async fn client() -> Client {
    let mut config = Config::default();
    config.upload_dir = std::env::temp_dir().join(format!("lms-uploads-{}", Uuid::new_v4()));

    let rocket = crate::build(config, security(), Box::new(MemoryStore::new()))
        .expect("unable to build test instance");
    Client::tracked(rocket).await.expect("invalid backend")
}

pub fn store(client: &Client) -> &DynStore {
    client
        .rocket()
        .state::<DynStore>()
        .expect("store isn't managed")
}

pub fn bearer(user: &User) -> Header<'static> {
    let token = AuthToken::new(user, Duration::days(1))
        .encode_jwt(JWT_SECRET)
        .expect("unable to encode token");
    Header::new("Authorization", format!("Bearer {}", token))
}

pub fn expired_bearer(user: &User) -> Header<'static> {
    let token = AuthToken::new(user, Duration::seconds(-10))
        .encode_jwt(JWT_SECRET)
        .expect("unable to encode token");
    Header::new("Authorization", format!("Bearer {}", token))
}

/// Stores a user directly and returns it with a matching auth header.
pub async fn create_user(client: &Client, email: &str, role: Role) -> (User, Header<'static>) {
    let user = User::new("Test User", email, role);
    store(client)
        .insert_user(&user)
        .await
        .expect("unable to create test user");
    let header = bearer(&user);
    (user, header)
}

fn created_id(body: &Value, entity: &str) -> Uuid {
    body[entity]["id"]
        .as_str()
        .and_then(|it| Uuid::parse_str(it).ok())
        .unwrap_or_else(|| panic!("response has no {} id: {}", entity, body))
}

pub async fn create_course(client: &Client, instructor: &Header<'static>) -> Uuid {
    let response = client
        .post("/api/courses")
        .header(ContentType::JSON)
        .header(instructor.clone())
        .body(json!({"title": "Intro to X", "description": "Basics of X"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created, "course wasn't created");

    let body: Value = response.into_json().await.expect("invalid response json");
    created_id(&body, "course")
}

/// Approves the course as `admin` and publishes it as its `instructor`.
pub async fn publish_course(
    client: &Client,
    course: Uuid,
    instructor: &Header<'static>,
    admin: &Header<'static>,
) {
    let response = client
        .put(format!("/api/courses/{}/approve", course))
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "course wasn't approved");

    let response = client
        .put(format!("/api/courses/{}/publish", course))
        .header(ContentType::JSON)
        .header(instructor.clone())
        .body(json!({"is_published": true}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "course wasn't published");
}

pub async fn create_module(
    client: &Client,
    course: Uuid,
    title: &str,
    order: Option<i32>,
    auth: &Header<'static>,
) -> Uuid {
    let response = client
        .post(format!("/api/courses/{}/modules", course))
        .header(ContentType::JSON)
        .header(auth.clone())
        .body(json!({"title": title, "description": "", "order": order}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created, "module wasn't created");

    let body: Value = response.into_json().await.expect("invalid response json");
    created_id(&body, "module")
}

/// Creates a text lesson.
pub async fn create_lesson(client: &Client, module: Uuid, title: &str, auth: &Header<'static>) -> Uuid {
    let response = client
        .post(format!("/api/modules/{}/lessons", module))
        .header(ContentType::JSON)
        .header(auth.clone())
        .body(json!({"title": title, "content_type": "text", "description": "Read me"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created, "lesson wasn't created");

    let body: Value = response.into_json().await.expect("invalid response json");
    created_id(&body, "lesson")
}

pub async fn enroll(client: &Client, course: Uuid, auth: &Header<'static>) {
    let response = client
        .post("/api/enrollments")
        .header(ContentType::JSON)
        .header(auth.clone())
        .body(json!({ "course_id": course }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created, "enrollment failed");
}
