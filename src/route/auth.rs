use chrono::Duration;
use rocket::http::{Cookie, CookieJar};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{LoginData, RegisterData};
use crate::data::user::{User, UserResponse};
use crate::data::DynStore;
use crate::resp::jwt::{AuthToken, AUTH_COOKIE_NAME};
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::security::Security;

/// Private cookie set by the OAuth front end once the provider handshake succeeded.
pub static OAUTH_PROFILE_COOKIE: &str = "oauth_profile";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl ToString) -> Json<MessageResponse> {
        Json(MessageResponse {
            message: message.to_string(),
        })
    }
}

/// Profile stored in the [`OAUTH_PROFILE_COOKIE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProfile {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

/// Signs a token for `user` and stores it in the auth cookie.
pub(crate) fn issue_token(
    user: User,
    message: &str,
    cookies: &CookieJar<'_>,
    config: &Config,
    security: &Security,
) -> Result<AuthResponse, Problem> {
    let token = AuthToken::new(&user, Duration::days(config.token_lifetime_days));
    let jwt = token.encode_jwt(&security.jwt_secret)?;
    cookies.add(token.cookie(&security.jwt_secret)?);

    Ok(AuthResponse {
        message: message.to_string(),
        token: jwt,
        user: user.into(),
    })
}

/// Register a new account
#[utoipa::path(
    request_body = RegisterData,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid name, email or password", body = Problem),
        (status = 409, description = "Email already registered", body = Problem),
    )
)]
#[post("/auth/register", data = "<data>")]
#[tracing::instrument]
pub async fn register(
    data: Json<RegisterData>,
    cookies: &CookieJar<'_>,
    db: &State<DynStore>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<status::Created<Json<AuthResponse>>, Problem> {
    data.validate()?;

    let role = if config.is_admin_email(&data.email) {
        tracing::info!("registering configured admin: {}", data.email);
        Role::Admin
    } else {
        Role::Student
    };

    let data = data.into_inner();
    let user = User::new(data.name.trim(), &data.email, role).with_password(&data.password, &security.salt);
    db.insert_user(&user).await?;

    let location = format!("/api/users/{}", user.id);
    let response = issue_token(user, "User registered successfully", cookies, config, security)?;
    Ok(status::Created::new(location).body(Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Bad email or password", body = Problem),
    )
)]
#[post("/auth/login", data = "<data>")]
#[tracing::instrument]
pub async fn login(
    data: Json<LoginData>,
    cookies: &CookieJar<'_>,
    db: &State<DynStore>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<Json<AuthResponse>, Problem> {
    let user = db
        .find_user_by_email(data.email.trim())
        .await?
        .ok_or_else(user_problem::bad_login)?;

    if !user.check_password(&data.password, &security.salt) {
        return Err(user_problem::bad_login());
    }

    Ok(Json(issue_token(user, "Login successful", cookies, config, security)?))
}

/// Finish Google sign in
///
/// Reads the profile the OAuth front end stored in the encrypted `oauth_profile`
/// cookie, creating a student account for unknown emails.
#[utoipa::path(
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "No OAuth session", body = Problem),
    )
)]
#[post("/auth/google/callback")]
#[tracing::instrument]
pub async fn google_callback(
    cookies: &CookieJar<'_>,
    db: &State<DynStore>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<Json<AuthResponse>, Problem> {
    let profile: OAuthProfile = cookies
        .get_private(OAUTH_PROFILE_COOKIE)
        .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
        .ok_or_else(|| problems::unauthenticated("No OAuth session."))?;
    cookies.remove_private(OAUTH_PROFILE_COOKIE);

    let user = match db.find_user_by_email(&profile.email).await? {
        Some(mut user) => {
            if user.google_id.is_none() {
                user.google_id = Some(profile.google_id);
                db.update_user(&user).await?;
            }
            user
        }
        None => {
            let mut user = User::new(&profile.name, &profile.email, Role::Student);
            user.google_id = Some(profile.google_id);
            db.insert_user(&user).await?;
            user
        }
    };

    Ok(Json(issue_token(user, "Login successful", cookies, config, security)?))
}

/// Current user
#[utoipa::path(
    responses(
        (status = 200, description = "Authenticated user", body = CurrentUser),
        (status = 401, description = "Not authenticated", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/auth/me")]
#[tracing::instrument]
pub async fn me(auth: AuthToken, db: &State<DynStore>) -> Result<Json<CurrentUser>, Problem> {
    let user = db
        .get_user(auth.user)
        .await?
        .ok_or_else(|| problems::unauthenticated("User no longer exists."))?;

    Ok(Json(CurrentUser { user: user.into() }))
}

/// Clear the auth cookie
#[utoipa::path(
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
    )
)]
#[post("/auth/logout")]
#[tracing::instrument]
pub async fn logout(cookies: &CookieJar<'_>) -> Json<MessageResponse> {
    cookies.remove(Cookie::from(AUTH_COOKIE_NAME));
    MessageResponse::new("Logged out successfully")
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Cookie, Status};
    use serde_json::{json, Value};

    use super::{OAuthProfile, OAUTH_PROFILE_COOKIE};
    use crate::resp::jwt::AUTH_COOKIE_NAME;
    use crate::role::Role;
    use crate::route::test_support::*;

    #[rocket::async_test]
    async fn register_returns_token_and_student() {
        let client = client().await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(json!({"name": "Ada", "email": "Ada@Example.com", "password": "correct horse"}).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        assert!(response.cookies().get(AUTH_COOKIE_NAME).is_some());

        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["role"], "student");
        assert!(body["token"].as_str().map(|it| !it.is_empty()).unwrap_or(false));
    }

    #[rocket::async_test]
    async fn register_rejects_duplicate_email() {
        let client = client().await;
        create_user(&client, "taken@example.com", Role::Student).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(json!({"name": "Ada", "email": "taken@example.com", "password": "correct horse"}).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn register_validates_input() {
        let client = client().await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(json!({"name": "Ada", "email": "not-an-email", "password": "correct horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn login_checks_password() {
        let client = client().await;
        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(json!({"name": "Ada", "email": "ada@example.com", "password": "correct horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({"email": "ada@example.com", "password": "wrong horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({"email": "ada@example.com", "password": "correct horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["message"], "Login successful");
    }

    #[rocket::async_test]
    async fn me_requires_token() {
        let client = client().await;
        let response = client.get("/api/auth/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(
            response.content_type().map(|it| it.to_string()),
            Some("application/problem+json".to_string())
        );

        let (user, auth) = create_user(&client, "me@example.com", Role::Instructor).await;
        let response = client.get("/api/auth/me").header(auth).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["user"]["id"], user.id.to_string());
        assert_eq!(body["user"]["role"], "instructor");
    }

    #[rocket::async_test]
    async fn expired_token_is_unauthorized() {
        let client = client().await;
        let (user, _) = create_user(&client, "late@example.com", Role::Student).await;

        let response = client
            .get("/api/auth/me")
            .header(expired_bearer(&user))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["detail"], "Expired JWT signature.");
    }

    #[rocket::async_test]
    async fn google_callback_creates_student() {
        let client = client().await;
        let profile = OAuthProfile {
            google_id: "g-123".to_string(),
            email: "grace@example.com".to_string(),
            name: "Grace".to_string(),
        };

        let response = client
            .post("/api/auth/google/callback")
            .private_cookie(Cookie::new(
                OAUTH_PROFILE_COOKIE,
                serde_json::to_string(&profile).unwrap(),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["user"]["role"], "student");

        let stored = store(&client)
            .find_user_by_email("grace@example.com")
            .await
            .unwrap()
            .expect("user wasn't created");
        assert_eq!(stored.google_id.as_deref(), Some("g-123"));
    }

    #[rocket::async_test]
    async fn google_callback_without_session_is_unauthorized() {
        let client = client().await;
        let response = client.post("/api/auth/google/callback").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
