use rocket::http::{Cookie, CookieJar};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::user::db::{CreateUserData, RoleUpdate, UpdateUserData};
use crate::data::user::{User, UserResponse};
use crate::data::DynStore;
use crate::middleware::paging::PageState;
use crate::resp::jwt::{AuthToken, Authorized, AUTH_COOKIE_NAME};
use crate::resp::problem::{problems, Problem};
use crate::role::AdminOnly;
use crate::route::auth::{CurrentUser, MessageResponse};
use crate::security::Security;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserChanged {
    pub message: String,
    pub user: UserResponse,
}

impl UserChanged {
    fn new(message: &str, user: User) -> Json<UserChanged> {
        Json(UserChanged {
            message: message.to_string(),
            user: user.into(),
        })
    }
}

async fn find_user(db: &DynStore, id: Uuid) -> Result<User, Problem> {
    db.get_user(id)
        .await?
        .ok_or_else(|| problems::not_found("User", id))
}

fn self_or_admin(auth: &AuthToken, id: Uuid) -> Result<(), Problem> {
    if auth.is_self_or_admin(id) {
        Ok(())
    } else {
        Err(problems::forbidden("Only admins can access other users."))
    }
}

/// List users
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Zero based page"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses(
        (status = 200, description = "Users ordered by registration", body = UserList),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users")]
#[tracing::instrument]
pub async fn user_list(
    _admin: Authorized<AdminOnly>,
    page: PageState,
    db: &State<DynStore>,
) -> Result<Json<UserList>, Problem> {
    let users = db.list_users(page).await?;

    Ok(Json(UserList {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// Create a user with any role
#[utoipa::path(
    request_body = CreateUserData,
    responses(
        (status = 201, description = "User created", body = UserChanged),
        (status = 409, description = "Email already registered", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/users", data = "<data>")]
#[tracing::instrument]
pub async fn user_create(
    _admin: Authorized<AdminOnly>,
    data: Json<CreateUserData>,
    db: &State<DynStore>,
    security: &State<Security>,
) -> Result<status::Created<Json<UserChanged>>, Problem> {
    data.validate()?;

    let data = data.into_inner();
    let mut user = User::new(data.name.trim(), &data.email, data.role);
    if let Some(password) = &data.password {
        user = user.with_password(password, &security.salt);
    }
    db.insert_user(&user).await?;

    Ok(status::Created::new(format!("/api/users/{}", user.id))
        .body(UserChanged::new("User created successfully", user)))
}

/// Get a user
#[utoipa::path(
    responses(
        (status = 200, description = "User information", body = CurrentUser),
        (status = 403, description = "Not the caller and caller isn't an admin", body = Problem),
        (status = 404, description = "No such user", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/users/<id>")]
#[tracing::instrument]
pub async fn user_get(id: Uuid, auth: AuthToken, db: &State<DynStore>) -> Result<Json<CurrentUser>, Problem> {
    self_or_admin(&auth, id)?;
    let user = find_user(db, id).await?;

    Ok(Json(CurrentUser { user: user.into() }))
}

/// Update name or email
#[utoipa::path(
    request_body = UpdateUserData,
    responses(
        (status = 200, description = "User updated", body = UserChanged),
        (status = 409, description = "Email already registered", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/users/<id>", data = "<data>")]
#[tracing::instrument]
pub async fn user_update(
    id: Uuid,
    auth: AuthToken,
    data: Json<UpdateUserData>,
    db: &State<DynStore>,
) -> Result<Json<UserChanged>, Problem> {
    self_or_admin(&auth, id)?;
    data.validate()?;

    let mut user = find_user(db, id).await?;
    data.into_inner().apply(&mut user);
    db.update_user(&user).await?;

    Ok(UserChanged::new("User updated successfully", user))
}

/// Change a user's role
#[utoipa::path(
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role changed", body = UserChanged),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/users/<id>/role", data = "<data>")]
#[tracing::instrument]
pub async fn user_set_role(
    id: Uuid,
    _admin: Authorized<AdminOnly>,
    data: Json<RoleUpdate>,
    db: &State<DynStore>,
) -> Result<Json<UserChanged>, Problem> {
    let mut user = find_user(db, id).await?;
    user.role = data.role;
    if !db.set_user_role(id, user.role).await? {
        return Err(problems::not_found("User", id));
    }
    tracing::info!("user {} is now {}", user.id, user.role);

    Ok(UserChanged::new("User role updated successfully", user))
}

/// Delete a user along with their enrollments, progress and reviews
#[utoipa::path(
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "No such user", body = Problem),
        (status = 409, description = "User still owns courses", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/users/<id>")]
#[tracing::instrument]
pub async fn user_delete(
    id: Uuid,
    auth: AuthToken,
    cookies: &CookieJar<'_>,
    db: &State<DynStore>,
) -> Result<Json<MessageResponse>, Problem> {
    self_or_admin(&auth, id)?;

    // a demoted or promoted instructor keeps their courses
    let owned = db.count_courses_by_instructor(id).await?;
    if owned > 0 {
        return Err(problems::conflict(format!(
            "User still owns {} course(s).",
            owned
        )));
    }

    db.delete_user(id)
        .await?
        .ok_or_else(|| problems::not_found("User", id))?;

    if auth.user == id {
        cookies.remove(Cookie::from(AUTH_COOKIE_NAME));
    }

    Ok(MessageResponse::new("User deleted successfully"))
}
