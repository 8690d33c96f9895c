use std::marker::PhantomData;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome::{Error, Forward, Success};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::problem::{problems, Problem};
use crate::data::user::User;
use crate::role::{Role, RoleSet};
use crate::security::Security;
use crate::util::date_time_as_unix_seconds;

pub static AUTH_COOKIE_NAME: &str = "jwt_auth";

/// Claims carried by the bearer token of an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthToken {
    pub fn new(user: &User, lifetime: Duration) -> AuthToken {
        let now = Utc::now();
        AuthToken {
            iat: now,
            exp: now + lifetime,
            user: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.exp
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, &self, &EncodingKey::from_secret(secret.as_ref()))
    }

    pub fn cookie(&self, secret: impl AsRef<[u8]>) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(secret)?))
            .secure(true)
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }

    /// Admins manage everything, instructors manage what they own.
    pub fn can_manage(&self, owner: Uuid) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Instructor => self.user == owner,
            Role::Student => false,
        }
    }

    /// Access to a user record: the user themselves or an admin.
    pub fn is_self_or_admin(&self, id: Uuid) -> bool {
        self.user == id || self.role == Role::Admin
    }

    pub fn require(&self, allowed: &[Role]) -> Result<(), Problem> {
        if self.role.permits(allowed) {
            Ok(())
        } else {
            Err(problems::forbidden(format!(
                "Role '{}' isn't allowed to perform this action.",
                self.role
            )))
        }
    }
}

/// Verifies signature and expiry of a token. Expired tokens are rejected even
/// when their signature is valid.
pub fn decode_token(token: &str, secret: impl AsRef<[u8]>) -> Result<AuthToken, Problem> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<AuthToken>(token, &DecodingKey::from_secret(secret.as_ref()), &validation)
        .map(|data| data.claims)
        .map_err(Problem::from)
}

fn bearer_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

pub fn extract_claims(
    req: &Request<'_>,
    cookies: &CookieJar,
    secret: impl AsRef<[u8]>,
) -> Result<AuthToken, Problem> {
    let token = match bearer_token(req) {
        Some(token) => token.to_string(),
        None => match cookies.get(AUTH_COOKIE_NAME) {
            Some(jwt) => jwt.value().to_owned(),
            None => return Err(problems::unauthenticated("No bearer token or auth cookie.")),
        },
    };

    let claims = decode_token(&token, secret)?;
    tracing::debug!("decoded auth token for user: {}", claims.user);

    Ok(claims)
}

/// Makes the problem available to the catcher rendering the failed request.
fn fail<T>(req: &Request<'_>, status: Status, problem: Problem) -> request::Outcome<T, Problem> {
    req.local_cache(|| Some(problem.clone()));
    Error((status, problem))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                tracing::error!("security material isn't managed");
                return fail(req, Status::InternalServerError, problems::server_error());
            }
        };

        tracing::trace!("extracting auth token from request");
        match extract_claims(req, req.cookies(), &security.jwt_secret) {
            Ok(claims) => Success(claims),
            Err(e) => {
                tracing::debug!("unable to authenticate request: {}", e);
                fail(req, Status::Unauthorized, e)
            }
        }
    }
}

/// An authenticated caller whose role belongs to `P`.
#[derive(Debug)]
pub struct Authorized<P: RoleSet> {
    pub token: AuthToken,
    _policy: PhantomData<P>,
}

impl<P: RoleSet> std::ops::Deref for Authorized<P> {
    type Target = AuthToken;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

#[rocket::async_trait]
impl<'r, P: RoleSet> FromRequest<'r> for Authorized<P> {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match req.guard::<AuthToken>().await {
            Success(token) => token,
            Error(e) => return Error(e),
            Forward(status) => return Forward(status),
        };

        match token.require(P::ROLES) {
            Ok(()) => Success(Authorized {
                token,
                _policy: PhantomData,
            }),
            Err(problem) => fail(req, Status::Forbidden, problem),
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            )
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}
