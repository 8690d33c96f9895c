use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use regex::Regex;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;
use crate::security::Salt;

pub mod db;

pub static USER_COLLECTION_NAME: &str = "users";

#[cfg(not(test))]
const BCRYPT_COST: u32 = 12;
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern must compile");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash([u8; 24]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, salt: &Salt) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        // bcrypt only reads 72 bytes, pre-hashing keeps longer passwords meaningful
        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(BCRYPT_COST, salt, sha.finalize().as_slice(), &mut pw_hash);

        PasswordHash(pw_hash)
    }

    pub fn verify(&self, password: impl AsRef<str>, salt: &Salt) -> bool {
        *self == PasswordHash::new(password, salt)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub pw_hash: Option<PasswordHash>,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl ToString, email: impl AsRef<str>, role: Role) -> User {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new user with UUID: {}", id);

        User {
            id,
            name: name.to_string(),
            email: email.as_ref().trim().to_lowercase(),
            role,
            pw_hash: None,
            google_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_password(mut self, password: impl AsRef<str>, salt: &Salt) -> User {
        self.pw_hash = Some(PasswordHash::new(password, salt));
        self
    }

    pub fn check_password(&self, password: impl AsRef<str>, salt: &Salt) -> bool {
        match &self.pw_hash {
            Some(hash) => hash.verify(password, salt),
            None => false,
        }
    }
}

/// User information safe to send to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
