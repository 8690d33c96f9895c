use std::convert::TryInto;
use std::path::{Path, PathBuf};
use std::{env, fs};

use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::SecurityError;
use crate::util::base64_engine;

const PASSWORD_SALT: &str = "password.salt";
const JWT_SECRET: &str = "jwt.secret";
const SESSION_SECRET: &str = "session.secret";

pub type Salt = [u8; 16];

/// Secret material shared by every request: password salt, JWT signing secret and
/// the secret used for Rocket's private cookies.
#[derive(Clone)]
pub struct Security {
    pub salt: Salt,
    pub jwt_secret: Vec<u8>,
    pub session_secret: Vec<u8>,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Security { .. }")
    }
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn new(salt: Salt, jwt_secret: impl Into<Vec<u8>>, session_secret: impl Into<Vec<u8>>) -> Self {
        Security {
            salt,
            jwt_secret: jwt_secret.into(),
            session_secret: session_secret.into(),
        }
    }

    pub fn load() -> Result<Security, SecurityError> {
        let dir = security_dir();

        if cfg!(feature = "generate-security") {
            fs::create_dir_all(&dir)?;
        }

        tracing::info!("Loading password salt...");
        let salt_path = dir.join(PASSWORD_SALT);
        let salt: Salt = match fs::read(&salt_path) {
            Ok(bytes) => {
                tracing::info!("Salt found and loaded.");
                bytes
                    .try_into()
                    .map_err(|_| SecurityError::BadSalt(salt_path.clone()))?
            }
            Err(_) => {
                tracing::info!("Salt not found in '{}'.", salt_path.display());
                if !cfg!(feature = "generate-security") {
                    return Err(SecurityError::Missing(salt_path));
                }
                tracing::info!("Generating a new password salt.");
                let salt: Salt = rand::random();
                fs::write(&salt_path, salt)?;
                salt
            }
        };

        tracing::info!("Loading JWT signing secret...");
        let jwt_secret = load_secret("JWT_SECRET", &dir.join(JWT_SECRET))?;

        tracing::info!("Loading session secret...");
        let session_secret = load_secret("SESSION_SECRET", &dir.join(SESSION_SECRET))?;

        Ok(Security {
            salt,
            jwt_secret,
            session_secret,
        })
    }

    /// Rocket `secret_key` derived from the session secret: SHA-256, base64 encoded.
    pub fn cookie_key(&self) -> String {
        let digest = Sha256::digest(&self.session_secret);
        base64_engine().encode(digest)
    }
}

fn load_secret(var: &str, path: &Path) -> Result<Vec<u8>, SecurityError> {
    if let Ok(value) = env::var(var) {
        if !value.is_empty() {
            tracing::info!("Using secret from {} environment variable.", var);
            return Ok(value.into_bytes());
        }
    }

    match fs::read(path) {
        Ok(secret) if !secret.is_empty() => {
            tracing::info!("Loaded secret from '{}'.", path.display());
            Ok(secret)
        }
        _ => {
            if !cfg!(feature = "generate-security") {
                return Err(SecurityError::Missing(path.to_path_buf()));
            }
            tracing::warn!(
                "{} isn't set and '{}' is missing. Generating a new secret.",
                var,
                path.display()
            );
            let secret: Vec<u8> = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(64)
                .collect();
            fs::write(path, &secret)?;
            Ok(secret)
        }
    }
}
