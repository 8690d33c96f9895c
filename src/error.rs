use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("'{0}' is missing and generating security material is disabled")]
    Missing(PathBuf),
    #[error("'{0}' doesn't contain a valid password salt")]
    BadSalt(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Security(#[from] SecurityError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}

/// Errors returned by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(mongodb::error::Error),
    #[error(transparent)]
    BsonEncode(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDecode(#[from] bson::de::Error),
}

const DUPLICATE_KEY_CODE: i32 = 11000;

impl StoreError {
    /// Classifies a driver error, turning duplicate key violations into
    /// [`StoreError::Duplicate`] for the given entity.
    pub fn classify(what: &'static str) -> impl Fn(mongodb::error::Error) -> StoreError {
        move |e| {
            if is_duplicate_key(&e) {
                StoreError::Duplicate(what)
            } else {
                StoreError::Database(e)
            }
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Database(e)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
