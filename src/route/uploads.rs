use std::path::PathBuf;

use rocket::data::{ByteUnit, Data, ToByteUnit};
use rocket::fs::NamedFile;
use rocket::http::ContentType;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::resp::jwt::AuthToken;
use crate::resp::problem::{problems, Problem};
use crate::role::{RoleSet, Staff};

const IMAGES: &[(&str, &str, &str)] = &[
    ("image", "jpeg", "jpg"),
    ("image", "png", "png"),
    ("image", "gif", "gif"),
];

const DOCUMENTS: &[(&str, &str, &str)] = &[
    ("application", "pdf", "pdf"),
    ("application", "msword", "doc"),
    (
        "application",
        "vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application", "zip", "zip"),
    ("text", "plain", "txt"),
    ("text", "javascript", "js"),
    ("application", "javascript", "js"),
    ("text", "html", "html"),
    ("text", "css", "css"),
];

/// Upload policy, picked by the form field name the client uploads under.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UploadKind {
    Avatar,
    CourseThumbnail,
    Assignment,
    Misc,
}

impl UploadKind {
    pub fn from_field(field: &str) -> UploadKind {
        match field {
            "avatar" => UploadKind::Avatar,
            "courseThumbnail" => UploadKind::CourseThumbnail,
            "assignment" => UploadKind::Assignment,
            _ => UploadKind::Misc,
        }
    }

    pub fn directory(&self) -> &'static str {
        match self {
            UploadKind::Avatar => "avatars",
            UploadKind::CourseThumbnail => "thumbnails",
            UploadKind::Assignment => "assignments",
            UploadKind::Misc => "misc",
        }
    }

    pub fn max_size(&self) -> ByteUnit {
        match self {
            UploadKind::Avatar | UploadKind::CourseThumbnail => 5.mebibytes(),
            UploadKind::Assignment | UploadKind::Misc => 10.mebibytes(),
        }
    }

    fn allowed(&self) -> &'static [(&'static str, &'static str, &'static str)] {
        match self {
            UploadKind::Avatar | UploadKind::CourseThumbnail => IMAGES,
            UploadKind::Assignment | UploadKind::Misc => DOCUMENTS,
        }
    }

    /// File extension for an accepted content type.
    pub fn extension(&self, content_type: &ContentType) -> Option<&'static str> {
        self.allowed()
            .iter()
            .find(|(top, sub, _)| {
                content_type.top().as_str().eq_ignore_ascii_case(top)
                    && content_type.sub().as_str().eq_ignore_ascii_case(sub)
            })
            .map(|(_, _, ext)| *ext)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Relative to the upload directory.
    pub path: String,
    pub url: String,
}

/// Upload a file
///
/// The request body is the raw file and `Content-Type` its MIME type.
#[utoipa::path(
    params(("field" = String, Path, description = "avatar, courseThumbnail, assignment or anything else")),
    request_body(content = [u8], content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Type not allowed or file too large", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/uploads/<field>", data = "<data>")]
#[tracing::instrument(skip(data))]
pub async fn upload(
    field: &str,
    auth: AuthToken,
    content_type: Option<&ContentType>,
    data: Data<'_>,
    config: &State<Config>,
) -> Result<status::Created<Json<UploadResponse>>, Problem> {
    let kind = UploadKind::from_field(field);
    if kind == UploadKind::CourseThumbnail {
        auth.require(Staff::ROLES)?;
    }

    let extension = content_type
        .and_then(|it| kind.extension(it))
        .ok_or_else(|| {
            problems::validation(
                "content_type",
                format!("Invalid file type for {}.", kind.directory()),
            )
        })?;

    let directory = config.upload_dir.join(kind.directory());
    tokio::fs::create_dir_all(&directory).await?;

    let name = format!("{}.{}", Uuid::new_v4(), extension);
    let target = directory.join(&name);

    let file = data.open(kind.max_size()).into_file(&target).await?;
    if !file.is_complete() {
        tracing::debug!("discarding oversized upload '{}'", target.display());
        if let Err(e) = tokio::fs::remove_file(&target).await {
            tracing::warn!("unable to remove partial upload '{}': {}", target.display(), e);
        }
        return Err(problems::validation("file", "File size too large"));
    }

    let path = format!("{}/{}", kind.directory(), name);
    tracing::info!("user {} uploaded '{}'", auth.user, path);

    Ok(status::Created::new(format!("/uploads/{}", path)).body(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        url: format!("/uploads/{}", path),
        path,
    })))
}

/// Serves a stored upload.
#[get("/uploads/<path..>")]
#[tracing::instrument]
pub async fn uploaded_file(path: PathBuf, config: &State<Config>) -> Option<NamedFile> {
    NamedFile::open(config.upload_dir.join(path))
        .await
        .ok()
}
