use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AdminIdentity;
use crate::features::files::dtos::{
    DownloadQueryParams, FileDto, FileTransitionDto, QuotaDto, UploadFileForm,
};
use crate::features::files::services::{FileLifecycleService, QuotaService};
use crate::modules::storage::is_valid_blob_id;
use crate::shared::lifecycle::TransitionOutcome;
use crate::shared::types::ApiResponse;

/// Shared state for file handlers
#[derive(Clone)]
pub struct FileHandlerState {
    pub files: Arc<FileLifecycleService>,
    pub quota: Arc<QuotaService>,
    pub trash_retention: chrono::Duration,
}

fn validate_file_id(id: &str) -> Result<()> {
    if is_valid_blob_id(id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid file id: {}", id)))
    }
}

fn transition_message(action: &str, outcome: TransitionOutcome) -> String {
    match outcome {
        TransitionOutcome::Applied => format!("File {}", action),
        TransitionOutcome::AlreadyApplied => format!("File already {}", action),
        TransitionOutcome::NotFound => "File not found, nothing to do".to_string(),
        TransitionOutcome::NotEligible => format!("File cannot be {} yet", action),
    }
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    debug!("Failed to read multipart data: {}", e);
    AppError::BadRequest(format!("Failed to read multipart data: {}", e))
}

fn parse_number<T: std::str::FromStr>(field: &str, text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a whole number", field)))
}

/// Name safe to place in a `Content-Disposition` header
fn attachment_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

/// Upload a file on behalf of a user
///
/// Accepts multipart/form-data with:
/// - `file`: the file to upload (required)
/// - `expires_in_hours`: time limit (optional, no limit when omitted)
/// - `max_downloads`: download limit (optional, unlimited when omitted)
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/files",
    params(("id" = Uuid, Path, description = "Owner user id")),
    request_body(
        content = UploadFileForm,
        content_type = "multipart/form-data",
        description = "File upload form with optional time and download limits",
    ),
    responses(
        (status = 201, description = "File uploaded", body = ApiResponse<FileDto>),
        (status = 400, description = "Invalid form or unknown owner"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn upload_file(
    admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(owner_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileDto>>)> {
    let mut form = UploadFileForm::default();
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = Some(field.file_name().unwrap_or("unnamed").to_string());
                form.file = field.bytes().await.map_err(multipart_error)?.to_vec();
            }
            "expires_in_hours" => {
                let text = field.text().await.map_err(multipart_error)?;
                form.expires_in_hours = Some(parse_number(&field_name, &text)?);
            }
            "max_downloads" => {
                let text = field.text().await.map_err(multipart_error)?;
                form.max_downloads = Some(parse_number(&field_name, &text)?);
            }
            _ => debug!("Ignoring unknown field: {}", field_name),
        }
    }

    let file_name =
        file_name.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    form.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let expires_in = form.expires_in_hours.map(Duration::hours);
    let limits = state.files.limits_from_now(expires_in, form.max_downloads);
    let file = state
        .files
        .register_upload(owner_id, &file_name, &form.file, limits, &admin.actor())
        .await?;
    let file_state = state.files.state_of(&file);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(FileDto::new(file, file_state)),
            Some("File uploaded".to_string()),
            None,
        )),
    ))
}

/// Download an active file, consuming one download
#[utoipa::path(
    get,
    path = "/api/admin/files/{id}/download",
    params(
        ("id" = String, Path, description = "File id"),
        DownloadQueryParams
    ),
    responses(
        (status = 200, description = "File content as an octet stream attachment"),
        (status = 400, description = "Invalid file id or unknown download account"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File missing, expired or trashed")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn download_file(
    _admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(id): Path<String>,
    Query(params): Query<DownloadQueryParams>,
) -> Result<Response> {
    validate_file_id(&id)?;

    let content = state
        .files
        .download_file(&id, params.download_account_id)
        .await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(&content.file_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content.data,
    )
        .into_response())
}

/// Move a file to the trash
#[utoipa::path(
    post,
    path = "/api/admin/files/{id}/trash",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Trash request handled (see outcome)", body = ApiResponse<FileTransitionDto>),
        (status = 400, description = "Invalid file id"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn trash_file(
    admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileTransitionDto>>> {
    validate_file_id(&id)?;

    let outcome = state.files.trash_file(&id, &admin.actor()).await?;

    Ok(Json(ApiResponse::success(
        Some(FileTransitionDto {
            file_id: id,
            outcome,
        }),
        Some(transition_message("trashed", outcome)),
        None,
    )))
}

/// Restore a trashed file
#[utoipa::path(
    post,
    path = "/api/admin/files/{id}/restore",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Restore request handled (see outcome)", body = ApiResponse<FileTransitionDto>),
        (status = 400, description = "Invalid file id"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn restore_file(
    admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileTransitionDto>>> {
    validate_file_id(&id)?;

    let outcome = state.files.restore_file(&id, &admin.actor()).await?;

    Ok(Json(ApiResponse::success(
        Some(FileTransitionDto {
            file_id: id,
            outcome,
        }),
        Some(transition_message("restored", outcome)),
        None,
    )))
}

/// Permanently remove a file whose trash retention window has elapsed
#[utoipa::path(
    post,
    path = "/api/admin/files/{id}/purge",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Purge request handled (see outcome)", body = ApiResponse<FileTransitionDto>),
        (status = 400, description = "Invalid file id"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn purge_file(
    admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileTransitionDto>>> {
    validate_file_id(&id)?;

    let outcome = state
        .files
        .purge_file(&id, state.trash_retention, &admin.actor())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(FileTransitionDto {
            file_id: id,
            outcome,
        }),
        Some(transition_message("purged", outcome)),
        None,
    )))
}

/// Recompute a user's consumed storage from their files
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/quota",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Quota recomputed", body = ApiResponse<QuotaDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    tag = "files",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn recompute_quota(
    admin: AdminIdentity,
    State(state): State<FileHandlerState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<QuotaDto>>> {
    let consumed_storage_mb = state
        .quota
        .recompute_audited(user_id, &admin.actor())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(QuotaDto {
            user_id,
            consumed_storage_mb,
        }),
        None,
        None,
    )))
}

#[cfg(test)]
mod tests {
    use crate::features::files::routes;
    use crate::modules::storage::BlobStore;
    use crate::shared::clock::Clock;
    use crate::shared::constants::BYTES_PER_MEGABYTE;
    use crate::shared::test_helpers::{admin_auth, admin_server, permanent_file, TestServices};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;

    fn server(services: &TestServices) -> axum_test::TestServer {
        admin_server(routes(services.files.clone(), services.quota.clone(), 5))
    }

    #[tokio::test]
    async fn test_trash_and_restore_over_http() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        services
            .store
            .put_file(permanent_file("f1", owner, 10, services.clock.now()));
        let server = server(&services);
        let (name, value) = admin_auth();

        let response = server
            .post("/api/admin/files/f1/trash")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["outcome"], "applied");

        let file = services.store.file("f1").unwrap();
        assert_eq!(file.soft_deleted_by.as_deref(), Some("admin:ops"));

        let again: Value = server
            .post("/api/admin/files/f1/trash")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(again["data"]["outcome"], "already_applied");

        let restored: Value = server
            .post("/api/admin/files/f1/restore")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(restored["data"]["outcome"], "applied");
        assert!(!services.store.file("f1").unwrap().is_trashed());
    }

    #[tokio::test]
    async fn test_purge_waits_for_retention() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        services
            .store
            .put_file(permanent_file("f1", owner, 10, services.clock.now()));
        services.blobs.put_blob("f1", b"bytes").await.unwrap();
        let server = server(&services);
        let (name, value) = admin_auth();

        server
            .post("/api/admin/files/f1/trash")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let early: Value = server
            .post("/api/admin/files/f1/purge")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(early["data"]["outcome"], "not_eligible");
        assert!(services.store.file("f1").is_some());

        services.clock.advance(chrono::Duration::days(5));
        let purged: Value = server
            .post("/api/admin/files/f1/purge")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(purged["data"]["outcome"], "applied");
        assert!(services.store.file("f1").is_none());
        assert!(!services.blobs.contains("f1"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let services = TestServices::new();
        let server = server(&services);
        let (name, value) = admin_auth();

        let response = server
            .post("/api/admin/files/nope/trash")
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["outcome"], "not_found");
    }

    #[tokio::test]
    async fn test_requires_credentials() {
        let services = TestServices::new();
        let server = server(&services);

        let response = server.post("/api/admin/files/f1/trash").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_recompute_quota() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        services.store.put_file(permanent_file(
            "big",
            owner,
            3 * BYTES_PER_MEGABYTE,
            services.clock.now(),
        ));
        let server = server(&services);
        let (name, value) = admin_auth();

        let body: Value = server
            .post(&format!("/api/admin/users/{}/quota", owner))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body["data"]["consumed_storage_mb"], 3);

        let response = server
            .post(&format!("/api/admin/users/{}/quota", uuid::Uuid::new_v4()))
            .add_header(name, value)
            .await;
        response.assert_status_not_found();
    }

    fn hello_form() -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(b"hello".to_vec())
                .file_name("hello.txt")
                .mime_type("text/plain"),
        )
    }

    #[tokio::test]
    async fn test_upload_then_download_until_limit() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        let downloader = services.store.add_download_account("bob@example.com");
        let server = server(&services);
        let (name, value) = admin_auth();

        let response = server
            .post(&format!("/api/admin/users/{}/files", owner))
            .add_header(name.clone(), value.clone())
            .multipart(hello_form().add_text("max_downloads", "1"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["state"], "active");
        assert_eq!(body["data"]["size_bytes"], 5);
        assert_eq!(body["data"]["downloads_remaining"], 1);
        assert!(body["data"]["expires_at"].is_null());
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert!(services.blobs.contains(&id));

        let download = server
            .get(&format!("/api/admin/files/{}/download", id))
            .add_query_param("download_account_id", downloader)
            .add_header(name.clone(), value.clone())
            .await;
        download.assert_status_ok();
        assert_eq!(download.as_bytes().as_ref(), b"hello");
        let disposition = download.header("content-disposition");
        assert_eq!(
            disposition.to_str().unwrap(),
            "attachment; filename=\"hello.txt\""
        );

        let logs = services.store.download_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].download_account_id, Some(downloader));
        assert_eq!(logs[0].email.as_deref(), Some("bob@example.com"));

        server
            .get(&format!("/api/admin/files/{}/download", id))
            .add_header(name, value)
            .await
            .assert_status_not_found();
        assert_eq!(services.store.file(&id).unwrap().download_count, 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_missing_file_and_bad_limits() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        let server = server(&services);
        let (name, value) = admin_auth();
        let url = format!("/api/admin/users/{}/files", owner);

        server
            .post(&url)
            .add_header(name.clone(), value.clone())
            .multipart(MultipartForm::new().add_text("max_downloads", "3"))
            .await
            .assert_status_bad_request();

        server
            .post(&url)
            .add_header(name.clone(), value.clone())
            .multipart(hello_form().add_text("expires_in_hours", "soon"))
            .await
            .assert_status_bad_request();

        server
            .post(&url)
            .add_header(name, value)
            .multipart(hello_form().add_text("max_downloads", "0"))
            .await
            .assert_status_bad_request();

        assert!(services.store.files_of(owner).is_empty());
        assert!(services.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_trashed_file_cannot_be_downloaded() {
        let services = TestServices::new();
        let owner = services.store.add_user("alice@example.com");
        let mut file = permanent_file("f1", owner, 5, services.clock.now());
        file.soft_deleted_at = Some(services.clock.now());
        services.store.put_file(file);
        services.blobs.put_blob("f1", b"hello").await.unwrap();
        let server = server(&services);
        let (name, value) = admin_auth();

        server
            .get("/api/admin/files/f1/download")
            .add_header(name, value)
            .await
            .assert_status_not_found();
        assert!(services.store.download_logs().is_empty());
    }
}
