use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::accounts::{
    dtos as accounts_dtos, handlers as accounts_handlers, models as accounts_models,
};
use crate::features::audit::{
    dtos as audit_dtos, handlers as audit_handlers, models as audit_models,
};
use crate::features::files::{
    dtos as files_dtos, handlers as files_handlers, models as files_models,
};
use crate::features::sweeps::{
    dtos as sweeps_dtos, handlers as sweeps_handlers, models as sweeps_models,
};
use crate::shared::lifecycle::{SweepReport, TransitionOutcome};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files
        files_handlers::upload_file,
        files_handlers::download_file,
        files_handlers::trash_file,
        files_handlers::restore_file,
        files_handlers::purge_file,
        files_handlers::recompute_quota,
        // Accounts
        accounts_handlers::delete_user,
        accounts_handlers::delete_download_account,
        // Audit
        audit_handlers::list_audit,
        // Sweeps
        sweeps_handlers::run_sweep,
    ),
    components(
        schemas(
            Meta,
            TransitionOutcome,
            SweepReport,
            // Files
            files_models::FileState,
            files_dtos::UploadFileForm,
            files_dtos::FileDto,
            ApiResponse<files_dtos::FileDto>,
            files_dtos::FileTransitionDto,
            files_dtos::QuotaDto,
            ApiResponse<files_dtos::FileTransitionDto>,
            ApiResponse<files_dtos::QuotaDto>,
            // Accounts
            accounts_models::AccountKind,
            accounts_dtos::AccountTransitionDto,
            ApiResponse<accounts_dtos::AccountTransitionDto>,
            // Audit
            audit_models::EntityType,
            audit_models::AuditAction,
            audit_dtos::AuditEntryDto,
            ApiResponse<Vec<audit_dtos::AuditEntryDto>>,
            // Sweeps
            sweeps_models::SweepKind,
            sweeps_dtos::SweepRunDto,
            ApiResponse<sweeps_dtos::SweepRunDto>,
        )
    ),
    tags(
        (name = "files", description = "File upload, download, trash and quota administration"),
        (name = "accounts", description = "User and download account removal"),
        (name = "audit", description = "Audit log queries"),
        (name = "sweeps", description = "On-demand retention sweeps"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Fileshare Admin API",
        version = "0.1.0",
        description = "File and account lifecycle administration",
    )
)]
pub struct ApiDoc;

/// Adds the admin Basic auth security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_admin_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/admin/users/{id}/files",
            "/api/admin/files/{id}/download",
            "/api/admin/files/{id}/trash",
            "/api/admin/files/{id}/restore",
            "/api/admin/files/{id}/purge",
            "/api/admin/users/{id}/quota",
            "/api/admin/users/{id}",
            "/api/admin/download-accounts/{id}",
            "/api/admin/audit",
            "/api/admin/sweeps/{sweep}/run",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let schemes = doc.components.unwrap().security_schemes;
        assert!(schemes.contains_key("basic_auth"));
    }
}
