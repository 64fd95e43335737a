use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::workflow::{DraftWorkflow, MergeReport, Upload};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/showcases").route(web::post().to(create_showcase)))
            .service(
                web::resource("/showcases/{id}")
                    .route(web::get().to(get_showcase))
                    .route(web::delete().to(delete_showcase)),
            )
            .service(web::resource("/showcases/{id}/submit").route(web::post().to(submit_showcase)))
            .service(web::resource("/showcases/{id}/images").route(web::post().to(upload_showcase_image)))
            .service(
                web::resource("/showcases/{id}/images/{image_id}")
                    .route(web::delete().to(delete_showcase_image)),
            )
            .service(
                web::resource("/showcases/{id}/draft")
                    .route(web::post().to(fork_draft))
                    .route(web::get().to(get_showcase_draft)),
            )
            .service(
                web::resource("/drafts/{id}")
                    .route(web::get().to(get_draft))
                    .route(web::patch().to(update_draft))
                    .route(web::delete().to(discard_draft)),
            )
            .service(web::resource("/drafts/{id}/images").route(web::post().to(stage_draft_image)))
            .service(
                web::resource("/drafts/{id}/images/{entry_id}")
                    .route(web::patch().to(update_draft_image)),
            )
            .service(
                web::resource("/drafts/{id}/images/{entry_id}/remove")
                    .route(web::post().to(remove_draft_image)),
            )
            .service(
                web::resource("/drafts/{id}/images/{entry_id}/restore")
                    .route(web::post().to(restore_draft_image)),
            )
            .service(
                web::resource("/drafts/{id}/thumbnail")
                    .route(web::put().to(set_draft_thumbnail))
                    .route(web::delete().to(clear_draft_thumbnail)),
            )
            .service(web::resource("/drafts/{id}/submit").route(web::post().to(submit_draft)))
            .service(web::resource("/practice-areas").route(web::get().to(list_practice_areas)))
            // Moderation
            .service(web::resource("/admin/drafts/{id}/approve").route(web::post().to(approve_draft)))
            .service(web::resource("/admin/drafts/{id}/reject").route(web::post().to(reject_draft)))
            .service(
                web::resource("/admin/showcases/{id}/approve").route(web::post().to(approve_showcase)),
            )
            .service(
                web::resource("/admin/showcases/{id}/reject").route(web::post().to(reject_showcase)),
            )
            .service(
                web::resource("/admin/practice-areas").route(web::post().to(create_practice_area)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub workflow: DraftWorkflow,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MergeResponse {
    pub showcase: ShowcaseRecord,
    pub kept: usize,
    pub removed: usize,
    pub added: usize,
    pub skipped: usize, // entries whose live image had vanished
}

impl MergeResponse {
    fn new(showcase: ShowcaseRecord, report: MergeReport) -> Self {
        Self {
            showcase,
            kept: report.kept,
            removed: report.removed,
            added: report.added,
            skipped: report.skipped,
        }
    }
}

const IMAGE_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Multipart body of an upload: `file` plus optional `alt_text` and `crop` (JSON) text fields.
struct UploadForm {
    upload: Upload,
    crop: Option<ThumbnailCrop>,
}

async fn read_upload(mut payload: Multipart) -> Result<UploadForm, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut alt_text = None;
    let mut crop = None;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        error!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let filename = field.content_disposition().get_filename().map(str::to_string);
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            error!("stream read error: {e}");
            ApiError::BadRequest("malformed multipart body".into())
        })? {
            if bytes.len() + chunk.len() > IMAGE_SIZE_LIMIT {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        match name.as_str() {
            "file" => file = Some((filename.unwrap_or_else(|| "upload".into()), bytes)),
            "alt_text" => {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                alt_text = (!text.is_empty()).then_some(text);
            }
            "crop" => {
                let parsed: ThumbnailCrop = serde_json::from_slice(&bytes)
                    .map_err(|e| ApiError::Unprocessable(format!("invalid crop: {e}")))?;
                crop = Some(parsed);
            }
            _ => continue,
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let kind = infer::get(&bytes).ok_or(ApiError::UnsupportedMedia)?;
    if !ALLOWED_MIME.contains(&kind.mime_type()) {
        return Err(ApiError::UnsupportedMedia);
    }
    Ok(UploadForm {
        upload: Upload { filename, extension: kind.extension().to_string(), alt_text, bytes },
        crop,
    })
}

async fn ensure_showcase_access(data: &AppState, auth: &Auth, showcase_id: Id) -> Result<(), ApiError> {
    let owner = data.workflow.showcase_owner(showcase_id).await?;
    auth.require_owner_or_moderator(&owner)
}

async fn ensure_draft_access(data: &AppState, auth: &Auth, draft_id: Id) -> Result<(), ApiError> {
    let owner = data.workflow.draft_owner(draft_id).await?;
    auth.require_owner_or_moderator(&owner)
}

// ---------------- Showcases ----------------

#[utoipa::path(
    post,
    path = "/api/v1/showcases",
    request_body = NewShowcase,
    responses(
        (status = 201, description = "Showcase created", body = ShowcaseRecord),
        (status = 401, description = "Authorization required"),
        (status = 422, description = "Invalid content")
    )
)]
pub async fn create_showcase(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewShowcase>,
) -> Result<HttpResponse, ApiError> {
    let showcase = data.workflow.create_showcase(auth.subject(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(showcase))
}

#[utoipa::path(
    get,
    path = "/api/v1/showcases/{id}",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 200, description = "Showcase with images", body = ShowcaseView),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn get_showcase(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let view = data.workflow.showcase_view(path.into_inner()).await?;
    let visible = view.showcase.status.is_publicly_visible()
        || auth
            .as_ref()
            .map(|a| a.require_owner_or_moderator(&view.showcase.owner).is_ok())
            .unwrap_or(false);
    if !visible {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/showcases/{id}",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 204, description = "Soft-deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_showcase(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_showcase_access(&data, &auth, id).await?;
    data.workflow.delete_showcase(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/showcases/{id}/submit",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 200, description = "Submitted for review", body = ShowcaseRecord),
        (status = 409, description = "Not submittable from its current status")
    )
)]
pub async fn submit_showcase(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_showcase_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.submit_showcase(id).await?))
}

/// Live images may be edited in place only until the showcase is public; afterwards
/// changes go through a draft.
async fn ensure_live_editable(data: &AppState, auth: &Auth, showcase_id: Id) -> Result<(), ApiError> {
    let view = data.workflow.showcase_view(showcase_id).await?;
    auth.require_owner_or_moderator(&view.showcase.owner)?;
    if view.showcase.status.is_publicly_visible() && !auth.is_moderator() {
        return Err(ApiError::Conflict("approved showcases are edited through a draft".into()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/showcases/{id}/images",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 201, description = "Image stored", body = ShowcaseImage),
        (status = 409, description = "Showcase is public; use a draft"),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn upload_showcase_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_live_editable(&data, &auth, id).await?;
    let form = read_upload(payload).await?;
    let image = data.workflow.add_live_image(id, form.upload).await?;
    Ok(HttpResponse::Created().json(image))
}

#[utoipa::path(
    delete,
    path = "/api/v1/showcases/{id}/images/{image_id}",
    params(
        ("id" = Id, Path, description = "Showcase id"),
        ("image_id" = Id, Path, description = "Image id")
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_showcase_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (id, image_id) = path.into_inner();
    ensure_live_editable(&data, &auth, id).await?;
    data.workflow.delete_live_image(id, image_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Drafts ----------------

#[utoipa::path(
    post,
    path = "/api/v1/showcases/{id}/draft",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 201, description = "Draft forked", body = DraftRecord),
        (status = 409, description = "Showcase already has a draft")
    )
)]
pub async fn fork_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_showcase_access(&data, &auth, id).await?;
    let draft = data.workflow.fork(id).await?;
    Ok(HttpResponse::Created().json(draft))
}

#[utoipa::path(
    get,
    path = "/api/v1/showcases/{id}/draft",
    params(("id" = Id, Path, description = "Showcase id")),
    responses(
        (status = 200, description = "Current draft", body = DraftView),
        (status = 404, description = "No draft")
    )
)]
pub async fn get_showcase_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_showcase_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.draft_for_showcase(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/drafts/{id}",
    params(("id" = Id, Path, description = "Draft id")),
    responses((status = 200, description = "Draft", body = DraftView))
)]
pub async fn get_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.draft_view(id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/drafts/{id}",
    params(("id" = Id, Path, description = "Draft id")),
    request_body = UpdateDraft,
    responses(
        (status = 200, description = "Draft updated", body = DraftRecord),
        (status = 409, description = "Draft is under review"),
        (status = 422, description = "Invalid content")
    )
)]
pub async fn update_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDraft>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.update_draft(id, payload.into_inner()).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/drafts/{id}",
    params(("id" = Id, Path, description = "Draft id")),
    responses((status = 204, description = "Draft discarded"))
)]
pub async fn discard_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    data.workflow.discard(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/drafts/{id}/images",
    params(("id" = Id, Path, description = "Draft id")),
    responses(
        (status = 201, description = "Image staged", body = DraftImageEntry),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn stage_draft_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    let form = read_upload(payload).await?;
    let entry = data.workflow.stage_image(id, form.upload).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    patch,
    path = "/api/v1/drafts/{id}/images/{entry_id}",
    params(
        ("id" = Id, Path, description = "Draft id"),
        ("entry_id" = Id, Path, description = "Draft image entry id")
    ),
    request_body = UpdateImageEntry,
    responses((status = 200, description = "Entry updated", body = DraftImageEntry))
)]
pub async fn update_draft_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
    payload: web::Json<UpdateImageEntry>,
) -> Result<HttpResponse, ApiError> {
    let (id, entry_id) = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    let entry = data.workflow.update_image_entry(id, entry_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    post,
    path = "/api/v1/drafts/{id}/images/{entry_id}/remove",
    params(
        ("id" = Id, Path, description = "Draft id"),
        ("entry_id" = Id, Path, description = "Draft image entry id")
    ),
    responses((status = 204, description = "Marked for removal, or staged upload dropped"))
)]
pub async fn remove_draft_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (id, entry_id) = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    data.workflow.remove_image(id, entry_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/drafts/{id}/images/{entry_id}/restore",
    params(
        ("id" = Id, Path, description = "Draft id"),
        ("entry_id" = Id, Path, description = "Draft image entry id")
    ),
    responses((status = 200, description = "Entry kept again", body = DraftImageEntry))
)]
pub async fn restore_draft_image(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (id, entry_id) = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.restore_image(id, entry_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/drafts/{id}/thumbnail",
    params(("id" = Id, Path, description = "Draft id")),
    responses(
        (status = 200, description = "Thumbnail staged", body = DraftRecord),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn set_draft_thumbnail(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    let form = read_upload(payload).await?;
    let draft = data.workflow.set_thumbnail(id, form.upload, form.crop).await?;
    Ok(HttpResponse::Ok().json(draft))
}

#[utoipa::path(
    delete,
    path = "/api/v1/drafts/{id}/thumbnail",
    params(("id" = Id, Path, description = "Draft id")),
    responses((status = 200, description = "Thumbnail cleared", body = DraftRecord))
)]
pub async fn clear_draft_thumbnail(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.clear_thumbnail(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/drafts/{id}/submit",
    params(("id" = Id, Path, description = "Draft id")),
    responses(
        (status = 200, description = "Submitted for review", body = DraftRecord),
        (status = 409, description = "Already pending")
    )
)]
pub async fn submit_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_draft_access(&data, &auth, id).await?;
    Ok(HttpResponse::Ok().json(data.workflow.submit_draft(id).await?))
}

// ---------------- Moderation ----------------

#[utoipa::path(
    post,
    path = "/api/v1/admin/drafts/{id}/approve",
    params(("id" = Id, Path, description = "Draft id")),
    responses(
        (status = 200, description = "Draft merged into the live showcase", body = MergeResponse),
        (status = 403, description = "Moderators only"),
        (status = 404, description = "Draft not found (or already merged)"),
        (status = 409, description = "Draft is not pending")
    )
)]
pub async fn approve_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    auth.require_moderator()?;
    let (showcase, report) = data.workflow.approve_draft(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MergeResponse::new(showcase, report)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/drafts/{id}/reject",
    params(("id" = Id, Path, description = "Draft id")),
    request_body = RejectRequest,
    responses((status = 200, description = "Draft rejected", body = DraftRecord))
)]
pub async fn reject_draft(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<RejectRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_moderator()?;
    let draft = data.workflow.reject_draft(path.into_inner(), &payload.reason).await?;
    Ok(HttpResponse::Ok().json(draft))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/showcases/{id}/approve",
    params(("id" = Id, Path, description = "Showcase id")),
    responses((status = 200, description = "Showcase approved", body = ShowcaseRecord))
)]
pub async fn approve_showcase(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    auth.require_moderator()?;
    let showcase = data.workflow.approve_showcase(path.into_inner(), auth.subject()).await?;
    Ok(HttpResponse::Ok().json(showcase))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/showcases/{id}/reject",
    params(("id" = Id, Path, description = "Showcase id")),
    request_body = RejectRequest,
    responses((status = 200, description = "Showcase rejected", body = ShowcaseRecord))
)]
pub async fn reject_showcase(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<RejectRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_moderator()?;
    let showcase = data.workflow.reject_showcase(path.into_inner(), &payload.reason).await?;
    Ok(HttpResponse::Ok().json(showcase))
}

// ---------------- Practice areas ----------------

#[utoipa::path(
    get,
    path = "/api/v1/practice-areas",
    responses((status = 200, description = "All practice areas", body = [PracticeArea]))
)]
pub async fn list_practice_areas(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.workflow.list_practice_areas().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/practice-areas",
    request_body = NewPracticeArea,
    responses(
        (status = 201, description = "Practice area created", body = PracticeArea),
        (status = 403, description = "Forbidden – Admins only"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create_practice_area(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewPracticeArea>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let area = data.workflow.create_practice_area(&payload.name).await?;
    Ok(HttpResponse::Created().json(area))
}
