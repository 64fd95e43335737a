//! Owner edits on a draft and moderation of live showcases.

use chrono::Utc;
use sqlx::types::Json;
use tracing::info;

use super::{Cleanup, FileJournal, WorkflowError, WorkflowResult};
use crate::models::{
    DraftImageEntry, DraftRecord, Id, ImageAction, NewDraftImage, NewShowcase, NewShowcaseImage,
    NewShowcaseRecord, ShowcaseImage, ShowcaseRecord, ShowcaseStatus, ThumbnailCrop, UpdateDraft,
    UpdateImageEntry,
};
use crate::paths;
use crate::repo::{RepoError, UnitOfWork};
use crate::slug::generate_slug;
use crate::storage::BlobStore;

/// An uploaded file, already sniffed and size-checked by the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub extension: String,
    pub alt_text: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    fn extension(&self) -> WorkflowResult<String> {
        paths::sanitize_extension(&self.extension)
            .ok_or_else(|| WorkflowError::Validation(format!("unsupported file extension '{}'", self.extension)))
    }
}

async fn editable_draft(uow: &mut dyn UnitOfWork, draft_id: Id) -> WorkflowResult<DraftRecord> {
    let draft = uow.get_draft(draft_id).await?;
    if !draft.can_be_edited() {
        return Err(WorkflowError::NotEditable { draft_id, status: draft.status });
    }
    Ok(draft)
}

async fn draft_entry(uow: &mut dyn UnitOfWork, draft_id: Id, entry_id: Id) -> WorkflowResult<DraftImageEntry> {
    uow.list_draft_images(draft_id)
        .await?
        .into_iter()
        .find(|e| e.id == entry_id)
        .ok_or(WorkflowError::Repo(RepoError::NotFound))
}

// ---------------- Draft edits ----------------

pub async fn update_draft_content(
    uow: &mut dyn UnitOfWork,
    draft_id: Id,
    update: UpdateDraft,
) -> WorkflowResult<DraftRecord> {
    let mut draft = editable_draft(uow, draft_id).await?;
    update.content.validate().map_err(WorkflowError::Validation)?;
    draft.content = update.content.normalized();
    let draft = uow.update_draft(&draft).await?;
    if let Some(ids) = update.practice_area_ids {
        uow.set_draft_practice_areas(draft.id, &ids).await?;
    }
    Ok(draft)
}

/// Upload a new image into the draft directory and record it as an ADD entry at the end.
pub async fn stage_image(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    draft_id: Id,
    upload: Upload,
    journal: &mut FileJournal,
) -> WorkflowResult<DraftImageEntry> {
    let draft = editable_draft(uow, draft_id).await?;
    let ext = upload.extension()?;
    let order = uow
        .list_draft_images(draft.id)
        .await?
        .iter()
        .map(|e| e.order)
        .max()
        .map_or(0, |max| max + 1);

    let path = paths::draft_image(draft.id, &ext);
    blobs.put(&path, &upload.bytes).await?;
    journal.put(path.clone());

    let entry = uow
        .insert_draft_image(NewDraftImage {
            draft_id: draft.id,
            action: ImageAction::Add { path },
            filename: upload.filename,
            alt_text: upload.alt_text,
            order,
        })
        .await?;
    info!(draft_id, entry_id = entry.id, "staged image");
    Ok(entry)
}

/// KEEP becomes REMOVE; an ADD entry is dropped along with its staged file.
pub async fn remove_image(uow: &mut dyn UnitOfWork, draft_id: Id, entry_id: Id) -> WorkflowResult<Cleanup> {
    editable_draft(uow, draft_id).await?;
    let mut entry = draft_entry(uow, draft_id, entry_id).await?;
    let mut cleanup = Cleanup::default();
    match entry.action {
        ImageAction::Keep { original_image_id } => {
            entry.action = ImageAction::Remove { original_image_id };
            uow.update_draft_image(&entry).await?;
        }
        ImageAction::Remove { .. } => {}
        ImageAction::Add { ref path } => {
            cleanup.delete_file(path.clone());
            uow.delete_draft_image(draft_id, entry_id).await?;
        }
    }
    Ok(cleanup)
}

/// Undo a removal: REMOVE goes back to KEEP.
pub async fn restore_image(uow: &mut dyn UnitOfWork, draft_id: Id, entry_id: Id) -> WorkflowResult<DraftImageEntry> {
    editable_draft(uow, draft_id).await?;
    let mut entry = draft_entry(uow, draft_id, entry_id).await?;
    match entry.action {
        ImageAction::Remove { original_image_id } => {
            entry.action = ImageAction::Keep { original_image_id };
            Ok(uow.update_draft_image(&entry).await?)
        }
        ImageAction::Keep { .. } => Ok(entry),
        ImageAction::Add { .. } => Err(WorkflowError::Validation("staged uploads cannot be restored".into())),
    }
}

pub async fn update_image_entry(
    uow: &mut dyn UnitOfWork,
    draft_id: Id,
    entry_id: Id,
    update: UpdateImageEntry,
) -> WorkflowResult<DraftImageEntry> {
    editable_draft(uow, draft_id).await?;
    let mut entry = draft_entry(uow, draft_id, entry_id).await?;
    if let Some(alt) = update.alt_text {
        let alt = alt.trim();
        entry.alt_text = (!alt.is_empty()).then(|| alt.to_string());
    }
    if let Some(order) = update.order {
        entry.order = order;
    }
    Ok(uow.update_draft_image(&entry).await?)
}

/// Stage a replacement thumbnail. A previously staged file under another extension is
/// cleaned up after commit; one under the same extension is backed up until then.
pub async fn set_thumbnail(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    draft_id: Id,
    upload: Upload,
    crop: Option<ThumbnailCrop>,
    journal: &mut FileJournal,
) -> WorkflowResult<(DraftRecord, Cleanup)> {
    let mut draft = editable_draft(uow, draft_id).await?;
    let ext = upload.extension()?;
    let mut cleanup = Cleanup::default();
    if let Some(old) = draft.thumbnail_extension.as_deref().filter(|old| *old != ext) {
        cleanup.delete_file(paths::draft_thumbnail(draft.id, old));
    }

    let path = paths::draft_thumbnail(draft.id, &ext);
    if blobs.exists(&path).await? {
        let saved = paths::draft_thumbnail_backup(draft.id, &ext);
        blobs.copy(&path, &saved).await?;
        journal.replaced(path.clone(), saved.clone());
        cleanup.delete_file(saved);
    } else {
        journal.put(path.clone());
    }
    blobs.put(&path, &upload.bytes).await?;

    draft.thumbnail_extension = Some(ext);
    draft.thumbnail_crop = crop.map(Json);
    Ok((uow.update_draft(&draft).await?, cleanup))
}

/// Mark the draft as having no thumbnail; merge will then drop the live one.
pub async fn clear_thumbnail(uow: &mut dyn UnitOfWork, draft_id: Id) -> WorkflowResult<(DraftRecord, Cleanup)> {
    let mut draft = editable_draft(uow, draft_id).await?;
    let mut cleanup = Cleanup::default();
    if let Some(ext) = draft.thumbnail_extension.take() {
        cleanup.delete_file(paths::draft_thumbnail(draft.id, &ext));
    }
    draft.thumbnail_crop = None;
    Ok((uow.update_draft(&draft).await?, cleanup))
}

pub async fn submit_draft(uow: &mut dyn UnitOfWork, draft_id: Id) -> WorkflowResult<DraftRecord> {
    let mut draft = uow.get_draft(draft_id).await?;
    draft.submit(Utc::now())?;
    Ok(uow.update_draft(&draft).await?)
}

pub async fn reject_draft(uow: &mut dyn UnitOfWork, draft_id: Id, reason: &str) -> WorkflowResult<DraftRecord> {
    let mut draft = uow.get_draft(draft_id).await?;
    draft.reject(reason)?;
    Ok(uow.update_draft(&draft).await?)
}

/// Throw the draft away; the live showcase is untouched.
pub async fn discard_draft(uow: &mut dyn UnitOfWork, draft_id: Id) -> WorkflowResult<Cleanup> {
    let draft = uow.lock_draft(draft_id).await?;
    uow.delete_draft(draft.id).await?;
    let mut cleanup = Cleanup::default();
    cleanup.delete_directory(paths::draft_directory(draft.id));
    info!(draft_id, showcase_id = draft.showcase_id, "discarded draft");
    Ok(cleanup)
}

// ---------------- Live showcases ----------------

pub async fn create_showcase(
    uow: &mut dyn UnitOfWork,
    owner: &str,
    new: NewShowcase,
) -> WorkflowResult<ShowcaseRecord> {
    new.content.validate().map_err(WorkflowError::Validation)?;
    let content = new.content.normalized();
    let slug = generate_slug(&content.title, &mut rand::thread_rng());
    let (status, submitted_date) = if new.submit {
        (ShowcaseStatus::Pending, Some(Utc::now()))
    } else {
        (ShowcaseStatus::Draft, None)
    };
    let showcase = uow
        .insert_showcase(NewShowcaseRecord {
            slug,
            owner: owner.to_string(),
            content,
            status,
            submitted_date,
        })
        .await?;
    uow.set_practice_areas(showcase.id, &new.practice_area_ids).await?;
    info!(showcase_id = showcase.id, slug = %showcase.slug, "created showcase");
    Ok(showcase)
}

pub async fn submit_showcase(uow: &mut dyn UnitOfWork, showcase_id: Id) -> WorkflowResult<ShowcaseRecord> {
    let mut showcase = uow.get_showcase(showcase_id).await?;
    showcase.submit(Utc::now())?;
    Ok(uow.update_showcase(&showcase).await?)
}

pub async fn approve_showcase(
    uow: &mut dyn UnitOfWork,
    showcase_id: Id,
    moderator: &str,
) -> WorkflowResult<ShowcaseRecord> {
    let mut showcase = uow.get_showcase(showcase_id).await?;
    showcase.approve(moderator, Utc::now())?;
    Ok(uow.update_showcase(&showcase).await?)
}

pub async fn reject_showcase(uow: &mut dyn UnitOfWork, showcase_id: Id, reason: &str) -> WorkflowResult<ShowcaseRecord> {
    let mut showcase = uow.get_showcase(showcase_id).await?;
    showcase.reject(reason)?;
    Ok(uow.update_showcase(&showcase).await?)
}

/// Upload straight into the live tree, appended after the existing images.
pub async fn add_live_image(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    showcase_id: Id,
    upload: Upload,
    journal: &mut FileJournal,
) -> WorkflowResult<ShowcaseImage> {
    let showcase = uow.get_showcase(showcase_id).await?;
    let ext = upload.extension()?;
    let order = uow
        .list_images(showcase.id)
        .await?
        .iter()
        .map(|i| i.order)
        .max()
        .map_or(0, |max| max + 1);
    let path = paths::live_image(showcase.id, &ext);
    blobs.put(&path, &upload.bytes).await?;
    journal.put(path.clone());
    Ok(uow
        .insert_image(NewShowcaseImage {
            showcase_id: showcase.id,
            path,
            filename: upload.filename,
            alt_text: upload.alt_text,
            order,
        })
        .await?)
}

/// Delete one live image. Its file goes away only after commit.
pub async fn delete_live_image(uow: &mut dyn UnitOfWork, showcase_id: Id, image_id: Id) -> WorkflowResult<Cleanup> {
    let image = uow
        .delete_image(showcase_id, image_id)
        .await?
        .ok_or(WorkflowError::Repo(RepoError::NotFound))?;
    let mut cleanup = Cleanup::default();
    cleanup.delete_file(image.path);
    Ok(cleanup)
}

/// Soft delete. A pending draft of the showcase goes with it.
pub async fn delete_showcase(uow: &mut dyn UnitOfWork, showcase_id: Id) -> WorkflowResult<Cleanup> {
    let mut cleanup = Cleanup::default();
    if let Some(draft) = uow.find_draft_for_showcase(showcase_id).await? {
        cleanup.absorb(discard_draft(uow, draft.id).await?);
    }
    uow.soft_delete_showcase(showcase_id).await?;
    info!(showcase_id, "soft-deleted showcase");
    Ok(cleanup)
}
