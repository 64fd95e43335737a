use tracing::{debug, info};

use super::{FileJournal, WorkflowError, WorkflowResult};
use crate::models::{DraftRecord, Id, NewDraft, NewDraftImage};
use crate::paths;
use crate::repo::{RepoError, UnitOfWork};
use crate::storage::{BlobStore, BlobStoreError};

/// Snapshot a live showcase into a new draft.
///
/// Copies the scalar fields, the thumbnail file (if the live one exists), the
/// practice-area set and one KEEP entry per live image. Nothing on the live record
/// changes. A showcase that already has a draft yields [`WorkflowError::DraftExists`].
pub async fn fork_draft(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    showcase_id: Id,
    journal: &mut FileJournal,
) -> WorkflowResult<DraftRecord> {
    let showcase = uow.get_showcase(showcase_id).await?;
    if uow.find_draft_for_showcase(showcase.id).await?.is_some() {
        return Err(WorkflowError::DraftExists(showcase.id));
    }

    let draft = match uow.insert_draft(NewDraft::from_showcase(&showcase)).await {
        Err(RepoError::Conflict) => return Err(WorkflowError::DraftExists(showcase.id)),
        other => other?,
    };

    if let Some(ext) = showcase.thumbnail_extension.as_deref() {
        let src = paths::live_thumbnail(showcase.id, ext);
        let dst = paths::draft_thumbnail(draft.id, ext);
        match blobs.copy(&src, &dst).await {
            Ok(()) => journal.copied(dst),
            Err(BlobStoreError::NotFound(_)) => {
                debug!(showcase_id, %src, "live thumbnail missing; draft starts without a staged copy")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let areas = uow.practice_area_ids(showcase.id).await?;
    uow.set_draft_practice_areas(draft.id, &areas).await?;

    let images = uow.list_images(showcase.id).await?;
    for image in &images {
        uow.insert_draft_image(NewDraftImage::keep(draft.id, image)).await?;
    }

    info!(showcase_id, draft_id = draft.id, images = images.len(), "forked draft");
    Ok(draft)
}
