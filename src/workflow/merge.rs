use tracing::{info, warn};

use super::{Cleanup, FileJournal, WorkflowError, WorkflowResult};
use crate::models::{DraftImageEntry, DraftRecord, Id, ImageAction, NewShowcaseImage, ShowcaseRecord};
use crate::paths;
use crate::repo::UnitOfWork;
use crate::storage::{BlobStore, BlobStoreError};

/// Counts of what image reconciliation did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub kept: usize,
    pub removed: usize,
    pub added: usize,
    /// KEEP/REMOVE entries whose live image had already vanished.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub showcase: ShowcaseRecord,
    pub report: MergeReport,
    /// Old thumbnail, removed images and the draft directory. Run after commit.
    pub cleanup: Cleanup,
}

/// Apply a draft onto its live showcase and delete the draft.
///
/// The draft row is locked first so two merges of the same draft serialize; the loser
/// then finds no draft and fails with `NotFound`. Moves into the live tree are
/// journaled; deletions of superseded live files are returned in the outcome's
/// [`Cleanup`] and must only run once the unit of work has committed.
pub async fn merge_draft(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    draft_id: Id,
    journal: &mut FileJournal,
) -> WorkflowResult<MergeOutcome> {
    let draft = uow.lock_draft(draft_id).await?;
    let mut showcase = uow.get_showcase(draft.showcase_id).await?;
    let mut cleanup = Cleanup::default();

    showcase.content = draft.content.clone();
    reconcile_thumbnail(&draft, &mut showcase, blobs, journal, &mut cleanup).await?;
    uow.update_showcase(&showcase).await?;

    let areas = uow.draft_practice_area_ids(draft.id).await?;
    uow.set_practice_areas(showcase.id, &areas).await?;

    let mut report = MergeReport::default();
    for entry in uow.list_draft_images(draft.id).await? {
        reconcile_image(uow, blobs, &draft, showcase.id, entry, journal, &mut cleanup, &mut report).await?;
    }

    uow.delete_draft(draft.id).await?;
    cleanup.delete_directory(paths::draft_directory(draft.id));

    let showcase = uow.get_showcase(showcase.id).await?;
    info!(
        draft_id,
        showcase_id = showcase.id,
        kept = report.kept,
        removed = report.removed,
        added = report.added,
        skipped = report.skipped,
        "merged draft"
    );
    Ok(MergeOutcome { showcase, report, cleanup })
}

/// Moderator approval: only a pending draft may be merged this way.
pub async fn approve_draft(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    draft_id: Id,
    journal: &mut FileJournal,
) -> WorkflowResult<MergeOutcome> {
    uow.lock_draft(draft_id).await?.ensure_approvable()?;
    merge_draft(uow, blobs, draft_id, journal).await
}

async fn reconcile_thumbnail(
    draft: &DraftRecord,
    showcase: &mut ShowcaseRecord,
    blobs: &dyn BlobStore,
    journal: &mut FileJournal,
    cleanup: &mut Cleanup,
) -> WorkflowResult<()> {
    let live_path = showcase
        .thumbnail_extension
        .as_deref()
        .map(|ext| paths::live_thumbnail(showcase.id, ext));

    if let Some(ext) = draft.thumbnail_extension.as_deref() {
        let staged = paths::draft_thumbnail(draft.id, ext);
        if blobs.exists(&staged).await? {
            let target = paths::live_thumbnail(showcase.id, ext);
            let mut backup = None;
            if live_path.as_deref() == Some(target.as_str()) && blobs.exists(&target).await? {
                let saved = paths::draft_thumbnail_backup(draft.id, ext);
                blobs.copy(&target, &saved).await?;
                journal.copied(saved.clone());
                backup = Some(saved);
            }
            // move first; the old file is only dropped once the new one is in place
            blobs.move_to(&staged, &target).await?;
            journal.moved(staged, target.clone(), backup);
            if let Some(old) = live_path.filter(|old| *old != target) {
                cleanup.delete_file(old);
            }
            showcase.thumbnail_extension = Some(ext.to_string());
            showcase.thumbnail_crop = draft.thumbnail_crop;
            return Ok(());
        }
    } else if let Some(old) = live_path {
        cleanup.delete_file(old);
        showcase.thumbnail_extension = None;
        showcase.thumbnail_crop = None;
        return Ok(());
    }

    // no new file: the live thumbnail stays, only the crop follows the draft
    showcase.thumbnail_crop = draft.thumbnail_crop;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn reconcile_image(
    uow: &mut dyn UnitOfWork,
    blobs: &dyn BlobStore,
    draft: &DraftRecord,
    showcase_id: Id,
    entry: DraftImageEntry,
    journal: &mut FileJournal,
    cleanup: &mut Cleanup,
    report: &mut MergeReport,
) -> WorkflowResult<()> {
    match entry.action {
        ImageAction::Keep { original_image_id } => {
            let updated = uow
                .update_image_placement(showcase_id, original_image_id, entry.order, entry.alt_text)
                .await?;
            if updated {
                report.kept += 1;
            } else {
                warn!(showcase_id, original_image_id, entry_id = entry.id, "kept image no longer exists; skipping");
                report.skipped += 1;
            }
        }
        ImageAction::Remove { original_image_id } => {
            match uow.delete_image(showcase_id, original_image_id).await? {
                Some(image) => {
                    cleanup.delete_file(image.path);
                    report.removed += 1;
                }
                None => {
                    warn!(showcase_id, original_image_id, entry_id = entry.id, "removed image already gone; skipping");
                    report.skipped += 1;
                }
            }
        }
        ImageAction::Add { path } => {
            if !paths::is_in_draft_directory(draft.id, &path) {
                return Err(WorkflowError::ForeignStagedPath(path));
            }
            let ext = promoted_extension(&path, &entry.filename);
            let target = paths::live_image(showcase_id, &ext);
            match blobs.move_to(&path, &target).await {
                Ok(()) => {}
                Err(BlobStoreError::NotFound(_)) => return Err(WorkflowError::MissingStagedFile(path)),
                Err(e) => return Err(e.into()),
            }
            journal.moved(path, target.clone(), None);
            uow.insert_image(NewShowcaseImage {
                showcase_id,
                path: target,
                filename: entry.filename,
                alt_text: entry.alt_text,
                order: entry.order,
            })
            .await?;
            report.added += 1;
        }
    }
    Ok(())
}

/// Extension for a promoted image: staged path, then original filename, then `bin`.
fn promoted_extension(staged_path: &str, filename: &str) -> String {
    [staged_path, filename]
        .into_iter()
        .find_map(|p| paths::extension_of(p).and_then(paths::sanitize_extension))
        .unwrap_or_else(|| "bin".to_string())
}
