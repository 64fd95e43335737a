use std::sync::Arc;

use tracing::{error, warn};

use super::{edit, fork, merge, Cleanup, FileJournal, MergeReport, Upload, WorkflowResult};
use crate::models::{
    DraftImageEntry, DraftRecord, DraftView, Id, NewPracticeArea, NewShowcase, PracticeArea,
    ShowcaseImage, ShowcaseRecord, ShowcaseView, ThumbnailCrop, UpdateDraft, UpdateImageEntry,
};
use crate::repo::{RepoError, RepoResult, ShowcaseRepo, UnitOfWork};
use crate::storage::BlobStore;

/// Runs `$body` inside a fresh unit of work and hands the result to `finish`.
/// `$body` must evaluate to `WorkflowResult<(T, Cleanup)>`.
macro_rules! in_unit_of_work {
    ($self:ident, $op:literal, |$uow:ident, $journal:pat_param| $body:expr) => {{
        let mut uow = $self.repo.begin().await?;
        let mut journal = FileJournal::default();
        let result = {
            let $uow: &mut dyn UnitOfWork = uow.as_mut();
            let $journal = &mut journal;
            $body
        };
        $self.finish($op, uow, journal, result).await
    }};
}

fn settled<T>(result: WorkflowResult<T>) -> WorkflowResult<(T, Cleanup)> {
    result.map(|value| (value, Cleanup::default()))
}

async fn load_showcase_view(uow: &mut dyn UnitOfWork, showcase_id: Id) -> RepoResult<ShowcaseView> {
    let showcase = uow.get_showcase(showcase_id).await?;
    let images = uow.list_images(showcase.id).await?;
    let practice_area_ids = uow.practice_area_ids(showcase.id).await?;
    Ok(ShowcaseView { showcase, images, practice_area_ids })
}

async fn load_draft_view(uow: &mut dyn UnitOfWork, draft: DraftRecord) -> RepoResult<DraftView> {
    let images = uow.list_draft_images(draft.id).await?;
    let practice_area_ids = uow.draft_practice_area_ids(draft.id).await?;
    Ok(DraftView { draft, images, practice_area_ids })
}

/// Transaction boundary for every showcase and draft operation.
///
/// Each call opens one unit of work. If the operation or the commit fails, blob writes
/// recorded in the [`FileJournal`] are reverted; on success the operation's
/// [`Cleanup`] runs against the blob store after the commit.
#[derive(Clone)]
pub struct DraftWorkflow {
    repo: Arc<dyn ShowcaseRepo>,
    blobs: Arc<dyn BlobStore>,
}

impl DraftWorkflow {
    pub fn new(repo: Arc<dyn ShowcaseRepo>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    async fn finish<T>(
        &self,
        op: &'static str,
        uow: Box<dyn UnitOfWork>,
        journal: FileJournal,
        result: WorkflowResult<(T, Cleanup)>,
    ) -> WorkflowResult<T> {
        let (value, cleanup) = match result {
            Ok(done) => done,
            Err(e) => {
                drop(uow);
                self.revert(op, journal).await;
                return Err(e);
            }
        };
        if let Err(e) = uow.commit().await {
            error!(op, "commit failed: {e}");
            self.revert(op, journal).await;
            return Err(e.into());
        }
        cleanup.run(self.blobs.as_ref()).await;
        Ok(value)
    }

    async fn revert(&self, op: &'static str, journal: FileJournal) {
        if journal.is_empty() {
            return;
        }
        let steps = journal.len();
        let failed = journal.revert(self.blobs.as_ref()).await;
        if failed > 0 {
            error!(op, steps, failed, "blob changes only partially reverted");
        } else {
            warn!(op, steps, "reverted blob changes");
        }
    }

    // ---------------- Live showcases ----------------

    pub async fn create_showcase(&self, owner: &str, new: NewShowcase) -> WorkflowResult<ShowcaseRecord> {
        in_unit_of_work!(self, "create_showcase", |uow, _| settled(edit::create_showcase(uow, owner, new).await))
    }

    pub async fn showcase_view(&self, showcase_id: Id) -> WorkflowResult<ShowcaseView> {
        in_unit_of_work!(self, "showcase_view", |uow, _| settled(
            load_showcase_view(uow, showcase_id).await.map_err(Into::into)
        ))
    }

    pub async fn showcase_owner(&self, showcase_id: Id) -> WorkflowResult<String> {
        in_unit_of_work!(self, "showcase_owner", |uow, _| settled(
            uow.get_showcase(showcase_id).await.map(|s| s.owner).map_err(Into::into)
        ))
    }

    pub async fn submit_showcase(&self, showcase_id: Id) -> WorkflowResult<ShowcaseRecord> {
        in_unit_of_work!(self, "submit_showcase", |uow, _| settled(edit::submit_showcase(uow, showcase_id).await))
    }

    pub async fn approve_showcase(&self, showcase_id: Id, moderator: &str) -> WorkflowResult<ShowcaseRecord> {
        in_unit_of_work!(self, "approve_showcase", |uow, _| settled(
            edit::approve_showcase(uow, showcase_id, moderator).await
        ))
    }

    pub async fn reject_showcase(&self, showcase_id: Id, reason: &str) -> WorkflowResult<ShowcaseRecord> {
        in_unit_of_work!(self, "reject_showcase", |uow, _| settled(
            edit::reject_showcase(uow, showcase_id, reason).await
        ))
    }

    pub async fn delete_showcase(&self, showcase_id: Id) -> WorkflowResult<()> {
        in_unit_of_work!(self, "delete_showcase", |uow, _| edit::delete_showcase(uow, showcase_id)
            .await
            .map(|cleanup| ((), cleanup)))
    }

    pub async fn add_live_image(&self, showcase_id: Id, upload: Upload) -> WorkflowResult<ShowcaseImage> {
        in_unit_of_work!(self, "add_live_image", |uow, journal| settled(
            edit::add_live_image(uow, self.blobs.as_ref(), showcase_id, upload, journal).await
        ))
    }

    pub async fn delete_live_image(&self, showcase_id: Id, image_id: Id) -> WorkflowResult<()> {
        in_unit_of_work!(self, "delete_live_image", |uow, _| edit::delete_live_image(uow, showcase_id, image_id)
            .await
            .map(|cleanup| ((), cleanup)))
    }

    // ---------------- Drafts ----------------

    pub async fn fork(&self, showcase_id: Id) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "fork", |uow, journal| settled(
            fork::fork_draft(uow, self.blobs.as_ref(), showcase_id, journal).await
        ))
    }

    pub async fn draft_view(&self, draft_id: Id) -> WorkflowResult<DraftView> {
        in_unit_of_work!(self, "draft_view", |uow, _| settled(
            async move {
                let draft = uow.get_draft(draft_id).await?;
                load_draft_view(uow, draft).await
            }
            .await
            .map_err(Into::into)
        ))
    }

    pub async fn draft_for_showcase(&self, showcase_id: Id) -> WorkflowResult<DraftView> {
        in_unit_of_work!(self, "draft_for_showcase", |uow, _| settled(
            async move {
                let draft = uow.find_draft_for_showcase(showcase_id).await?.ok_or(RepoError::NotFound)?;
                load_draft_view(uow, draft).await
            }
            .await
            .map_err(Into::into)
        ))
    }

    /// Owner of the showcase the draft was forked from.
    pub async fn draft_owner(&self, draft_id: Id) -> WorkflowResult<String> {
        in_unit_of_work!(self, "draft_owner", |uow, _| settled(
            async move {
                let draft = uow.get_draft(draft_id).await?;
                uow.get_showcase(draft.showcase_id).await.map(|s| s.owner)
            }
            .await
            .map_err(Into::into)
        ))
    }

    pub async fn update_draft(&self, draft_id: Id, update: UpdateDraft) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "update_draft", |uow, _| settled(
            edit::update_draft_content(uow, draft_id, update).await
        ))
    }

    pub async fn stage_image(&self, draft_id: Id, upload: Upload) -> WorkflowResult<DraftImageEntry> {
        in_unit_of_work!(self, "stage_image", |uow, journal| settled(
            edit::stage_image(uow, self.blobs.as_ref(), draft_id, upload, journal).await
        ))
    }

    pub async fn remove_image(&self, draft_id: Id, entry_id: Id) -> WorkflowResult<()> {
        in_unit_of_work!(self, "remove_image", |uow, _| edit::remove_image(uow, draft_id, entry_id)
            .await
            .map(|cleanup| ((), cleanup)))
    }

    pub async fn restore_image(&self, draft_id: Id, entry_id: Id) -> WorkflowResult<DraftImageEntry> {
        in_unit_of_work!(self, "restore_image", |uow, _| settled(
            edit::restore_image(uow, draft_id, entry_id).await
        ))
    }

    pub async fn update_image_entry(
        &self,
        draft_id: Id,
        entry_id: Id,
        update: UpdateImageEntry,
    ) -> WorkflowResult<DraftImageEntry> {
        in_unit_of_work!(self, "update_image_entry", |uow, _| settled(
            edit::update_image_entry(uow, draft_id, entry_id, update).await
        ))
    }

    pub async fn set_thumbnail(
        &self,
        draft_id: Id,
        upload: Upload,
        crop: Option<ThumbnailCrop>,
    ) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "set_thumbnail", |uow, journal| edit::set_thumbnail(
            uow,
            self.blobs.as_ref(),
            draft_id,
            upload,
            crop,
            journal
        )
        .await)
    }

    pub async fn clear_thumbnail(&self, draft_id: Id) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "clear_thumbnail", |uow, _| edit::clear_thumbnail(uow, draft_id).await)
    }

    pub async fn submit_draft(&self, draft_id: Id) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "submit_draft", |uow, _| settled(edit::submit_draft(uow, draft_id).await))
    }

    pub async fn reject_draft(&self, draft_id: Id, reason: &str) -> WorkflowResult<DraftRecord> {
        in_unit_of_work!(self, "reject_draft", |uow, _| settled(
            edit::reject_draft(uow, draft_id, reason).await
        ))
    }

    /// Merge regardless of draft status.
    pub async fn merge(&self, draft_id: Id) -> WorkflowResult<(ShowcaseRecord, MergeReport)> {
        in_unit_of_work!(self, "merge", |uow, journal| merge::merge_draft(uow, self.blobs.as_ref(), draft_id, journal)
            .await
            .map(|m| ((m.showcase, m.report), m.cleanup)))
    }

    pub async fn approve_draft(&self, draft_id: Id) -> WorkflowResult<(ShowcaseRecord, MergeReport)> {
        in_unit_of_work!(self, "approve_draft", |uow, journal| merge::approve_draft(
            uow,
            self.blobs.as_ref(),
            draft_id,
            journal
        )
        .await
        .map(|m| ((m.showcase, m.report), m.cleanup)))
    }

    pub async fn discard(&self, draft_id: Id) -> WorkflowResult<()> {
        in_unit_of_work!(self, "discard", |uow, _| edit::discard_draft(uow, draft_id)
            .await
            .map(|cleanup| ((), cleanup)))
    }

    // ---------------- Practice areas ----------------

    pub async fn list_practice_areas(&self) -> WorkflowResult<Vec<PracticeArea>> {
        in_unit_of_work!(self, "list_practice_areas", |uow, _| settled(
            uow.list_practice_areas().await.map_err(Into::into)
        ))
    }

    pub async fn create_practice_area(&self, name: &str) -> WorkflowResult<PracticeArea> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(super::WorkflowError::Validation("practice area name must not be empty".into()));
        }
        in_unit_of_work!(self, "create_practice_area", |uow, _| settled(
            uow.insert_practice_area(NewPracticeArea { name }).await.map_err(Into::into)
        ))
    }
}
