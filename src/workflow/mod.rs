//! Copy-on-write editing of live showcases.
//!
//! An owner forks a draft from a live showcase, edits it while the live record stays
//! public, and a moderator merges the draft back. The free functions in the submodules
//! each run inside a caller-supplied [`UnitOfWork`](crate::repo::UnitOfWork);
//! [`DraftWorkflow`] owns the transaction boundary and the blob bookkeeping around it.

mod edit;
mod fork;
mod journal;
mod merge;
mod service;

pub use edit::{
    add_live_image, approve_showcase, clear_thumbnail, create_showcase, delete_live_image,
    delete_showcase, discard_draft, reject_draft, reject_showcase, remove_image, restore_image, set_thumbnail,
    stage_image, submit_draft, submit_showcase, update_draft_content, update_image_entry, Upload,
};
pub use fork::fork_draft;
pub use journal::{Cleanup, FileJournal};
pub use merge::{approve_draft, merge_draft, MergeOutcome, MergeReport};
pub use service::DraftWorkflow;

use crate::models::{DraftStatus, Id};
use crate::moderation::TransitionError;
use crate::repo::RepoError;
use crate::storage::BlobStoreError;

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("showcase {0} already has a draft")]
    DraftExists(Id),
    #[error("draft {draft_id} is {status} and cannot be edited")]
    NotEditable { draft_id: Id, status: DraftStatus },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("staged file {0} is missing")]
    MissingStagedFile(String),
    #[error("staged path {0} is outside the draft directory")]
    ForeignStagedPath(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] BlobStoreError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
