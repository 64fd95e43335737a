//! Moderation state machines for live showcases and their drafts.
//!
//! Live records move `draft -> pending -> {approved, rejected}`, may be resubmitted
//! after rejection, and fall back to `pending` when a non-privileged owner edits an
//! approved record. Drafts cycle `draft -> pending -> rejected -> pending` until they
//! are merged (and deleted) or discarded.

use chrono::{DateTime, Utc};

use crate::models::{DraftRecord, DraftStatus, ShowcaseRecord, ShowcaseStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

impl ShowcaseStatus {
    pub fn can_transition_to(self, next: ShowcaseStatus) -> bool {
        use ShowcaseStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Rejected, Pending)
                | (Approved, Pending)
        )
    }

    pub fn is_publicly_visible(self) -> bool {
        self == ShowcaseStatus::Approved
    }
}

impl ShowcaseRecord {
    fn transition(&mut self, next: ShowcaseStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "showcase",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Draft or rejected -> pending.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status == ShowcaseStatus::Approved {
            // approved -> pending is reserved for owner edits
            return Err(TransitionError {
                entity: "showcase",
                from: self.status.as_str(),
                to: ShowcaseStatus::Pending.as_str(),
            });
        }
        self.transition(ShowcaseStatus::Pending)?;
        self.submitted_date = Some(now);
        Ok(())
    }

    pub fn approve(&mut self, moderator: &str, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(ShowcaseStatus::Approved)?;
        self.approved_at = Some(now);
        self.approved_by = Some(moderator.to_string());
        self.rejection_reason = None;
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), TransitionError> {
        self.transition(ShowcaseStatus::Rejected)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    /// An approved record edited by its (non-privileged) owner goes back to review.
    /// Returns whether the status changed.
    pub fn mark_edited_by_owner(&mut self, privileged: bool, now: DateTime<Utc>) -> bool {
        if privileged || self.status != ShowcaseStatus::Approved {
            return false;
        }
        self.status = ShowcaseStatus::Pending;
        self.submitted_date = Some(now);
        true
    }
}

impl DraftStatus {
    pub fn can_be_edited(self) -> bool {
        matches!(self, DraftStatus::Draft | DraftStatus::Rejected)
    }

    pub fn can_be_submitted(self) -> bool {
        matches!(self, DraftStatus::Draft | DraftStatus::Rejected)
    }
}

impl DraftRecord {
    pub fn can_be_edited(&self) -> bool {
        self.status.can_be_edited()
    }

    pub fn can_be_submitted(&self) -> bool {
        self.status.can_be_submitted()
    }

    fn refuse(&self, to: &'static str) -> TransitionError {
        TransitionError { entity: "draft", from: self.status.as_str(), to }
    }

    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.can_be_submitted() {
            return Err(self.refuse(DraftStatus::Pending.as_str()));
        }
        self.status = DraftStatus::Pending;
        self.submitted_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), TransitionError> {
        if self.status != DraftStatus::Pending {
            return Err(self.refuse(DraftStatus::Rejected.as_str()));
        }
        self.status = DraftStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    /// Approval consumes the draft, so only a pending one may be merged through moderation.
    pub fn ensure_approvable(&self) -> Result<(), TransitionError> {
        if self.status != DraftStatus::Pending {
            return Err(self.refuse("approved"));
        }
        Ok(())
    }
}
