use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "source_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    NotAvailable,
    SourceAvailable,
    OpenSource,
}

impl SourceStatus {
    /// `source_url` is mandatory for every status except `NotAvailable`.
    pub fn requires_url(self) -> bool {
        !matches!(self, SourceStatus::NotAvailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "showcase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShowcaseStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl ShowcaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShowcaseStatus::Draft => "draft",
            ShowcaseStatus::Pending => "pending",
            ShowcaseStatus::Approved => "approved",
            ShowcaseStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ShowcaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drafts never reach an approved state: approval merges and deletes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "draft_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Pending,
    Rejected,
}

impl DraftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Pending => "pending",
            DraftStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThumbnailCrop {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Editable fields shared verbatim by a live showcase and its draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ShowcaseContent {
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub key_features: Option<String>,
    pub help_needed: Option<String>,
    pub url: Option<String>,
    pub video_url: Option<String>,
    pub source_status: SourceStatus,
    pub source_url: Option<String>,
}

impl ShowcaseContent {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("title", &self.title),
            ("tagline", &self.tagline),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        let has_source_url = self
            .source_url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false);
        if self.source_status.requires_url() && !has_source_url {
            return Err("source_url is required when source is available".into());
        }
        Ok(())
    }

    /// Blank optionals become `None`; `source_url` is forced to `None` when no source is offered.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.key_features = blank_to_none(self.key_features);
        self.help_needed = blank_to_none(self.help_needed);
        self.url = blank_to_none(self.url);
        self.video_url = blank_to_none(self.video_url);
        self.source_url = if self.source_status.requires_url() {
            blank_to_none(self.source_url)
        } else {
            None
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ShowcaseRecord {
    pub id: Id,
    pub slug: String,
    pub owner: String, // JWT subject of the author
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub content: ShowcaseContent,
    pub thumbnail_extension: Option<String>,
    #[schema(value_type = Option<ThumbnailCrop>)]
    pub thumbnail_crop: Option<Json<ThumbnailCrop>>,
    pub status: ShowcaseStatus,
    pub submitted_date: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub is_featured: bool,
    pub approval_celebrated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>, // soft delete marker
}

impl ShowcaseRecord {
    pub fn crop(&self) -> Option<ThumbnailCrop> {
        self.thumbnail_crop.map(|c| c.0)
    }
}

/// Insert payload used by repositories; slug and status are decided by the caller.
#[derive(Debug, Clone)]
pub struct NewShowcaseRecord {
    pub slug: String,
    pub owner: String,
    pub content: ShowcaseContent,
    pub status: ShowcaseStatus,
    pub submitted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ShowcaseImage {
    pub id: Id,
    pub showcase_id: Id,
    pub path: String,
    pub filename: String,
    pub alt_text: Option<String>,
    #[sqlx(rename = "position")]
    pub order: i32,
}

#[derive(Debug, Clone)]
pub struct NewShowcaseImage {
    pub showcase_id: Id,
    pub path: String,
    pub filename: String,
    pub alt_text: Option<String>,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PracticeArea {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPracticeArea {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DraftRecord {
    pub id: Id,
    pub showcase_id: Id,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub content: ShowcaseContent,
    pub thumbnail_extension: Option<String>,
    #[schema(value_type = Option<ThumbnailCrop>)]
    pub thumbnail_crop: Option<Json<ThumbnailCrop>>,
    pub status: DraftStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftRecord {
    pub fn crop(&self) -> Option<ThumbnailCrop> {
        self.thumbnail_crop.map(|c| c.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewDraft {
    pub showcase_id: Id,
    pub content: ShowcaseContent,
    pub thumbnail_extension: Option<String>,
    pub thumbnail_crop: Option<ThumbnailCrop>,
}

impl NewDraft {
    pub fn from_showcase(showcase: &ShowcaseRecord) -> Self {
        Self {
            showcase_id: showcase.id,
            content: showcase.content.clone(),
            thumbnail_extension: showcase.thumbnail_extension.clone(),
            thumbnail_crop: showcase.crop(),
        }
    }
}

/// What merge does with one image of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageAction {
    Keep { original_image_id: Id },
    Remove { original_image_id: Id },
    Add { path: String },
}

impl ImageAction {
    pub fn tag(&self) -> &'static str {
        match self {
            ImageAction::Keep { .. } => "keep",
            ImageAction::Remove { .. } => "remove",
            ImageAction::Add { .. } => "add",
        }
    }

    pub fn original_image_id(&self) -> Option<Id> {
        match self {
            ImageAction::Keep { original_image_id } | ImageAction::Remove { original_image_id } => {
                Some(*original_image_id)
            }
            ImageAction::Add { .. } => None,
        }
    }

    pub fn staged_path(&self) -> Option<&str> {
        match self {
            ImageAction::Add { path } => Some(path),
            _ => None,
        }
    }

    /// Rebuild from the flat `(action, original_image_id, path)` columns, rejecting rows
    /// that break the keep/remove-have-original, add-has-path rule.
    pub fn from_columns(
        tag: &str,
        original_image_id: Option<Id>,
        path: Option<String>,
    ) -> Result<Self, String> {
        match (tag, original_image_id, path) {
            ("keep", Some(id), None) => Ok(ImageAction::Keep { original_image_id: id }),
            ("remove", Some(id), None) => Ok(ImageAction::Remove { original_image_id: id }),
            ("add", None, Some(path)) => Ok(ImageAction::Add { path }),
            (tag, id, path) => Err(format!(
                "inconsistent draft image row: action={tag} original_image_id={id:?} path={path:?}"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DraftImageEntry {
    pub id: Id,
    pub draft_id: Id,
    pub action: ImageAction,
    pub filename: String,
    pub alt_text: Option<String>,
    pub order: i32,
}

#[derive(Debug, Clone)]
pub struct NewDraftImage {
    pub draft_id: Id,
    pub action: ImageAction,
    pub filename: String,
    pub alt_text: Option<String>,
    pub order: i32,
}

impl NewDraftImage {
    pub fn keep(draft_id: Id, image: &ShowcaseImage) -> Self {
        Self {
            draft_id,
            action: ImageAction::Keep { original_image_id: image.id },
            filename: image.filename.clone(),
            alt_text: image.alt_text.clone(),
            order: image.order,
        }
    }
}

// ---------------- Read models & request payloads ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShowcaseView {
    pub showcase: ShowcaseRecord,
    pub images: Vec<ShowcaseImage>,
    pub practice_area_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DraftView {
    pub draft: DraftRecord,
    pub images: Vec<DraftImageEntry>,
    pub practice_area_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewShowcase {
    #[serde(flatten)]
    pub content: ShowcaseContent,
    #[serde(default)]
    pub practice_area_ids: Vec<Id>,
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDraft {
    #[serde(flatten)]
    pub content: ShowcaseContent,
    pub practice_area_ids: Option<Vec<Id>>, // None leaves the association set untouched
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateImageEntry {
    pub alt_text: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(status: SourceStatus, source_url: Option<&str>) -> ShowcaseContent {
        ShowcaseContent {
            title: "Tiny Forge".into(),
            tagline: "Small tools".into(),
            description: "A forge for tiny tools".into(),
            key_features: Some("  ".into()),
            help_needed: None,
            url: Some("https://example.test".into()),
            video_url: None,
            source_status: status,
            source_url: source_url.map(String::from),
        }
    }

    #[test]
    fn source_url_required_only_when_source_offered() {
        assert!(content(SourceStatus::OpenSource, None).validate().is_err());
        assert!(content(SourceStatus::SourceAvailable, Some(" ")).validate().is_err());
        assert!(content(SourceStatus::OpenSource, Some("https://git.test/x")).validate().is_ok());
        assert!(content(SourceStatus::NotAvailable, None).validate().is_ok());
    }

    #[test]
    fn normalize_forces_source_url_off_and_drops_blanks() {
        let c = content(SourceStatus::NotAvailable, Some("https://git.test/x")).normalized();
        assert_eq!(c.source_url, None);
        assert_eq!(c.key_features, None);
        assert_eq!(c.url.as_deref(), Some("https://example.test"));
    }

    #[test]
    fn image_action_columns_enforce_shape() {
        assert_eq!(
            ImageAction::from_columns("keep", Some(4), None).unwrap(),
            ImageAction::Keep { original_image_id: 4 }
        );
        assert!(ImageAction::from_columns("add", Some(4), Some("p".into())).is_err());
        assert!(ImageAction::from_columns("remove", None, None).is_err());
        assert!(ImageAction::from_columns("rename", Some(1), None).is_err());
    }

    #[test]
    fn image_action_serializes_with_kind_tag() {
        let v = serde_json::to_value(ImageAction::Add { path: "showcase-drafts/1/images/a.png".into() }).unwrap();
        assert_eq!(v["kind"], "add");
        assert_eq!(v["path"], "showcase-drafts/1/images/a.png");
    }
}
