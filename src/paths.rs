//! Blob path conventions. These strings are shared with existing storage and must not drift.

use uuid::Uuid;

use crate::models::Id;

pub const LIVE_ROOT: &str = "showcase";
pub const DRAFT_ROOT: &str = "showcase-drafts";

pub fn live_thumbnail(showcase_id: Id, extension: &str) -> String {
    format!("{LIVE_ROOT}/{showcase_id}/thumbnail.{extension}")
}

/// Fresh, never-reused location for a promoted image.
pub fn live_image(showcase_id: Id, extension: &str) -> String {
    format!("{LIVE_ROOT}/{showcase_id}/images/{}.{extension}", Uuid::new_v4())
}

pub fn draft_directory(draft_id: Id) -> String {
    format!("{DRAFT_ROOT}/{draft_id}")
}

pub fn draft_thumbnail(draft_id: Id, extension: &str) -> String {
    format!("{DRAFT_ROOT}/{draft_id}/thumbnail.{extension}")
}

/// Holds the previous thumbnail while a unit of work overwrites it in place.
pub fn draft_thumbnail_backup(draft_id: Id, extension: &str) -> String {
    format!("{DRAFT_ROOT}/{draft_id}/thumbnail.previous.{extension}")
}

pub fn draft_image(draft_id: Id, extension: &str) -> String {
    format!("{DRAFT_ROOT}/{draft_id}/images/{}.{extension}", Uuid::new_v4())
}

pub fn is_in_draft_directory(draft_id: Id, path: &str) -> bool {
    let dir = draft_directory(draft_id);
    path.strip_prefix(&dir)
        .map(|rest| rest.starts_with('/') && !rest.split('/').any(|seg| seg == ".."))
        .unwrap_or(false)
}

/// Extension of the last path segment, if any.
pub fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Lowercased, alphanumeric, at most 8 chars; anything else is refused.
pub fn sanitize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}
