use std::sync::Arc;

use async_trait::async_trait;

use crate::models::*;
use crate::slug::is_valid_slug;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Slugs are generated, never user input; a malformed one is a caller bug.
fn ensure_slug(slug: &str) -> RepoResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(RepoError::Internal(format!("malformed slug '{slug}'")))
    }
}

/// Live showcase rows, their images and practice-area associations.
#[async_trait]
pub trait ShowcaseStore: Send {
    async fn insert_showcase(&mut self, new: NewShowcaseRecord) -> RepoResult<ShowcaseRecord>;
    /// Soft-deleted showcases are reported as `NotFound`.
    async fn get_showcase(&mut self, id: Id) -> RepoResult<ShowcaseRecord>;
    async fn update_showcase(&mut self, showcase: &ShowcaseRecord) -> RepoResult<ShowcaseRecord>;
    async fn soft_delete_showcase(&mut self, id: Id) -> RepoResult<()>;

    /// Ordered by display order, then id.
    async fn list_images(&mut self, showcase_id: Id) -> RepoResult<Vec<ShowcaseImage>>;
    async fn insert_image(&mut self, new: NewShowcaseImage) -> RepoResult<ShowcaseImage>;
    /// Returns false when the image does not exist or belongs to another showcase.
    async fn update_image_placement(
        &mut self,
        showcase_id: Id,
        image_id: Id,
        order: i32,
        alt_text: Option<String>,
    ) -> RepoResult<bool>;
    /// Removes the row only; the caller owns cleanup of the backing file.
    async fn delete_image(&mut self, showcase_id: Id, image_id: Id) -> RepoResult<Option<ShowcaseImage>>;

    async fn practice_area_ids(&mut self, showcase_id: Id) -> RepoResult<Vec<Id>>;
    /// Full replacement of the association set.
    async fn set_practice_areas(&mut self, showcase_id: Id, area_ids: &[Id]) -> RepoResult<()>;
    async fn list_practice_areas(&mut self) -> RepoResult<Vec<PracticeArea>>;
    async fn insert_practice_area(&mut self, new: NewPracticeArea) -> RepoResult<PracticeArea>;
}

/// Draft rows. At most one draft per showcase; a second insert is a `Conflict`.
#[async_trait]
pub trait DraftStore: Send {
    async fn insert_draft(&mut self, new: NewDraft) -> RepoResult<DraftRecord>;
    async fn get_draft(&mut self, id: Id) -> RepoResult<DraftRecord>;
    /// Like `get_draft` but holds the row for the rest of the unit of work.
    async fn lock_draft(&mut self, id: Id) -> RepoResult<DraftRecord>;
    async fn find_draft_for_showcase(&mut self, showcase_id: Id) -> RepoResult<Option<DraftRecord>>;
    async fn update_draft(&mut self, draft: &DraftRecord) -> RepoResult<DraftRecord>;
    /// Cascades to the draft's image entries and practice-area rows.
    async fn delete_draft(&mut self, id: Id) -> RepoResult<()>;

    async fn draft_practice_area_ids(&mut self, draft_id: Id) -> RepoResult<Vec<Id>>;
    async fn set_draft_practice_areas(&mut self, draft_id: Id, area_ids: &[Id]) -> RepoResult<()>;

    /// Ordered by `order`, then id.
    async fn list_draft_images(&mut self, draft_id: Id) -> RepoResult<Vec<DraftImageEntry>>;
    async fn insert_draft_image(&mut self, new: NewDraftImage) -> RepoResult<DraftImageEntry>;
    async fn update_draft_image(&mut self, entry: &DraftImageEntry) -> RepoResult<DraftImageEntry>;
    async fn delete_draft_image(&mut self, draft_id: Id, entry_id: Id) -> RepoResult<DraftImageEntry>;
}

/// One database transaction. Dropping it without `commit` rolls everything back.
#[async_trait]
pub trait UnitOfWork: ShowcaseStore + DraftStore {
    async fn commit(self: Box<Self>) -> RepoResult<()>;
}

#[async_trait]
pub trait ShowcaseRepo: Send + Sync {
    async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::{Path, PathBuf};

    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use sqlx::types::Json;
    use tokio::sync::{Mutex, OwnedMutexGuard};
    use tracing::{info, warn};

    #[derive(Default, Clone, Serialize, Deserialize)]
    struct State {
        showcases: BTreeMap<Id, ShowcaseRecord>,
        images: BTreeMap<Id, ShowcaseImage>,
        showcase_areas: BTreeMap<Id, BTreeSet<Id>>,
        practice_areas: BTreeMap<Id, PracticeArea>,
        drafts: BTreeMap<Id, DraftRecord>,
        draft_images: BTreeMap<Id, DraftImageEntry>,
        draft_areas: BTreeMap<Id, BTreeSet<Id>>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        fn live_showcase(&self, id: Id) -> RepoResult<&ShowcaseRecord> {
            self.showcases
                .get(&id)
                .filter(|s| s.deleted_at.is_none())
                .ok_or(RepoError::NotFound)
        }

        fn check_areas(&self, area_ids: &[Id]) -> RepoResult<BTreeSet<Id>> {
            if area_ids.iter().any(|id| !self.practice_areas.contains_key(id)) {
                return Err(RepoError::NotFound);
            }
            Ok(area_ids.iter().copied().collect())
        }
    }

    /// Units of work are serialised; each edits a private copy that replaces the
    /// shared state on commit.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<Mutex<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self { state: Arc::new(Mutex::new(State::default())), snapshot_path: None }
        }

        /// Loads `path` if present and rewrites it after every commit.
        pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(Mutex::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), "loaded in-memory snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse snapshot: {e}; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), "no snapshot ({e}); starting empty");
                    State::default()
                }
            }
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl ShowcaseRepo for InMemRepo {
        async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>> {
            let guard = self.state.clone().lock_owned().await;
            let working = (*guard).clone();
            Ok(Box::new(InMemUnitOfWork {
                guard,
                working,
                snapshot_path: self.snapshot_path.clone(),
            }))
        }
    }

    pub struct InMemUnitOfWork {
        guard: OwnedMutexGuard<State>,
        working: State,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    #[async_trait]
    impl UnitOfWork for InMemUnitOfWork {
        async fn commit(self: Box<Self>) -> RepoResult<()> {
            let this = *self;
            if let Some(path) = this.snapshot_path.as_deref() {
                let bytes = serde_json::to_vec_pretty(&this.working)
                    .map_err(|e| RepoError::Internal(e.to_string()))?;
                if let Some(dir) = path.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| RepoError::Internal(e.to_string()))?;
                }
                tokio::fs::write(path, bytes)
                    .await
                    .map_err(|e| RepoError::Internal(e.to_string()))?;
            }
            let mut guard = this.guard;
            *guard = this.working;
            Ok(())
        }
    }

    #[async_trait]
    impl ShowcaseStore for InMemUnitOfWork {
        async fn insert_showcase(&mut self, new: NewShowcaseRecord) -> RepoResult<ShowcaseRecord> {
            ensure_slug(&new.slug)?;
            let s = &mut self.working;
            if s.showcases.values().any(|sc| sc.slug == new.slug) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let now = Utc::now();
            let showcase = ShowcaseRecord {
                id,
                slug: new.slug,
                owner: new.owner,
                content: new.content,
                thumbnail_extension: None,
                thumbnail_crop: None,
                status: new.status,
                submitted_date: new.submitted_date,
                approved_at: None,
                approved_by: None,
                rejection_reason: None,
                is_featured: false,
                approval_celebrated_at: None,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            s.showcases.insert(id, showcase.clone());
            Ok(showcase)
        }

        async fn get_showcase(&mut self, id: Id) -> RepoResult<ShowcaseRecord> {
            self.working.live_showcase(id).cloned()
        }

        async fn update_showcase(&mut self, showcase: &ShowcaseRecord) -> RepoResult<ShowcaseRecord> {
            self.working.live_showcase(showcase.id)?;
            let mut updated = showcase.clone();
            updated.updated_at = Utc::now();
            self.working.showcases.insert(updated.id, updated.clone());
            Ok(updated)
        }

        async fn soft_delete_showcase(&mut self, id: Id) -> RepoResult<()> {
            let sc = self.working.showcases.get_mut(&id).ok_or(RepoError::NotFound)?;
            if sc.deleted_at.is_none() {
                sc.deleted_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn list_images(&mut self, showcase_id: Id) -> RepoResult<Vec<ShowcaseImage>> {
            let mut v: Vec<_> = self
                .working
                .images
                .values()
                .filter(|i| i.showcase_id == showcase_id)
                .cloned()
                .collect();
            v.sort_by_key(|i| (i.order, i.id));
            Ok(v)
        }

        async fn insert_image(&mut self, new: NewShowcaseImage) -> RepoResult<ShowcaseImage> {
            let s = &mut self.working;
            s.live_showcase(new.showcase_id)?;
            let id = s.next_id();
            let image = ShowcaseImage {
                id,
                showcase_id: new.showcase_id,
                path: new.path,
                filename: new.filename,
                alt_text: new.alt_text,
                order: new.order,
            };
            s.images.insert(id, image.clone());
            Ok(image)
        }

        async fn update_image_placement(
            &mut self,
            showcase_id: Id,
            image_id: Id,
            order: i32,
            alt_text: Option<String>,
        ) -> RepoResult<bool> {
            match self.working.images.get_mut(&image_id) {
                Some(img) if img.showcase_id == showcase_id => {
                    img.order = order;
                    img.alt_text = alt_text;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn delete_image(&mut self, showcase_id: Id, image_id: Id) -> RepoResult<Option<ShowcaseImage>> {
            let images = &mut self.working.images;
            if images.get(&image_id).map(|i| i.showcase_id) != Some(showcase_id) {
                return Ok(None);
            }
            Ok(images.remove(&image_id))
        }

        async fn practice_area_ids(&mut self, showcase_id: Id) -> RepoResult<Vec<Id>> {
            Ok(self
                .working
                .showcase_areas
                .get(&showcase_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default())
        }

        async fn set_practice_areas(&mut self, showcase_id: Id, area_ids: &[Id]) -> RepoResult<()> {
            let s = &mut self.working;
            s.live_showcase(showcase_id)?;
            let set = s.check_areas(area_ids)?;
            s.showcase_areas.insert(showcase_id, set);
            Ok(())
        }

        async fn list_practice_areas(&mut self) -> RepoResult<Vec<PracticeArea>> {
            let mut v: Vec<_> = self.working.practice_areas.values().cloned().collect();
            v.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(v)
        }

        async fn insert_practice_area(&mut self, new: NewPracticeArea) -> RepoResult<PracticeArea> {
            let s = &mut self.working;
            if s.practice_areas.values().any(|a| a.name == new.name) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let area = PracticeArea { id, name: new.name };
            s.practice_areas.insert(id, area.clone());
            Ok(area)
        }
    }

    #[async_trait]
    impl DraftStore for InMemUnitOfWork {
        async fn insert_draft(&mut self, new: NewDraft) -> RepoResult<DraftRecord> {
            let s = &mut self.working;
            s.live_showcase(new.showcase_id)?;
            // mirrors the unique index on showcase_drafts.showcase_id
            if s.drafts.values().any(|d| d.showcase_id == new.showcase_id) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let now = Utc::now();
            let draft = DraftRecord {
                id,
                showcase_id: new.showcase_id,
                content: new.content,
                thumbnail_extension: new.thumbnail_extension,
                thumbnail_crop: new.thumbnail_crop.map(Json),
                status: DraftStatus::Draft,
                submitted_at: None,
                rejection_reason: None,
                created_at: now,
                updated_at: now,
            };
            s.drafts.insert(id, draft.clone());
            Ok(draft)
        }

        async fn get_draft(&mut self, id: Id) -> RepoResult<DraftRecord> {
            self.working.drafts.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn lock_draft(&mut self, id: Id) -> RepoResult<DraftRecord> {
            // the unit of work already holds the only lock
            self.get_draft(id).await
        }

        async fn find_draft_for_showcase(&mut self, showcase_id: Id) -> RepoResult<Option<DraftRecord>> {
            Ok(self
                .working
                .drafts
                .values()
                .find(|d| d.showcase_id == showcase_id)
                .cloned())
        }

        async fn update_draft(&mut self, draft: &DraftRecord) -> RepoResult<DraftRecord> {
            if !self.working.drafts.contains_key(&draft.id) {
                return Err(RepoError::NotFound);
            }
            let mut updated = draft.clone();
            updated.updated_at = Utc::now();
            self.working.drafts.insert(updated.id, updated.clone());
            Ok(updated)
        }

        async fn delete_draft(&mut self, id: Id) -> RepoResult<()> {
            let s = &mut self.working;
            s.drafts.remove(&id).ok_or(RepoError::NotFound)?;
            s.draft_images.retain(|_, e| e.draft_id != id);
            s.draft_areas.remove(&id);
            Ok(())
        }

        async fn draft_practice_area_ids(&mut self, draft_id: Id) -> RepoResult<Vec<Id>> {
            Ok(self
                .working
                .draft_areas
                .get(&draft_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default())
        }

        async fn set_draft_practice_areas(&mut self, draft_id: Id, area_ids: &[Id]) -> RepoResult<()> {
            let s = &mut self.working;
            if !s.drafts.contains_key(&draft_id) {
                return Err(RepoError::NotFound);
            }
            let set = s.check_areas(area_ids)?;
            s.draft_areas.insert(draft_id, set);
            Ok(())
        }

        async fn list_draft_images(&mut self, draft_id: Id) -> RepoResult<Vec<DraftImageEntry>> {
            let mut v: Vec<_> = self
                .working
                .draft_images
                .values()
                .filter(|e| e.draft_id == draft_id)
                .cloned()
                .collect();
            v.sort_by_key(|e| (e.order, e.id));
            Ok(v)
        }

        async fn insert_draft_image(&mut self, new: NewDraftImage) -> RepoResult<DraftImageEntry> {
            let s = &mut self.working;
            if !s.drafts.contains_key(&new.draft_id) {
                return Err(RepoError::NotFound);
            }
            let id = s.next_id();
            let entry = DraftImageEntry {
                id,
                draft_id: new.draft_id,
                action: new.action,
                filename: new.filename,
                alt_text: new.alt_text,
                order: new.order,
            };
            s.draft_images.insert(id, entry.clone());
            Ok(entry)
        }

        async fn update_draft_image(&mut self, entry: &DraftImageEntry) -> RepoResult<DraftImageEntry> {
            match self.working.draft_images.get_mut(&entry.id) {
                Some(existing) if existing.draft_id == entry.draft_id => {
                    *existing = entry.clone();
                    Ok(entry.clone())
                }
                _ => Err(RepoError::NotFound),
            }
        }

        async fn delete_draft_image(&mut self, draft_id: Id, entry_id: Id) -> RepoResult<DraftImageEntry> {
            let images = &mut self.working.draft_images;
            if images.get(&entry_id).map(|e| e.draft_id) != Some(draft_id) {
                return Err(RepoError::NotFound);
            }
            images.remove(&entry_id).ok_or(RepoError::NotFound)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::error::DatabaseError as _;
    use sqlx::types::Json;
    use sqlx::{Pool, Postgres, Transaction};

    const SHOWCASE_COLUMNS: &str = "id, slug, owner, title, tagline, description, key_features, \
        help_needed, url, video_url, source_status, source_url, thumbnail_extension, thumbnail_crop, \
        status, submitted_date, approved_at, approved_by, rejection_reason, is_featured, \
        approval_celebrated_at, created_at, updated_at, deleted_at";

    const IMAGE_COLUMNS: &str = "id, showcase_id, path, filename, alt_text, position";

    const DRAFT_COLUMNS: &str = "id, showcase_id, title, tagline, description, key_features, \
        help_needed, url, video_url, source_status, source_url, thumbnail_extension, thumbnail_crop, \
        status, submitted_at, rejection_reason, created_at, updated_at";

    const DRAFT_IMAGE_COLUMNS: &str =
        "id, draft_id, action, original_image_id, path, filename, alt_text, position";

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::Conflict,
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(sqlx::FromRow)]
    struct DraftImageRow {
        id: Id,
        draft_id: Id,
        action: String,
        original_image_id: Option<Id>,
        path: Option<String>,
        filename: String,
        alt_text: Option<String>,
        position: i32,
    }

    impl TryFrom<DraftImageRow> for DraftImageEntry {
        type Error = RepoError;

        fn try_from(row: DraftImageRow) -> Result<Self, Self::Error> {
            let action = ImageAction::from_columns(&row.action, row.original_image_id, row.path)
                .map_err(RepoError::Internal)?;
            Ok(DraftImageEntry {
                id: row.id,
                draft_id: row.draft_id,
                action,
                filename: row.filename,
                alt_text: row.alt_text,
                order: row.position,
            })
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    #[async_trait]
    impl ShowcaseRepo for PgRepo {
        async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>> {
            let tx = self.pool.begin().await.map_err(map_err)?;
            Ok(Box::new(PgUnitOfWork { tx }))
        }
    }

    pub struct PgUnitOfWork {
        tx: Transaction<'static, Postgres>,
    }

    #[async_trait]
    impl UnitOfWork for PgUnitOfWork {
        async fn commit(self: Box<Self>) -> RepoResult<()> {
            let PgUnitOfWork { tx } = *self;
            tx.commit().await.map_err(map_err)
        }
    }

    #[async_trait]
    impl ShowcaseStore for PgUnitOfWork {
        async fn insert_showcase(&mut self, new: NewShowcaseRecord) -> RepoResult<ShowcaseRecord> {
            ensure_slug(&new.slug)?;
            let c = &new.content;
            let query = format!(
                "INSERT INTO showcases (slug, owner, title, tagline, description, key_features, \
                    help_needed, url, video_url, source_status, source_url, status, submitted_date)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 RETURNING {SHOWCASE_COLUMNS}"
            );
            sqlx::query_as::<_, ShowcaseRecord>(&query)
                .bind(&new.slug)
                .bind(&new.owner)
                .bind(&c.title)
                .bind(&c.tagline)
                .bind(&c.description)
                .bind(&c.key_features)
                .bind(&c.help_needed)
                .bind(&c.url)
                .bind(&c.video_url)
                .bind(c.source_status)
                .bind(&c.source_url)
                .bind(new.status)
                .bind(new.submitted_date)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn get_showcase(&mut self, id: Id) -> RepoResult<ShowcaseRecord> {
            let query = format!(
                "SELECT {SHOWCASE_COLUMNS} FROM showcases WHERE id = $1 AND deleted_at IS NULL"
            );
            sqlx::query_as::<_, ShowcaseRecord>(&query)
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn update_showcase(&mut self, s: &ShowcaseRecord) -> RepoResult<ShowcaseRecord> {
            let c = &s.content;
            let query = format!(
                "UPDATE showcases SET
                    title = $2, tagline = $3, description = $4, key_features = $5,
                    help_needed = $6, url = $7, video_url = $8, source_status = $9,
                    source_url = $10, thumbnail_extension = $11, thumbnail_crop = $12,
                    status = $13, submitted_date = $14, approved_at = $15, approved_by = $16,
                    rejection_reason = $17, is_featured = $18, approval_celebrated_at = $19,
                    updated_at = now()
                 WHERE id = $1 AND deleted_at IS NULL
                 RETURNING {SHOWCASE_COLUMNS}"
            );
            sqlx::query_as::<_, ShowcaseRecord>(&query)
                .bind(s.id)
                .bind(&c.title)
                .bind(&c.tagline)
                .bind(&c.description)
                .bind(&c.key_features)
                .bind(&c.help_needed)
                .bind(&c.url)
                .bind(&c.video_url)
                .bind(c.source_status)
                .bind(&c.source_url)
                .bind(&s.thumbnail_extension)
                .bind(s.thumbnail_crop)
                .bind(s.status)
                .bind(s.submitted_date)
                .bind(s.approved_at)
                .bind(&s.approved_by)
                .bind(&s.rejection_reason)
                .bind(s.is_featured)
                .bind(s.approval_celebrated_at)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn soft_delete_showcase(&mut self, id: Id) -> RepoResult<()> {
            let res = sqlx::query(
                "UPDATE showcases SET deleted_at = COALESCE(deleted_at, now()) WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn list_images(&mut self, showcase_id: Id) -> RepoResult<Vec<ShowcaseImage>> {
            let query = format!(
                "SELECT {IMAGE_COLUMNS} FROM showcase_images WHERE showcase_id = $1 ORDER BY position, id"
            );
            sqlx::query_as::<_, ShowcaseImage>(&query)
                .bind(showcase_id)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn insert_image(&mut self, new: NewShowcaseImage) -> RepoResult<ShowcaseImage> {
            let query = format!(
                "INSERT INTO showcase_images (showcase_id, path, filename, alt_text, position)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {IMAGE_COLUMNS}"
            );
            sqlx::query_as::<_, ShowcaseImage>(&query)
                .bind(new.showcase_id)
                .bind(&new.path)
                .bind(&new.filename)
                .bind(&new.alt_text)
                .bind(new.order)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn update_image_placement(
            &mut self,
            showcase_id: Id,
            image_id: Id,
            order: i32,
            alt_text: Option<String>,
        ) -> RepoResult<bool> {
            let res = sqlx::query(
                "UPDATE showcase_images SET position = $3, alt_text = $4
                 WHERE id = $2 AND showcase_id = $1",
            )
            .bind(showcase_id)
            .bind(image_id)
            .bind(order)
            .bind(alt_text)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
            Ok(res.rows_affected() > 0)
        }

        async fn delete_image(&mut self, showcase_id: Id, image_id: Id) -> RepoResult<Option<ShowcaseImage>> {
            let query = format!(
                "DELETE FROM showcase_images WHERE id = $2 AND showcase_id = $1 RETURNING {IMAGE_COLUMNS}"
            );
            sqlx::query_as::<_, ShowcaseImage>(&query)
                .bind(showcase_id)
                .bind(image_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn practice_area_ids(&mut self, showcase_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>(
                "SELECT practice_area_id FROM showcase_practice_areas
                 WHERE showcase_id = $1 ORDER BY practice_area_id",
            )
            .bind(showcase_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)
        }

        async fn set_practice_areas(&mut self, showcase_id: Id, area_ids: &[Id]) -> RepoResult<()> {
            sqlx::query("DELETE FROM showcase_practice_areas WHERE showcase_id = $1")
                .bind(showcase_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_err)?;
            sqlx::query(
                "INSERT INTO showcase_practice_areas (showcase_id, practice_area_id)
                 SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
            )
            .bind(showcase_id)
            .bind(area_ids)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
            Ok(())
        }

        async fn list_practice_areas(&mut self) -> RepoResult<Vec<PracticeArea>> {
            sqlx::query_as::<_, PracticeArea>("SELECT id, name FROM practice_areas ORDER BY name")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn insert_practice_area(&mut self, new: NewPracticeArea) -> RepoResult<PracticeArea> {
            sqlx::query_as::<_, PracticeArea>(
                "INSERT INTO practice_areas (name) VALUES ($1) RETURNING id, name",
            )
            .bind(&new.name)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_err)
        }
    }

    #[async_trait]
    impl DraftStore for PgUnitOfWork {
        async fn insert_draft(&mut self, new: NewDraft) -> RepoResult<DraftRecord> {
            let c = &new.content;
            let query = format!(
                "INSERT INTO showcase_drafts (showcase_id, title, tagline, description, key_features, \
                    help_needed, url, video_url, source_status, source_url, thumbnail_extension, \
                    thumbnail_crop, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'draft')
                 RETURNING {DRAFT_COLUMNS}"
            );
            sqlx::query_as::<_, DraftRecord>(&query)
                .bind(new.showcase_id)
                .bind(&c.title)
                .bind(&c.tagline)
                .bind(&c.description)
                .bind(&c.key_features)
                .bind(&c.help_needed)
                .bind(&c.url)
                .bind(&c.video_url)
                .bind(c.source_status)
                .bind(&c.source_url)
                .bind(&new.thumbnail_extension)
                .bind(new.thumbnail_crop.map(Json))
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn get_draft(&mut self, id: Id) -> RepoResult<DraftRecord> {
            let query = format!("SELECT {DRAFT_COLUMNS} FROM showcase_drafts WHERE id = $1");
            sqlx::query_as::<_, DraftRecord>(&query)
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn lock_draft(&mut self, id: Id) -> RepoResult<DraftRecord> {
            let query = format!("SELECT {DRAFT_COLUMNS} FROM showcase_drafts WHERE id = $1 FOR UPDATE");
            sqlx::query_as::<_, DraftRecord>(&query)
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn find_draft_for_showcase(&mut self, showcase_id: Id) -> RepoResult<Option<DraftRecord>> {
            let query = format!("SELECT {DRAFT_COLUMNS} FROM showcase_drafts WHERE showcase_id = $1");
            sqlx::query_as::<_, DraftRecord>(&query)
                .bind(showcase_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn update_draft(&mut self, d: &DraftRecord) -> RepoResult<DraftRecord> {
            let c = &d.content;
            let query = format!(
                "UPDATE showcase_drafts SET
                    title = $2, tagline = $3, description = $4, key_features = $5,
                    help_needed = $6, url = $7, video_url = $8, source_status = $9,
                    source_url = $10, thumbnail_extension = $11, thumbnail_crop = $12,
                    status = $13, submitted_at = $14, rejection_reason = $15, updated_at = now()
                 WHERE id = $1
                 RETURNING {DRAFT_COLUMNS}"
            );
            sqlx::query_as::<_, DraftRecord>(&query)
                .bind(d.id)
                .bind(&c.title)
                .bind(&c.tagline)
                .bind(&c.description)
                .bind(&c.key_features)
                .bind(&c.help_needed)
                .bind(&c.url)
                .bind(&c.video_url)
                .bind(c.source_status)
                .bind(&c.source_url)
                .bind(&d.thumbnail_extension)
                .bind(d.thumbnail_crop)
                .bind(d.status)
                .bind(d.submitted_at)
                .bind(&d.rejection_reason)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)
        }

        async fn delete_draft(&mut self, id: Id) -> RepoResult<()> {
            // image entries and practice-area rows go with ON DELETE CASCADE
            let res = sqlx::query("DELETE FROM showcase_drafts WHERE id = $1")
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn draft_practice_area_ids(&mut self, draft_id: Id) -> RepoResult<Vec<Id>> {
            sqlx::query_scalar::<_, Id>(
                "SELECT practice_area_id FROM showcase_draft_practice_areas
                 WHERE draft_id = $1 ORDER BY practice_area_id",
            )
            .bind(draft_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)
        }

        async fn set_draft_practice_areas(&mut self, draft_id: Id, area_ids: &[Id]) -> RepoResult<()> {
            sqlx::query("DELETE FROM showcase_draft_practice_areas WHERE draft_id = $1")
                .bind(draft_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_err)?;
            sqlx::query(
                "INSERT INTO showcase_draft_practice_areas (draft_id, practice_area_id)
                 SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
            )
            .bind(draft_id)
            .bind(area_ids)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
            Ok(())
        }

        async fn list_draft_images(&mut self, draft_id: Id) -> RepoResult<Vec<DraftImageEntry>> {
            let query = format!(
                "SELECT {DRAFT_IMAGE_COLUMNS} FROM showcase_draft_images
                 WHERE draft_id = $1 ORDER BY position, id"
            );
            sqlx::query_as::<_, DraftImageRow>(&query)
                .bind(draft_id)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_err)?
                .into_iter()
                .map(DraftImageEntry::try_from)
                .collect()
        }

        async fn insert_draft_image(&mut self, new: NewDraftImage) -> RepoResult<DraftImageEntry> {
            let query = format!(
                "INSERT INTO showcase_draft_images
                    (draft_id, action, original_image_id, path, filename, alt_text, position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING {DRAFT_IMAGE_COLUMNS}"
            );
            sqlx::query_as::<_, DraftImageRow>(&query)
                .bind(new.draft_id)
                .bind(new.action.tag())
                .bind(new.action.original_image_id())
                .bind(new.action.staged_path())
                .bind(&new.filename)
                .bind(&new.alt_text)
                .bind(new.order)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)?
                .try_into()
        }

        async fn update_draft_image(&mut self, e: &DraftImageEntry) -> RepoResult<DraftImageEntry> {
            let query = format!(
                "UPDATE showcase_draft_images SET
                    action = $3, original_image_id = $4, path = $5, filename = $6,
                    alt_text = $7, position = $8
                 WHERE id = $1 AND draft_id = $2
                 RETURNING {DRAFT_IMAGE_COLUMNS}"
            );
            sqlx::query_as::<_, DraftImageRow>(&query)
                .bind(e.id)
                .bind(e.draft_id)
                .bind(e.action.tag())
                .bind(e.action.original_image_id())
                .bind(e.action.staged_path())
                .bind(&e.filename)
                .bind(&e.alt_text)
                .bind(e.order)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)?
                .try_into()
        }

        async fn delete_draft_image(&mut self, draft_id: Id, entry_id: Id) -> RepoResult<DraftImageEntry> {
            let query = format!(
                "DELETE FROM showcase_draft_images WHERE id = $2 AND draft_id = $1
                 RETURNING {DRAFT_IMAGE_COLUMNS}"
            );
            sqlx::query_as::<_, DraftImageRow>(&query)
                .bind(draft_id)
                .bind(entry_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_err)?
                .try_into()
        }
    }
}
