#![allow(dead_code, unused_imports)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use showcase::models::{Id, ShowcaseContent, ShowcaseView, SourceStatus, ThumbnailCrop};
use showcase::models::NewShowcase;
use showcase::paths;
#[cfg(feature = "inmem-store")]
use showcase::repo::inmem::InMemRepo;
use showcase::repo::ShowcaseRepo;
use showcase::storage::{BlobResult, BlobStore, BlobStoreError};
use showcase::workflow::{DraftWorkflow, Upload};
use sqlx::types::Json;

// ---------------- In-memory BlobStore with failure injection (tests only) ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put,
    Copy,
    Move,
    Delete,
    DeleteDirectory,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failures: Mutex<Vec<(Op, String)>>,
}

impl MemoryBlobStore {
    /// Make every `op` whose (source) path starts with `prefix` fail.
    pub fn fail(&self, op: Op, prefix: &str) {
        self.failures.lock().unwrap().push((op, prefix.to_string()));
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.files.lock().unwrap().insert(path.to_string(), bytes.to_vec());
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.files.lock().unwrap().keys().filter(|k| k.starts_with(&prefix)).cloned().collect()
    }

    fn check(&self, op: Op, path: &str) -> BlobResult<()> {
        let injected = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(o, prefix)| *o == op && path.starts_with(prefix.as_str()));
        if injected {
            return Err(BlobStoreError::Other(format!("injected {op:?} failure for {path}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, path: &str) -> BlobResult<bool> {
        Ok(self.contains(path))
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> BlobResult<()> {
        self.check(Op::Put, path)?;
        self.insert(path, bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> BlobResult<Vec<u8>> {
        self.read(path).ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }

    async fn copy(&self, src: &str, dst: &str) -> BlobResult<()> {
        self.check(Op::Copy, src)?;
        let bytes = self.read(src).ok_or_else(|| BlobStoreError::NotFound(src.to_string()))?;
        self.insert(dst, &bytes);
        Ok(())
    }

    async fn move_to(&self, src: &str, dst: &str) -> BlobResult<()> {
        self.check(Op::Move, src)?;
        let mut files = self.files.lock().unwrap();
        let bytes = files.remove(src).ok_or_else(|| BlobStoreError::NotFound(src.to_string()))?;
        files.insert(dst.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        self.check(Op::Delete, path)?;
        self.remove(path);
        Ok(())
    }

    async fn delete_directory(&self, prefix: &str) -> BlobResult<()> {
        self.check(Op::DeleteDirectory, prefix)?;
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.files.lock().unwrap().retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

// ---------------- Fixtures ----------------

pub const OWNER: &str = "u:owner";
pub const MODERATOR: &str = "u:moderator";
pub const LIVE_THUMB: &[u8] = b"live-thumbnail";

pub fn content(title: &str) -> ShowcaseContent {
    ShowcaseContent {
        title: title.to_string(),
        tagline: "Small tools for big jobs".into(),
        description: "A showcase used by tests".into(),
        key_features: Some("fast".into()),
        help_needed: None,
        url: Some("https://example.com".into()),
        video_url: None,
        source_status: SourceStatus::OpenSource,
        source_url: Some("https://example.com/src".into()),
    }
}

pub fn upload(filename: &str, bytes: &[u8]) -> Upload {
    Upload {
        filename: filename.to_string(),
        extension: paths::extension_of(filename).unwrap_or("bin").to_string(),
        alt_text: Some(format!("alt for {filename}")),
        bytes: bytes.to_vec(),
    }
}

pub const CROP: ThumbnailCrop = ThumbnailCrop { x: 1, y: 2, width: 300, height: 200 };

#[cfg(feature = "inmem-store")]
pub struct Fixture {
    pub wf: DraftWorkflow,
    pub repo: Arc<InMemRepo>,
    pub blobs: Arc<MemoryBlobStore>,
}

#[cfg(feature = "inmem-store")]
impl Fixture {
    pub fn new() -> Self {
        Self::with_repo(InMemRepo::new())
    }

    /// Commits also rewrite `path`, so a test can make them fail by blocking it.
    pub fn with_snapshot(path: &std::path::Path) -> Self {
        Self::with_repo(InMemRepo::with_snapshot(path))
    }

    fn with_repo(repo: InMemRepo) -> Self {
        let repo = Arc::new(repo);
        let blobs = Arc::new(MemoryBlobStore::default());
        let wf = DraftWorkflow::new(repo.clone(), blobs.clone());
        Self { wf, repo, blobs }
    }

    pub async fn area(&self, name: &str) -> Id {
        self.wf.create_practice_area(name).await.unwrap().id
    }

    /// Approved showcase with `images` live images and, optionally, a live thumbnail.
    pub async fn live_showcase(&self, thumbnail_ext: Option<&str>, images: usize, areas: &[Id]) -> ShowcaseView {
        let created = self
            .wf
            .create_showcase(
                OWNER,
                NewShowcase { content: content("Tiny Forge"), practice_area_ids: areas.to_vec(), submit: true },
            )
            .await
            .unwrap();
        let id = created.id;
        self.wf.approve_showcase(id, MODERATOR).await.unwrap();
        for i in 0..images {
            self.wf
                .add_live_image(id, upload(&format!("shot{i}.png"), format!("image-{i}").as_bytes()))
                .await
                .unwrap();
        }
        if let Some(ext) = thumbnail_ext {
            let mut uow = self.repo.begin().await.unwrap();
            let mut record = uow.get_showcase(id).await.unwrap();
            record.thumbnail_extension = Some(ext.to_string());
            record.thumbnail_crop = Some(Json(CROP));
            uow.update_showcase(&record).await.unwrap();
            uow.commit().await.unwrap();
            self.blobs.insert(&paths::live_thumbnail(id, ext), LIVE_THUMB);
        }
        self.wf.showcase_view(id).await.unwrap()
    }
}
