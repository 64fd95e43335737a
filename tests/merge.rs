#![cfg(feature = "inmem-store")]

mod common;

use common::{content, upload, Fixture, Op, LIVE_THUMB};
use showcase::models::{ImageAction, NewDraftImage, ThumbnailCrop, UpdateDraft, UpdateImageEntry};
use showcase::paths;
use showcase::repo::{RepoError, ShowcaseRepo};
use showcase::workflow::WorkflowError;
use sqlx::types::Json;

#[tokio::test]
async fn merge_applies_content_and_practice_areas() {
    let fx = Fixture::new();
    let design = fx.area("Design").await;
    let tools = fx.area("Tools").await;
    let live = fx.live_showcase(None, 0, &[design]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    let mut edited = content("Tiny Forge 2");
    edited.help_needed = Some("  testers  ".into());
    fx.wf
        .update_draft(draft.id, UpdateDraft { content: edited, practice_area_ids: Some(vec![tools]) })
        .await
        .unwrap();

    // the live record keeps serving the old content until merge
    assert_eq!(fx.wf.showcase_view(id).await.unwrap().showcase.content.title, "Tiny Forge");

    let (merged, report) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!(merged.content.title, "Tiny Forge 2");
    assert_eq!(merged.content.help_needed.as_deref(), Some("testers"));
    assert_eq!(merged.slug, live.showcase.slug);
    assert_eq!(merged.status, live.showcase.status);
    assert_eq!(report.kept + report.removed + report.added + report.skipped, 0);

    let view = fx.wf.showcase_view(id).await.unwrap();
    assert_eq!(view.practice_area_ids, vec![tools]);
    assert!(matches!(
        fx.wf.draft_view(draft.id).await.unwrap_err(),
        WorkflowError::Repo(RepoError::NotFound)
    ));
}

#[tokio::test]
async fn image_actions_are_reconciled() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 3, &[]).await;
    let id = live.showcase.id;
    let (a, b, c) = (&live.images[0], &live.images[1], &live.images[2]);

    let draft = fx.wf.fork(id).await.unwrap();
    let entries = fx.wf.draft_view(draft.id).await.unwrap().images;
    let entry_a = entries.iter().find(|e| e.action.original_image_id() == Some(a.id)).unwrap();
    let entry_b = entries.iter().find(|e| e.action.original_image_id() == Some(b.id)).unwrap();

    fx.wf.remove_image(draft.id, entry_b.id).await.unwrap();
    fx.wf
        .update_image_entry(
            draft.id,
            entry_a.id,
            UpdateImageEntry { alt_text: Some("hero shot".into()), order: Some(10) },
        )
        .await
        .unwrap();
    let added = fx.wf.stage_image(draft.id, upload("diagram.webp", b"new-image")).await.unwrap();
    assert_eq!(added.order, 3);
    let staged = added.action.staged_path().unwrap().to_string();
    assert!(staged.starts_with(&format!("showcase-drafts/{}/images/", draft.id)));
    assert!(fx.blobs.contains(&staged));

    let (_, report) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!((report.kept, report.removed, report.added, report.skipped), (2, 1, 1, 0));

    let view = fx.wf.showcase_view(id).await.unwrap();
    assert_eq!(view.images.len(), 3, "KEEP + ADD entries");
    let ids: Vec<_> = view.images.iter().map(|i| i.id).collect();
    assert!(!ids.contains(&b.id));
    assert!(!fx.blobs.contains(&b.path), "removed image file is deleted after commit");

    let kept_a = view.images.iter().find(|i| i.id == a.id).unwrap();
    assert_eq!(kept_a.order, 10);
    assert_eq!(kept_a.alt_text.as_deref(), Some("hero shot"));
    assert_eq!(kept_a.path, a.path);
    assert!(view.images.iter().any(|i| i.id == c.id));

    let promoted = view.images.iter().find(|i| i.filename == "diagram.webp").unwrap();
    assert!(promoted.path.starts_with(&format!("showcase/{id}/images/")));
    assert!(promoted.path.ends_with(".webp"));
    assert_eq!(fx.blobs.read(&promoted.path).as_deref(), Some(&b"new-image"[..]));
    assert!(!fx.blobs.contains(&staged));
    assert!(fx.blobs.paths_under(&paths::draft_directory(draft.id)).is_empty());
}

#[tokio::test]
async fn thumbnail_with_new_extension_replaces_old_file() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 0, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    let crop = ThumbnailCrop { x: 0, y: 0, width: 64, height: 64 };
    let staged = fx.wf.set_thumbnail(draft.id, upload("cover.jpg", b"new-thumb"), Some(crop)).await.unwrap();
    assert_eq!(staged.thumbnail_extension.as_deref(), Some("jpg"));
    // the png copy made by fork was superseded
    assert!(!fx.blobs.contains(&paths::draft_thumbnail(draft.id, "png")));

    let (merged, _) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!(merged.thumbnail_extension.as_deref(), Some("jpg"));
    assert_eq!(merged.crop(), Some(crop));
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "jpg")).as_deref(), Some(&b"new-thumb"[..]));
    assert!(!fx.blobs.contains(&paths::live_thumbnail(id, "png")));
}

#[tokio::test]
async fn thumbnail_with_same_extension_is_overwritten() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 0, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    fx.wf.set_thumbnail(draft.id, upload("cover.png", b"new-thumb"), None).await.unwrap();
    let (merged, _) = fx.wf.merge(draft.id).await.unwrap();

    assert_eq!(merged.thumbnail_extension.as_deref(), Some("png"));
    assert_eq!(merged.crop(), None);
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(&b"new-thumb"[..]));
    assert!(fx.blobs.paths_under(&paths::draft_directory(draft.id)).is_empty());
}

#[tokio::test]
async fn cleared_thumbnail_removes_live_one() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 0, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    let cleared = fx.wf.clear_thumbnail(draft.id).await.unwrap();
    assert_eq!(cleared.thumbnail_extension, None);
    assert!(!fx.blobs.contains(&paths::draft_thumbnail(draft.id, "png")));

    let (merged, _) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!(merged.thumbnail_extension, None);
    assert_eq!(merged.thumbnail_crop, None);
    assert!(!fx.blobs.contains(&paths::live_thumbnail(id, "png")));
}

#[tokio::test]
async fn missing_staged_thumbnail_only_updates_crop() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 0, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    fx.blobs.remove(&paths::draft_thumbnail(draft.id, "png"));
    let crop = ThumbnailCrop { x: 5, y: 5, width: 10, height: 10 };
    {
        let mut uow = fx.repo.begin().await.unwrap();
        let mut record = uow.get_draft(draft.id).await.unwrap();
        record.thumbnail_crop = Some(Json(crop));
        uow.update_draft(&record).await.unwrap();
        uow.commit().await.unwrap();
    }

    let (merged, _) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!(merged.thumbnail_extension.as_deref(), Some("png"));
    assert_eq!(merged.crop(), Some(crop));
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(LIVE_THUMB));
}

#[tokio::test]
async fn failed_merge_restores_live_files() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 1, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    fx.wf
        .update_draft(draft.id, UpdateDraft { content: content("Renamed"), practice_area_ids: None })
        .await
        .unwrap();
    fx.wf.set_thumbnail(draft.id, upload("cover.png", b"new-thumb"), None).await.unwrap();
    let entry = fx.wf.stage_image(draft.id, upload("lost.png", b"gone")).await.unwrap();
    let staged = entry.action.staged_path().unwrap().to_string();
    fx.blobs.remove(&staged);

    let err = fx.wf.merge(draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::MissingStagedFile(ref p) if *p == staged));

    // database untouched
    let view = fx.wf.showcase_view(id).await.unwrap();
    assert_eq!(view.showcase.content.title, "Tiny Forge");
    assert_eq!(view.images, live.images);
    assert_eq!(fx.wf.draft_view(draft.id).await.unwrap().draft.id, draft.id);

    // files back where they were, including the overwritten live thumbnail
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(LIVE_THUMB));
    assert_eq!(
        fx.blobs.read(&paths::draft_thumbnail(draft.id, "png")).as_deref(),
        Some(&b"new-thumb"[..])
    );
    assert!(!fx.blobs.contains(&paths::draft_thumbnail_backup(draft.id, "png")));
    assert_eq!(fx.blobs.paths_under(&format!("showcase/{id}/images")).len(), 1);
}

#[tokio::test]
async fn merged_draft_cannot_be_merged_twice() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 1, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();

    fx.wf.merge(draft.id).await.unwrap();
    let err = fx.wf.merge(draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Repo(RepoError::NotFound)));
    assert_eq!(fx.wf.showcase_view(live.showcase.id).await.unwrap().images.len(), 1);
}

#[tokio::test]
async fn approval_requires_a_pending_draft() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 0, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();

    assert!(matches!(fx.wf.approve_draft(draft.id).await.unwrap_err(), WorkflowError::Transition(_)));

    fx.wf.submit_draft(draft.id).await.unwrap();
    let err = fx
        .wf
        .update_draft(draft.id, UpdateDraft { content: content("Too late"), practice_area_ids: None })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotEditable { .. }));

    let rejected = fx.wf.reject_draft(draft.id, "typo in tagline").await.unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("typo in tagline"));
    fx.wf
        .update_draft(draft.id, UpdateDraft { content: content("Fixed"), practice_area_ids: None })
        .await
        .unwrap();
    fx.wf.submit_draft(draft.id).await.unwrap();

    let (merged, _) = fx.wf.approve_draft(draft.id).await.unwrap();
    assert_eq!(merged.content.title, "Fixed");
}

#[tokio::test]
async fn cleanup_failure_does_not_fail_merge() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 1, &[]).await;
    let id = live.showcase.id;
    let image = &live.images[0];

    let draft = fx.wf.fork(id).await.unwrap();
    let entry = fx.wf.draft_view(draft.id).await.unwrap().images.remove(0);
    fx.wf.remove_image(draft.id, entry.id).await.unwrap();

    fx.blobs.fail(Op::Delete, "showcase/");
    fx.wf.merge(draft.id).await.unwrap();

    assert!(fx.wf.showcase_view(id).await.unwrap().images.is_empty());
    assert!(fx.blobs.contains(&image.path), "orphaned file survives a failed cleanup");
}

#[tokio::test]
async fn vanished_live_images_are_skipped() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 2, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    fx.wf.delete_live_image(id, live.images[0].id).await.unwrap();

    let (_, report) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!((report.kept, report.skipped), (1, 1));
    assert_eq!(fx.wf.showcase_view(id).await.unwrap().images.len(), 1);
}

#[tokio::test]
async fn add_entry_outside_draft_directory_is_refused() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 0, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();
    let foreign = "showcase-drafts/999/images/other.png";
    fx.blobs.insert(foreign, b"not yours");
    {
        let mut uow = fx.repo.begin().await.unwrap();
        uow.insert_draft_image(NewDraftImage {
            draft_id: draft.id,
            action: ImageAction::Add { path: foreign.into() },
            filename: "other.png".into(),
            alt_text: None,
            order: 0,
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();
    }

    let err = fx.wf.merge(draft.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ForeignStagedPath(_)));
    assert!(fx.blobs.contains(foreign));
}

#[tokio::test]
async fn removing_a_staged_upload_deletes_its_file() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 0, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();

    let entry = fx.wf.stage_image(draft.id, upload("oops.png", b"x")).await.unwrap();
    let staged = entry.action.staged_path().unwrap().to_string();
    fx.wf.remove_image(draft.id, entry.id).await.unwrap();

    assert!(!fx.blobs.contains(&staged));
    assert!(fx.wf.draft_view(draft.id).await.unwrap().images.is_empty());
    assert!(matches!(
        fx.wf.restore_image(draft.id, entry.id).await.unwrap_err(),
        WorkflowError::Repo(RepoError::NotFound)
    ));
}

#[tokio::test]
async fn restore_brings_back_a_removed_image() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 1, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();
    let entry = fx.wf.draft_view(draft.id).await.unwrap().images.remove(0);

    fx.wf.remove_image(draft.id, entry.id).await.unwrap();
    let restored = fx.wf.restore_image(draft.id, entry.id).await.unwrap();
    assert_eq!(restored.action, ImageAction::Keep { original_image_id: live.images[0].id });

    let (_, report) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!((report.kept, report.removed), (1, 0));
    assert_eq!(fx.wf.showcase_view(live.showcase.id).await.unwrap().images, live.images);
}

#[tokio::test]
async fn merge_without_edits_leaves_showcase_unchanged() {
    let fx = Fixture::new();
    let design = fx.area("Design").await;
    let tools = fx.area("Tools").await;
    let before = fx.live_showcase(Some("png"), 3, &[design, tools]).await;
    let id = before.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    let (merged, report) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!((report.kept, report.removed, report.added, report.skipped), (3, 0, 0, 0));

    let after = fx.wf.showcase_view(id).await.unwrap();
    let mut expected = before.showcase.clone();
    expected.updated_at = after.showcase.updated_at;
    assert_eq!(after.showcase, expected);
    assert_eq!(merged.crop(), before.showcase.crop());
    assert_eq!(after.images, before.images);
    assert_eq!(after.practice_area_ids, before.practice_area_ids);

    // the thumbnail went through backup and overwrite and still holds the same bytes
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(LIVE_THUMB));
    assert_eq!(fx.blobs.paths_under(&format!("showcase/{id}/images")).len(), 3);
    assert!(fx.blobs.paths_under(&paths::draft_directory(draft.id)).is_empty());
}

#[tokio::test]
async fn failed_thumbnail_replacement_keeps_previous_upload() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("state.json");
    let fx = Fixture::with_snapshot(&snapshot);
    let live = fx.live_showcase(None, 0, &[]).await;
    let draft = fx.wf.fork(live.showcase.id).await.unwrap();
    fx.wf.set_thumbnail(draft.id, upload("cover.png", b"first-upload"), None).await.unwrap();
    let staged = paths::draft_thumbnail(draft.id, "png");

    // a directory in place of the snapshot makes every commit fail
    std::fs::remove_file(&snapshot).unwrap();
    std::fs::create_dir(&snapshot).unwrap();
    let err = fx.wf.set_thumbnail(draft.id, upload("cover.png", b"second-upload"), None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Repo(RepoError::Internal(_))));

    assert_eq!(fx.blobs.read(&staged).as_deref(), Some(&b"first-upload"[..]));
    assert!(!fx.blobs.contains(&paths::draft_thumbnail_backup(draft.id, "png")));

    std::fs::remove_dir(&snapshot).unwrap();
    let view = fx.wf.draft_view(draft.id).await.unwrap();
    assert_eq!(view.draft.thumbnail_extension.as_deref(), Some("png"));

    let (merged, _) = fx.wf.merge(draft.id).await.unwrap();
    assert_eq!(merged.thumbnail_extension.as_deref(), Some("png"));
    assert_eq!(
        fx.blobs.read(&paths::live_thumbnail(live.showcase.id, "png")).as_deref(),
        Some(&b"first-upload"[..])
    );
}
