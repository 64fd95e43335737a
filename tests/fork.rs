#![cfg(feature = "inmem-store")]

mod common;

use common::{Fixture, Op, CROP, LIVE_THUMB};
use showcase::models::{DraftStatus, ImageAction};
use showcase::paths;
use showcase::repo::RepoError;
use showcase::workflow::WorkflowError;

#[tokio::test]
async fn fork_snapshots_live_showcase() {
    let fx = Fixture::new();
    let design = fx.area("Design").await;
    let tools = fx.area("Tools").await;
    let live = fx.live_showcase(Some("png"), 2, &[design, tools]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    assert_eq!(draft.showcase_id, id);
    assert_eq!(draft.status, DraftStatus::Draft);
    assert_eq!(draft.content, live.showcase.content);
    assert_eq!(draft.thumbnail_extension.as_deref(), Some("png"));
    assert_eq!(draft.crop(), Some(CROP));

    // staged thumbnail is a copy; the live file stays put
    assert_eq!(fx.blobs.read(&paths::draft_thumbnail(draft.id, "png")).as_deref(), Some(LIVE_THUMB));
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(LIVE_THUMB));

    let view = fx.wf.draft_view(draft.id).await.unwrap();
    assert_eq!(view.practice_area_ids, vec![design, tools]);
    assert_eq!(view.images.len(), 2);
    for (entry, image) in view.images.iter().zip(&live.images) {
        assert_eq!(entry.action, ImageAction::Keep { original_image_id: image.id });
        assert_eq!(entry.order, image.order);
        assert_eq!(entry.filename, image.filename);
        assert_eq!(entry.alt_text, image.alt_text);
    }

    // nothing about the live record changed
    let after = fx.wf.showcase_view(id).await.unwrap();
    assert_eq!(after.showcase.status, live.showcase.status);
    assert_eq!(after.images, live.images);
}

#[tokio::test]
async fn fork_tolerates_missing_live_thumbnail_file() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("jpg"), 0, &[]).await;
    let id = live.showcase.id;
    fx.blobs.remove(&paths::live_thumbnail(id, "jpg"));

    let draft = fx.wf.fork(id).await.unwrap();
    assert_eq!(draft.thumbnail_extension.as_deref(), Some("jpg"));
    assert!(fx.blobs.paths_under(&paths::draft_directory(draft.id)).is_empty());
}

#[tokio::test]
async fn second_fork_is_refused() {
    let fx = Fixture::new();
    let live = fx.live_showcase(None, 1, &[]).await;
    let id = live.showcase.id;

    let first = fx.wf.fork(id).await.unwrap();
    let err = fx.wf.fork(id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::DraftExists(s) if s == id));

    // the existing draft is untouched
    let view = fx.wf.draft_for_showcase(id).await.unwrap();
    assert_eq!(view.draft.id, first.id);
    assert_eq!(view.images.len(), 1);
}

#[tokio::test]
async fn fork_of_missing_or_deleted_showcase_is_not_found() {
    let fx = Fixture::new();
    let err = fx.wf.fork(4242).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Repo(RepoError::NotFound)));

    let live = fx.live_showcase(None, 0, &[]).await;
    fx.wf.delete_showcase(live.showcase.id).await.unwrap();
    let err = fx.wf.fork(live.showcase.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Repo(RepoError::NotFound)));
}

#[tokio::test]
async fn storage_failure_during_fork_leaves_no_draft() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 1, &[]).await;
    let id = live.showcase.id;

    fx.blobs.fail(Op::Copy, &paths::live_thumbnail(id, "png"));
    let err = fx.wf.fork(id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Storage(_)));
    assert!(matches!(
        fx.wf.draft_for_showcase(id).await.unwrap_err(),
        WorkflowError::Repo(RepoError::NotFound)
    ));

    fx.blobs.heal();
    let draft = fx.wf.fork(id).await.unwrap();
    assert!(fx.blobs.contains(&paths::draft_thumbnail(draft.id, "png")));
}

#[tokio::test]
async fn discarded_draft_can_be_forked_again() {
    let fx = Fixture::new();
    let live = fx.live_showcase(Some("png"), 1, &[]).await;
    let id = live.showcase.id;

    let draft = fx.wf.fork(id).await.unwrap();
    fx.wf.stage_image(draft.id, common::upload("new.png", b"staged")).await.unwrap();
    fx.wf.discard(draft.id).await.unwrap();

    assert!(fx.blobs.paths_under(&paths::draft_directory(draft.id)).is_empty());
    let after = fx.wf.showcase_view(id).await.unwrap();
    assert_eq!(after.images, live.images);
    assert_eq!(fx.blobs.read(&paths::live_thumbnail(id, "png")).as_deref(), Some(LIVE_THUMB));

    let again = fx.wf.fork(id).await.unwrap();
    assert_ne!(again.id, draft.id);
}
