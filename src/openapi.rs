use crate::models::{
    DraftImageEntry, DraftRecord, DraftStatus, DraftView, ImageAction, NewPracticeArea,
    NewShowcase, PracticeArea, RejectRequest, ShowcaseContent, ShowcaseImage, ShowcaseRecord,
    ShowcaseStatus, ShowcaseView, SourceStatus, ThumbnailCrop, UpdateDraft, UpdateImageEntry,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_showcase,
        crate::routes::get_showcase,
        crate::routes::delete_showcase,
        crate::routes::submit_showcase,
        crate::routes::upload_showcase_image,
        crate::routes::delete_showcase_image,
        crate::routes::fork_draft,
        crate::routes::get_showcase_draft,
        crate::routes::get_draft,
        crate::routes::update_draft,
        crate::routes::discard_draft,
        crate::routes::stage_draft_image,
        crate::routes::update_draft_image,
        crate::routes::remove_draft_image,
        crate::routes::restore_draft_image,
        crate::routes::set_draft_thumbnail,
        crate::routes::clear_draft_thumbnail,
        crate::routes::submit_draft,
        crate::routes::approve_draft,
        crate::routes::reject_draft,
        crate::routes::approve_showcase,
        crate::routes::reject_showcase,
        crate::routes::list_practice_areas,
        crate::routes::create_practice_area,
    ),
    components(schemas(
        ShowcaseRecord, ShowcaseContent, ShowcaseStatus, SourceStatus, ShowcaseImage, ShowcaseView,
        NewShowcase, ThumbnailCrop, DraftRecord, DraftStatus, DraftView, DraftImageEntry,
        ImageAction, UpdateDraft, UpdateImageEntry, RejectRequest, PracticeArea, NewPracticeArea,
        crate::routes::MergeResponse
    )),
    tags(
        (name = "showcases", description = "Live showcase operations"),
        (name = "drafts", description = "Draft staging and merge-back"),
        (name = "moderation", description = "Moderator review"),
    )
)]
pub struct ApiDoc;
