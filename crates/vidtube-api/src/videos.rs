use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    routing::{get, patch},
};
use sea_orm::prelude::{DateTimeWithTimeZone, Expr};
use sea_orm::sea_query::{Func, OnConflict, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::{videos, watch_history};

use crate::error::ApiError;
use crate::pagination::PageQuery;
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::users::{OwnerView, load_owners};
use crate::validate::{Required, ensure_owner, parse_id};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i32,
    pub is_published: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerView>,
}

impl VideoView {
    pub fn from_model(v: videos::Model, owner: Option<OwnerView>) -> Self {
        Self {
            id: v.id,
            owner_id: v.owner_id,
            title: v.title,
            description: v.description,
            video_file: v.video_file,
            thumbnail: v.thumbnail,
            duration: v.duration,
            views: v.views,
            is_published: v.is_published,
            created_at: v.created_at,
            updated_at: v.updated_at,
            owner,
        }
    }
}

pub(crate) async fn with_owners(
    db: &DatabaseConnection,
    rows: Vec<videos::Model>,
) -> Result<Vec<VideoView>, DbErr> {
    let owners = load_owners(db, rows.iter().map(|v| v.owner_id)).await?;
    Ok(rows
        .into_iter()
        .map(|v| {
            let owner = owners.get(&v.owner_id).cloned();
            VideoView::from_model(v, owner)
        })
        .collect())
}

/// Unpublished videos exist only for their owner.
pub(crate) fn is_visible(video: &videos::Model, me: Uuid) -> bool {
    video.is_published || video.owner_id == me
}

/// SQL form of [`is_visible`], for queries that join `videos`.
pub(crate) fn visible_condition(me: Uuid) -> Condition {
    Condition::any()
        .add(videos::Column::IsPublished.eq(true))
        .add(videos::Column::OwnerId.eq(me))
}

pub(crate) async fn load_visible_video(
    db: &DatabaseConnection,
    id: Uuid,
    me: &AuthUser,
) -> Result<videos::Model, ApiError> {
    videos::Entity::find_by_id(id)
        .one(db)
        .await?
        .filter(|v| is_visible(v, me.id()))
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

async fn load_owned_video(
    db: &DatabaseConnection,
    id: Uuid,
    me: &AuthUser,
) -> Result<videos::Model, ApiError> {
    let video = videos::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    ensure_owner(video.owner_id, me.id(), "video")?;
    Ok(video)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos).post(publish_video))
        .route(
            "/:videoId",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/toggle/publish/:videoId", patch(toggle_publish))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListVideosQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoPage {
    pub videos: Vec<VideoView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

fn sort_column(raw: Option<&str>) -> Result<videos::Column, ApiError> {
    match raw.unwrap_or("createdAt") {
        "createdAt" => Ok(videos::Column::CreatedAt),
        "views" => Ok(videos::Column::Views),
        "title" => Ok(videos::Column::Title),
        "duration" => Ok(videos::Column::Duration),
        other => Err(ApiError::bad_request(format!("Unsupported sortBy {other:?}"))),
    }
}

fn sort_order(raw: Option<&str>) -> Result<Order, ApiError> {
    match raw.unwrap_or("desc") {
        "desc" => Ok(Order::Desc),
        "asc" => Ok(Order::Asc),
        other => Err(ApiError::bad_request(format!("Unsupported sortType {other:?}"))),
    }
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub async fn list_videos(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    query: Result<Query<ListVideosQuery>, QueryRejection>,
) -> ApiResult<VideoPage> {
    let Query(query) = query?;
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(10);
    let column = sort_column(query.sort_by.as_deref())?;
    let order = sort_order(query.sort_type.as_deref())?;
    let owner = query
        .user_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_id(v, "userId"))
        .transpose()?;

    let mut select = videos::Entity::find();
    if let Some(owner) = owner {
        select = select.filter(videos::Column::OwnerId.eq(owner));
    }
    if owner != Some(me.id()) {
        select = select.filter(videos::Column::IsPublished.eq(true));
    }
    if let Some(needle) = query.query.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(videos::Column::Title))).like(like_pattern(needle)),
        );
    }

    let db = &*state.db;
    let paginator = select
        .order_by(column, order)
        .order_by_asc(videos::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page.index()).await?;

    Ok(ApiResponse::ok(
        VideoPage {
            videos: with_owners(db, rows).await?,
            total,
            page: page.page,
            limit: page.limit,
        },
        "Videos fetched successfully",
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_file: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
}

pub async fn publish_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<PublishVideoRequest>, JsonRejection>,
) -> ApiResult<VideoView> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let title = required.take("title", input.title).trim().to_string();
    let description = required.take("description", input.description).trim().to_string();
    let video_file = required.take("videoFile", input.video_file).trim().to_string();
    let thumbnail = required.take("thumbnail", input.thumbnail).trim().to_string();
    required.finish()?;

    let duration = input.duration.unwrap_or(0.0);
    if !duration.is_finite() || duration < 0.0 {
        return Err(ApiError::bad_request("Duration must be a non-negative number"));
    }

    let now = chrono::Utc::now();
    let video = videos::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(me.id()),
        title: Set(title),
        description: Set(description),
        video_file: Set(video_file),
        thumbnail: Set(thumbnail),
        duration: Set(duration),
        views: Set(0),
        is_published: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&*state.db)
    .await?;

    tracing::info!(video_id = %video.id, owner_id = %me.id(), "video published");
    Ok(ApiResponse::created(
        VideoView::from_model(video, None),
        "Video published successfully",
    ))
}

pub async fn get_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<VideoView> {
    let id = parse_id(&video_id, "videoId")?;
    let db = &*state.db;

    let mut video = load_visible_video(db, id, &me).await?;

    // One history row per (user, video); a rewatch only moves `watched_at`.
    let txn = db.begin().await?;
    videos::Entity::update_many()
        .col_expr(videos::Column::Views, Expr::col(videos::Column::Views).add(1))
        .filter(videos::Column::Id.eq(id))
        .exec(&txn)
        .await?;
    watch_history::Entity::insert(watch_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(me.id()),
        video_id: Set(id),
        watched_at: Set(chrono::Utc::now().into()),
    })
    .on_conflict(
        OnConflict::columns([watch_history::Column::UserId, watch_history::Column::VideoId])
            .update_column(watch_history::Column::WatchedAt)
            .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;
    txn.commit().await?;
    video.views += 1;

    let mut views = with_owners(db, vec![video]).await?;
    let view = views
        .pop()
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(ApiResponse::ok(view, "Video fetched successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

pub async fn update_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
    payload: Result<Json<UpdateVideoRequest>, JsonRejection>,
) -> ApiResult<VideoView> {
    let id = parse_id(&video_id, "videoId")?;
    let Json(input) = payload?;
    let mut required = Required::new();
    let title = required.take("title", input.title).trim().to_string();
    let description = required.take("description", input.description).trim().to_string();
    required.finish()?;

    let db = &*state.db;
    let mut active: videos::ActiveModel = load_owned_video(db, id, &me).await?.into();
    active.title = Set(title);
    active.description = Set(description);
    if let Some(thumbnail) = input.thumbnail.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        active.thumbnail = Set(thumbnail);
    }
    active.updated_at = Set(chrono::Utc::now().into());
    let video = active.update(db).await?;

    Ok(ApiResponse::ok(
        VideoView::from_model(video, None),
        "Video updated successfully",
    ))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&video_id, "videoId")?;
    let db = &*state.db;
    load_owned_video(db, id, &me).await?;
    videos::Entity::delete_by_id(id).exec(db).await?;

    tracing::info!(video_id = %id, "video deleted");
    Ok(ApiResponse::ok((), "Video deleted successfully"))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<VideoView> {
    let id = parse_id(&video_id, "videoId")?;
    let db = &*state.db;
    let video = load_owned_video(db, id, &me).await?;

    let published = !video.is_published;
    let mut active: videos::ActiveModel = video.into();
    active.is_published = Set(published);
    active.updated_at = Set(chrono::Utc::now().into());
    let video = active.update(db).await?;

    Ok(ApiResponse::ok(
        VideoView::from_model(video, None),
        "Video publish status toggled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_newest_first() {
        assert!(matches!(sort_column(None), Ok(videos::Column::CreatedAt)));
        assert!(matches!(sort_order(None), Ok(Order::Desc)));
        assert!(matches!(sort_order(Some("asc")), Ok(Order::Asc)));
    }

    #[test]
    fn unknown_sort_keys_are_rejected() {
        assert!(sort_column(Some("password_hash")).is_err());
        assert!(sort_order(Some("sideways")).is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Rust"), "%rust%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }
}
