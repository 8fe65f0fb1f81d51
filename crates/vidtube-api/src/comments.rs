use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    routing::get,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::comments;

use crate::error::ApiError;
use crate::pagination::{PageQuery, Paged};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::users::{OwnerView, load_owners};
use crate::validate::{Required, ensure_owner, parse_id};
use crate::videos::load_visible_video;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerView>,
}

impl CommentView {
    fn from_model(c: comments::Model, owner: Option<OwnerView>) -> Self {
        Self {
            id: c.id,
            video_id: c.video_id,
            owner_id: c.owner_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
            owner,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub content: Option<String>,
}

fn content_of(payload: Result<Json<CommentRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let content = required.take("content", input.content).trim().to_string();
    required.finish()?;
    Ok(content)
}

async fn load_owned_comment(
    db: &DatabaseConnection,
    id: Uuid,
    me: &AuthUser,
) -> Result<comments::Model, ApiError> {
    let comment = comments::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    ensure_owner(comment.owner_id, me.id(), "comment")?;
    Ok(comment)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:videoId", get(video_comments).post(add_comment))
        .route("/c/:commentId", axum::routing::patch(update_comment).delete(delete_comment))
}

pub async fn video_comments(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Paged<CommentView>> {
    let video_id = parse_id(&video_id, "videoId")?;
    let Query(query) = query?;
    let page = query.resolve(10);
    let db = &*state.db;
    load_visible_video(db, video_id, &me).await?;

    let paginator = comments::Entity::find()
        .filter(comments::Column::VideoId.eq(video_id))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page.index()).await?;

    let owners = load_owners(db, rows.iter().map(|c| c.owner_id)).await?;
    let items = rows
        .into_iter()
        .map(|c| {
            let owner = owners.get(&c.owner_id).cloned();
            CommentView::from_model(c, owner)
        })
        .collect();

    Ok(ApiResponse::ok(
        Paged::new(items, total, page),
        "Comments fetched successfully",
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<CommentView> {
    let video_id = parse_id(&video_id, "videoId")?;
    let content = content_of(payload)?;
    let db = &*state.db;
    load_visible_video(db, video_id, &me).await?;

    let now = chrono::Utc::now();
    let comment = comments::ActiveModel {
        id: Set(Uuid::new_v4()),
        video_id: Set(video_id),
        owner_id: Set(me.id()),
        content: Set(content),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    Ok(ApiResponse::created(
        CommentView::from_model(comment, None),
        "Comment added successfully",
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(comment_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<CommentView> {
    let id = parse_id(&comment_id, "commentId")?;
    let content = content_of(payload)?;
    let db = &*state.db;

    let mut active: comments::ActiveModel = load_owned_comment(db, id, &me).await?.into();
    active.content = Set(content);
    active.updated_at = Set(chrono::Utc::now().into());
    let comment = active.update(db).await?;

    Ok(ApiResponse::ok(
        CommentView::from_model(comment, None),
        "Comment updated successfully",
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&comment_id, "commentId")?;
    let db = &*state.db;
    load_owned_comment(db, id, &me).await?;
    comments::Entity::delete_by_id(id).exec(db).await?;
    Ok(ApiResponse::ok((), "Comment deleted successfully"))
}
