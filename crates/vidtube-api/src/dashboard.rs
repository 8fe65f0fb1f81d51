use axum::{
    Extension, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use vidtube_db::entities::{likes, subscriptions, videos};

use crate::pagination::{PageQuery, Paged};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::videos::VideoView;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: u64,
    pub total_views: i64,
    pub total_video_likes: u64,
    pub total_subscribers: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(channel_stats))
        .route("/videos", get(channel_videos))
}

pub async fn channel_stats(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> ApiResult<ChannelStats> {
    let db = &*state.db;

    let total_videos = videos::Entity::find()
        .filter(videos::Column::OwnerId.eq(me.id()))
        .count(db)
        .await?;

    // SUM over an integer column comes back as bigint, or NULL with no rows.
    let total_views: Option<i64> = videos::Entity::find()
        .select_only()
        .column_as(videos::Column::Views.sum(), "total_views")
        .filter(videos::Column::OwnerId.eq(me.id()))
        .into_tuple()
        .one(db)
        .await?
        .flatten();

    let total_video_likes = likes::Entity::find()
        .inner_join(videos::Entity)
        .filter(videos::Column::OwnerId.eq(me.id()))
        .count(db)
        .await?;

    let total_subscribers = subscriptions::Entity::find()
        .filter(subscriptions::Column::ChannelId.eq(me.id()))
        .count(db)
        .await?;

    Ok(ApiResponse::ok(
        ChannelStats {
            total_videos,
            total_views: total_views.unwrap_or(0),
            total_video_likes,
            total_subscribers,
        },
        "Channel stats fetched successfully",
    ))
}

pub async fn channel_videos(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Paged<VideoView>> {
    let Query(query) = query?;
    let page = query.resolve(20);

    let paginator = videos::Entity::find()
        .filter(videos::Column::OwnerId.eq(me.id()))
        .order_by_desc(videos::Column::CreatedAt)
        .order_by_asc(videos::Column::Id)
        .paginate(&*state.db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator
        .fetch_page(page.index())
        .await?
        .into_iter()
        .map(|v| VideoView::from_model(v, None))
        .collect();

    Ok(ApiResponse::ok(
        Paged::new(items, total, page),
        "Channel videos fetched successfully",
    ))
}
