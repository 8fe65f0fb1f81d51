use axum::{
    Extension, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::{get, post},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;
use vidtube_db::entities::{comments, likes, tweets, videos};

use crate::error::ApiError;
use crate::pagination::{PageQuery, Paged};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::validate::parse_id;
use crate::videos::{VideoView, is_visible, visible_condition, with_owners};

/// The thing a like points at. A like row sets exactly one target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeTarget {
    Video(Uuid),
    Comment(Uuid),
    Tweet(Uuid),
}

impl LikeTarget {
    fn column(self) -> likes::Column {
        match self {
            LikeTarget::Video(_) => likes::Column::VideoId,
            LikeTarget::Comment(_) => likes::Column::CommentId,
            LikeTarget::Tweet(_) => likes::Column::TweetId,
        }
    }

    fn id(self) -> Uuid {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => id,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "Video",
            LikeTarget::Comment(_) => "Comment",
            LikeTarget::Tweet(_) => "Tweet",
        }
    }

    /// Whether `me` can see the target. Comments follow their video.
    async fn visible(self, db: &DatabaseConnection, me: Uuid) -> Result<bool, DbErr> {
        Ok(match self {
            LikeTarget::Video(id) => videos::Entity::find_by_id(id)
                .one(db)
                .await?
                .is_some_and(|v| is_visible(&v, me)),
            LikeTarget::Comment(id) => comments::Entity::find_by_id(id)
                .find_also_related(videos::Entity)
                .one(db)
                .await?
                .and_then(|(_, video)| video)
                .is_some_and(|v| is_visible(&v, me)),
            LikeTarget::Tweet(id) => tweets::Entity::find_by_id(id).one(db).await?.is_some(),
        })
    }

    fn new_like(self, liked_by: Uuid) -> likes::ActiveModel {
        let (mut video_id, mut comment_id, mut tweet_id) = (None, None, None);
        match self {
            LikeTarget::Video(id) => video_id = Some(id),
            LikeTarget::Comment(id) => comment_id = Some(id),
            LikeTarget::Tweet(id) => tweet_id = Some(id),
        }
        likes::ActiveModel {
            id: Set(Uuid::new_v4()),
            liked_by: Set(liked_by),
            video_id: Set(video_id),
            comment_id: Set(comment_id),
            tweet_id: Set(tweet_id),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub is_liked: bool,
}

async fn toggle(state: &AppState, me: &AuthUser, target: LikeTarget) -> ApiResult<LikeState> {
    let db = &*state.db;
    if !target.visible(db, me.id()).await? {
        return Err(ApiError::not_found(format!("{} not found", target.label())));
    }

    let existing = likes::Entity::find()
        .filter(likes::Column::LikedBy.eq(me.id()))
        .filter(target.column().eq(target.id()))
        .one(db)
        .await?;

    let is_liked = match existing {
        Some(like) => {
            likes::Entity::delete_by_id(like.id).exec(db).await?;
            false
        }
        None => {
            target.new_like(me.id()).insert(db).await?;
            true
        }
    };

    tracing::debug!(user_id = %me.id(), kind = target.label(), is_liked, "like toggled");
    Ok(ApiResponse::ok(
        LikeState { is_liked },
        format!("{} like toggled", target.label()),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/toggle/v/:videoId", post(toggle_video_like))
        .route("/toggle/c/:commentId", post(toggle_comment_like))
        .route("/toggle/t/:tweetId", post(toggle_tweet_like))
        .route("/videos", get(liked_videos))
}

pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<LikeState> {
    let target = LikeTarget::Video(parse_id(&video_id, "videoId")?);
    toggle(&state, &me, target).await
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> ApiResult<LikeState> {
    let target = LikeTarget::Comment(parse_id(&comment_id, "commentId")?);
    toggle(&state, &me, target).await
}

pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
) -> ApiResult<LikeState> {
    let target = LikeTarget::Tweet(parse_id(&tweet_id, "tweetId")?);
    toggle(&state, &me, target).await
}

pub async fn liked_videos(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Paged<VideoView>> {
    let Query(query) = query?;
    let page = query.resolve(20);
    let db = &*state.db;

    let paginator = likes::Entity::find()
        .filter(likes::Column::LikedBy.eq(me.id()))
        .filter(likes::Column::VideoId.is_not_null())
        .order_by_desc(likes::Column::CreatedAt)
        .find_also_related(videos::Entity)
        .filter(visible_condition(me.id()))
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page.index()).await?;

    let liked: Vec<videos::Model> = rows.into_iter().filter_map(|(_, video)| video).collect();
    Ok(ApiResponse::ok(
        Paged::new(with_owners(db, liked).await?, total, page),
        "Liked videos fetched successfully",
    ))
}

#[cfg(test)]
mod tests {
    use sea_orm::ActiveValue;

    use super::*;

    #[test]
    fn new_like_sets_only_the_target_column() {
        let me = Uuid::new_v4();
        let comment = Uuid::new_v4();
        let like = LikeTarget::Comment(comment).new_like(me);

        assert!(matches!(like.liked_by, ActiveValue::Set(id) if id == me));
        assert!(matches!(like.comment_id, ActiveValue::Set(Some(id)) if id == comment));
        assert!(matches!(like.video_id, ActiveValue::Set(None)));
        assert!(matches!(like.tweet_id, ActiveValue::Set(None)));
    }

    #[test]
    fn target_maps_to_its_column() {
        let id = Uuid::new_v4();
        assert!(matches!(LikeTarget::Video(id).column(), likes::Column::VideoId));
        assert!(matches!(LikeTarget::Tweet(id).column(), likes::Column::TweetId));
        assert_eq!(LikeTarget::Tweet(id).id(), id);
    }
}
