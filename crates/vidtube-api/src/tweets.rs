use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    routing::{get, patch, post},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::{tweets, users};

use crate::error::ApiError;
use crate::pagination::{PageQuery, Paged};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::users::OwnerView;
use crate::validate::{Required, ensure_owner, parse_id};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerView>,
}

impl TweetView {
    fn from_model(t: tweets::Model, owner: Option<OwnerView>) -> Self {
        Self {
            id: t.id,
            owner_id: t.owner_id,
            content: t.content,
            created_at: t.created_at,
            updated_at: t.updated_at,
            owner,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TweetRequest {
    pub content: Option<String>,
}

fn content_of(payload: Result<Json<TweetRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let content = required.take("content", input.content).trim().to_string();
    required.finish()?;
    Ok(content)
}

async fn load_owned_tweet(
    db: &DatabaseConnection,
    id: Uuid,
    me: &AuthUser,
) -> Result<tweets::Model, ApiError> {
    let tweet = tweets::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    ensure_owner(tweet.owner_id, me.id(), "tweet")?;
    Ok(tweet)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_tweet))
        .route("/user/:userId", get(user_tweets))
        .route("/:tweetId", patch(update_tweet).delete(delete_tweet))
}

pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> ApiResult<TweetView> {
    let content = content_of(payload)?;
    let now = chrono::Utc::now();
    let tweet = tweets::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(me.id()),
        content: Set(content),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&*state.db)
    .await?;

    Ok(ApiResponse::created(
        TweetView::from_model(tweet, None),
        "Tweet created successfully",
    ))
}

pub async fn user_tweets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Paged<TweetView>> {
    let user_id = parse_id(&user_id, "userId")?;
    let Query(query) = query?;
    let page = query.resolve(10);
    let db = &*state.db;

    let owner = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map(OwnerView::from)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let paginator = tweets::Entity::find()
        .filter(tweets::Column::OwnerId.eq(user_id))
        .order_by_desc(tweets::Column::CreatedAt)
        .order_by_asc(tweets::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator
        .fetch_page(page.index())
        .await?
        .into_iter()
        .map(|t| TweetView::from_model(t, Some(owner.clone())))
        .collect();

    Ok(ApiResponse::ok(
        Paged::new(items, total, page),
        "Tweets fetched successfully",
    ))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> ApiResult<TweetView> {
    let id = parse_id(&tweet_id, "tweetId")?;
    let content = content_of(payload)?;
    let db = &*state.db;

    let mut active: tweets::ActiveModel = load_owned_tweet(db, id, &me).await?.into();
    active.content = Set(content);
    active.updated_at = Set(chrono::Utc::now().into());
    let tweet = active.update(db).await?;

    Ok(ApiResponse::ok(
        TweetView::from_model(tweet, None),
        "Tweet updated successfully",
    ))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(tweet_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&tweet_id, "tweetId")?;
    let db = &*state.db;
    load_owned_tweet(db, id, &me).await?;
    tweets::Entity::delete_by_id(id).exec(db).await?;
    Ok(ApiResponse::ok((), "Tweet deleted successfully"))
}
