use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    routing::{get, patch, post},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::{subscriptions, users, videos, watch_history};

use crate::auth;
use crate::error::ApiError;
use crate::pagination::{PageQuery, Paged};
use crate::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::validate::Required;
use crate::videos::{VideoView, visible_condition};

/// Public projection of a user row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<users::Model> for UserView {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar,
            cover_image: u.cover_image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Compact author card embedded in videos, comments, tweets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

impl From<users::Model> for OwnerView {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            avatar: u.avatar,
        }
    }
}

pub(crate) async fn load_owners(
    db: &DatabaseConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, OwnerView>, DbErr> {
    let ids: Vec<Uuid> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|u| (u.id, OwnerView::from(u))).collect())
}

async fn load_me(state: &AppState, me: &AuthUser) -> Result<users::Model, ApiError> {
    users::Entity::find_by_id(me.id())
        .one(&*state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user).post(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/coverImage", patch(update_cover_image))
        .route("/c/:username", get(channel_profile))
        .route("/history", get(history))
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let old_password = required.take("oldPassword", input.old_password);
    let new_password = required.take("newPassword", input.new_password);
    required.finish()?;

    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = load_me(&state, &me).await?;
    if !verify_password(&user.password_hash, &old_password) {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&new_password)?);
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(&*state.db).await?;

    tracing::info!(user_id = %me.id(), "password changed");
    Ok(ApiResponse::ok((), "Password changed successfully"))
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
) -> ApiResult<UserView> {
    let user = load_me(&state, &me).await?;
    Ok(ApiResponse::ok(user.into(), "Current user fetched successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<UserView> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let full_name = required.take("fullName", input.full_name).trim().to_string();
    let email = required.take("email", input.email).trim().to_lowercase();
    required.finish()?;

    let db = &*state.db;
    let taken = users::Entity::find()
        .filter(users::Column::Email.eq(email.clone()))
        .filter(users::Column::Id.ne(me.id()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict("Email is already in use"));
    }

    let mut active: users::ActiveModel = load_me(&state, &me).await?.into();
    active.full_name = Set(full_name);
    active.email = Set(email);
    active.updated_at = Set(chrono::Utc::now().into());
    let user = active.update(db).await?;

    Ok(ApiResponse::ok(user.into(), "Account details updated successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageRequest {
    pub url: Option<String>,
}

async fn set_image(
    state: &AppState,
    me: &AuthUser,
    payload: Result<Json<ImageRequest>, JsonRejection>,
    apply: impl FnOnce(&mut users::ActiveModel, String),
) -> Result<users::Model, ApiError> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let url = required.take("url", input.url).trim().to_string();
    required.finish()?;

    let mut active: users::ActiveModel = load_me(state, me).await?.into();
    apply(&mut active, url);
    active.updated_at = Set(chrono::Utc::now().into());
    Ok(active.update(&*state.db).await?)
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<UserView> {
    let user = set_image(&state, &me, payload, |u, url| u.avatar = Set(url)).await?;
    Ok(ApiResponse::ok(user.into(), "Avatar updated successfully"))
}

pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<UserView> {
    let user = set_image(&state, &me, payload, |u, url| u.cover_image = Set(Some(url))).await?;
    Ok(ApiResponse::ok(user.into(), "Cover image updated successfully"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub subscribers_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
}

pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(username): Path<String>,
) -> ApiResult<ChannelProfile> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is missing"));
    }

    let db = &*state.db;
    let channel = users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let subscribers_count = subscriptions::Entity::find()
        .filter(subscriptions::Column::ChannelId.eq(channel.id))
        .count(db)
        .await?;
    let channels_subscribed_to_count = subscriptions::Entity::find()
        .filter(subscriptions::Column::SubscriberId.eq(channel.id))
        .count(db)
        .await?;
    let is_subscribed = subscriptions::Entity::find()
        .filter(subscriptions::Column::ChannelId.eq(channel.id))
        .filter(subscriptions::Column::SubscriberId.eq(me.id()))
        .count(db)
        .await?
        > 0;

    Ok(ApiResponse::ok(
        ChannelProfile {
            id: channel.id,
            username: channel.username,
            full_name: channel.full_name,
            avatar: channel.avatar,
            cover_image: channel.cover_image,
            created_at: channel.created_at,
            subscribers_count,
            channels_subscribed_to_count,
            is_subscribed,
        },
        "User channel fetched successfully",
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub watched_at: DateTimeWithTimeZone,
    pub video: VideoView,
}

pub async fn history(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Paged<HistoryEntry>> {
    let Query(query) = query?;
    let page = query.resolve(20);
    let db = &*state.db;

    let paginator = watch_history::Entity::find()
        .filter(watch_history::Column::UserId.eq(me.id()))
        .order_by_desc(watch_history::Column::WatchedAt)
        .find_also_related(videos::Entity)
        .filter(visible_condition(me.id()))
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page.index()).await?;

    let owners = load_owners(db, rows.iter().filter_map(|(_, v)| v.as_ref().map(|v| v.owner_id))).await?;
    let items = rows
        .into_iter()
        .filter_map(|(entry, video)| {
            let video = video?;
            let owner = owners.get(&video.owner_id).cloned();
            Some(HistoryEntry {
                watched_at: entry.watched_at,
                video: VideoView::from_model(video, owner),
            })
        })
        .collect();

    Ok(ApiResponse::ok(
        Paged::new(items, total, page),
        "Watch history fetched successfully",
    ))
}
