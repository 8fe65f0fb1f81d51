use axum::{
    Extension, Router,
    extract::{Path, State},
    routing::get,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use uuid::Uuid;
use vidtube_db::entities::{subscriptions, users};

use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::users::{OwnerView, load_owners};
use crate::validate::parse_id;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub is_subscribed: bool,
}

/// One side of a subscription edge plus when it was created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    pub user: OwnerView,
    pub subscribed_at: DateTimeWithTimeZone,
}

async fn ensure_user_exists(db: &DatabaseConnection, id: Uuid, what: &str) -> Result<(), ApiError> {
    if users::Entity::find_by_id(id).one(db).await?.is_none() {
        return Err(ApiError::not_found(format!("{what} not found")));
    }
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/c/:channelId", get(channel_subscribers).post(toggle_subscription))
        .route("/u/:subscriberId", get(subscribed_channels))
}

pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(channel_id): Path<String>,
) -> ApiResult<SubscriptionState> {
    let channel_id = parse_id(&channel_id, "channelId")?;
    if channel_id == me.id() {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }

    let db = &*state.db;
    ensure_user_exists(db, channel_id, "Channel").await?;

    let existing = subscriptions::Entity::find()
        .filter(subscriptions::Column::SubscriberId.eq(me.id()))
        .filter(subscriptions::Column::ChannelId.eq(channel_id))
        .one(db)
        .await?;

    let is_subscribed = match existing {
        Some(sub) => {
            subscriptions::Entity::delete_by_id(sub.id).exec(db).await?;
            false
        }
        None => {
            subscriptions::ActiveModel {
                id: Set(Uuid::new_v4()),
                subscriber_id: Set(me.id()),
                channel_id: Set(channel_id),
                created_at: Set(chrono::Utc::now().into()),
            }
            .insert(db)
            .await?;
            true
        }
    };

    tracing::info!(subscriber_id = %me.id(), %channel_id, is_subscribed, "subscription toggled");
    let message = if is_subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(SubscriptionState { is_subscribed }, message))
}

pub async fn channel_subscribers(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> ApiResult<Vec<SubscriptionEntry>> {
    let channel_id = parse_id(&channel_id, "channelId")?;
    let db = &*state.db;
    ensure_user_exists(db, channel_id, "Channel").await?;

    let rows = subscriptions::Entity::find()
        .filter(subscriptions::Column::ChannelId.eq(channel_id))
        .order_by_desc(subscriptions::Column::CreatedAt)
        .all(db)
        .await?;
    let mut subscribers = load_owners(db, rows.iter().map(|s| s.subscriber_id)).await?;
    let entries = rows
        .into_iter()
        .filter_map(|s| {
            subscribers.remove(&s.subscriber_id).map(|user| SubscriptionEntry {
                user,
                subscribed_at: s.created_at,
            })
        })
        .collect();

    Ok(ApiResponse::ok(entries, "Subscribers fetched successfully"))
}

pub async fn subscribed_channels(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> ApiResult<Vec<SubscriptionEntry>> {
    let subscriber_id = parse_id(&subscriber_id, "subscriberId")?;
    let db = &*state.db;
    ensure_user_exists(db, subscriber_id, "User").await?;

    let rows = subscriptions::Entity::find()
        .filter(subscriptions::Column::SubscriberId.eq(subscriber_id))
        .order_by_desc(subscriptions::Column::CreatedAt)
        .all(db)
        .await?;
    let mut channels = load_owners(db, rows.iter().map(|s| s.channel_id)).await?;
    let entries = rows
        .into_iter()
        .filter_map(|s| {
            channels.remove(&s.channel_id).map(|user| SubscriptionEntry {
                user,
                subscribed_at: s.created_at,
            })
        })
        .collect();

    Ok(ApiResponse::ok(entries, "Subscribed channels fetched successfully"))
}
