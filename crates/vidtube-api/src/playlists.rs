use std::collections::HashMap;

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{delete, get, patch, post},
};
use sea_orm::prelude::{DateTimeWithTimeZone, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::{playlist_videos, playlists, users, videos};

use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::validate::{Required, ensure_owner, parse_id};
use crate::videos::{VideoView, with_owners};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub total_videos: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<VideoView>>,
}

impl PlaylistView {
    fn from_model(p: playlists::Model, total_videos: u64, videos: Option<Vec<VideoView>>) -> Self {
        Self {
            id: p.id,
            owner_id: p.owner_id,
            name: p.name,
            description: p.description,
            created_at: p.created_at,
            updated_at: p.updated_at,
            total_videos,
            videos,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub video_id: Option<String>,
}

async fn load_playlist(db: &DatabaseConnection, id: Uuid) -> Result<playlists::Model, ApiError> {
    playlists::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))
}

async fn load_owned_playlist(
    db: &DatabaseConnection,
    id: Uuid,
    me: &AuthUser,
) -> Result<playlists::Model, ApiError> {
    let playlist = load_playlist(db, id).await?;
    ensure_owner(playlist.owner_id, me.id(), "playlist")?;
    Ok(playlist)
}

async fn ensure_video_exists(db: &DatabaseConnection, id: Uuid) -> Result<(), ApiError> {
    if videos::Entity::find_by_id(id).one(db).await?.is_none() {
        return Err(ApiError::not_found("Video not found"));
    }
    Ok(())
}

/// Videos visible to `viewer` in a playlist, oldest addition first.
async fn playlist_videos_for(
    db: &DatabaseConnection,
    playlist_id: Uuid,
    viewer: Uuid,
) -> Result<Vec<VideoView>, ApiError> {
    let rows = playlist_videos::Entity::find()
        .filter(playlist_videos::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_videos::Column::AddedAt)
        .find_also_related(videos::Entity)
        .all(db)
        .await?;
    let visible = rows
        .into_iter()
        .filter_map(|(_, video)| video)
        .filter(|v| v.is_published || v.owner_id == viewer)
        .collect();
    Ok(with_owners(db, visible).await?)
}

async fn video_counts(
    db: &DatabaseConnection,
    playlist_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, u64>, ApiError> {
    if playlist_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let counts: Vec<(Uuid, i64)> = playlist_videos::Entity::find()
        .select_only()
        .column(playlist_videos::Column::PlaylistId)
        .column_as(Expr::col(playlist_videos::Column::VideoId).count(), "total")
        .filter(playlist_videos::Column::PlaylistId.is_in(playlist_ids))
        .group_by(playlist_videos::Column::PlaylistId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(counts
        .into_iter()
        .map(|(id, total)| (id, u64::try_from(total).unwrap_or(0)))
        .collect())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_playlist))
        .route(
            "/:playlistId",
            get(get_playlist).patch(update_playlist).delete(delete_playlist),
        )
        .route("/add/:videoId/:playlistId", patch(add_video))
        .route("/remove/:videoId/:playlistId", delete(remove_video))
        .route("/user/:userId", get(user_playlists))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    payload: Result<Json<PlaylistRequest>, JsonRejection>,
) -> ApiResult<PlaylistView> {
    let Json(input) = payload?;
    let mut required = Required::new();
    let name = required.take("name", input.name).trim().to_string();
    let description = required.take("description", input.description).trim().to_string();
    required.finish()?;
    let video_id = input
        .video_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_id(v, "videoId"))
        .transpose()?;

    let db = &*state.db;
    if let Some(video_id) = video_id {
        ensure_video_exists(db, video_id).await?;
    }

    let now = chrono::Utc::now();
    let txn = db.begin().await?;
    let playlist = playlists::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(me.id()),
        name: Set(name),
        description: Set(description),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;
    if let Some(video_id) = video_id {
        playlist_videos::ActiveModel {
            playlist_id: Set(playlist.id),
            video_id: Set(video_id),
            added_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    let total = u64::from(video_id.is_some());
    Ok(ApiResponse::created(
        PlaylistView::from_model(playlist, total, None),
        "Playlist created successfully",
    ))
}

pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> ApiResult<PlaylistView> {
    let id = parse_id(&playlist_id, "playlistId")?;
    let db = &*state.db;
    let playlist = load_playlist(db, id).await?;
    let videos = playlist_videos_for(db, id, me.id()).await?;
    let total = videos.len() as u64;

    Ok(ApiResponse::ok(
        PlaylistView::from_model(playlist, total, Some(videos)),
        "Playlist fetched successfully",
    ))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
    payload: Result<Json<PlaylistRequest>, JsonRejection>,
) -> ApiResult<PlaylistView> {
    let id = parse_id(&playlist_id, "playlistId")?;
    let Json(input) = payload?;
    let mut required = Required::new();
    let name = required.take("name", input.name).trim().to_string();
    let description = required.take("description", input.description).trim().to_string();
    required.finish()?;

    let db = &*state.db;
    let mut active: playlists::ActiveModel = load_owned_playlist(db, id, &me).await?.into();
    active.name = Set(name);
    active.description = Set(description);
    active.updated_at = Set(chrono::Utc::now().into());
    let playlist = active.update(db).await?;
    let total = video_counts(db, vec![id]).await?.get(&id).copied().unwrap_or(0);

    Ok(ApiResponse::ok(
        PlaylistView::from_model(playlist, total, None),
        "Playlist updated successfully",
    ))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&playlist_id, "playlistId")?;
    let db = &*state.db;
    load_owned_playlist(db, id, &me).await?;
    playlists::Entity::delete_by_id(id).exec(db).await?;
    Ok(ApiResponse::ok((), "Playlist deleted successfully"))
}

fn parse_pair(ids: &(String, String)) -> Result<(Uuid, Uuid), ApiError> {
    Ok((parse_id(&ids.0, "videoId")?, parse_id(&ids.1, "playlistId")?))
}

pub async fn add_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(ids): Path<(String, String)>,
) -> ApiResult<PlaylistView> {
    let (video_id, playlist_id) = parse_pair(&ids)?;
    let db = &*state.db;
    let playlist = load_owned_playlist(db, playlist_id, &me).await?;
    ensure_video_exists(db, video_id).await?;

    let already = playlist_videos::Entity::find_by_id((playlist_id, video_id))
        .one(db)
        .await?
        .is_some();
    if !already {
        playlist_videos::ActiveModel {
            playlist_id: Set(playlist_id),
            video_id: Set(video_id),
            added_at: Set(chrono::Utc::now().into()),
        }
        .insert(db)
        .await?;
    }

    let total = video_counts(db, vec![playlist_id])
        .await?
        .get(&playlist_id)
        .copied()
        .unwrap_or(0);
    Ok(ApiResponse::ok(
        PlaylistView::from_model(playlist, total, None),
        "Video added to playlist",
    ))
}

pub async fn remove_video(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    Path(ids): Path<(String, String)>,
) -> ApiResult<PlaylistView> {
    let (video_id, playlist_id) = parse_pair(&ids)?;
    let db = &*state.db;
    let playlist = load_owned_playlist(db, playlist_id, &me).await?;

    let res = playlist_videos::Entity::delete_by_id((playlist_id, video_id))
        .exec(db)
        .await?;
    if res.rows_affected == 0 {
        return Err(ApiError::not_found("Video is not in this playlist"));
    }

    let total = video_counts(db, vec![playlist_id])
        .await?
        .get(&playlist_id)
        .copied()
        .unwrap_or(0);
    Ok(ApiResponse::ok(
        PlaylistView::from_model(playlist, total, None),
        "Video removed from playlist",
    ))
}

pub async fn user_playlists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<PlaylistView>> {
    let user_id = parse_id(&user_id, "userId")?;
    let db = &*state.db;
    if users::Entity::find_by_id(user_id).one(db).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let rows = playlists::Entity::find()
        .filter(playlists::Column::OwnerId.eq(user_id))
        .order_by_desc(playlists::Column::CreatedAt)
        .all(db)
        .await?;
    let counts = video_counts(db, rows.iter().map(|p| p.id).collect()).await?;
    let items = rows
        .into_iter()
        .map(|p| {
            let total = counts.get(&p.id).copied().unwrap_or(0);
            PlaylistView::from_model(p, total, None)
        })
        .collect();

    Ok(ApiResponse::ok(items, "User playlists fetched successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_video_then_playlist() {
        let video = Uuid::new_v4();
        let playlist = Uuid::new_v4();
        let parsed = parse_pair(&(video.to_string(), playlist.to_string())).unwrap();
        assert_eq!(parsed, (video, playlist));
    }

    #[test]
    fn pair_names_the_bad_segment() {
        let err = parse_pair(&(Uuid::new_v4().to_string(), "nope".into())).unwrap_err();
        assert_eq!(err.message, "Invalid playlistId");
    }
}
