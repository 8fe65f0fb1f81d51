use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidtube_db::entities::users;
use vidtube_session::{SessionConfig, TokenPair};

use crate::error::ApiError;
use crate::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::response::{ApiResponse, ApiResult};
use crate::security::AuthUser;
use crate::state::AppState;
use crate::users::UserView;
use crate::validate::Required;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

fn cookie_base(name: &'static str, value: String) -> Cookie<'static> {
    let mut c = Cookie::new(name, value);
    c.set_http_only(true);
    c.set_secure(true);
    c.set_same_site(SameSite::Lax);
    c.set_path("/");
    c
}

fn clear_cookie(name: &'static str) -> Cookie<'static> {
    let mut c = cookie_base(name, String::new());
    c.make_removal();
    c
}

fn with_session_cookies(jar: CookieJar, pair: &TokenPair, config: &SessionConfig) -> CookieJar {
    let mut access = cookie_base(ACCESS_COOKIE_NAME, pair.access_token.clone());
    access.set_max_age(config.access_ttl);
    let mut refresh = cookie_base(REFRESH_COOKIE_NAME, pair.refresh_token.clone());
    refresh.set_max_age(config.refresh_ttl);
    jar.add(access).add(refresh)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserView> {
    let Json(input) = payload?;

    let mut required = Required::new();
    let username = required.take("userName", input.user_name).trim().to_lowercase();
    let email = required.take("email", input.email).trim().to_lowercase();
    let full_name = required.take("fullName", input.full_name).trim().to_string();
    let password = required.take("password", input.password);
    let avatar = required.take("avatar", input.avatar).trim().to_string();
    let cover_image = required.take("coverImage", input.cover_image).trim().to_string();
    required.finish()?;

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let db = &*state.db;
    let existing = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Username.eq(username.clone()))
                .add(users::Column::Email.eq(email.clone())),
        )
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with email or username already exists"));
    }

    let now = chrono::Utc::now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        full_name: Set(full_name),
        avatar: Set(avatar),
        cover_image: Set(Some(cover_image)),
        password_hash: Set(hash_password(&password)?),
        refresh_token: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(user.into(), "User registered successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let Json(input) = payload?;

    let username = input
        .user_name
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty());
    let email = input
        .email
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }
    let password = input
        .password
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("Password is required"))?;

    let mut by_name_or_email = Condition::any();
    if let Some(username) = username {
        by_name_or_email = by_name_or_email.add(users::Column::Username.eq(username));
    }
    if let Some(email) = email {
        by_name_or_email = by_name_or_email.add(users::Column::Email.eq(email));
    }

    let user = users::Entity::find()
        .filter(by_name_or_email)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid user credentials"))?;

    if !verify_password(&user.password_hash, &password) {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let pair = state.sessions.issue(user.id).await?;
    let jar = with_session_cookies(jar, &pair, state.sessions.config());

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user: user.into(),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(me): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), ApiError> {
    state.sessions.revoke(me.id()).await?;

    let jar = jar
        .add(clear_cookie(ACCESS_COOKIE_NAME))
        .add(clear_cookie(REFRESH_COOKIE_NAME));

    tracing::info!(user_id = %me.id(), "user logged out");
    Ok((jar, ApiResponse::ok((), "User logged out")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, ApiResponse<TokenPair>), ApiError> {
    let presented = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token));

    let pair = state.sessions.rotate(presented.as_deref()).await?;
    let jar = with_session_cookies(jar, &pair, state.sessions.config());

    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}
