use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    error::AppError,
    extract::{PathParam, QueryParams, ValidatedJson},
    state::AppState,
    users::{
        dto::{
            AuthResponse, DatedUserList, NameQuery, RangeQuery, ReferencedUserList,
            RegisterRequest, SignInRequest, UserList, UserResponse,
        },
        services,
    },
};

/// Reference user of the fixed-reference search routes.
const LEGACY_REFERENCE_USER: &str = "john";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/signin", post(sign_in))
        .route("/users/login", post(sign_in))
}

pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/users/all", get(all_users))
        .route("/users/search/name", get(search_by_name))
        .route("/users/search/userid/:username", get(search_by_username))
        .route("/users/search/salary", get(search_by_salary))
        .route("/users/search/age", get(search_by_age))
        .route("/users/search/registered-after/:username", get(registered_after))
        .route("/users/search/after-john", get(registered_after_john))
        .route("/users/search/same-day-as/:username", get(same_day_as))
        .route("/users/search/same-day-as-john", get(same_day_as_john))
        .route("/users/search/registered-today", get(registered_today))
        .route("/users/search/never-signed-in", get(never_signed_in))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = services::register(state.users.as_ref(), payload, OffsetDateTime::now_utc()).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = services::sign_in(
        state.users.as_ref(),
        &payload.username,
        &payload.password,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(AuthResponse {
        message: "Sign-in successful",
        user,
    }))
}

#[instrument(skip(state))]
pub async fn search_by_name(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<NameQuery>,
) -> Result<Json<UserList>, AppError> {
    Ok(Json(services::search_by_name(state.users.as_ref(), &q).await?))
}

#[instrument(skip(state))]
pub async fn search_by_username(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::find_by_username(state.users.as_ref(), &username).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state))]
pub async fn search_by_salary(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<RangeQuery>,
) -> Result<Json<UserList>, AppError> {
    let (min, max) = q.salary_bounds()?;
    Ok(Json(services::salary_between(state.users.as_ref(), min, max).await?))
}

#[instrument(skip(state))]
pub async fn search_by_age(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<RangeQuery>,
) -> Result<Json<UserList>, AppError> {
    let (min, max) = q.age_bounds()?;
    Ok(Json(services::age_between(state.users.as_ref(), min, max).await?))
}

#[instrument(skip(state))]
pub async fn registered_after(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
) -> Result<Json<ReferencedUserList>, AppError> {
    Ok(Json(
        services::registered_after(state.users.as_ref(), &username).await?,
    ))
}

pub async fn registered_after_john(
    state: State<AppState>,
) -> Result<Json<ReferencedUserList>, AppError> {
    registered_after(state, PathParam(LEGACY_REFERENCE_USER.to_string())).await
}

#[instrument(skip(state))]
pub async fn same_day_as(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
) -> Result<Json<ReferencedUserList>, AppError> {
    Ok(Json(
        services::registered_same_day_as(
            state.users.as_ref(),
            &username,
            state.config.day_offset,
        )
        .await?,
    ))
}

pub async fn same_day_as_john(
    state: State<AppState>,
) -> Result<Json<ReferencedUserList>, AppError> {
    same_day_as(state, PathParam(LEGACY_REFERENCE_USER.to_string())).await
}

#[instrument(skip(state))]
pub async fn registered_today(
    State(state): State<AppState>,
) -> Result<Json<DatedUserList>, AppError> {
    Ok(Json(
        services::registered_today(
            state.users.as_ref(),
            OffsetDateTime::now_utc(),
            state.config.day_offset,
        )
        .await?,
    ))
}

#[instrument(skip(state))]
pub async fn never_signed_in(State(state): State<AppState>) -> Result<Json<UserList>, AppError> {
    Ok(Json(services::never_signed_in(state.users.as_ref()).await?))
}

#[instrument(skip(state))]
pub async fn all_users(State(state): State<AppState>) -> Result<Json<UserList>, AppError> {
    Ok(Json(services::all(state.users.as_ref()).await?))
}
