use anyhow::Context;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::users::{
    dto::{DatedUserList, NameQuery, ReferencedUserList, RegisterRequest, UserList},
    filter::{DayRange, UserFilter},
    password::{hash_password, verify_password, verify_unknown_user},
    repo::{RepoError, UserStore},
    repo_types::{NewUser, User},
};

/// Creates a user with a hashed password, `registerday = now` and no sign-in yet.
pub async fn register(
    store: &dyn UserStore,
    req: RegisterRequest,
    now: OffsetDateTime,
) -> Result<User, AppError> {
    if store.find_by_username(&req.username).await?.is_some() {
        warn!(username = %req.username, "username already registered");
        return Err(AppError::DuplicateUsername);
    }

    // Argon2 blocks for a while; run it off the async workers.
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("join password hashing task")??;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: req.username,
        password_hash,
        firstname: req.firstname,
        lastname: req.lastname,
        salary: req.salary,
        age: i32::try_from(req.age).context("age out of range")?,
        registerday: now,
    };

    let user = store.insert(new_user).await.map_err(|e| {
        if matches!(e, RepoError::AlreadyExists) {
            warn!("username taken by a concurrent registration");
        }
        AppError::from(e)
    })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Checks credentials and stamps `signintime = now` on success.
pub async fn sign_in(
    store: &dyn UserStore,
    username: &str,
    password: &str,
    now: OffsetDateTime,
) -> Result<User, AppError> {
    let Some(user) = store.find_by_username(username).await? else {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || verify_unknown_user(&password))
            .await
            .context("join password verification task")?;
        warn!(%username, "sign-in for unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let hash = user.password_hash.clone();
    let password = password.to_owned();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("join password verification task")??;
    if !ok {
        warn!(%username, user_id = %user.id, "sign-in with invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let user = store.record_sign_in(user.id, now).await?;
    info!(user_id = %user.id, %username, "user signed in");
    Ok(user)
}

pub async fn search_by_name(store: &dyn UserStore, q: &NameQuery) -> Result<UserList, AppError> {
    let filter = UserFilter::name(q.firstname.as_deref(), q.lastname.as_deref())
        .ok_or_else(|| AppError::MissingParameter("firstname or lastname".into()))?;
    search(store, &filter).await
}

pub async fn find_by_username(store: &dyn UserStore, username: &str) -> Result<User, AppError> {
    store
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User".into()))
}

pub async fn salary_between(store: &dyn UserStore, min: f64, max: f64) -> Result<UserList, AppError> {
    search(store, &UserFilter::SalaryBetween { min, max }).await
}

pub async fn age_between(store: &dyn UserStore, min: i32, max: i32) -> Result<UserList, AppError> {
    search(store, &UserFilter::AgeBetween { min, max }).await
}

/// Users registered strictly after `username` did.
pub async fn registered_after(
    store: &dyn UserStore,
    username: &str,
) -> Result<ReferencedUserList, AppError> {
    let reference = reference_user(store, username).await?;
    let list = search(store, &UserFilter::RegisteredAfter(reference.registerday)).await?;
    Ok(ReferencedUserList {
        list,
        ref_registered_on: reference.registerday,
    })
}

/// Users registered on the same calendar day (in `offset`) as `username`.
pub async fn registered_same_day_as(
    store: &dyn UserStore,
    username: &str,
    offset: UtcOffset,
) -> Result<ReferencedUserList, AppError> {
    let reference = reference_user(store, username).await?;
    let range = DayRange::containing(reference.registerday, offset);
    let list = search(store, &UserFilter::RegisteredWithin(range)).await?;
    Ok(ReferencedUserList {
        list,
        ref_registered_on: reference.registerday,
    })
}

pub async fn registered_today(
    store: &dyn UserStore,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<DatedUserList, AppError> {
    let range = DayRange::containing(now, offset);
    let list = search(store, &UserFilter::RegisteredWithin(range)).await?;
    Ok(DatedUserList {
        list,
        date: range.start.date().to_string(),
    })
}

pub async fn never_signed_in(store: &dyn UserStore) -> Result<UserList, AppError> {
    search(store, &UserFilter::NeverSignedIn).await
}

pub async fn all(store: &dyn UserStore) -> Result<UserList, AppError> {
    search(store, &UserFilter::All).await
}

async fn search(store: &dyn UserStore, filter: &UserFilter) -> Result<UserList, AppError> {
    let users = store.find(filter).await?;
    debug!(?filter, count = users.len(), "user search");
    Ok(UserList::from(users))
}

async fn reference_user(store: &dyn UserStore, username: &str) -> Result<User, AppError> {
    store
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("Reference user".into()))
}
