use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::{
    filter::UserFilter,
    repo_types::{NewUser, User},
};

const USER_COLUMNS: &str =
    "id, username, password_hash, firstname, lastname, salary, age, registerday, signintime";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("user not found")]
    NotFound,
    #[error("username already exists")]
    AlreadyExists,
    #[error("database query failed: {0}")]
    TechnicalError(#[from] sqlx::Error),
}

/// Persistent collection of users, unique on `username`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `AlreadyExists` when the username is taken.
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    /// Users matching `filter`, ordered by `registerday` then `username`.
    async fn find(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError>;
    /// Sets `signintime` and returns the updated user.
    async fn record_sign_in(&self, id: Uuid, at: OffsetDateTime) -> Result<User, RepoError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `SELECT` for `filter`. Usernames sort bytewise (`COLLATE "C"`) so ties
/// come back in the same order as from the in-memory store.
fn select_matching(filter: &UserFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
    filter.push_where(&mut qb);
    qb.push(r#" ORDER BY registerday ASC, username COLLATE "C" ASC"#);
    qb
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, password_hash, firstname, lastname, salary, age, registerday)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.firstname)
            .bind(&user.lastname)
            .bind(user.salary)
            .bind(user.age)
            .bind(user.registerday)
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if duplicate {
                    RepoError::AlreadyExists
                } else {
                    RepoError::TechnicalError(e)
                }
            })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError> {
        let users = select_matching(filter)
            .build_query_as::<User>()
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn record_sign_in(&self, id: Uuid, at: OffsetDateTime) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            UPDATE users
               SET signintime = $2
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_orders_by_registerday_then_bytewise_username() {
        let qb = select_matching(&UserFilter::SalaryBetween { min: 0.0, max: 1.0 });
        assert_eq!(
            qb.sql(),
            format!(
                r#"SELECT {USER_COLUMNS} FROM users WHERE salary >= $1 AND salary <= $2 ORDER BY registerday ASC, username COLLATE "C" ASC"#
            )
        );
    }

    #[test]
    fn select_without_filter_has_no_where() {
        let qb = select_matching(&UserFilter::All);
        assert!(!qb.sql().contains("WHERE"));
        assert!(qb.sql().starts_with("SELECT id, username, password_hash"));
    }
}
