use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub firstname: String,
    pub lastname: String,
    pub salary: f64,
    pub age: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub registerday: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub signintime: Option<OffsetDateTime>, // None until the first successful sign-in
}

/// Everything needed to insert a user; the hash is computed before this exists.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub salary: f64,
    pub age: i32,
    pub registerday: OffsetDateTime,
}

impl From<NewUser> for User {
    fn from(n: NewUser) -> Self {
        Self {
            id: n.id,
            username: n.username,
            password_hash: n.password_hash,
            firstname: n.firstname,
            lastname: n.lastname,
            salary: n.salary,
            age: n.age,
            registerday: n.registerday,
            signintime: None,
        }
    }
}
