use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    filter::UserFilter,
    repo::{RepoError, UserStore},
    repo_types::{NewUser, User},
};

/// Process-local store, used when no database is configured and in tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::AlreadyExists);
        }
        let user = User::from(user);
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError> {
        let users = self.users.read().await;
        let mut found: Vec<User> = users.iter().filter(|u| filter.matches(u)).cloned().collect();
        found.sort_by(|a, b| {
            a.registerday
                .cmp(&b.registerday)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(found)
    }

    async fn record_sign_in(&self, id: Uuid, at: OffsetDateTime) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.signintime = Some(at);
        Ok(user.clone())
    }
}
