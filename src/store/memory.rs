use super::{StoreBackend, StoreError};
use crate::models::{AccessToken, Application, AuthorizationCode, GroupLink, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    applications: HashMap<String, Application>,
    codes: HashMap<String, AuthorizationCode>,
    tokens: HashMap<String, AccessToken>,
    group_links: HashMap<String, GroupLink>,
}

/// In-memory store backed by a single read-write lock.
///
/// Conditional updates and `take_code` run entirely under the write lock,
/// which is what gives them their atomicity. No lock is ever held across
/// an await point.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn upsert_user(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.write()?;
        let stored = inner
            .users
            .entry(user.discord_id.clone())
            .or_insert(user)
            .clone();
        Ok(stored)
    }

    async fn user_by_discord_id(&self, discord_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(discord_id).cloned())
    }

    async fn user_by_jira_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.jira_key.as_deref() == Some(key))
            .cloned())
    }

    async fn set_jira_key_if_unset(
        &self,
        discord_id: &str,
        key: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.users.get_mut(discord_id) {
            Some(user) if user.jira_key.is_none() => {
                user.jira_key = Some(key.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_mailcow_email_if_unset(
        &self,
        discord_id: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.users.get_mut(discord_id) {
            Some(user) if user.mailcow_email.is_none() => {
                user.mailcow_email = Some(email.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn put_application(&self, app: Application) -> Result<(), StoreError> {
        self.write()?.applications.insert(app.id.clone(), app);
        Ok(())
    }

    async fn application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        Ok(self.read()?.applications.get(id).cloned())
    }

    async fn delete_application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        Ok(self.write()?.applications.remove(id))
    }

    async fn put_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        self.write()?.codes.insert(code.token.clone(), code);
        Ok(())
    }

    async fn take_code(&self, token: &str) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(self.write()?.codes.remove(token))
    }

    async fn put_token(&self, token: AccessToken) -> Result<(), StoreError> {
        self.write()?.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.read()?.tokens.get(token).cloned())
    }

    async fn put_group_link(&self, link: GroupLink) -> Result<(), StoreError> {
        self.write()?.group_links.insert(link.id.clone(), link);
        Ok(())
    }

    async fn group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError> {
        Ok(self.read()?.group_links.get(id).cloned())
    }

    async fn delete_group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError> {
        Ok(self.write()?.group_links.remove(id))
    }

    async fn group_links(&self) -> Result<Vec<GroupLink>, StoreError> {
        Ok(self.read()?.group_links.values().cloned().collect())
    }

    async fn base_role_link(&self) -> Result<Option<GroupLink>, StoreError> {
        Ok(self
            .read()?
            .group_links
            .values()
            .find(|link| link.base_role)
            .cloned())
    }
}
