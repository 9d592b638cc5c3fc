use crate::models::{AccessToken, Application, AuthorizationCode, GroupLink, User};
use thiserror::Error;

pub mod memory;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
}

/// Store trait defining the interface for all persistence backends.
///
/// The gateway only ever talks to records through this trait; the
/// concrete persistence technology stays behind it. Two operations carry
/// atomicity guarantees the rest of the system leans on:
///
/// - `take_code` removes and returns an authorization code in one step,
///   which is what makes code redemption exactly-once.
/// - `set_jira_key_if_unset` / `set_mailcow_email_if_unset` write only
///   when the field is still unset, so concurrent provisioning cannot
///   overwrite a key that already landed.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Create the user if absent, returning the stored record either way
    async fn upsert_user(&self, user: User) -> Result<User, StoreError>;

    async fn user_by_discord_id(&self, discord_id: &str) -> Result<Option<User>, StoreError>;

    async fn user_by_jira_key(&self, key: &str) -> Result<Option<User>, StoreError>;

    /// Set the Jira key only when currently unset; returns whether it was written
    async fn set_jira_key_if_unset(&self, discord_id: &str, key: &str)
        -> Result<bool, StoreError>;

    /// Set the mailbox address only when currently unset; returns whether it was written
    async fn set_mailcow_email_if_unset(
        &self,
        discord_id: &str,
        email: &str,
    ) -> Result<bool, StoreError>;

    async fn put_application(&self, app: Application) -> Result<(), StoreError>;

    async fn application(&self, id: &str) -> Result<Option<Application>, StoreError>;

    async fn delete_application(&self, id: &str) -> Result<Option<Application>, StoreError>;

    async fn put_code(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Remove and return the code in one atomic step (single consumption)
    async fn take_code(&self, token: &str) -> Result<Option<AuthorizationCode>, StoreError>;

    async fn put_token(&self, token: AccessToken) -> Result<(), StoreError>;

    async fn token(&self, token: &str) -> Result<Option<AccessToken>, StoreError>;

    async fn put_group_link(&self, link: GroupLink) -> Result<(), StoreError>;

    async fn group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError>;

    async fn delete_group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError>;

    async fn group_links(&self) -> Result<Vec<GroupLink>, StoreError>;

    /// The single link flagged as the base role, if any
    async fn base_role_link(&self) -> Result<Option<GroupLink>, StoreError>;
}

/// Store implementation that provides a uniform interface regardless of backend.
///
/// The concrete backend is chosen at startup; handlers only see this enum.
#[derive(Clone)]
pub enum Store {
    /// In-memory store, the only backend shipped with the gateway
    Memory(memory::MemoryStore),
}

#[async_trait::async_trait]
impl StoreBackend for Store {
    async fn upsert_user(&self, user: User) -> Result<User, StoreError> {
        match self {
            Self::Memory(store) => store.upsert_user(user).await,
        }
    }

    async fn user_by_discord_id(&self, discord_id: &str) -> Result<Option<User>, StoreError> {
        match self {
            Self::Memory(store) => store.user_by_discord_id(discord_id).await,
        }
    }

    async fn user_by_jira_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        match self {
            Self::Memory(store) => store.user_by_jira_key(key).await,
        }
    }

    async fn set_jira_key_if_unset(
        &self,
        discord_id: &str,
        key: &str,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => store.set_jira_key_if_unset(discord_id, key).await,
        }
    }

    async fn set_mailcow_email_if_unset(
        &self,
        discord_id: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => store.set_mailcow_email_if_unset(discord_id, email).await,
        }
    }

    async fn put_application(&self, app: Application) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put_application(app).await,
        }
    }

    async fn application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        match self {
            Self::Memory(store) => store.application(id).await,
        }
    }

    async fn delete_application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        match self {
            Self::Memory(store) => store.delete_application(id).await,
        }
    }

    async fn put_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put_code(code).await,
        }
    }

    async fn take_code(&self, token: &str) -> Result<Option<AuthorizationCode>, StoreError> {
        match self {
            Self::Memory(store) => store.take_code(token).await,
        }
    }

    async fn put_token(&self, token: AccessToken) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put_token(token).await,
        }
    }

    async fn token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        match self {
            Self::Memory(store) => store.token(token).await,
        }
    }

    async fn put_group_link(&self, link: GroupLink) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put_group_link(link).await,
        }
    }

    async fn group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError> {
        match self {
            Self::Memory(store) => store.group_link(id).await,
        }
    }

    async fn delete_group_link(&self, id: &str) -> Result<Option<GroupLink>, StoreError> {
        match self {
            Self::Memory(store) => store.delete_group_link(id).await,
        }
    }

    async fn group_links(&self) -> Result<Vec<GroupLink>, StoreError> {
        match self {
            Self::Memory(store) => store.group_links().await,
        }
    }

    async fn base_role_link(&self) -> Result<Option<GroupLink>, StoreError> {
        match self {
            Self::Memory(store) => store.base_role_link().await,
        }
    }
}

/// Factory function to create the store backend
pub fn create_store() -> Store {
    Store::Memory(memory::MemoryStore::new())
}
