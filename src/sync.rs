//! Group reconciliation.
//!
//! Makes a user's Jira group memberships match the Discord roles they
//! currently hold, using the GroupLink table as the mapping. Runs on
//! every login and on every bearer-token resource access, so it has to
//! be idempotent and safe to retry after partial application.

use crate::discord::{DiscordClient, DiscordError};
use crate::jira::{JiraClient, JiraError, JiraUser};
use crate::provision::{Provisioner, ProvisionError};
use crate::store::{Store, StoreBackend, StoreError};
use futures::future::{try_join_all, BoxFuture};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Errors that can occur during reconciliation
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no local record for user {0}")]
    UnknownUser(String),
    #[error(transparent)]
    Discord(#[from] DiscordError),
    #[error(transparent)]
    Jira(#[from] JiraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Per-user async locks serializing first-provisioning.
///
/// Without this, two concurrent reconciliation calls for the same
/// unprovisioned user would both miss the Jira lookup and both create an
/// account. The conditional key write alone cannot prevent the second
/// creation, only the second write.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The reconciliation engine.
#[derive(Clone)]
pub struct GroupSync {
    store: Store,
    discord: DiscordClient,
    jira: JiraClient,
    provisioner: Provisioner,
    guild_id: String,
    locks: Arc<UserLocks>,
}

impl GroupSync {
    pub fn new(
        store: Store,
        discord: DiscordClient,
        jira: JiraClient,
        provisioner: Provisioner,
        guild_id: impl Into<String>,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            store,
            discord,
            jira,
            provisioner,
            guild_id: guild_id.into(),
            locks,
        }
    }

    /// Reconcile one user's Jira groups against their Discord roles.
    ///
    /// Provisions the Jira account (and mailbox) when the user has no key
    /// yet. Additions are idempotent; "already a member" answers are
    /// swallowed. Both additions and removals are awaited before success
    /// is reported. Partial application on failure is not rolled back;
    /// a retry converges.
    pub async fn sync_user(&self, discord_id: &str) -> Result<(), SyncError> {
        let member = self
            .discord
            .guild_member(&self.guild_id, discord_id)
            .await?;

        let jira_user = self.ensure_provisioned(discord_id).await?;
        let links = self.store.group_links().await?;

        // Stale memberships: linked groups whose role the member lost
        let mut ops: Vec<BoxFuture<'_, Result<(), SyncError>>> = Vec::new();
        for group in jira_user.group_names() {
            let Some(link) = links.iter().find(|l| l.jira_name == group) else {
                continue;
            };
            if member.has_role(&link.id) {
                continue;
            }
            let jira = self.jira.clone();
            let username = jira_user.name.clone();
            debug!("Removing {username} from Jira group {group}");
            ops.push(Box::pin(async move {
                jira.remove_group_member(&group, &username).await?;
                Ok(())
            }));
        }

        // Held roles with a mapping become memberships; groups the user
        // is already in are left untouched
        let current_groups = jira_user.group_names();
        for role in &member.roles {
            let Some(link) = links.iter().find(|l| &l.id == role) else {
                continue;
            };
            if current_groups.iter().any(|g| g == &link.jira_name) {
                continue;
            }
            let jira = self.jira.clone();
            let username = jira_user.name.clone();
            let group = link.jira_name.clone();
            debug!("Adding {username} to Jira group {group}");
            ops.push(Box::pin(async move {
                // A concurrent reconciliation may have added the group in
                // the meantime; that answer is not a failure
                match jira.add_group_member(&group, &username).await {
                    Ok(()) | Err(JiraError::AlreadyMember) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }));
        }

        try_join_all(ops).await?;
        info!("Reconciled groups for user {discord_id}");
        Ok(())
    }

    /// Fetch the user's Jira record, provisioning it first when no key is
    /// stored. First-provisioning is serialized per user.
    async fn ensure_provisioned(&self, discord_id: &str) -> Result<JiraUser, SyncError> {
        let user = self
            .store
            .user_by_discord_id(discord_id)
            .await?
            .ok_or_else(|| SyncError::UnknownUser(discord_id.to_string()))?;

        if let Some(key) = &user.jira_key {
            return Ok(self.jira.user_by_key(key).await?);
        }

        let _guard = self.locks.acquire(discord_id).await;

        // Re-read under the lock: a concurrent call may have provisioned
        let user = self
            .store
            .user_by_discord_id(discord_id)
            .await?
            .ok_or_else(|| SyncError::UnknownUser(discord_id.to_string()))?;
        match &user.jira_key {
            Some(key) => Ok(self.jira.user_by_key(key).await?),
            None => Ok(self.provisioner.provision(&user).await?),
        }
    }
}
