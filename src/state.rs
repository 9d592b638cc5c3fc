use crate::config::GatewayConfig;
use crate::discord::{DiscordClient, DiscordOAuth};
use crate::jira::JiraClient;
use crate::mailcow::MailcowClient;
use crate::provision::Provisioner;
use crate::session::SessionStore;
use crate::store::{create_store, Store};
use crate::sync::{GroupSync, UserLocks};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Store,
    pub sessions: SessionStore,
    pub discord: DiscordClient,
    pub discord_oauth: DiscordOAuth,
    pub jira: JiraClient,
    pub mailcow: MailcowClient,
    /// Per-user provisioning locks, shared by every reconciliation run
    locks: Arc<UserLocks>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, std::io::Error> {
        let sessions = SessionStore::new(config.session.ttl_secs);
        let discord = DiscordClient::new(&config.discord).map_err(into_io)?;
        let discord_oauth = DiscordOAuth::new(&config.discord).map_err(into_io)?;
        let jira = JiraClient::new(&config.jira).map_err(into_io)?;
        let mailcow = MailcowClient::new(&config.mailcow).map_err(into_io)?;

        Ok(Self {
            config: Arc::new(config),
            store: create_store(),
            sessions,
            discord,
            discord_oauth,
            jira,
            mailcow,
            locks: Arc::new(UserLocks::default()),
        })
    }

    /// Build the reconciliation engine over this state's clients. Cheap:
    /// every part is a handle.
    pub fn group_sync(&self) -> GroupSync {
        let provisioner = Provisioner::new(
            self.store.clone(),
            self.discord.clone(),
            self.jira.clone(),
            self.mailcow.clone(),
            self.config.provision.clone(),
        );
        GroupSync::new(
            self.store.clone(),
            self.discord.clone(),
            self.jira.clone(),
            provisioner,
            self.config.discord.guild_id.clone(),
            self.locks.clone(),
        )
    }

    #[cfg(test)]
    pub fn for_testing(config: &GatewayConfig) -> Self {
        Self::new(config.clone()).expect("Failed to initialize test state")
    }
}

fn into_io(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            admin_token: "test_admin_token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_app_state_clone_shares_data() {
        let state = AppState::for_testing(&test_config());
        let state2 = state.clone();

        // After cloning, both instances should point to the same data
        assert_eq!(Arc::as_ptr(&state.config), Arc::as_ptr(&state2.config));
        assert_eq!(Arc::as_ptr(&state.locks), Arc::as_ptr(&state2.locks));
    }

    #[tokio::test]
    async fn test_app_state_thread_safety() {
        let state = AppState::for_testing(&test_config());

        let mut handles = vec![];
        for _ in 0..10 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                state.config.admin_token == "test_admin_token"
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
